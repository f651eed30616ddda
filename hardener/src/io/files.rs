//! Whole-file text I/O used by the file mutators.
//!
//! Reads and writes are whole-file; appends open with create + append and
//! never rewrite existing bytes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

pub fn read_text(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Read the file, replacing invalid UTF-8 with U+FFFD instead of failing.
///
/// For presence checks only; never write the result back.
pub fn read_text_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Replace the file's content, creating it if absent.
pub fn write_text(path: &Path, contents: &str) -> io::Result<()> {
    debug!(path = %path.display(), bytes = contents.len(), "writing file");
    fs::write(path, contents)
}

/// Append to the file, creating it if absent.
pub fn append_text(path: &Path, contents: &str) -> io::Result<()> {
    debug!(path = %path.display(), bytes = contents.len(), "appending to file");
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_creates_then_extends() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("limits.conf");

        append_text(&path, "a\n").expect("append");
        append_text(&path, "b\n").expect("append");

        assert_eq!(read_text(&path).expect("read"), "a\nb\n");
    }

    #[test]
    fn write_replaces_existing_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("http-dos.conf");

        write_text(&path, "old contents\n").expect("write");
        write_text(&path, "new\n").expect("write");

        assert_eq!(read_text(&path).expect("read"), "new\n");
    }

    #[test]
    fn lossy_read_keeps_valid_text_around_bad_bytes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("limits.conf");
        fs::write(&path, b"# caf\xe9 limits\n* hard core 0\n").expect("write");

        assert_eq!(
            read_text(&path).expect_err("strict").kind(),
            io::ErrorKind::InvalidData
        );
        let text = read_text_lossy(&path).expect("lossy");
        assert_eq!(text, "# caf\u{fffd} limits\n* hard core 0\n");
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_text(&temp.path().join("missing")).expect_err("missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
