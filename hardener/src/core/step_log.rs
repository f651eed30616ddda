//! Append-only record of the mutations attempted in a run.
//!
//! Insertion order is the order of intended system changes. Only the engine
//! appends; everyone else sees a slice.

use std::fmt::Write as _;

use crate::core::types::StepRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepLog {
    records: Vec<StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Render records as a numbered plan, one step per line.
pub fn render_plan(records: &[StepRecord]) -> String {
    let width = records.len().to_string().len();
    let mut out = String::new();
    for (idx, record) in records.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{:>width$}. {record}", idx + 1);
    }
    out
}
