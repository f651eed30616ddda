//! The fixed hardening procedure for Ubuntu 22.04 servers.
//!
//! Sections run in order on one [`RunContext`]; the first error aborts the
//! run and leaves earlier changes in place. Order matters: sshd moves to the
//! new port before the firewall and fail2ban reference it.

use std::borrow::Cow;

use shell_escape::escape;
use tracing::{info, instrument, warn};

use crate::engine::RunContext;
use crate::error::EngineResult;
use crate::io::console;

/// Operator-supplied inputs to the procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureParams {
    /// Non-root account to create and grant sudo.
    pub username: String,
    /// Port sshd is moved to.
    pub ssh_port: u16,
}

type SectionFn = fn(&mut RunContext, &ProcedureParams) -> EngineResult<()>;

/// Procedure sections in execution order.
pub const SECTIONS: &[(&str, SectionFn)] = &[
    ("Initial setup", initial_setup),
    ("Automatic security updates", automatic_security_updates),
    ("Non-root user", non_root_user),
    ("SSH", secure_ssh),
    ("Firewall", firewall),
    ("Fail2Ban", fail2ban),
    ("Unused services", unused_services),
    ("Shared memory", shared_memory),
    ("Kernel network parameters", sysctl),
    ("AppArmor", apparmor),
    ("Auditd", auditd),
    ("Password policy", password_policy),
    ("File integrity (AIDE)", file_integrity),
    ("Core dumps", core_dumps),
    ("Compiler tools", compiler_tools),
    ("/tmp", secure_tmp),
    ("Process accounting", process_accounting),
    ("CrowdSec", crowdsec),
    ("SYN flood protection", syn_flood),
    ("/proc", secure_proc),
    ("Suricata", suricata),
    ("Remote logging", remote_logging),
    ("Kernel modules", kernel_modules),
];

const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
const FSTAB: &str = "/etc/fstab";
const JAIL_LOCAL: &str = "/etc/fail2ban/jail.local";

const UNUSED_SERVICES: &[&str] = &[
    "bluetooth.service",
    "cups.service",
    "avahi-daemon.service",
    "rpcbind.service",
];

const DISABLED_KERNEL_MODULES: &[&str] = &[
    "cramfs", "freevxfs", "jffs2", "hfs", "hfsplus", "squashfs", "udf",
];

const HTTP_DOS_FILTER: &str = "
[Definition]
failregex = ^<HOST> -.*\"(GET|POST).*
ignoreregex =
";

const SYSCTL_SETTINGS: &str = "
net.ipv4.conf.all.accept_redirects = 0
net.ipv4.conf.all.send_redirects = 0
net.ipv4.conf.all.accept_source_route = 0
net.ipv4.conf.all.log_martians = 1
net.ipv4.tcp_syncookies = 1
net.ipv4.icmp_echo_ignore_broadcasts = 1
net.ipv6.conf.all.disable_ipv6 = 1
kernel.randomize_va_space = 2
";

const PWQUALITY_SETTINGS: &str = "
minlen = 14
dcredit = -1
ucredit = -1
ocredit = -1
lcredit = -1
";

const RSYSLOG_SETTINGS: &str = "
$FileCreateMode 0640
*.* @@remote-log-server:514
";

/// Run every section in order.
#[instrument(skip_all, fields(mode = %ctx.mode(), ssh_port = params.ssh_port))]
pub fn run_procedure(ctx: &mut RunContext, params: &ProcedureParams) -> EngineResult<()> {
    for (idx, (name, section)) in SECTIONS.iter().enumerate() {
        info!(section = name, "starting section");
        console::notice(format!("==> [{}/{}] {name}", idx + 1, SECTIONS.len()));
        section(ctx, params)?;
    }
    console::notice("Server hardening completed. You should reboot now.");
    Ok(())
}

/// Single-quote `value` for interpolation into a shell command string.
fn quote(value: &str) -> Cow<'_, str> {
    escape(Cow::Borrowed(value))
}

fn initial_setup(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt update && sudo apt upgrade -y")?;
    ctx.run_command("sudo apt install -y unattended-upgrades")?;
    ctx.run_command("sudo dpkg-reconfigure -f noninteractive --priority=low unattended-upgrades")?;
    Ok(())
}

fn automatic_security_updates(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt install -y apt-listchanges")?;
    ctx.edit_file(
        "/etc/apt/apt.conf.d/50unattended-upgrades",
        "//      \"${distro_id}:${distro_codename}-security\";",
        "        \"${distro_id}:${distro_codename}-security\";",
    )
}

fn non_root_user(ctx: &mut RunContext, params: &ProcedureParams) -> EngineResult<()> {
    let user = quote(&params.username);
    ctx.run_command(&format!(
        "sudo adduser --disabled-password --gecos '' {user}"
    ))?;
    ctx.run_command(&format!("sudo usermod -aG sudo {user}"))?;
    Ok(())
}

fn secure_ssh(ctx: &mut RunContext, params: &ProcedureParams) -> EngineResult<()> {
    ctx.edit_file(SSHD_CONFIG, "PermitRootLogin yes", "PermitRootLogin no")?;
    ctx.edit_file(
        SSHD_CONFIG,
        "PasswordAuthentication yes",
        "PasswordAuthentication no",
    )?;
    ctx.ensure_line_in_file(SSHD_CONFIG, "PubkeyAuthentication yes\n")?;
    ctx.edit_file(SSHD_CONFIG, "Port 22", &format!("Port {}", params.ssh_port))?;
    ctx.run_command("sudo systemctl restart sshd")?;
    Ok(())
}

fn firewall(ctx: &mut RunContext, params: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo ufw default deny incoming")?;
    ctx.run_command("sudo ufw default allow outgoing")?;
    ctx.run_command(&format!(
        "sudo ufw limit {}/tcp comment 'SSH port'",
        params.ssh_port
    ))?;
    ctx.run_command("sudo ufw --force enable")?;
    Ok(())
}

fn fail2ban(ctx: &mut RunContext, params: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt install -y fail2ban")?;
    ctx.run_command("sudo cp /etc/fail2ban/jail.conf /etc/fail2ban/jail.local")?;
    ctx.append_to_file(JAIL_LOCAL, &jail_local_block(params.ssh_port))?;
    ctx.write_file("/etc/fail2ban/filter.d/http-dos.conf", HTTP_DOS_FILTER)?;
    ctx.run_command("sudo systemctl restart fail2ban")?;
    Ok(())
}

fn jail_local_block(ssh_port: u16) -> String {
    format!(
        "
[sshd]
enabled = true
port = {ssh_port}
maxretry = 3
bantime = 86400

[http-dos]
enabled = true
port = http,https
filter = http-dos
logpath = /var/log/apache2/access.log
maxretry = 300
findtime = 300
bantime = 600
"
    )
}

fn unused_services(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    for service in UNUSED_SERVICES {
        if !ctx.service_exists(service) {
            warn!(service, "service not found, skipping");
            console::warning(format!("{service} not found, skipping"));
            continue;
        }
        ctx.run_command(&format!("sudo systemctl disable {service}"))?;
        ctx.run_command(&format!("sudo systemctl stop {service}"))?;
    }
    Ok(())
}

fn shared_memory(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.ensure_line_in_file(FSTAB, "tmpfs /run/shm tmpfs defaults,noexec,nosuid 0 0\n")
}

fn sysctl(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.append_to_file("/etc/sysctl.conf", SYSCTL_SETTINGS)?;
    ctx.run_command("sudo sysctl -p")?;
    Ok(())
}

fn apparmor(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt install -y apparmor apparmor-utils")?;
    ctx.run_command("sudo aa-enforce /etc/apparmor.d/*")?;
    Ok(())
}

fn auditd(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt install -y auditd")?;
    ctx.run_command("sudo systemctl enable auditd")?;
    ctx.run_command("sudo systemctl start auditd")?;
    Ok(())
}

fn password_policy(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt install -y libpam-pwquality")?;
    ctx.append_to_file("/etc/security/pwquality.conf", PWQUALITY_SETTINGS)
}

fn file_integrity(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt install -y aide")?;
    ctx.run_command("sudo aideinit")?;
    ctx.run_command("sudo mv /var/lib/aide/aide.db.new /var/lib/aide/aide.db")?;
    Ok(())
}

fn core_dumps(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.ensure_line_in_file("/etc/security/limits.conf", "* hard core 0\n")
}

fn compiler_tools(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt-get remove -y gcc make")?;
    Ok(())
}

fn secure_tmp(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo mount -o remount,noexec,nosuid,nodev /tmp")?;
    ctx.ensure_line_in_file(FSTAB, "tmpfs /tmp tmpfs defaults,noexec,nosuid,nodev 0 0\n")
}

fn process_accounting(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt install -y acct")?;
    ctx.run_command("sudo /etc/init.d/acct start")?;
    Ok(())
}

fn crowdsec(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command(
        "curl -s https://packagecloud.io/install/repositories/crowdsec/crowdsec/script.deb.sh | sudo bash",
    )?;
    ctx.run_command("sudo apt-get install -y crowdsec")?;
    ctx.run_command("sudo systemctl start crowdsec")?;
    ctx.run_command("sudo apt-get install -y crowdsec-firewall-bouncer-iptables")?;
    Ok(())
}

fn syn_flood(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command(
        "sudo iptables -A INPUT -p tcp --syn -m limit --limit 1/s --limit-burst 3 -j ACCEPT",
    )?;
    ctx.run_command("sudo iptables -A INPUT -p tcp --syn -j DROP")?;
    Ok(())
}

fn secure_proc(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.ensure_line_in_file(FSTAB, "proc /proc proc defaults,hidepid=2 0 0\n")
}

fn suricata(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo add-apt-repository -y ppa:oisf/suricata-stable")?;
    ctx.run_command("sudo apt update")?;
    ctx.run_command("sudo apt install -y suricata")?;
    ctx.run_command("sudo suricata-update")?;
    Ok(())
}

fn remote_logging(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    ctx.run_command("sudo apt install -y rsyslog")?;
    ctx.append_to_file("/etc/rsyslog.conf", RSYSLOG_SETTINGS)?;
    ctx.run_command("sudo systemctl restart rsyslog")?;
    Ok(())
}

fn kernel_modules(ctx: &mut RunContext, _: &ProcedureParams) -> EngineResult<()> {
    for module in DISABLED_KERNEL_MODULES {
        ctx.ensure_line_in_file(
            "/etc/modprobe.d/disablemodules.conf",
            &format!("install {module} /bin/false\n"),
        )?;
    }
    Ok(())
}
