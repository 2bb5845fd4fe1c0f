use std::io::{self, BufRead, Write};
use std::process::Command;

#[derive(Debug, Default)]
pub struct PreflightReport {
    pub ok:       bool,
    pub errors:   Vec<String>,
    pub warnings: Vec<String>,
}

// Host tools behind the menu actions: (binary, what needs it)
const HOST_TOOLS: &[(&str, &str)] = &[
    ("pveversion", "host version on the idle screen"),
    ("ifreload",   "Restart Management Network"),
    ("ping",       "Test Management Network"),
    ("journalctl", "View System Logs"),
];

pub fn run_preflight() -> PreflightReport {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let is_root = unsafe { libc::geteuid() } == 0;
    build_report(is_root, sysinfo::IS_SUPPORTED_SYSTEM, which)
}

pub fn build_report<F: Fn(&str) -> bool>(
    is_root: bool,
    metrics_supported: bool,
    has_tool: F,
) -> PreflightReport {
    let mut errors   = Vec::new();
    let mut warnings = Vec::new();

    if !is_root {
        errors.push("This console must be run as root.".to_string());
    }
    if !metrics_supported {
        errors.push("System metrics are not available on this platform.".to_string());
    }
    for (bin, desc) in HOST_TOOLS {
        if !has_tool(bin) {
            warnings.push(format!("'{bin}' not found ({desc})"));
        }
    }

    PreflightReport { ok: errors.is_empty(), errors, warnings }
}

fn which(bin: &str) -> bool {
    Command::new("which").arg(bin).output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn print_preflight(report: &PreflightReport) {
    let _ = write_preflight(&mut io::stderr(), report);
}

pub fn write_preflight<W: Write>(out: &mut W, report: &PreflightReport) -> io::Result<()> {
    if !report.errors.is_empty() {
        writeln!(out, "\n== Proxmox VE console: cannot start ==")?;
        for e in &report.errors   { writeln!(out, "  x {e}")?; }
    }
    if !report.warnings.is_empty() {
        writeln!(out, "\n== Proxmox VE console: some actions will fail ==")?;
        for w in &report.warnings { writeln!(out, "  ! {w}")?; }
    }
    Ok(())
}

/// Shows the warnings and holds until Enter, so they are read before the TUI
/// takes over the screen. Returns without reading when there is nothing to show.
pub fn acknowledge_warnings<R: BufRead, W: Write>(
    report: &PreflightReport,
    input: &mut R,
    out: &mut W,
) -> io::Result<()> {
    if report.warnings.is_empty() {
        return Ok(());
    }
    write_preflight(out, report)?;
    write!(out, "\nPress Enter to continue...")?;
    out.flush()?;
    let mut buf = String::new();
    input.read_line(&mut buf)?;
    Ok(())
}
