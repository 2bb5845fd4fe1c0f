use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Command spec ──────────────────────────────────────────────────────────────

/// A fixed external command: program plus arguments, never passed through a shell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

// ── Menu action commands ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActionCommands {
    pub show_network: CommandSpec,
    pub restart_network: CommandSpec,
    pub ping_test: CommandSpec,
    pub show_logs: CommandSpec,
    pub shell: CommandSpec,
    pub reboot: CommandSpec,
    pub shutdown: CommandSpec,
}

impl Default for ActionCommands {
    fn default() -> Self {
        Self {
            show_network: CommandSpec::new("cat", &["/etc/network/interfaces"]),
            restart_network: CommandSpec::new("ifreload", &["-a"]),
            ping_test: CommandSpec::new("ping", &["-c", "3", "8.8.8.8"]),
            show_logs: CommandSpec::new("journalctl", &["-n", "50", "--no-pager"]),
            shell: CommandSpec::new("/bin/bash", &[]),
            reboot: CommandSpec::new("reboot", &[]),
            shutdown: CommandSpec::new("poweroff", &[]),
        }
    }
}

// ── Ticket endpoint ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Realm appended to bare usernames (`root` -> `root@pam`).
    pub default_realm: String,
    pub timeout_ms: u64,
}

impl Default for AuthEndpoint {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8006,
            path: "/api2/json/access/ticket".into(),
            default_realm: "pam".into(),
            timeout_ms: 2000,
        }
    }
}

impl AuthEndpoint {
    pub fn url(&self) -> String {
        format!("https://{}:{}{}", self.host, self.port, self.path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ── Console config ────────────────────────────────────────────────────────────

/// Everything the console needs at runtime. Built once in `main` and only read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub title: String,
    pub default_vendor: String,
    pub screensaver_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub info_refresh_secs: u64,
    pub default_username: String,
    /// Port shown in the "To manage this host go to:" URLs.
    pub management_port: u16,
    pub auth: AuthEndpoint,
    pub shadow_path: PathBuf,
    pub version_command: CommandSpec,
    pub commands: ActionCommands,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            title: "Proxmox VE".into(),
            default_vendor: "Proxmox Server Solutions GmbH".into(),
            screensaver_timeout_secs: 60,
            poll_interval_ms: 1000,
            info_refresh_secs: 30,
            default_username: "root".into(),
            management_port: 8006,
            auth: AuthEndpoint::default(),
            shadow_path: PathBuf::from("/etc/shadow"),
            version_command: CommandSpec::new("pveversion", &[]),
            commands: ActionCommands::default(),
        }
    }
}

impl ConsoleConfig {
    /// Defaults, overlaid with the JSON file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => load_json(p),
            None => Ok(Self::default()),
        }
    }

    pub fn screensaver_timeout(&self) -> Duration {
        Duration::from_secs(self.screensaver_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn info_refresh(&self) -> Duration {
        Duration::from_secs(self.info_refresh_secs)
    }
}

// ── JSON helpers ──────────────────────────────────────────────────────────────

pub fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
