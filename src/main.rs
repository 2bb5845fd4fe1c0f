use anyhow::Result;
use clap::Parser;
use crossterm::{
    cursor, execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use pve_dcui::checks::{acknowledge_warnings, print_preflight, run_preflight};
use pve_dcui::config::ConsoleConfig;
use pve_dcui::core::auth::{AuthenticationService, Authenticator, PveTicketClient, TicketIssuer};
use pve_dcui::core::session::SessionController;
use pve_dcui::core::shadow::{select_lookup, SystemCrypt};
use pve_dcui::host_info::HostInfoProvider;
use pve_dcui::input::poll_key;
use pve_dcui::launcher::{ActionDispatcher, TerminalConsole};
use pve_dcui::logging;
use pve_dcui::ui::{self, Palette, Term};

#[derive(Debug, Parser)]
#[command(name = "pve-dcui", version, about = "Proxmox VE direct console")]
struct Cli {
    /// JSON file overriding the built-in console settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "/var/log/pve-dcui.log")]
    log_file: PathBuf,

    /// Skip the root and platform checks
    #[arg(long)]
    no_preflight: bool,
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn init_terminal() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(ratatui::Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

// ── Wiring ────────────────────────────────────────────────────────────────────

fn build_authenticator(config: &ConsoleConfig) -> AuthenticationService {
    let tickets = match PveTicketClient::new(&config.auth) {
        Ok(client) => Some(Box::new(client) as Box<dyn TicketIssuer>),
        Err(e) => {
            warn!(error = %e, "ticket client unavailable; local store only");
            None
        }
    };
    let lookup = select_lookup(&config.shadow_path);
    info!(lookup = lookup.name(), "credential lookup selected");
    AuthenticationService::new(tickets, lookup, Box::new(SystemCrypt))
}

// ── Main loop ─────────────────────────────────────────────────────────────────

fn run<A: Authenticator>(console: &mut TerminalConsole, config: &ConsoleConfig, auth: A) -> Result<()> {
    let palette = Palette::detect();
    let mut host_info = HostInfoProvider::new(config);
    let mut session = SessionController::new(auth, config, Instant::now());

    loop {
        let now = Instant::now();
        let host = host_info.current(now);
        let view = session.view(now);
        let drawn_dimmed = view.dimmed;
        console
            .terminal_mut()
            .draw(|f| ui::draw(f, &view, host, config, &palette))?;

        let key = poll_key(config.poll_interval())?;
        let mut dispatcher = ActionDispatcher::new(console, &config.commands);
        session.handle_key(key, Instant::now(), drawn_dimmed, &mut dispatcher);
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let logging_ready = logging::init(&cli.log_file);

    if !cli.no_preflight {
        let report = run_preflight();
        if !report.ok {
            print_preflight(&report);
            for e in &report.errors {
                error!("preflight: {e}");
            }
            std::process::exit(1);
        }
        for w in &report.warnings {
            warn!("preflight: {w}");
        }
        acknowledge_warnings(&report, &mut std::io::stdin().lock(), &mut std::io::stderr())?;
    }

    let config = ConsoleConfig::load(cli.config.as_deref())?;
    info!(logging_ready, title = %config.title, "console starting");
    let auth = build_authenticator(&config);

    let mut console = TerminalConsole::new(init_terminal()?);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        run(&mut console, &config, auth)
    }));

    // Always restore terminal
    restore_terminal(console.terminal_mut()).ok();

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(error = %e, "console loop failed");
            Err(e)
        }
        Err(_) => {
            error!("console loop panicked");
            eprintln!("pve-dcui crashed. Check {}", cli.log_file.display());
            std::process::exit(1);
        }
    }
}
