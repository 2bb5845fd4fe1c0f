use anyhow::Result;
use crossterm::{
    cursor,
    event::{poll, read},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{stdin, stdout, Write};
use std::ops::{Deref, DerefMut};
use std::process::Command;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ActionCommands, CommandSpec};
use crate::core::menu::{MenuAction, MenuItem};
use crate::core::session::Dispatch;
use crate::ui::Term;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' exited with {status}")]
    Failed { command: String, status: String },
}

/// The pieces of the console an action needs while the TUI is released.
pub trait Console {
    /// Leave raw mode and the alternate screen.
    fn suspend(&mut self) -> Result<()>;
    /// Re-enter raw mode and the alternate screen, ready for a full redraw.
    fn resume(&mut self) -> Result<()>;
    fn say(&mut self, text: &str);
    /// Line typed by the operator, without the trailing newline. Empty on read errors.
    fn read_line(&mut self, prompt: &str) -> String;
    fn run(&mut self, command: &CommandSpec) -> Result<(), DispatchError>;
}

// ── Scoped suspension ─────────────────────────────────────────────────────────

/// Holds the console released for the duration of an external program. Dropping it
/// reacquires the screen, whatever path the action took.
pub struct SuspendedScreen<'a, C: Console + ?Sized> {
    console: &'a mut C,
}

impl<'a, C: Console + ?Sized> SuspendedScreen<'a, C> {
    pub fn acquire(console: &'a mut C) -> Result<Self> {
        if let Err(e) = console.suspend() {
            // Put back whatever part of the screen state was already released.
            let _ = console.resume();
            return Err(e);
        }
        Ok(Self { console })
    }
}

impl<C: Console + ?Sized> Deref for SuspendedScreen<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.console
    }
}

impl<C: Console + ?Sized> DerefMut for SuspendedScreen<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.console
    }
}

impl<C: Console + ?Sized> Drop for SuspendedScreen<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.console.resume() {
            error!(error = %e, "failed to restore console screen");
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

pub const RETURN_PROMPT: &str = "\nPress Enter to return...";

pub fn command_for(commands: &ActionCommands, action: MenuAction) -> &CommandSpec {
    match action {
        MenuAction::ShowNetwork => &commands.show_network,
        MenuAction::RestartNetwork => &commands.restart_network,
        MenuAction::TestNetwork => &commands.ping_test,
        MenuAction::ViewLogs => &commands.show_logs,
        MenuAction::Shell => &commands.shell,
        MenuAction::Reboot => &commands.reboot,
        MenuAction::Shutdown => &commands.shutdown,
    }
}

pub struct ActionDispatcher<'a, C: Console> {
    console: &'a mut C,
    commands: &'a ActionCommands,
}

impl<'a, C: Console> ActionDispatcher<'a, C> {
    pub fn new(console: &'a mut C, commands: &'a ActionCommands) -> Self {
        Self { console, commands }
    }
}

impl<C: Console> Dispatch for ActionDispatcher<'_, C> {
    fn dispatch(&mut self, item: &MenuItem) {
        info!(action = ?item.action, "dispatching menu action");
        let mut screen = match SuspendedScreen::acquire(&mut *self.console) {
            Ok(screen) => screen,
            Err(e) => {
                error!(error = %e, "could not release console; action skipped");
                return;
            }
        };

        screen.say(&format!("\nExecuting: {}...\n", item.label));
        let command = command_for(self.commands, item.action);

        match item.action.confirmation() {
            Some(question) => {
                let answer = screen.read_line(question);
                if answer.trim().eq_ignore_ascii_case("y") {
                    run_logged(&mut *screen, command);
                } else {
                    info!(action = ?item.action, "cancelled by operator");
                    screen.say("Cancelled.");
                }
            }
            None => run_logged(&mut *screen, command),
        }

        if !item.action.is_interactive() {
            screen.read_line(RETURN_PROMPT);
        }
    }
}

fn run_logged<C: Console + ?Sized>(console: &mut C, command: &CommandSpec) {
    match console.run(command) {
        Ok(()) => info!(command = %command.display(), "command finished"),
        Err(e @ DispatchError::Failed { .. }) => warn!(error = %e, "command failed"),
        Err(e) => {
            warn!(error = %e, "command failed");
            console.say(&e.to_string());
        }
    }
}

// ── Real terminal ─────────────────────────────────────────────────────────────

pub struct TerminalConsole {
    terminal: Term,
}

impl TerminalConsole {
    pub fn new(terminal: Term) -> Self {
        Self { terminal }
    }

    pub fn terminal_mut(&mut self) -> &mut Term {
        &mut self.terminal
    }
}

impl Console for TerminalConsole {
    fn suspend(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(stdout(), LeaveAlternateScreen, cursor::Show)?;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, cursor::Hide)?;
        self.terminal.clear()?;
        drain_pending_input(Duration::from_millis(80));
        Ok(())
    }

    fn say(&mut self, text: &str) {
        let mut out = stdout();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn read_line(&mut self, prompt: &str) -> String {
        let mut out = stdout();
        let _ = write!(out, "{prompt}");
        let _ = out.flush();
        let mut line = String::new();
        if let Err(e) = stdin().read_line(&mut line) {
            warn!(error = %e, "reading operator input failed");
        }
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    fn run(&mut self, command: &CommandSpec) -> Result<(), DispatchError> {
        let status = Command::new(&command.program)
            .args(&command.args)
            .status()
            .map_err(|source| DispatchError::Spawn {
                command: command.display(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(DispatchError::Failed {
                command: command.display(),
                status: status.to_string(),
            })
        }
    }
}

/// Swallow keys typed while the external program had the terminal.
fn drain_pending_input(max_for: Duration) {
    let deadline = Instant::now() + max_for;
    while Instant::now() < deadline {
        match poll(Duration::from_millis(0)) {
            Ok(true) => {
                let _ = read();
            }
            _ => break,
        }
    }
}
