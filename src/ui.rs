use ratatui::{
    layout::{Alignment, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use crate::config::ConsoleConfig;
use crate::core::session::{LoginField, SessionState, SessionView};
use crate::host_info::{management_url, HostInfo};
use crate::status::render_footer;

pub type Term = Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>;

const LOGIN_W: u16 = 50;
const LOGIN_H: u16 = 14;
const LABEL_X: u16 = 4;
const FIELD_X: u16 = 16;
const FIELD_W: u16 = 30;
const USERNAME_ROW: u16 = 4;
const PASSWORD_ROW: u16 = 7;
const ERROR_ROW: u16 = 10;
const CONTENT_X: u16 = 4;

const IDLE_F2: &str = "<F2> Customize System/View Logs";
const IDLE_F12: &str = "<F12> Shut Down/Restart";
const LOGIN_HINTS: &str = " [Enter] OK | [ESC] Cancel ";
const MENU_HINTS: &str = " [Up/Down] Select | [Enter] OK | [ESC] Logout ";

// ── Palette ───────────────────────────────────────────────────────────────────

/// Colours for the whole console. The 256-colour variant gets the grey/yellow split of
/// the idle screen; plain consoles (`TERM=linux`) fall back to the 8 basic colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub top: Style,
    pub bottom: Style,
    pub footer: Style,
    pub border: Style,
    pub dialog: Style,
    pub field: Style,
    pub error: Style,
    pub screen: Style,
}

impl Palette {
    pub fn detect() -> Self {
        let term = std::env::var("TERM").unwrap_or_default();
        let truecolor = std::env::var_os("COLORTERM").is_some();
        Self::for_depth(truecolor || term.contains("256color"))
    }

    pub fn for_depth(has_256: bool) -> Self {
        let (grey, yellow) = if has_256 {
            (Color::Indexed(235), Color::Indexed(226))
        } else {
            (Color::Black, Color::Yellow)
        };
        Self {
            top: Style::default().fg(Color::White).bg(grey),
            bottom: Style::default().fg(Color::Black).bg(yellow),
            footer: Style::default()
                .fg(Color::Yellow)
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
            border: Style::default().fg(Color::White).bg(Color::Black),
            dialog: Style::default().fg(Color::White).bg(Color::Blue),
            field: Style::default().fg(Color::White).bg(grey),
            error: Style::default().fg(Color::Yellow).bg(Color::Black),
            screen: Style::default().fg(Color::White).bg(Color::Black),
        }
    }

    /// Inactive idle screen: everything on the top colour, border and footer dimmed.
    fn dimmed(&self) -> Self {
        Self {
            bottom: self.top,
            footer: self.top.add_modifier(Modifier::DIM),
            border: self.top.add_modifier(Modifier::DIM),
            ..*self
        }
    }
}

// ── Clipped drawing helpers ───────────────────────────────────────────────────

/// Part of `rect` that lies on screen, if any. Anything that does not fit is skipped.
fn fit(rect: Rect, screen: Rect) -> Option<Rect> {
    let clipped = rect.intersection(screen);
    (!clipped.is_empty()).then_some(clipped)
}

fn put(f: &mut Frame, x: u16, y: u16, text: Line<'_>) {
    let screen = f.area();
    let width = text.width() as u16;
    if let Some(area) = fit(Rect::new(x, y, width.max(1), 1), screen) {
        f.render_widget(Paragraph::new(text), area);
    }
}

fn fill(f: &mut Frame, rect: Rect, style: Style) {
    if let Some(area) = fit(rect, f.area()) {
        f.render_widget(Block::default().style(style), area);
    }
}

fn frame_box(f: &mut Frame, rect: Rect, style: Style) {
    if let Some(area) = fit(rect, f.area()) {
        f.render_widget(
            Block::default().borders(Borders::ALL).border_style(style),
            area,
        );
    }
}

fn centered(screen: Rect, w: u16, h: u16) -> Rect {
    let w = w.min(screen.width);
    let h = h.min(screen.height);
    Rect::new(
        screen.x + (screen.width - w) / 2,
        screen.y + (screen.height - h) / 2,
        w,
        h,
    )
}

// ── Entry point ───────────────────────────────────────────────────────────────

pub fn draw(
    f: &mut Frame,
    view: &SessionView<'_>,
    host: &HostInfo,
    config: &ConsoleConfig,
    palette: &Palette,
) {
    let screen = f.area();
    f.render_widget(Block::default().style(palette.screen), screen);
    match view.state {
        SessionState::Idle => {
            let palette = if view.dimmed { palette.dimmed() } else { *palette };
            draw_idle(f, host, config, &palette, view.dimmed);
        }
        SessionState::Login => {
            let cursor = draw_login(f, view, palette);
            if screen.contains(cursor) {
                f.set_cursor_position(cursor);
            }
        }
        SessionState::Menu => draw_menu(f, view, palette),
    }
}

// ── Idle ──────────────────────────────────────────────────────────────────────

fn draw_idle(f: &mut Frame, host: &HostInfo, config: &ConsoleConfig, palette: &Palette, dimmed: bool) {
    let screen = f.area();
    let split = screen.height / 2;

    fill(f, Rect::new(screen.x, screen.y, screen.width, split), palette.top);
    fill(
        f,
        Rect::new(screen.x, screen.y + split, screen.width, screen.height - split),
        palette.bottom,
    );
    frame_box(f, screen, palette.border);

    let x = screen.x + CONTENT_X;
    let heading = if dimmed {
        palette.top
    } else {
        palette.top.add_modifier(Modifier::BOLD)
    };
    let title = format!(
        "{} {} (Kernel {})",
        config.title, host.version, host.kernel
    );
    put(f, x, screen.y + 3, Line::styled(title, heading));
    put(f, x, screen.y + 5, Line::styled(host.model.as_str(), palette.top));
    put(f, x, screen.y + 7, Line::styled(host.cpu.as_str(), palette.top));
    put(f, x, screen.y + 8, Line::styled(host.memory.as_str(), palette.top));

    let tips_y = screen.y + split + 2;
    let url_style = if dimmed {
        palette.bottom
    } else {
        palette.bottom.add_modifier(Modifier::BOLD)
    };
    put(
        f,
        x,
        tips_y,
        Line::styled("To manage this host go to:", palette.bottom),
    );
    for (idx, addr) in host.addresses.iter().enumerate() {
        let url = management_url(addr, config.management_port);
        let line = Line::from(vec![
            Span::styled(url, url_style),
            Span::styled(" (Static)", palette.bottom),
        ]);
        put(f, x, tips_y + 1 + idx as u16, line);
    }

    if screen.height >= 2 && screen.width >= 2 {
        let footer_y = screen.y + screen.height - 2;
        fill(f, Rect::new(screen.x + 1, footer_y, screen.width - 2, 1), palette.footer);
        put(f, screen.x + 2, footer_y, Line::styled(IDLE_F2, palette.footer));
        let f12_w = IDLE_F12.len() as u16;
        if screen.width > f12_w + 4 {
            put(
                f,
                screen.x + screen.width - f12_w - 2,
                footer_y,
                Line::styled(IDLE_F12, palette.footer),
            );
        }
    }
}

// ── Login ─────────────────────────────────────────────────────────────────────

/// Screen position where the login cursor belongs: end of the active field's text.
pub fn login_cursor(screen: Rect, view: &SessionView<'_>) -> Position {
    let dialog = centered(screen, LOGIN_W, LOGIN_H);
    let (row, len) = match view.login.active_field() {
        LoginField::Username => (USERNAME_ROW, view.login.username().chars().count()),
        LoginField::Password => (PASSWORD_ROW, view.login.password_len()),
    };
    Position::new(
        dialog.x + FIELD_X + len.min(FIELD_W as usize) as u16,
        dialog.y + row,
    )
}

fn draw_login(f: &mut Frame, view: &SessionView<'_>, palette: &Palette) -> Position {
    let screen = f.area();
    let dialog = centered(screen, LOGIN_W, LOGIN_H);
    fill(f, dialog, palette.dialog);
    frame_box(f, dialog, palette.border);

    let title = " Authentication Required ";
    let title_x = dialog.x + dialog.width.saturating_sub(title.len() as u16) / 2;
    put(
        f,
        title_x,
        dialog.y + 1,
        Line::styled(title, palette.dialog.add_modifier(Modifier::BOLD)),
    );

    put(f, dialog.x + LABEL_X, dialog.y + USERNAME_ROW, Line::styled("Login Name:", palette.dialog));
    put(f, dialog.x + LABEL_X, dialog.y + PASSWORD_ROW, Line::styled("Password:", palette.dialog));

    let field_x = dialog.x + FIELD_X;
    for row in [USERNAME_ROW, PASSWORD_ROW] {
        fill(f, Rect::new(field_x, dialog.y + row, FIELD_W, 1), palette.field);
    }
    let username: String = view.login.username().chars().take(FIELD_W as usize).collect();
    let mask = "*".repeat(view.login.password_len().min(FIELD_W as usize));
    put(f, field_x, dialog.y + USERNAME_ROW, Line::styled(username, palette.field));
    put(f, field_x, dialog.y + PASSWORD_ROW, Line::styled(mask, palette.field));

    let error = view.login.error_message();
    if !error.is_empty() {
        let width = dialog.width.saturating_sub(4);
        if let Some(area) = fit(Rect::new(dialog.x + 2, dialog.y + ERROR_ROW, width, 1), screen) {
            f.render_widget(
                Paragraph::new(error)
                    .alignment(Alignment::Center)
                    .style(palette.error),
                area,
            );
        }
    }

    if screen.height > 0 {
        render_footer(
            f,
            Rect::new(screen.x, screen.y + screen.height - 1, screen.width, 1),
            LOGIN_HINTS,
            palette.footer,
        );
    }

    login_cursor(screen, view)
}

// ── Menu ──────────────────────────────────────────────────────────────────────

fn draw_menu(f: &mut Frame, view: &SessionView<'_>, palette: &Palette) {
    let screen = f.area();
    let items = view.menu.items();
    let box_w = 60.min(screen.width.saturating_sub(4));
    let box_h = (items.len() as u16 + 4).min(screen.height.saturating_sub(4));
    let dialog = centered(screen, box_w, box_h);
    fill(f, dialog, palette.dialog);
    frame_box(f, dialog, palette.border);

    let title = " System Customization ";
    put(
        f,
        dialog.x + dialog.width.saturating_sub(title.len() as u16) / 2,
        dialog.y,
        Line::styled(title, palette.dialog.add_modifier(Modifier::BOLD)),
    );

    let label_w = box_w.saturating_sub(4) as usize;
    for (idx, item) in items.iter().enumerate() {
        let style = if idx == view.menu.selected() {
            palette.bottom
        } else {
            palette.dialog
        };
        let label = format!("{:<label_w$}", item.label);
        let label: String = label.chars().take(label_w).collect();
        put(f, dialog.x + 2, dialog.y + 2 + idx as u16, Line::styled(label, style));
    }

    if screen.height > 0 {
        render_footer(
            f,
            Rect::new(screen.x, screen.y + screen.height - 1, screen.width, 1),
            MENU_HINTS,
            palette.footer,
        );
    }
}
