use chrono::Local;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

// ── Footer bar ────────────────────────────────────────────────────────────────

/// One-row bar: key hints on the left, local time on the right.
pub fn render_footer(f: &mut Frame, area: Rect, hints: &str, style: Style) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let now = Local::now().format("%Y-%m-%d %H:%M ").to_string();
    let width = area.width as usize;
    let hints_w = hints.chars().count();
    let now_w = now.chars().count();

    let line = if hints_w + now_w <= width {
        let pad = " ".repeat(width - hints_w - now_w);
        Line::from(vec![
            Span::styled(hints.to_string(), style),
            Span::styled(pad, style),
            Span::styled(now, style),
        ])
    } else {
        let pad = " ".repeat(width.saturating_sub(hints_w));
        Line::from(vec![Span::styled(hints.to_string(), style), Span::styled(pad, style)])
    };
    f.render_widget(Paragraph::new(line), area);
}
