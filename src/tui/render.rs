/// Ratatui draw entry-point for Recall.
/// Thin dispatcher — screen bodies live in views.rs, overlays in overlays.rs.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use super::{AppState, LANGUAGES};
use crate::nav::{Folder, Screen};

pub const SPINNER_GLYPHS: [&str; 4] = ["⠋", "⠙", "⠸", "⠴"];

pub fn spinner(tick: u32) -> &'static str {
    SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()]
}

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header: title + search box
            Constraint::Min(0),    // body
            Constraint::Length(1), // status bar
        ])
        .split(area);

    draw_header(f, state, rows[0]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(22), Constraint::Min(0)])
        .split(rows[1]);

    draw_sidebar(f, state, cols[0]);

    match state.nav.screen {
        Screen::List => super::views::draw_list(f, state, cols[1]),
        Screen::Detail => super::views::draw_detail(f, state, cols[1]),
        Screen::Create | Screen::Edit => super::views::draw_form(f, state, cols[1]),
    }

    draw_status_bar(f, state, rows[2]);

    // Overlays stack above everything; the search dropdown anchors to the
    // header, the dialogs center.
    if state.search.focused && !state.nav.search_query.is_empty() {
        super::overlays::draw_search_dropdown(f, state, area);
    }
    if state.nav.settings_open {
        super::overlays::draw_settings(f, state, area);
    }
    if state.nav.assistant_open {
        super::overlays::draw_assistant(f, state, area);
    }
}

// ── Header: title + search box ────────────────────────────────────────────────

fn draw_header(f: &mut Frame, state: &AppState, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(14), Constraint::Min(0)])
        .split(area);

    let title = Paragraph::new(Line::from(vec![
        Span::styled(" ⌘ ", Style::default().fg(Color::Cyan)),
        Span::styled("recall", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(title, cols[0]);

    let (border, hint) = if state.search.focused {
        (Color::Cyan, "")
    } else {
        (Color::DarkGray, "  press / to search")
    };
    let mut spans = vec![Span::styled("🔍 ", Style::default().fg(Color::DarkGray))];
    if state.nav.search_query.is_empty() {
        spans.push(Span::styled(
            format!("semantic search{hint}"),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        ));
    } else {
        spans.push(Span::styled(
            state.nav.search_query.clone(),
            Style::default().fg(Color::White),
        ));
        if state.search.focused {
            spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
        }
    }
    if state.search.loading {
        spans.push(Span::styled(
            format!("  {}", spinner(state.spinner_tick)),
            Style::default().fg(Color::Cyan),
        ));
    }
    let search_box = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(search_box, cols[1]);
}

// ── Sidebar: folders + language filter ───────────────────────────────────────

fn draw_sidebar(f: &mut Frame, state: &AppState, area: Rect) {
    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        " Folders",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
    ))];

    for (i, folder) in [Folder::Library, Folder::Favorites, Folder::Trash]
        .iter()
        .enumerate()
    {
        let active = state.nav.folder == *folder;
        let style = if active {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let marker = if active { "▸" } else { " " };
        lines.push(Line::from(Span::styled(
            format!(" {marker} {} {}", i + 1, folder.label()),
            style,
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " Languages (l)",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
    )));
    let all_style = if state.nav.language_filter.is_none() {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    };
    lines.push(Line::from(Span::styled(" all", all_style)));
    for lang in LANGUAGES.iter().filter(|l| **l != crate::editor::LanguageMode::Plain) {
        let key = lang.label().to_lowercase();
        let active = state.nav.language_filter.as_deref() == Some(key.as_str());
        let style = if active {
            Style::default().fg(lang.accent()).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(Span::styled(format!(" {}", lang.label()), style)));
    }

    let sidebar = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(sidebar, area);
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let (dot, dot_color) = if state.ollama_online {
        ("●", Color::Green)
    } else {
        ("●", Color::Red)
    };

    let mut spans = vec![
        Span::styled(format!(" {dot} "), Style::default().fg(dot_color)),
        Span::styled(state.model.clone(), Style::default().fg(Color::Gray)),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{} · {} snippets", state.nav.folder.label(), state.snippets.len()),
            Style::default().fg(Color::Gray),
        ),
    ];

    if let Some(msg) = &state.status {
        spans.push(Span::styled("  ·  ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(msg.clone(), Style::default().fg(Color::Yellow)));
    } else {
        let hints = match state.nav.screen {
            Screen::List if state.nav.folder == Folder::Trash => {
                "  ·  enter open · r restore · d purge · q quit"
            }
            Screen::List => "  ·  / search · n new · enter open · f fav · ^j assistant · q quit",
            Screen::Detail => "  ·  e edit · f fav · d delete · esc back",
            Screen::Create | Screen::Edit => {
                "  ·  tab next field · ^s save · ^g draft solution · ^t tags · esc cancel"
            }
        };
        spans.push(Span::styled(hints, Style::default().fg(Color::DarkGray)));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Centered rect of the given size, clamped to the parent.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_clamps_to_parent() {
        let parent = Rect { x: 0, y: 0, width: 40, height: 10 };
        let r = centered_rect(100, 100, parent);
        assert_eq!((r.width, r.height), (40, 10));

        let r = centered_rect(20, 4, parent);
        assert_eq!((r.x, r.y, r.width, r.height), (10, 3, 20, 4));
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("héllo wörld", 6), "héllo…");
        assert_eq!(truncate("short", 10), "short");
    }
}
