/// Overlays: search dropdown, settings dialog, assistant chat.
/// Drawn last so they stack above the active screen.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::render::{centered_rect, spinner, truncate};
use super::{AppState, ChatEntry, SettingsForm};
use crate::errors::QueryError;
use crate::nav::Overlay;

// ── Search dropdown ───────────────────────────────────────────────────────────

/// Anchored under the header search box. Shows one of four states: loading,
/// unreachable/error, empty, or ranked results.
pub fn draw_search_dropdown(f: &mut Frame, state: &AppState, area: Rect) {
    let height = (state.search.results.len() as u16 + 2).clamp(3, 12);
    let anchor = Rect {
        x: area.x + 14,
        y: area.y + 3,
        width: area.width.saturating_sub(14).min(90),
        height: height.min(area.height.saturating_sub(3)),
    };
    f.render_widget(Clear, anchor);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if state.search.loading {
        let body = Paragraph::new(format!("{} searching…", spinner(state.spinner_tick)))
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(body, anchor);
        return;
    }

    if let Some(err) = &state.search.error {
        let msg = match err {
            QueryError::Unreachable => "AI search requires Ollama — is it running?".to_string(),
            other => format!("search failed: {other}"),
        };
        let body = Paragraph::new(msg)
            .style(Style::default().fg(Color::Red))
            .block(block);
        f.render_widget(body, anchor);
        return;
    }

    if state.search.results.is_empty() {
        let hint = if state.nav.search_query.chars().count() < 3 {
            "keep typing…"
        } else {
            "no matches"
        };
        let body = Paragraph::new(hint)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(body, anchor);
        return;
    }

    let lines: Vec<Line> = state
        .search
        .results
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let selected = i == state.search.selected;
            let marker = if selected { "▸ " } else { "  " };
            let style = if selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(vec![
                Span::styled(format!("{marker}{}", truncate(&hit.snippet.title, 56)), style),
                Span::styled(
                    format!("  {:.0}%", hit.score * 100.0),
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(block), anchor);
}

// ── Settings dialog ───────────────────────────────────────────────────────────

pub fn draw_settings(f: &mut Frame, state: &AppState, area: Rect) {
    let Some(form) = &state.settings_form else { return };

    let focused = state.nav.overlay_focus == Some(Overlay::Settings);
    let height = if state.available_models.is_empty() { 9 } else { 10 };
    let dialog = centered_rect(56, height, area);
    f.render_widget(Clear, dialog);

    let border = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(" Settings ", Style::default().fg(Color::White)))
        .title_bottom(Span::styled(
            " ↑↓ field · type to edit · ^s save · esc close ",
            Style::default().fg(Color::DarkGray),
        ));

    let fields: [(&str, &String); SettingsForm::FIELD_COUNT] = [
        ("theme", &form.theme),
        ("ollama url", &form.ollama_base_url),
        ("llm model", &form.llm_model),
        ("embedding model", &form.embedding_model),
        ("search limit", &form.search_limit),
    ];

    let mut lines: Vec<Line> = fields
        .iter()
        .enumerate()
        .map(|(i, (label, value))| {
            let selected = i == form.selected;
            let marker = if selected { "▸ " } else { "  " };
            let label_style = if selected {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            let mut spans = vec![
                Span::styled(format!("{marker}{label:<16}"), label_style),
                Span::styled((*value).clone(), Style::default().fg(Color::White)),
            ];
            if selected && focused {
                spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
            }
            Line::from(spans)
        })
        .collect();

    if !state.available_models.is_empty() {
        let installed = state
            .available_models
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" · ");
        lines.push(Line::from(Span::styled(
            truncate(&format!("  installed: {installed}"), 52),
            Style::default().fg(Color::DarkGray),
        )));
    }

    f.render_widget(Paragraph::new(lines).block(block), dialog);
}

// ── Assistant chat ────────────────────────────────────────────────────────────

pub fn draw_assistant(f: &mut Frame, state: &AppState, area: Rect) {
    let focused = state.nav.overlay_focus == Some(Overlay::Assistant);
    let w = (area.width * 3 / 4).clamp(40, 100);
    let h = (area.height * 3 / 4).clamp(10, 30);
    let dialog = centered_rect(w, h, area);
    f.render_widget(Clear, dialog);

    let border = if focused { Color::Cyan } else { Color::DarkGray };
    let outer = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(" Assistant ", Style::default().fg(Color::White)))
        .title_bottom(Span::styled(
            " enter send · ^j close ",
            Style::default().fg(Color::DarkGray),
        ));
    let inner = outer.inner(dialog);
    f.render_widget(outer, dialog);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(inner);

    draw_chat_history(f, state, rows[0]);
    draw_chat_input(f, state, rows[1], focused);
}

fn draw_chat_history(f: &mut Frame, state: &AppState, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    if state.chat.history.is_empty() && !state.chat.waiting {
        lines.push(Line::from(Span::styled(
            "ask anything about your knowledge base",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        )));
    }

    for entry in &state.chat.history {
        match entry {
            ChatEntry::User(msg) => {
                lines.push(Line::from(vec![
                    Span::styled("you  ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                    Span::raw(msg.clone()),
                ]));
            }
            ChatEntry::Assistant(reply) => {
                for (i, l) in reply.answer.lines().enumerate() {
                    if i == 0 {
                        lines.push(Line::from(vec![
                            Span::styled(
                                "ai   ",
                                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                            ),
                            Span::raw(l.to_string()),
                        ]));
                    } else {
                        lines.push(Line::from(format!("     {l}")));
                    }
                }
                if !reply.sources.is_empty() {
                    let cited = reply
                        .sources
                        .iter()
                        .map(|s| truncate(&s.title, 24))
                        .collect::<Vec<_>>()
                        .join(" · ");
                    lines.push(Line::from(Span::styled(
                        format!("     sources: {cited}"),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
            }
            ChatEntry::Error(msg) => {
                lines.push(Line::from(Span::styled(
                    format!("✗ {msg}"),
                    Style::default().fg(Color::Red),
                )));
            }
        }
        lines.push(Line::from(""));
    }

    if state.chat.waiting {
        lines.push(Line::from(Span::styled(
            format!("{} thinking…", spinner(state.spinner_tick)),
            Style::default().fg(Color::DarkGray),
        )));
    }

    // Pin to the bottom like a chat log
    let visible = area.height as usize;
    let scroll = lines.len().saturating_sub(visible);
    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));
    f.render_widget(body, area);
}

fn draw_chat_input(f: &mut Frame, state: &AppState, area: Rect, focused: bool) {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    let mut spans = Vec::new();
    if state.chat.input.is_empty() {
        spans.push(Span::styled(
            "type a question…",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        ));
    } else {
        spans.push(Span::raw(state.chat.input.clone()));
    }
    if focused {
        spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
    }
    let input = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(input, area);
}
