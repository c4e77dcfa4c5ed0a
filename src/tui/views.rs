/// Screen bodies: snippet list, snippet detail, and the create/edit form.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use super::render::{spinner, truncate};
use super::{AppState, FormField};
use crate::editor::LanguageMode;
use crate::nav::Folder;
use crate::store::SnippetSummary;

// ── List ──────────────────────────────────────────────────────────────────────

pub fn draw_list(f: &mut Frame, state: &AppState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {} ", state.nav.folder.label()),
            Style::default().fg(Color::White),
        ));

    if state.list_loading {
        let loading = Paragraph::new(format!("{} loading…", spinner(state.spinner_tick)))
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(loading, area);
        return;
    }

    if state.snippets.is_empty() {
        let hint = match state.nav.folder {
            Folder::Trash => "trash is empty",
            Folder::Favorites => "no favorites yet — press f on a snippet",
            Folder::Library => "no snippets yet — press n to create one",
        };
        let empty = Paragraph::new(hint)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    // Each row: title line + dim meta line
    let rows_visible = (area.height.saturating_sub(2) / 2) as usize;
    let first = state.list_selected.saturating_sub(rows_visible.saturating_sub(1));
    let mut lines: Vec<Line> = Vec::new();
    for (i, snippet) in state.snippets.iter().enumerate().skip(first).take(rows_visible) {
        let selected = i == state.list_selected;
        lines.push(title_line(snippet, selected));
        lines.push(meta_line(snippet));
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn title_line(snippet: &SnippetSummary, selected: bool) -> Line<'static> {
    let marker = if selected { "▸ " } else { "  " };
    let style = if selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    let mut spans = vec![Span::styled(
        format!("{marker}{}", truncate(&snippet.title, 60)),
        style,
    )];
    if snippet.is_favorite {
        spans.push(Span::styled(" ★", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

fn meta_line(snippet: &SnippetSummary) -> Line<'static> {
    let mut parts = vec![snippet.created_at.chars().take(10).collect::<String>()];
    if let Some(lang) = &snippet.code_language {
        parts.push(lang.clone());
    }
    if !snippet.tags.is_empty() {
        parts.push(
            snippet
                .tags
                .iter()
                .map(|t| format!("#{}", t.name))
                .collect::<Vec<_>>()
                .join(" "),
        );
    }
    Line::from(Span::styled(
        format!("    {}", parts.join("  ·  ")),
        Style::default().fg(Color::DarkGray),
    ))
}

// ── Detail ────────────────────────────────────────────────────────────────────

pub fn draw_detail(f: &mut Frame, state: &AppState, area: Rect) {
    let Some(snippet) = &state.detail else {
        let loading = Paragraph::new(format!("{} loading…", spinner(state.spinner_tick)))
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(loading, area);
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    let mut title_spans = vec![Span::styled(
        snippet.title.clone(),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )];
    if snippet.is_favorite {
        title_spans.push(Span::styled(" ★", Style::default().fg(Color::Yellow)));
    }
    lines.push(Line::from(title_spans));

    if !snippet.tags.is_empty() {
        lines.push(Line::from(Span::styled(
            snippet
                .tags
                .iter()
                .map(|t| format!("#{}", t.name))
                .collect::<Vec<_>>()
                .join(" "),
            Style::default().fg(Color::Magenta),
        )));
    }
    lines.push(Line::from(""));

    lines.push(section_header("Problem"));
    for l in snippet.problem.lines() {
        lines.push(Line::from(l.to_string()));
    }

    if let Some(solution) = &snippet.solution {
        lines.push(Line::from(""));
        lines.push(section_header("Solution"));
        for l in solution.lines() {
            lines.push(Line::from(l.to_string()));
        }
    }

    if let Some(code) = &snippet.code {
        lines.push(Line::from(""));
        let lang = snippet
            .code_language
            .as_deref()
            .map(LanguageMode::detect)
            .unwrap_or_default();
        lines.push(Line::from(Span::styled(
            format!("── Code ({}) ──", lang.label()),
            Style::default().fg(lang.accent()),
        )));
        for l in code.lines() {
            lines.push(Line::from(Span::styled(
                l.to_string(),
                Style::default().fg(Color::Rgb(200, 200, 215)),
            )));
        }
    }

    if let Some(url) = &snippet.reference_url {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("ref: ", Style::default().fg(Color::DarkGray)),
            Span::styled(url.clone(), Style::default().fg(Color::Blue)),
        ]));
    }

    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((state.detail_scroll as u16, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
    f.render_widget(body, area);
}

fn section_header(name: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("── {name} ──"),
        Style::default().fg(Color::Cyan),
    ))
}

// ── Create / edit form ────────────────────────────────────────────────────────

pub fn draw_form(f: &mut Frame, state: &AppState, area: Rect) {
    let Some(form) = &state.form else { return };

    let title = if form.editing_id.is_some() { " Edit snippet " } else { " New snippet " };
    let outer = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(title, Style::default().fg(Color::White)));
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Length(4), // problem
            Constraint::Length(4), // solution
            Constraint::Min(5),    // code editor
            Constraint::Length(3), // tags
            Constraint::Length(3), // reference url
            Constraint::Length(2), // duplicate warning
        ])
        .split(inner);

    draw_field(f, rows[0], "Title", &form.title, form.focus == FormField::Title);
    draw_field(f, rows[1], "Problem", &form.problem, form.focus == FormField::Problem);

    let solution_label = if form.generating_solution {
        format!("Solution {} drafting…", spinner(state.spinner_tick))
    } else {
        "Solution (^g to draft)".to_string()
    };
    draw_field(f, rows[2], &solution_label, &form.solution, form.focus == FormField::Solution);

    // Editor draws its own block; a zero-size slot would be a mount failure,
    // but the Min(5) constraint keeps it alive on any sane terminal
    if let Err(e) = form.code.render(f, rows[3]) {
        tracing::warn!(error = %e, "code editor failed to mount");
    }

    let tags_label = if form.suggesting_tags {
        format!("Tags {} suggesting…", spinner(state.spinner_tick))
    } else {
        "Tags (comma-separated, ^t to suggest)".to_string()
    };
    draw_field(f, rows[4], &tags_label, &form.tag_input, form.focus == FormField::Tags);
    draw_field(f, rows[5], "Reference URL", &form.reference_url, form.focus == FormField::Reference);

    if !form.duplicates.is_empty() {
        let top = &form.duplicates[0];
        let warning = Line::from(vec![
            Span::styled("⚠ possible duplicate: ", Style::default().fg(Color::Yellow)),
            Span::styled(
                truncate(&top.snippet.title, 50),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                format!("  ({:.0}% match)", top.score * 100.0),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        f.render_widget(Paragraph::new(warning), rows[6]);
    }
}

fn draw_field(f: &mut Frame, area: Rect, label: &str, value: &str, focused: bool) {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    // Single-line rendering; embedded line breaks show as ↵
    let value = value.replace('\n', " ↵ ");
    // Show the tail when the value is longer than the field
    let visible_width = area.width.saturating_sub(3) as usize;
    let shown: String = if value.chars().count() > visible_width {
        let skip = value.chars().count() - visible_width;
        value.chars().skip(skip).collect()
    } else {
        value.to_string()
    };
    let mut spans = vec![Span::raw(shown)];
    if focused {
        spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
    }
    let field = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(Span::styled(
                format!(" {label} "),
                Style::default().fg(if focused { Color::Cyan } else { Color::Gray }),
            )),
    );
    f.render_widget(field, area);
}
