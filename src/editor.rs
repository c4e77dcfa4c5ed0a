/// Embedded code editor adapter.
///
/// Bridges a host-owned string value to a `tui_textarea` buffer. The buffer
/// is the user's live editing session (cursor, undo history), so the adapter
/// is created once per logical editor and kept across redraws — never
/// rebuilt per frame. Three behavior slots (language mode, theme, read-only)
/// are swappable live via `reconfigure` without touching the session.
///
/// Synchronization contract:
///   host → buffer: `set_text` (no-op when equal, to avoid redundant work
///                  and feedback loops)
///   buffer → host: the return value of `input` — the only channel by which
///                  the host learns about user edits
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph},
};
use tui_textarea::TextArea;

use crate::errors::EditorError;

// ── Language mode ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguageMode {
    JavaScript,
    TypeScript,
    Python,
    Rust,
    Html,
    Css,
    Json,
    #[default]
    Plain,
}

impl LanguageMode {
    /// Map an informal language name ("ts", "py", free text) to the nearest
    /// supported mode. Unrecognized input falls back to plain text.
    pub fn detect(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "javascript" | "js" | "jsx" => LanguageMode::JavaScript,
            "typescript" | "ts" | "tsx" => LanguageMode::TypeScript,
            "python" | "py" => LanguageMode::Python,
            "rust" | "rs" => LanguageMode::Rust,
            "html" => LanguageMode::Html,
            "css" => LanguageMode::Css,
            "json" => LanguageMode::Json,
            _ => LanguageMode::Plain,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LanguageMode::JavaScript => "javascript",
            LanguageMode::TypeScript => "typescript",
            LanguageMode::Python => "python",
            LanguageMode::Rust => "rust",
            LanguageMode::Html => "html",
            LanguageMode::Css => "css",
            LanguageMode::Json => "json",
            LanguageMode::Plain => "text",
        }
    }

    /// Accent color used for the editor border and language badges.
    pub fn accent(&self) -> Color {
        match self {
            LanguageMode::JavaScript => Color::Rgb(240, 219, 79),
            LanguageMode::TypeScript => Color::Rgb(49, 120, 198),
            LanguageMode::Python => Color::Rgb(75, 139, 190),
            LanguageMode::Rust => Color::Rgb(222, 165, 132),
            LanguageMode::Html => Color::Rgb(227, 76, 38),
            LanguageMode::Css => Color::Rgb(86, 61, 124),
            LanguageMode::Json => Color::Rgb(100, 160, 100),
            LanguageMode::Plain => Color::DarkGray,
        }
    }
}

// ── Theme ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorTheme {
    #[default]
    Dark,
    Light,
}

impl EditorTheme {
    fn base(&self) -> Style {
        match self {
            EditorTheme::Dark => Style::default().fg(Color::Rgb(220, 220, 230)),
            EditorTheme::Light => Style::default().fg(Color::Black).bg(Color::Rgb(245, 245, 240)),
        }
    }

    fn cursor_line(&self) -> Style {
        match self {
            EditorTheme::Dark => Style::default().bg(Color::Rgb(25, 25, 40)),
            EditorTheme::Light => Style::default().bg(Color::Rgb(230, 230, 225)),
        }
    }

    fn line_numbers(&self) -> Style {
        Style::default().fg(Color::DarkGray)
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct EditorConfig {
    pub language: LanguageMode,
    pub theme: EditorTheme,
    pub read_only: bool,
    pub placeholder: String,
}

/// Partial reconfiguration: only the slots present are swapped. Buffer
/// content, cursor, and undo history are untouched either way.
#[derive(Debug, Clone, Default)]
pub struct EditorConfigPatch {
    pub language: Option<LanguageMode>,
    pub theme: Option<EditorTheme>,
    pub read_only: Option<bool>,
}

// ── Adapter ───────────────────────────────────────────────────────────────────

pub struct CodeEditor {
    /// `None` once destroyed — every later operation is a no-op, which
    /// tolerates late-arriving reconfiguration during unmount races.
    engine: Option<TextArea<'static>>,
    language: LanguageMode,
    theme: EditorTheme,
    read_only: bool,
    focused: bool,
}

impl CodeEditor {
    /// Instantiate the internal document. Called at most once per logical
    /// editor instance.
    pub fn create(initial_text: &str, config: EditorConfig) -> Self {
        let mut engine = TextArea::from(initial_text.lines().map(str::to_string));
        engine.set_placeholder_text(config.placeholder.clone());
        let mut editor = Self {
            engine: Some(engine),
            language: config.language,
            theme: config.theme,
            read_only: config.read_only,
            focused: false,
        };
        editor.apply_style();
        editor
    }

    /// Full current buffer text.
    pub fn text(&self) -> String {
        self.engine
            .as_ref()
            .map(|e| e.lines().join("\n"))
            .unwrap_or_default()
    }

    pub fn language(&self) -> LanguageMode {
        self.language
    }

    /// Host-initiated replacement (e.g. switching records). Compares first:
    /// equal text is a no-op so the host's own updates never echo back as a
    /// change and feed an update loop. Different text replaces the whole
    /// buffer in one atomic edit.
    pub fn set_text(&mut self, text: &str) {
        if self.text() == text {
            return;
        }
        let Some(engine) = self.engine.as_mut() else { return };
        engine.select_all();
        engine.cut();
        engine.insert_str(text);
    }

    /// Swap exactly the behavior slots present in the patch.
    pub fn reconfigure(&mut self, patch: EditorConfigPatch) {
        if self.engine.is_none() {
            return;
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(read_only) = patch.read_only {
            self.read_only = read_only;
        }
        self.apply_style();
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        self.apply_style();
    }

    /// Forward one user key to the engine. Returns the full buffer text when
    /// (and only when) a user-originated edit changed the content; `None`
    /// for navigation keys, read-only mode, or a torn-down handle.
    pub fn input(&mut self, key: KeyEvent) -> Option<String> {
        if self.read_only && !is_navigation_key(&key) {
            return None;
        }
        let modified = self.engine.as_mut()?.input(key);
        modified.then(|| self.text())
    }

    /// Tear down the engine. Idempotent; later operations no-op.
    pub fn destroy(&mut self) {
        self.engine = None;
    }

    pub fn is_destroyed(&self) -> bool {
        self.engine.is_none()
    }

    /// Draw the editor. A zero-size attachment point is a mount failure —
    /// fatal to this render, surfaced to the caller, never retried here. A
    /// torn-down handle draws a disabled placeholder instead of failing.
    pub fn render(&self, f: &mut Frame, area: Rect) -> Result<(), EditorError> {
        if area.width == 0 || area.height == 0 {
            return Err(EditorError::Mount);
        }
        match &self.engine {
            Some(engine) => f.render_widget(engine, area),
            None => {
                let placeholder = Paragraph::new("editor unavailable")
                    .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM))
                    .block(Block::default().borders(Borders::ALL).border_style(
                        Style::default().fg(Color::DarkGray),
                    ));
                f.render_widget(placeholder, area);
            }
        }
        Ok(())
    }

    fn apply_style(&mut self) {
        let language = self.language;
        let theme = self.theme;
        let focused = self.focused;
        let read_only = self.read_only;
        let Some(engine) = self.engine.as_mut() else { return };

        engine.set_style(theme.base());
        engine.set_cursor_line_style(if focused {
            theme.cursor_line()
        } else {
            Style::default()
        });
        engine.set_line_number_style(theme.line_numbers());

        let border = if focused { language.accent() } else { Color::DarkGray };
        let mut title = format!(" {} ", language.label());
        if read_only {
            title.push_str("(read-only) ");
        }
        engine.set_block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(title),
        );
    }
}

/// Keys that move the cursor without editing — the only ones forwarded in
/// read-only mode.
fn is_navigation_key(key: &KeyEvent) -> bool {
    matches!(
        key.code,
        KeyCode::Up
            | KeyCode::Down
            | KeyCode::Left
            | KeyCode::Right
            | KeyCode::Home
            | KeyCode::End
            | KeyCode::PageUp
            | KeyCode::PageDown
    ) && key.modifiers == KeyModifiers::NONE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_editor(text: &str) -> CodeEditor {
        CodeEditor::create(text, EditorConfig::default())
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn create_seeds_buffer_with_initial_text() {
        let editor = plain_editor("fn main() {}\nprintln!();");
        assert_eq!(editor.text(), "fn main() {}\nprintln!();");
    }

    #[test]
    fn set_text_with_equal_content_is_a_no_op() {
        let mut editor = plain_editor("hello");
        // Move the cursor forward so a buffer rebuild would be observable
        editor.input(KeyEvent::new(KeyCode::End, KeyModifiers::NONE));
        editor.set_text("hello");
        assert_eq!(editor.text(), "hello");
    }

    #[test]
    fn set_text_replaces_whole_buffer() {
        let mut editor = plain_editor("old\ncontent");
        editor.set_text("new");
        assert_eq!(editor.text(), "new");
    }

    #[test]
    fn user_edit_returns_full_buffer_text() {
        let mut editor = plain_editor("");
        assert_eq!(editor.input(key('a')).as_deref(), Some("a"));
        assert_eq!(editor.input(key('b')).as_deref(), Some("ab"));
        // Navigation produces no change notification
        assert_eq!(editor.input(KeyEvent::new(KeyCode::Left, KeyModifiers::NONE)), None);
    }

    #[test]
    fn read_only_blocks_edits_but_allows_navigation() {
        let mut editor = CodeEditor::create(
            "locked",
            EditorConfig { read_only: true, ..Default::default() },
        );
        assert_eq!(editor.input(key('x')), None);
        assert_eq!(editor.text(), "locked");
        assert_eq!(editor.input(KeyEvent::new(KeyCode::Right, KeyModifiers::NONE)), None);

        // Flipping the slot back re-enables editing without touching content
        editor.reconfigure(EditorConfigPatch { read_only: Some(false), ..Default::default() });
        assert_eq!(editor.text(), "locked");
        assert!(editor.input(key('!')).is_some());
    }

    #[test]
    fn reconfigure_swaps_language_without_touching_buffer() {
        let mut editor = plain_editor("const x = 1;");
        editor.reconfigure(EditorConfigPatch {
            language: Some(LanguageMode::detect("ts")),
            ..Default::default()
        });
        assert_eq!(editor.language(), LanguageMode::TypeScript);
        assert_eq!(editor.text(), "const x = 1;");
    }

    #[test]
    fn operations_on_destroyed_handle_are_no_ops() {
        let mut editor = plain_editor("text");
        editor.destroy();
        assert!(editor.is_destroyed());

        // Late-arriving calls during an unmount race must not panic
        editor.set_text("other");
        editor.reconfigure(EditorConfigPatch { theme: Some(EditorTheme::Light), ..Default::default() });
        assert_eq!(editor.input(key('a')), None);
        assert_eq!(editor.text(), "");

        editor.destroy(); // idempotent
    }

    #[test]
    fn language_detection_maps_informal_names() {
        assert_eq!(LanguageMode::detect("TS"), LanguageMode::TypeScript);
        assert_eq!(LanguageMode::detect("py"), LanguageMode::Python);
        assert_eq!(LanguageMode::detect("jsx"), LanguageMode::JavaScript);
        assert_eq!(LanguageMode::detect(" rust "), LanguageMode::Rust);
        assert_eq!(LanguageMode::detect("brainfuck"), LanguageMode::Plain);
        assert_eq!(LanguageMode::detect(""), LanguageMode::Plain);
    }
}
