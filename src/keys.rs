/// Global keyboard router.
///
/// One dispatch per physical key-down. Accelerators marked `Scope::Always`
/// fire regardless of focus (the assistant shortcut must work while typing).
/// Everything else is suppressed while a text input has focus — except a
/// registered Escape — so single-letter accelerators never hijack typing.
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

// ── Commands ──────────────────────────────────────────────────────────────────

/// The closed vocabulary of things a key press can ask the app to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NewSnippet,
    FocusSearch,
    ToggleAssistant,
    OpenSettings,
    Escape,
    Quit,
    MoveUp,
    MoveDown,
    Open,
    ToggleFavorite,
    EditSnippet,
    DeleteSnippet,
    RestoreSnippet,
    Save,
    GenerateSolution,
    SuggestTags,
    FolderLibrary,
    FolderFavorites,
    FolderTrash,
    CycleLanguage,
}

// ── Bindings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Fires regardless of focus. Reserved for modifier-qualified combos.
    Always,
    /// Eligible only when focus is outside a text input. Escape is the one
    /// binding allowed through from inside a field.
    Global,
}

#[derive(Debug, Clone, Copy)]
pub struct KeyBinding {
    pub mods: KeyModifiers,
    pub code: KeyCode,
    pub scope: Scope,
    pub command: Command,
}

impl KeyBinding {
    const fn new(mods: KeyModifiers, code: KeyCode, scope: Scope, command: Command) -> Self {
        Self { mods, code, scope, command }
    }

    fn matches(&self, key: &KeyEvent) -> bool {
        self.code == key.code && self.mods == key.modifiers
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

pub struct KeyRouter {
    bindings: Vec<KeyBinding>,
}

impl KeyRouter {
    /// Bindings are read-only after registration; re-registering replaces
    /// the whole set (screen teardown must not leave stale bindings behind).
    pub fn register(bindings: Vec<KeyBinding>) -> Self {
        Self { bindings }
    }

    /// Route one key event. `in_text_input` is true when the focus target is
    /// a text-input-like widget (search box, form field, chat input).
    pub fn dispatch(&self, key: &KeyEvent, in_text_input: bool) -> Option<Command> {
        // Some terminals report key releases too; only act on press
        if key.kind != KeyEventKind::Press {
            return None;
        }

        if let Some(b) = self
            .bindings
            .iter()
            .find(|b| b.scope == Scope::Always && b.matches(key))
        {
            return Some(b.command);
        }

        if in_text_input {
            return self
                .bindings
                .iter()
                .find(|b| b.code == KeyCode::Esc && b.matches(key))
                .map(|b| b.command);
        }

        self.bindings.iter().find(|b| b.matches(key)).map(|b| b.command)
    }
}

/// The application's binding table.
pub fn default_bindings() -> Vec<KeyBinding> {
    use Command::*;
    use KeyCode::*;
    use Scope::*;
    vec![
        // Combos that must keep working while typing in a field
        KeyBinding::new(KeyModifiers::CONTROL, Char('j'), Always, ToggleAssistant),
        KeyBinding::new(KeyModifiers::CONTROL, Char('s'), Always, Save),
        KeyBinding::new(KeyModifiers::CONTROL, Char('g'), Always, GenerateSolution),
        KeyBinding::new(KeyModifiers::CONTROL, Char('t'), Always, SuggestTags),
        KeyBinding::new(KeyModifiers::CONTROL, Char('n'), Global, NewSnippet),
        KeyBinding::new(KeyModifiers::CONTROL, Char('o'), Global, OpenSettings),
        KeyBinding::new(KeyModifiers::NONE, Esc, Global, Escape),
        KeyBinding::new(KeyModifiers::NONE, Char('/'), Global, FocusSearch),
        KeyBinding::new(KeyModifiers::NONE, Char('n'), Global, NewSnippet),
        KeyBinding::new(KeyModifiers::NONE, Char('q'), Global, Quit),
        KeyBinding::new(KeyModifiers::NONE, Char('j'), Global, MoveDown),
        KeyBinding::new(KeyModifiers::NONE, Char('k'), Global, MoveUp),
        KeyBinding::new(KeyModifiers::NONE, Down, Global, MoveDown),
        KeyBinding::new(KeyModifiers::NONE, Up, Global, MoveUp),
        KeyBinding::new(KeyModifiers::NONE, Enter, Global, Open),
        KeyBinding::new(KeyModifiers::NONE, Char('f'), Global, ToggleFavorite),
        KeyBinding::new(KeyModifiers::NONE, Char('e'), Global, EditSnippet),
        KeyBinding::new(KeyModifiers::NONE, Char('d'), Global, DeleteSnippet),
        KeyBinding::new(KeyModifiers::NONE, Char('r'), Global, RestoreSnippet),
        KeyBinding::new(KeyModifiers::NONE, Char('1'), Global, FolderLibrary),
        KeyBinding::new(KeyModifiers::NONE, Char('2'), Global, FolderFavorites),
        KeyBinding::new(KeyModifiers::NONE, Char('3'), Global, FolderTrash),
        KeyBinding::new(KeyModifiers::NONE, Char('l'), Global, CycleLanguage),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(mods: KeyModifiers, code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn always_binding_fires_inside_text_input() {
        let router = KeyRouter::register(default_bindings());
        let key = press(KeyModifiers::CONTROL, KeyCode::Char('j'));
        assert_eq!(router.dispatch(&key, true), Some(Command::ToggleAssistant));
        assert_eq!(router.dispatch(&key, false), Some(Command::ToggleAssistant));
    }

    #[test]
    fn plain_letter_suppressed_in_text_input() {
        let router = KeyRouter::register(default_bindings());
        // 'n' is the new-snippet accelerator, but the user is typing it
        let key = press(KeyModifiers::NONE, KeyCode::Char('n'));
        assert_eq!(router.dispatch(&key, true), None);
        assert_eq!(router.dispatch(&key, false), Some(Command::NewSnippet));
    }

    #[test]
    fn escape_is_the_only_plain_binding_allowed_in_inputs() {
        let router = KeyRouter::register(default_bindings());
        let esc = press(KeyModifiers::NONE, KeyCode::Esc);
        assert_eq!(router.dispatch(&esc, true), Some(Command::Escape));

        for code in [KeyCode::Char('q'), KeyCode::Char('/'), KeyCode::Enter] {
            assert_eq!(router.dispatch(&press(KeyModifiers::NONE, code), true), None);
        }
    }

    #[test]
    fn modifier_must_match_exactly() {
        let router = KeyRouter::register(default_bindings());
        // Ctrl+N registered, plain 'n' registered — Alt+N matches neither
        let key = press(KeyModifiers::ALT, KeyCode::Char('n'));
        assert_eq!(router.dispatch(&key, false), None);
    }

    #[test]
    fn first_matching_binding_wins() {
        let router = KeyRouter::register(vec![
            KeyBinding::new(KeyModifiers::NONE, KeyCode::Char('x'), Scope::Global, Command::Quit),
            KeyBinding::new(KeyModifiers::NONE, KeyCode::Char('x'), Scope::Global, Command::Open),
        ]);
        let key = press(KeyModifiers::NONE, KeyCode::Char('x'));
        assert_eq!(router.dispatch(&key, false), Some(Command::Quit));
    }

    #[test]
    fn release_events_are_ignored() {
        let router = KeyRouter::register(default_bindings());
        let mut key = press(KeyModifiers::NONE, KeyCode::Char('q'));
        key.kind = KeyEventKind::Release;
        assert_eq!(router.dispatch(&key, false), None);
    }
}
