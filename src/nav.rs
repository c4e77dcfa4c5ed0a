/// Navigation state machine.
///
/// One authoritative state value for which screen is active, what is
/// selected, and which overlays are open. All mutation goes through
/// `reduce` — no component reads-modifies-writes the state directly, so the
/// selection invariants hold by construction:
///   - `selected_id` is `Some` only on the Detail and Edit screens
///   - Edit is reachable only with an existing selection
///   - clearing the selection always lands on the list screen

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    List,
    Create,
    Edit,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Folder {
    #[default]
    Library,
    Favorites,
    Trash,
}

impl Folder {
    pub fn label(&self) -> &'static str {
        match self {
            Folder::Library => "Library",
            Folder::Favorites => "Favorites",
            Folder::Trash => "Trash",
        }
    }
}

/// Which overlay currently owns keyboard focus. Both overlays may be
/// visually stacked, but at most one receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Settings,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavState {
    pub screen: Screen,
    pub selected_id: Option<String>,
    pub search_query: String,
    pub language_filter: Option<String>,
    pub folder: Folder,
    pub settings_open: bool,
    pub assistant_open: bool,
    /// Overlay holding keyboard focus; the most recently opened one.
    pub overlay_focus: Option<Overlay>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    SelectSnippet(String),
    Deselect,
    SetSearchQuery(String),
    SetLanguageFilter(Option<String>),
    SetFolder(Folder),
    SetSettingsOpen(bool),
    SetAssistantOpen(bool),
    NavigateToCreate,
    /// The canonical "go home": clears selection and search query.
    NavigateToList,
    /// Explicit screen switch, used for detail ↔ edit toggling.
    SetScreen(Screen),
}

/// Pure transition function. Actions that would produce an inconsistent
/// state (e.g. Edit without a selection) leave the state unchanged.
pub fn reduce(state: &NavState, action: NavAction) -> NavState {
    let mut next = state.clone();
    match action {
        NavAction::SelectSnippet(id) => {
            next.selected_id = Some(id);
            next.screen = Screen::Detail;
        }
        NavAction::Deselect => {
            next.selected_id = None;
            next.screen = Screen::List;
        }
        NavAction::SetSearchQuery(q) => {
            next.search_query = q;
        }
        NavAction::SetLanguageFilter(lang) => {
            next.language_filter = lang;
        }
        NavAction::SetFolder(folder) => {
            // Switching folders invalidates the selection context
            next.folder = folder;
            next.selected_id = None;
            next.screen = Screen::List;
        }
        NavAction::SetSettingsOpen(open) => {
            next.settings_open = open;
            next.overlay_focus = recompute_focus(&next, open.then_some(Overlay::Settings));
        }
        NavAction::SetAssistantOpen(open) => {
            next.assistant_open = open;
            next.overlay_focus = recompute_focus(&next, open.then_some(Overlay::Assistant));
        }
        NavAction::NavigateToCreate => {
            next.selected_id = None;
            next.screen = Screen::Create;
        }
        NavAction::NavigateToList => {
            next.selected_id = None;
            next.screen = Screen::List;
            next.search_query.clear();
        }
        NavAction::SetScreen(screen) => match screen {
            // List and Create are selection-free screens
            Screen::List | Screen::Create => {
                next.selected_id = None;
                next.screen = screen;
            }
            // Detail/Edit require a selection; refuse the switch otherwise
            Screen::Detail | Screen::Edit => {
                if next.selected_id.is_some() {
                    next.screen = screen;
                }
            }
        },
    }
    next
}

/// The just-opened overlay takes focus; on close, focus falls back to the
/// other overlay if it is still open.
fn recompute_focus(state: &NavState, opened: Option<Overlay>) -> Option<Overlay> {
    if let Some(overlay) = opened {
        return Some(overlay);
    }
    match (state.assistant_open, state.settings_open) {
        (true, _) => Some(Overlay::Assistant),
        (_, true) => Some(Overlay::Settings),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(state: &NavState, id: &str) -> NavState {
        reduce(state, NavAction::SelectSnippet(id.to_string()))
    }

    #[test]
    fn select_moves_to_detail() {
        let s = select(&NavState::default(), "s1");
        assert_eq!(s.screen, Screen::Detail);
        assert_eq!(s.selected_id.as_deref(), Some("s1"));
    }

    #[test]
    fn deselect_from_detail_returns_to_list() {
        let s = select(&NavState::default(), "s1");
        let s = reduce(&s, NavAction::Deselect);
        assert_eq!(s.screen, Screen::List);
        assert_eq!(s.selected_id, None);
    }

    #[test]
    fn edit_requires_selection() {
        let s = reduce(&NavState::default(), NavAction::SetScreen(Screen::Edit));
        assert_eq!(s.screen, Screen::List);

        let s = select(&NavState::default(), "s1");
        let s = reduce(&s, NavAction::SetScreen(Screen::Edit));
        assert_eq!(s.screen, Screen::Edit);
        assert_eq!(s.selected_id.as_deref(), Some("s1"));
    }

    #[test]
    fn navigate_to_list_clears_query_and_selection() {
        let mut s = select(&NavState::default(), "s1");
        s = reduce(&s, NavAction::SetSearchQuery("docker".to_string()));
        s = reduce(&s, NavAction::NavigateToList);
        assert_eq!(s.screen, Screen::List);
        assert_eq!(s.selected_id, None);
        assert!(s.search_query.is_empty());
    }

    #[test]
    fn navigate_to_create_clears_selection() {
        let s = select(&NavState::default(), "s1");
        let s = reduce(&s, NavAction::NavigateToCreate);
        assert_eq!(s.screen, Screen::Create);
        assert_eq!(s.selected_id, None);
    }

    #[test]
    fn switching_to_selection_free_screen_drops_selection() {
        let s = select(&NavState::default(), "s1");
        let s = reduce(&s, NavAction::SetScreen(Screen::List));
        assert_eq!(s.selected_id, None);
    }

    #[test]
    fn folder_change_resets_to_list() {
        let s = select(&NavState::default(), "s1");
        let s = reduce(&s, NavAction::SetFolder(Folder::Trash));
        assert_eq!(s.screen, Screen::List);
        assert_eq!(s.selected_id, None);
        assert_eq!(s.folder, Folder::Trash);
    }

    #[test]
    fn most_recent_overlay_takes_focus() {
        let s = reduce(&NavState::default(), NavAction::SetSettingsOpen(true));
        assert_eq!(s.overlay_focus, Some(Overlay::Settings));

        // Assistant stacked on top of settings — focus moves, both stay open
        let s = reduce(&s, NavAction::SetAssistantOpen(true));
        assert!(s.settings_open && s.assistant_open);
        assert_eq!(s.overlay_focus, Some(Overlay::Assistant));

        // Closing the assistant hands focus back
        let s = reduce(&s, NavAction::SetAssistantOpen(false));
        assert_eq!(s.overlay_focus, Some(Overlay::Settings));

        let s = reduce(&s, NavAction::SetSettingsOpen(false));
        assert_eq!(s.overlay_focus, None);
    }

    #[test]
    fn search_query_does_not_touch_selection() {
        let s = select(&NavState::default(), "s1");
        let s = reduce(&s, NavAction::SetSearchQuery("abc".to_string()));
        assert_eq!(s.screen, Screen::Detail);
        assert_eq!(s.selected_id.as_deref(), Some("s1"));
    }
}
