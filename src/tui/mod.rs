/// Ratatui-based TUI for Recall.
///
/// Architecture:
///   main thread:    event loop — crossterm keyboard events + channel drains
///   worker tasks:   tokio::spawn — store/Ollama calls, results sent back
///                   as UiEvents via UnboundedSender
///   query channels: debounced search / duplicate-detection / chat, each
///                   with its own outcome receiver in the select loop
///
/// Layout:
///   ┌────────────────────────────────────────────────┐
///   │  header: title + search box (3 lines)          │
///   ├──────────┬─────────────────────────────────────┤
///   │ sidebar  │  list / detail / form (Min(0))      │
///   ├──────────┴─────────────────────────────────────┤
///   │  status bar (1 line)                           │
///   └────────────────────────────────────────────────┘
pub mod overlays;
pub mod render;
pub mod views;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

use crate::ai::{ChatReply, OllamaClient, SnippetContext};
use crate::config::ResolvedConfig;
use crate::editor::{CodeEditor, EditorConfig, EditorConfigPatch, EditorTheme, LanguageMode};
use crate::errors::QueryError;
use crate::keys::{Command, KeyRouter, default_bindings};
use crate::nav::{self, Folder, NavAction, NavState, Overlay, Screen};
use crate::query::{ChannelPolicy, DUPLICATE_MIN_SCORE, Payload, QueryChannel, filter_results};
use crate::store::{
    CreateSnippetInput, SearchResult, Settings, Snippet, SnippetFilter, SnippetSummary,
    StoreClient, Tag, UpdateSettingsInput, UpdateSnippetInput,
};

/// Languages offered by the sidebar filter and the form's language cycle.
pub const LANGUAGES: &[LanguageMode] = &[
    LanguageMode::Plain,
    LanguageMode::JavaScript,
    LanguageMode::TypeScript,
    LanguageMode::Python,
    LanguageMode::Rust,
    LanguageMode::Html,
    LanguageMode::Css,
    LanguageMode::Json,
];

// ── UiEvent — typed events from worker tasks → TUI ───────────────────────────

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// List refresh completed for the active folder/filter
    SnippetsLoaded(Vec<SnippetSummary>),
    /// A single snippet was fetched for the detail screen
    SnippetLoaded(Snippet),
    TagsLoaded(Vec<Tag>),
    SettingsLoaded(Settings),
    /// Periodic Ollama reachability probe result
    OllamaStatus(bool),
    /// Models installed on the Ollama daemon (shown in the settings dialog)
    ModelsLoaded(Vec<String>),
    /// Create/update finished; the list and detail refresh from this
    SnippetSaved(Snippet),
    SnippetDeleted { id: String },
    /// AI drafted a solution for the form's problem text
    SolutionDraft(String),
    /// AI suggested tags for the form
    TagSuggestions(Vec<String>),
    /// A store or AI call failed (non-fatal, shown in the status bar)
    DataError(String),
}

// ── Search box ────────────────────────────────────────────────────────────────

pub struct SearchState {
    pub channel: QueryChannel<Vec<SearchResult>>,
    pub focused: bool,
    pub results: Vec<SearchResult>,
    pub selected: usize,
    pub loading: bool,
    /// Set when the collaborator failed; rendered instead of results
    pub error: Option<QueryError>,
}

impl SearchState {
    fn new(channel: QueryChannel<Vec<SearchResult>>) -> Self {
        Self {
            channel,
            focused: false,
            results: Vec::new(),
            selected: 0,
            loading: false,
            error: None,
        }
    }

    fn clear(&mut self) {
        self.results.clear();
        self.selected = 0;
        self.loading = false;
        self.error = None;
    }
}

// ── Snippet form ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Problem,
    Solution,
    Code,
    Tags,
    Reference,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Title => FormField::Problem,
            FormField::Problem => FormField::Solution,
            FormField::Solution => FormField::Code,
            FormField::Code => FormField::Tags,
            FormField::Tags => FormField::Reference,
            FormField::Reference => FormField::Title,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Title => FormField::Reference,
            FormField::Problem => FormField::Title,
            FormField::Solution => FormField::Problem,
            FormField::Code => FormField::Solution,
            FormField::Tags => FormField::Code,
            FormField::Reference => FormField::Tags,
        }
    }
}

pub struct SnippetForm {
    /// `Some` when editing an existing snippet; excluded from duplicate hits
    pub editing_id: Option<String>,
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub code: CodeEditor,
    pub language: LanguageMode,
    pub reference_url: String,
    /// Comma-separated tag names; resolved to ids on save
    pub tag_input: String,
    pub focus: FormField,
    pub duplicates: Vec<SearchResult>,
    pub generating_solution: bool,
    pub suggesting_tags: bool,
}

impl SnippetForm {
    pub fn blank(theme: EditorTheme) -> Self {
        Self {
            editing_id: None,
            title: String::new(),
            problem: String::new(),
            solution: String::new(),
            code: CodeEditor::create(
                "",
                EditorConfig {
                    language: LanguageMode::Plain,
                    theme,
                    read_only: false,
                    placeholder: "paste code here".to_string(),
                },
            ),
            language: LanguageMode::Plain,
            reference_url: String::new(),
            tag_input: String::new(),
            focus: FormField::Title,
            duplicates: Vec::new(),
            generating_solution: false,
            suggesting_tags: false,
        }
    }

    pub fn from_snippet(snippet: &Snippet, theme: EditorTheme) -> Self {
        let language = snippet
            .code_language
            .as_deref()
            .map(LanguageMode::detect)
            .unwrap_or_default();
        let mut form = Self::blank(theme);
        form.editing_id = Some(snippet.id.clone());
        form.title = snippet.title.clone();
        form.problem = snippet.problem.clone();
        form.solution = snippet.solution.clone().unwrap_or_default();
        form.code.set_text(snippet.code.as_deref().unwrap_or(""));
        form.code.reconfigure(EditorConfigPatch {
            language: Some(language),
            ..Default::default()
        });
        form.language = language;
        form.reference_url = snippet.reference_url.clone().unwrap_or_default();
        form.tag_input = snippet
            .tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        form
    }

    /// Text the duplicate detector matches against.
    fn duplicate_query(&self) -> String {
        format!("{} {}", self.title.trim(), self.problem.trim())
            .trim()
            .to_string()
    }

    fn cycle_language(&mut self) {
        let idx = LANGUAGES.iter().position(|l| *l == self.language).unwrap_or(0);
        self.language = LANGUAGES[(idx + 1) % LANGUAGES.len()];
        self.code.reconfigure(EditorConfigPatch {
            language: Some(self.language),
            ..Default::default()
        });
    }

    fn sync_focus(&mut self) {
        self.code.set_focused(self.focus == FormField::Code);
    }

    fn to_create_input(&self, tag_ids: Vec<String>) -> CreateSnippetInput {
        CreateSnippetInput {
            title: self.title.trim().to_string(),
            problem: self.problem.trim().to_string(),
            solution: non_empty(&self.solution),
            code: non_empty(&self.code.text()),
            code_language: (self.language != LanguageMode::Plain)
                .then(|| self.language.label().to_lowercase()),
            reference_url: non_empty(&self.reference_url),
            tag_ids,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

// ── Assistant chat ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ChatEntry {
    User(String),
    Assistant(ChatReply),
    Error(String),
}

pub struct ChatState {
    pub channel: QueryChannel<ChatReply>,
    pub input: String,
    pub history: Vec<ChatEntry>,
    pub waiting: bool,
}

impl ChatState {
    fn new(channel: QueryChannel<ChatReply>) -> Self {
        Self {
            channel,
            input: String::new(),
            history: Vec::new(),
            waiting: false,
        }
    }
}

// ── Settings dialog ───────────────────────────────────────────────────────────

pub struct SettingsForm {
    pub theme: String,
    pub ollama_base_url: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub search_limit: String,
    /// Row index of the field being edited (0..=4)
    pub selected: usize,
}

impl SettingsForm {
    pub const FIELD_COUNT: usize = 5;

    fn from_settings(s: &Settings) -> Self {
        Self {
            theme: s.theme.clone(),
            ollama_base_url: s.ollama_base_url.clone(),
            llm_model: s.llm_model.clone(),
            embedding_model: s.embedding_model.clone(),
            search_limit: s.search_limit.to_string(),
            selected: 0,
        }
    }

    fn selected_field_mut(&mut self) -> &mut String {
        match self.selected {
            0 => &mut self.theme,
            1 => &mut self.ollama_base_url,
            2 => &mut self.llm_model,
            3 => &mut self.embedding_model,
            _ => &mut self.search_limit,
        }
    }

    fn to_update_input(&self) -> UpdateSettingsInput {
        UpdateSettingsInput {
            theme: Some(self.theme.trim().to_string()),
            ollama_base_url: Some(self.ollama_base_url.trim().to_string()),
            llm_model: Some(self.llm_model.trim().to_string()),
            embedding_model: Some(self.embedding_model.trim().to_string()),
            search_limit: self.search_limit.trim().parse().ok(),
        }
    }
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub nav: NavState,
    pub router: KeyRouter,
    pub model: String,
    pub search_limit: usize,

    pub snippets: Vec<SnippetSummary>,
    pub list_selected: usize,
    pub detail: Option<Snippet>,
    pub detail_scroll: usize,
    pub tags: Vec<Tag>,
    pub settings: Settings,
    pub ollama_online: bool,
    pub available_models: Vec<String>,

    pub search: SearchState,
    pub form: Option<SnippetForm>,
    /// Duplicate-detection channel outlives the form so a torn-down form
    /// cannot leak an in-flight request into its successor
    pub dup_channel: QueryChannel<Vec<SearchResult>>,
    pub chat: ChatState,
    pub settings_form: Option<SettingsForm>,

    /// Transient one-line message in the status bar
    pub status: Option<String>,
    pub spinner_tick: u32,
    pub list_loading: bool,
}

impl AppState {
    fn new(
        resolved: &ResolvedConfig,
        search_channel: QueryChannel<Vec<SearchResult>>,
        dup_channel: QueryChannel<Vec<SearchResult>>,
        chat_channel: QueryChannel<ChatReply>,
    ) -> Self {
        Self {
            nav: NavState::default(),
            router: KeyRouter::register(default_bindings()),
            model: resolved.model.clone(),
            search_limit: resolved.search_limit,
            snippets: Vec::new(),
            list_selected: 0,
            detail: None,
            detail_scroll: 0,
            tags: Vec::new(),
            settings: Settings::default(),
            ollama_online: false,
            available_models: Vec::new(),
            search: SearchState::new(search_channel),
            form: None,
            dup_channel,
            chat: ChatState::new(chat_channel),
            settings_form: None,
            status: None,
            spinner_tick: 0,
            list_loading: false,
        }
    }

    pub fn editor_theme(&self) -> EditorTheme {
        if self.settings.theme == "light" { EditorTheme::Light } else { EditorTheme::Dark }
    }

    /// True when the focus target consumes plain keystrokes, so single-letter
    /// accelerators must not fire.
    pub fn in_text_input(&self) -> bool {
        match self.nav.overlay_focus {
            Some(Overlay::Assistant) => true,
            Some(Overlay::Settings) => true,
            None => {
                self.search.focused
                    || matches!(self.nav.screen, Screen::Create | Screen::Edit)
            }
        }
    }

    fn apply_nav(&mut self, action: NavAction) {
        self.nav = nav::reduce(&self.nav, action);
    }

    fn selected_summary(&self) -> Option<&SnippetSummary> {
        self.snippets.get(self.list_selected)
    }

    fn filter(&self) -> SnippetFilter {
        SnippetFilter {
            language: self.nav.language_filter.clone(),
            search: None,
            favorites_only: self.nav.folder == Folder::Favorites,
            trash_only: self.nav.folder == Folder::Trash,
            recent_first: true,
        }
    }

    /// Context handed to the assistant when the user is viewing a snippet.
    fn chat_context(&self) -> Option<SnippetContext> {
        if self.nav.screen != Screen::Detail {
            return None;
        }
        self.detail.as_ref().map(|s| SnippetContext {
            title: s.title.clone(),
            problem: s.problem.clone(),
            solution: s.solution.clone(),
            code: s.code.clone(),
        })
    }

    fn close_form(&mut self) {
        if let Some(form) = &mut self.form {
            form.code.destroy();
        }
        self.form = None;
        self.dup_channel.cancel();
    }

    fn apply_event(&mut self, ev: UiEvent, store: &Arc<StoreClient>, tx: &UnboundedSender<UiEvent>) {
        match ev {
            UiEvent::SnippetsLoaded(snippets) => {
                self.snippets = snippets;
                self.list_loading = false;
                if self.list_selected >= self.snippets.len() {
                    self.list_selected = self.snippets.len().saturating_sub(1);
                }
            }
            UiEvent::SnippetLoaded(snippet) => {
                // Only current if the user still has this id selected
                if self.nav.selected_id.as_deref() == Some(snippet.id.as_str()) {
                    self.detail = Some(snippet);
                    self.detail_scroll = 0;
                }
            }
            UiEvent::TagsLoaded(tags) => self.tags = tags,
            UiEvent::SettingsLoaded(settings) => {
                self.settings = settings;
                let theme = self.editor_theme();
                if let Some(form) = &mut self.form {
                    form.code.reconfigure(EditorConfigPatch {
                        theme: Some(theme),
                        ..Default::default()
                    });
                }
            }
            UiEvent::OllamaStatus(online) => self.ollama_online = online,
            UiEvent::ModelsLoaded(models) => self.available_models = models,
            UiEvent::SnippetSaved(snippet) => {
                self.status = Some(format!("saved \"{}\"", snippet.title));
                // Favorites/restores also land here; only a form save navigates
                let from_form = self.form.is_some();
                self.close_form();
                if from_form {
                    self.apply_nav(NavAction::SelectSnippet(snippet.id.clone()));
                    self.detail = Some(snippet);
                } else if self.nav.selected_id.as_deref() == Some(snippet.id.as_str()) {
                    self.detail = Some(snippet);
                }
                spawn_list_refresh(store, tx, self.filter());
            }
            UiEvent::SnippetDeleted { id } => {
                if self.nav.selected_id.as_deref() == Some(id.as_str()) {
                    self.apply_nav(NavAction::Deselect);
                    self.detail = None;
                }
                spawn_list_refresh(store, tx, self.filter());
            }
            UiEvent::SolutionDraft(text) => {
                if let Some(form) = &mut self.form {
                    form.solution = text;
                    form.generating_solution = false;
                }
            }
            UiEvent::TagSuggestions(tags) => {
                if let Some(form) = &mut self.form {
                    if !tags.is_empty() {
                        form.tag_input = tags.join(", ");
                    }
                    form.suggesting_tags = false;
                }
            }
            UiEvent::DataError(msg) => {
                warn!(%msg, "worker task failed");
                if let Some(form) = &mut self.form {
                    form.generating_solution = false;
                    form.suggesting_tags = false;
                }
                self.list_loading = false;
                self.status = Some(msg);
            }
        }
    }
}

// ── Worker task helpers ───────────────────────────────────────────────────────

fn spawn_list_refresh(
    store: &Arc<StoreClient>,
    tx: &UnboundedSender<UiEvent>,
    filter: SnippetFilter,
) {
    let store = Arc::clone(store);
    let tx = tx.clone();
    tokio::spawn(async move {
        let ev = match store.list_snippets(&filter).await {
            Ok(snippets) => UiEvent::SnippetsLoaded(snippets),
            Err(e) => UiEvent::DataError(format!("load failed: {e}")),
        };
        let _ = tx.send(ev);
    });
}

fn spawn_detail_load(store: &Arc<StoreClient>, tx: &UnboundedSender<UiEvent>, id: String) {
    let store = Arc::clone(store);
    let tx = tx.clone();
    tokio::spawn(async move {
        // Viewing counts as access; drives "recent" ordering
        let _ = store.mark_accessed(&id).await;
        let ev = match store.get_snippet(&id).await {
            Ok(snippet) => UiEvent::SnippetLoaded(snippet),
            Err(e) => UiEvent::DataError(format!("load failed: {e}")),
        };
        let _ = tx.send(ev);
    });
}

fn spawn_ollama_probe(ollama: &Arc<OllamaClient>, tx: &UnboundedSender<UiEvent>) {
    let ollama = Arc::clone(ollama);
    let tx = tx.clone();
    tokio::spawn(async move {
        let online = ollama.check_connection().await;
        let _ = tx.send(UiEvent::OllamaStatus(online));
    });
}

/// Resolve comma-separated tag names to ids, creating missing tags, then
/// create or update the snippet.
fn spawn_save(
    store: &Arc<StoreClient>,
    tx: &UnboundedSender<UiEvent>,
    input: CreateSnippetInput,
    tag_names: Vec<String>,
    known_tags: Vec<Tag>,
    editing_id: Option<String>,
) {
    let store = Arc::clone(store);
    let tx = tx.clone();
    tokio::spawn(async move {
        let mut created_tag_ids: Vec<String> = Vec::new();
        let result = async {
            let mut tag_ids = Vec::new();
            for name in &tag_names {
                let existing = known_tags
                    .iter()
                    .find(|t| t.name.eq_ignore_ascii_case(name))
                    .map(|t| t.id.clone());
                let id = match existing {
                    Some(id) => id,
                    None => {
                        let tag = store.create_tag(name).await?;
                        created_tag_ids.push(tag.id.clone());
                        tag.id
                    }
                };
                tag_ids.push(id);
            }
            match editing_id {
                Some(id) => {
                    let update = UpdateSnippetInput {
                        title: Some(input.title.clone()),
                        problem: Some(input.problem.clone()),
                        solution: input.solution.clone(),
                        code: input.code.clone(),
                        code_language: input.code_language.clone(),
                        reference_url: input.reference_url.clone(),
                        tag_ids: Some(tag_ids),
                        last_accessed_at: None,
                    };
                    store.update_snippet(&id, &update).await
                }
                None => {
                    let mut create = input;
                    create.tag_ids = tag_ids;
                    store.create_snippet(&create).await
                }
            }
        }
        .await;
        let ev = match result {
            Ok(snippet) => UiEvent::SnippetSaved(snippet),
            Err(e) => {
                // Tags created for a save that failed would be orphans
                for id in &created_tag_ids {
                    let _ = store.delete_tag(id).await;
                }
                UiEvent::DataError(format!("save failed: {e}"))
            }
        };
        let _ = tx.send(ev);
    });
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(resolved: ResolvedConfig) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let result = event_loop(&mut terminal, resolved).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    resolved: ResolvedConfig,
) -> Result<()> {
    let store = Arc::new(StoreClient::new(resolved.store_url.clone()));
    let ollama = Arc::new(OllamaClient::new(
        resolved.ollama_url.clone(),
        resolved.model.clone(),
    ));

    let (search_channel, mut search_rx) = QueryChannel::new(ChannelPolicy::SEARCH);
    let (dup_channel, mut dup_rx) = QueryChannel::new(ChannelPolicy::DUPLICATES);
    let (chat_channel, mut chat_rx) = QueryChannel::new(ChannelPolicy::CHAT);
    let (data_tx, mut data_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut state = AppState::new(&resolved, search_channel, dup_channel, chat_channel);
    info!(store = %resolved.store_url, ollama = %resolved.ollama_url, "starting tui");

    // Initial loads
    state.list_loading = true;
    spawn_list_refresh(&store, &data_tx, state.filter());
    spawn_ollama_probe(&ollama, &data_tx);
    {
        let store2 = Arc::clone(&store);
        let tx = data_tx.clone();
        tokio::spawn(async move {
            if let Ok(tags) = store2.list_tags().await {
                let _ = tx.send(UiEvent::TagsLoaded(tags));
            }
            if let Ok(settings) = store2.get_settings().await {
                let _ = tx.send(UiEvent::SettingsLoaded(settings));
            }
        });
    }

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Animation tick + periodic Ollama probe ────────────────────────
            _ = ticker.tick() => {
                state.spinner_tick = state.spinner_tick.wrapping_add(1);
                // Re-probe roughly every 30s
                if state.spinner_tick % 250 == 0 {
                    spawn_ollama_probe(&ollama, &data_tx);
                }
                if state.search.loading
                    || state.chat.waiting
                    || state.list_loading
                    || state.form.as_ref().is_some_and(|f| f.generating_solution || f.suggesting_tags)
                {
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Data events from worker tasks ─────────────────────────────────
            Some(ev) = data_rx.recv() => {
                state.apply_event(ev, &store, &data_tx);
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Search channel outcomes ───────────────────────────────────────
            Some(out) = search_rx.recv() => {
                if state.search.channel.accept(out.seq) {
                    state.search.loading = false;
                    match out.payload {
                        Payload::Results(results) => {
                            state.search.results = results;
                            state.search.selected = 0;
                            state.search.error = None;
                        }
                        Payload::Cleared => state.search.clear(),
                        Payload::Error(e) => {
                            state.search.results.clear();
                            state.search.error = Some(e);
                        }
                    }
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Duplicate-detection outcomes ──────────────────────────────────
            Some(out) = dup_rx.recv() => {
                if state.dup_channel.accept(out.seq) {
                    if let Some(form) = &mut state.form {
                        match out.payload {
                            Payload::Results(results) => form.duplicates = results,
                            Payload::Cleared => form.duplicates.clear(),
                            // Duplicate hints are best-effort; a failure just
                            // means no hint
                            Payload::Error(_) => form.duplicates.clear(),
                        }
                    }
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Chat outcomes ─────────────────────────────────────────────────
            Some(out) = chat_rx.recv() => {
                if state.chat.channel.accept(out.seq) {
                    state.chat.waiting = false;
                    match out.payload {
                        Payload::Results(reply) => {
                            state.chat.history.push(ChatEntry::Assistant(reply));
                        }
                        Payload::Cleared => {}
                        Payload::Error(e) => {
                            let msg = match e {
                                QueryError::Unreachable => {
                                    "assistant requires Ollama — is it running?".to_string()
                                }
                                other => other.to_string(),
                            };
                            state.chat.history.push(ChatEntry::Error(msg));
                        }
                    }
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) => {
                        let keep = handle_key(key, &mut state, &store, &ollama, &data_tx);
                        if !keep { break; }
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    Ok(())
}

// ── Key handling ──────────────────────────────────────────────────────────────

/// Route one key event. Returns false when the app should exit.
fn handle_key(
    key: KeyEvent,
    state: &mut AppState,
    store: &Arc<StoreClient>,
    ollama: &Arc<OllamaClient>,
    tx: &UnboundedSender<UiEvent>,
) -> bool {
    state.status = None;

    let in_input = state.in_text_input();
    if let Some(command) = state.router.dispatch(&key, in_input) {
        return handle_command(command, state, store, ollama, tx);
    }

    if in_input {
        handle_text_key(key, state, store, ollama, tx);
    }
    true
}

fn handle_command(
    command: Command,
    state: &mut AppState,
    store: &Arc<StoreClient>,
    ollama: &Arc<OllamaClient>,
    tx: &UnboundedSender<UiEvent>,
) -> bool {
    match command {
        Command::Quit => return false,

        Command::Escape => handle_escape(state),

        Command::ToggleAssistant => {
            let open = !state.nav.assistant_open;
            state.apply_nav(NavAction::SetAssistantOpen(open));
        }

        Command::OpenSettings => {
            state.settings_form = Some(SettingsForm::from_settings(&state.settings));
            state.apply_nav(NavAction::SetSettingsOpen(true));
            let ollama = Arc::clone(ollama);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(models) = ollama.list_models().await {
                    let _ = tx.send(UiEvent::ModelsLoaded(models));
                }
            });
        }

        Command::FocusSearch => {
            state.search.focused = true;
        }

        Command::NewSnippet => {
            state.form = Some(SnippetForm::blank(state.editor_theme()));
            state.apply_nav(NavAction::NavigateToCreate);
        }

        Command::MoveUp => match state.nav.screen {
            Screen::List => state.list_selected = state.list_selected.saturating_sub(1),
            Screen::Detail => state.detail_scroll = state.detail_scroll.saturating_sub(1),
            _ => {}
        },
        Command::MoveDown => match state.nav.screen {
            Screen::List => {
                if state.list_selected + 1 < state.snippets.len() {
                    state.list_selected += 1;
                }
            }
            // Paragraph::scroll takes a u16; saturate instead of wrapping
            Screen::Detail => {
                state.detail_scroll = (state.detail_scroll + 1).min(u16::MAX as usize);
            }
            _ => {}
        },

        Command::Open => {
            if state.nav.screen == Screen::List {
                if let Some(summary) = state.selected_summary() {
                    let id = summary.id.clone();
                    state.apply_nav(NavAction::SelectSnippet(id.clone()));
                    state.detail = None;
                    spawn_detail_load(store, tx, id);
                }
            }
        }

        Command::ToggleFavorite => {
            let target = match state.nav.screen {
                Screen::Detail => state.nav.selected_id.clone(),
                Screen::List => state.selected_summary().map(|s| s.id.clone()),
                _ => None,
            };
            if let Some(id) = target {
                let store = Arc::clone(store);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let ev = match store.toggle_favorite(&id).await {
                        Ok(snippet) => UiEvent::SnippetSaved(snippet),
                        Err(e) => UiEvent::DataError(format!("favorite failed: {e}")),
                    };
                    let _ = tx.send(ev);
                });
            }
        }

        Command::EditSnippet => {
            if state.nav.screen == Screen::Detail {
                if let Some(snippet) = &state.detail {
                    state.form = Some(SnippetForm::from_snippet(snippet, state.editor_theme()));
                    state.apply_nav(NavAction::SetScreen(Screen::Edit));
                }
            }
        }

        Command::DeleteSnippet => {
            let target = match state.nav.screen {
                Screen::Detail => state.nav.selected_id.clone(),
                Screen::List => state.selected_summary().map(|s| s.id.clone()),
                _ => None,
            };
            if let Some(id) = target {
                let purge = state.nav.folder == Folder::Trash;
                let store = Arc::clone(store);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = if purge {
                        store.purge_snippet(&id).await
                    } else {
                        store.delete_snippet(&id).await
                    };
                    let ev = match result {
                        Ok(()) => UiEvent::SnippetDeleted { id },
                        Err(e) => UiEvent::DataError(format!("delete failed: {e}")),
                    };
                    let _ = tx.send(ev);
                });
            }
        }

        Command::RestoreSnippet => {
            if state.nav.folder == Folder::Trash {
                if let Some(summary) = state.selected_summary() {
                    let id = summary.id.clone();
                    let store = Arc::clone(store);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let ev = match store.restore_snippet(&id).await {
                            Ok(snippet) => UiEvent::SnippetSaved(snippet),
                            Err(e) => UiEvent::DataError(format!("restore failed: {e}")),
                        };
                        let _ = tx.send(ev);
                    });
                }
            }
        }

        Command::Save => {
            if state.nav.settings_open {
                save_settings(state, store, tx);
            } else {
                save_form(state, store, tx);
            }
        }

        Command::GenerateSolution => {
            if let Some(form) = &mut state.form {
                let problem = form.problem.trim().to_string();
                if !problem.is_empty() && !form.generating_solution {
                    form.generating_solution = true;
                    let ollama = Arc::clone(ollama);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let ev = match ollama.generate_solution(&problem).await {
                            Ok(text) => UiEvent::SolutionDraft(text),
                            Err(e) => UiEvent::DataError(format!("generate failed: {e}")),
                        };
                        let _ = tx.send(ev);
                    });
                }
            }
        }

        Command::SuggestTags => {
            if let Some(form) = &mut state.form {
                let content = format!("{}\n{}\n{}", form.title, form.problem, form.solution);
                if !content.trim().is_empty() && !form.suggesting_tags {
                    form.suggesting_tags = true;
                    let ollama = Arc::clone(ollama);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let ev = match ollama.suggest_tags(&content).await {
                            Ok(tags) => UiEvent::TagSuggestions(tags),
                            Err(e) => UiEvent::DataError(format!("suggest failed: {e}")),
                        };
                        let _ = tx.send(ev);
                    });
                }
            }
        }

        Command::FolderLibrary => switch_folder(state, store, tx, Folder::Library),
        Command::FolderFavorites => switch_folder(state, store, tx, Folder::Favorites),
        Command::FolderTrash => switch_folder(state, store, tx, Folder::Trash),

        Command::CycleLanguage => {
            let known = known_languages(&state.snippets);
            let next = match &state.nav.language_filter {
                None => known.first().cloned(),
                Some(current) => {
                    let idx = known.iter().position(|l| l == current);
                    match idx {
                        Some(i) if i + 1 < known.len() => Some(known[i + 1].clone()),
                        _ => None,
                    }
                }
            };
            state.apply_nav(NavAction::SetLanguageFilter(next));
            state.list_loading = true;
            spawn_list_refresh(store, tx, state.filter());
        }
    }
    true
}

fn switch_folder(
    state: &mut AppState,
    store: &Arc<StoreClient>,
    tx: &UnboundedSender<UiEvent>,
    folder: Folder,
) {
    state.apply_nav(NavAction::SetFolder(folder));
    state.detail = None;
    state.list_selected = 0;
    state.list_loading = true;
    spawn_list_refresh(store, tx, state.filter());
}

/// Languages present in the current list, deduplicated, for the `l` cycle.
fn known_languages(snippets: &[SnippetSummary]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for s in snippets {
        if let Some(lang) = &s.code_language {
            if !out.contains(lang) {
                out.push(lang.clone());
            }
        }
    }
    out.sort();
    out
}

/// Escape unwinds one layer at a time: focused overlay, then search focus,
/// then the form, then the detail selection.
fn handle_escape(state: &mut AppState) {
    if state.nav.overlay_focus == Some(Overlay::Assistant) {
        state.apply_nav(NavAction::SetAssistantOpen(false));
        return;
    }
    if state.nav.overlay_focus == Some(Overlay::Settings) {
        state.settings_form = None;
        state.apply_nav(NavAction::SetSettingsOpen(false));
        return;
    }
    if state.search.focused {
        state.search.focused = false;
        state.search.clear();
        state.search.channel.cancel();
        state.apply_nav(NavAction::SetSearchQuery(String::new()));
        return;
    }
    match state.nav.screen {
        Screen::Create => {
            state.close_form();
            state.apply_nav(NavAction::NavigateToList);
        }
        Screen::Edit => {
            // Abandon edits, fall back to the detail screen
            state.close_form();
            let id = state.nav.selected_id.clone();
            if let Some(id) = id {
                state.apply_nav(NavAction::SelectSnippet(id));
            } else {
                state.apply_nav(NavAction::NavigateToList);
            }
        }
        Screen::Detail => {
            state.apply_nav(NavAction::Deselect);
            state.detail = None;
        }
        Screen::List => {}
    }
}

fn save_form(state: &mut AppState, store: &Arc<StoreClient>, tx: &UnboundedSender<UiEvent>) {
    let Some(form) = &state.form else { return };
    if form.title.trim().is_empty() || form.problem.trim().is_empty() {
        state.status = Some("title and problem are required".to_string());
        return;
    }
    let tag_names: Vec<String> = form
        .tag_input
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    spawn_save(
        store,
        tx,
        form.to_create_input(Vec::new()),
        tag_names,
        state.tags.clone(),
        form.editing_id.clone(),
    );
}

fn save_settings(state: &mut AppState, store: &Arc<StoreClient>, tx: &UnboundedSender<UiEvent>) {
    let Some(form) = &state.settings_form else { return };
    let input = form.to_update_input();
    state.settings_form = None;
    state.nav = nav::reduce(&state.nav, NavAction::SetSettingsOpen(false));
    let store = Arc::clone(store);
    let tx = tx.clone();
    tokio::spawn(async move {
        let ev = match store.update_settings(&input).await {
            Ok(settings) => UiEvent::SettingsLoaded(settings),
            Err(e) => UiEvent::DataError(format!("settings save failed: {e}")),
        };
        let _ = tx.send(ev);
    });
}

// ── Text-input key handling ───────────────────────────────────────────────────

fn handle_text_key(
    key: KeyEvent,
    state: &mut AppState,
    store: &Arc<StoreClient>,
    ollama: &Arc<OllamaClient>,
    tx: &UnboundedSender<UiEvent>,
) {
    match state.nav.overlay_focus {
        Some(Overlay::Assistant) => handle_chat_key(key, state, store, ollama),
        Some(Overlay::Settings) => handle_settings_key(key, state),
        None => {
            if state.search.focused {
                handle_search_key(key, state, store, tx);
            } else if state.form.is_some() {
                handle_form_key(key, state, store);
            }
        }
    }
}

/// A character the user actually typed. Unregistered Ctrl/Alt chords are
/// not text and must not leak their base letter into a buffer.
fn typed_char(key: &KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(c)
            if key
                .modifiers
                .intersection(KeyModifiers::CONTROL | KeyModifiers::ALT)
                .is_empty() =>
        {
            Some(c)
        }
        _ => None,
    }
}

fn handle_search_key(
    key: KeyEvent,
    state: &mut AppState,
    store: &Arc<StoreClient>,
    tx: &UnboundedSender<UiEvent>,
) {
    match key.code {
        KeyCode::Char(_) => {
            if let Some(c) = typed_char(&key) {
                let mut q = state.nav.search_query.clone();
                q.push(c);
                set_search_query(state, store, q);
            }
        }
        KeyCode::Backspace => {
            let mut q = state.nav.search_query.clone();
            q.pop();
            set_search_query(state, store, q);
        }
        KeyCode::Down => {
            if state.search.selected + 1 < state.search.results.len() {
                state.search.selected += 1;
            }
        }
        KeyCode::Up => {
            state.search.selected = state.search.selected.saturating_sub(1);
        }
        KeyCode::Enter => {
            if let Some(hit) = state.search.results.get(state.search.selected) {
                let id = hit.snippet.id.clone();
                state.search.focused = false;
                state.search.clear();
                state.apply_nav(NavAction::SetSearchQuery(String::new()));
                state.apply_nav(NavAction::SelectSnippet(id.clone()));
                state.detail = None;
                spawn_detail_load(store, tx, id);
            }
        }
        _ => {}
    }
}

fn set_search_query(state: &mut AppState, store: &Arc<StoreClient>, query: String) {
    state.apply_nav(NavAction::SetSearchQuery(query.clone()));
    let len = query.chars().count();
    state.search.error = None;
    state.search.loading = len >= 3;
    let store = Arc::clone(store);
    let limit = state.search_limit;
    state
        .search
        .channel
        .submit(len, async move { store.semantic_search(&query, limit).await });
}

fn handle_chat_key(
    key: KeyEvent,
    state: &mut AppState,
    store: &Arc<StoreClient>,
    ollama: &Arc<OllamaClient>,
) {
    match key.code {
        KeyCode::Char(_) => {
            if let Some(c) = typed_char(&key) {
                state.chat.input.push(c);
            }
        }
        KeyCode::Backspace => {
            state.chat.input.pop();
        }
        KeyCode::Enter => {
            let message = state.chat.input.trim().to_string();
            if message.is_empty() {
                return;
            }
            state.chat.input.clear();
            state.chat.history.push(ChatEntry::User(message.clone()));
            state.chat.waiting = true;
            let context = state.chat_context();
            let store = Arc::clone(store);
            let ollama = Arc::clone(ollama);
            let len = message.chars().count();
            state.chat.channel.submit(len, async move {
                ollama.chat(&store, &message, context.as_ref()).await
            });
        }
        _ => {}
    }
}

fn handle_settings_key(key: KeyEvent, state: &mut AppState) {
    let Some(form) = &mut state.settings_form else { return };
    match key.code {
        KeyCode::Down | KeyCode::Tab => {
            form.selected = (form.selected + 1) % SettingsForm::FIELD_COUNT;
        }
        KeyCode::Up | KeyCode::BackTab => {
            form.selected = (form.selected + SettingsForm::FIELD_COUNT - 1) % SettingsForm::FIELD_COUNT;
        }
        KeyCode::Char(_) => {
            if let Some(c) = typed_char(&key) {
                form.selected_field_mut().push(c);
            }
        }
        KeyCode::Backspace => {
            form.selected_field_mut().pop();
        }
        _ => {}
    }
}

fn handle_form_key(key: KeyEvent, state: &mut AppState, store: &Arc<StoreClient>) {
    let Some(form) = &mut state.form else { return };
    match key.code {
        KeyCode::Tab => {
            form.focus = form.focus.next();
            form.sync_focus();
            return;
        }
        KeyCode::BackTab => {
            form.focus = form.focus.prev();
            form.sync_focus();
            return;
        }
        _ => {}
    }

    let mut dup_trigger = false;
    match form.focus {
        FormField::Code => {
            // Ctrl+L cycles the attachment language
            if key.code == KeyCode::Char('l') && key.modifiers.contains(KeyModifiers::CONTROL) {
                form.cycle_language();
            } else {
                form.code.input(key);
            }
        }
        field => {
            let buf = match field {
                FormField::Title => &mut form.title,
                FormField::Problem => &mut form.problem,
                FormField::Solution => &mut form.solution,
                FormField::Tags => &mut form.tag_input,
                FormField::Reference => &mut form.reference_url,
                FormField::Code => unreachable!(),
            };
            match key.code {
                KeyCode::Char(_) => {
                    if let Some(c) = typed_char(&key) {
                        buf.push(c);
                        dup_trigger = matches!(field, FormField::Title | FormField::Problem);
                    }
                }
                KeyCode::Backspace => {
                    buf.pop();
                    dup_trigger = matches!(field, FormField::Title | FormField::Problem);
                }
                KeyCode::Enter => {
                    // Problem and solution are multi-line
                    if matches!(field, FormField::Problem | FormField::Solution) {
                        buf.push('\n');
                        dup_trigger = field == FormField::Problem;
                    }
                }
                _ => {}
            }
        }
    }

    if dup_trigger {
        let query = form.duplicate_query();
        let exclude = form.editing_id.clone();
        let len = query.chars().count();
        let store = Arc::clone(store);
        let limit = state.search_limit;
        state.dup_channel.submit(len, async move {
            let results = store.semantic_search(&query, limit).await?;
            Ok(filter_results(results, DUPLICATE_MIN_SCORE, exclude.as_deref()))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, lang: Option<&str>) -> SnippetSummary {
        SnippetSummary {
            id: id.to_string(),
            title: format!("snippet {id}"),
            problem: "p".to_string(),
            code_language: lang.map(str::to_string),
            code_preview: None,
            tags: Vec::new(),
            created_at: "2026-01-01".to_string(),
            is_favorite: false,
            is_deleted: false,
            deleted_at: None,
            last_accessed_at: None,
        }
    }

    #[test]
    fn known_languages_dedupes_and_sorts() {
        let snippets = vec![
            summary("a", Some("rust")),
            summary("b", Some("json")),
            summary("c", Some("rust")),
            summary("d", None),
        ];
        assert_eq!(known_languages(&snippets), vec!["json", "rust"]);
    }

    #[test]
    fn form_field_cycle_is_a_ring() {
        let mut field = FormField::Title;
        for _ in 0..6 {
            field = field.next();
        }
        assert_eq!(field, FormField::Title);
        assert_eq!(FormField::Title.prev(), FormField::Reference);
    }

    #[test]
    fn duplicate_query_joins_title_and_problem() {
        let mut form = SnippetForm::blank(EditorTheme::Dark);
        form.title = "Docker DNS".to_string();
        form.problem = "cannot resolve".to_string();
        assert_eq!(form.duplicate_query(), "Docker DNS cannot resolve");

        form.problem.clear();
        assert_eq!(form.duplicate_query(), "Docker DNS");
    }

    #[test]
    fn form_from_snippet_carries_code_and_tags() {
        let snippet = Snippet {
            id: "s1".to_string(),
            title: "t".to_string(),
            problem: "p".to_string(),
            solution: Some("sol".to_string()),
            code: Some("fn main() {}".to_string()),
            code_language: Some("rust".to_string()),
            reference_url: None,
            tags: vec![
                Tag { id: "1".to_string(), name: "rust".to_string() },
                Tag { id: "2".to_string(), name: "cli".to_string() },
            ],
            created_at: "2026-01-01".to_string(),
            updated_at: "2026-01-01".to_string(),
            is_favorite: false,
            is_deleted: false,
            deleted_at: None,
            last_accessed_at: None,
        };
        let form = SnippetForm::from_snippet(&snippet, EditorTheme::Dark);
        assert_eq!(form.editing_id.as_deref(), Some("s1"));
        assert_eq!(form.code.text(), "fn main() {}");
        assert_eq!(form.code.language(), LanguageMode::Rust);
        assert_eq!(form.tag_input, "rust, cli");
    }

    fn app_state() -> AppState {
        let resolved = ResolvedConfig {
            store_url: "http://localhost:7171".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            search_limit: 10,
            log_filter: None,
        };
        let (search, _search_rx) = QueryChannel::new(ChannelPolicy::SEARCH);
        let (dup, _dup_rx) = QueryChannel::new(ChannelPolicy::DUPLICATES);
        let (chat, _chat_rx) = QueryChannel::new(ChannelPolicy::CHAT);
        AppState::new(&resolved, search, dup, chat)
    }

    fn clients() -> (Arc<StoreClient>, Arc<OllamaClient>) {
        (
            Arc::new(StoreClient::new("http://localhost:7171".to_string())),
            Arc::new(OllamaClient::new("http://localhost:11434".to_string(), "m".to_string())),
        )
    }

    #[test]
    fn shifted_characters_count_as_typed_but_chords_do_not() {
        let shifted = KeyEvent::new(KeyCode::Char('X'), KeyModifiers::SHIFT);
        assert_eq!(typed_char(&shifted), Some('X'));

        let ctrl = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL);
        let alt = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(typed_char(&ctrl), None);
        assert_eq!(typed_char(&alt), None);
    }

    #[test]
    fn unregistered_chords_do_not_type_into_text_buffers() {
        let mut state = app_state();
        let (store, ollama) = clients();
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctrl_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL);

        state.search.focused = true;
        handle_search_key(ctrl_x, &mut state, &store, &tx);
        assert!(state.nav.search_query.is_empty());

        handle_chat_key(ctrl_x, &mut state, &store, &ollama);
        assert!(state.chat.input.is_empty());
        let plain = KeyEvent::new(KeyCode::Char('h'), KeyModifiers::NONE);
        handle_chat_key(plain, &mut state, &store, &ollama);
        assert_eq!(state.chat.input, "h");

        state.settings_form = Some(SettingsForm::from_settings(&state.settings));
        handle_settings_key(ctrl_x, &mut state);
        assert_eq!(state.settings_form.as_ref().unwrap().theme, state.settings.theme);

        state.form = Some(SnippetForm::blank(EditorTheme::Dark));
        handle_form_key(ctrl_x, &mut state, &store);
        assert!(state.form.as_ref().unwrap().title.is_empty());
    }

    #[test]
    fn detail_scroll_saturates_at_the_render_cap() {
        let mut state = app_state();
        let (store, ollama) = clients();
        let (tx, _rx) = mpsc::unbounded_channel();

        state.apply_nav(NavAction::SelectSnippet("s1".to_string()));
        state.detail_scroll = u16::MAX as usize;
        assert!(handle_command(Command::MoveDown, &mut state, &store, &ollama, &tx));
        assert_eq!(state.detail_scroll, u16::MAX as usize);
    }

    #[test]
    fn create_input_drops_blank_optionals() {
        let mut form = SnippetForm::blank(EditorTheme::Dark);
        form.title = "  t  ".to_string();
        form.problem = "p".to_string();
        let input = form.to_create_input(Vec::new());
        assert_eq!(input.title, "t");
        assert!(input.solution.is_none());
        assert!(input.code.is_none());
        assert!(input.code_language.is_none());
    }
}
