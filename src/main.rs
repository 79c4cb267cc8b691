mod ui;

use gemtype::{
    config::{Config, ConfigStore, DisplaySettings, FileConfigStore, StorageKind, Theme},
    error::StoreError,
    identity::{ConfiguredIdentity, Identity, IdentityProvider},
    level::{parse_duration, Level, TestDuration},
    logging,
    reporter::{ResultReporter, SubmissionOutcome},
    result::TestResult,
    runtime::{
        key_input, AppEvent, CrosstermEventSource, EventSender, EventSource, FixedTicker, Runner,
        Ticker,
    },
    session::{KeyInput, Status, TypingSession},
    sink::{HttpResultSink, ResultSink},
    store::{HistorySummary, SqliteResultStore, StoredResult},
    text_source::{fetch_practice_text, GeminiTextSource, PracticeText, StaticText, TextSource},
};

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{debug, error, info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
    thread,
};

/// typing test with AI-generated practice text and saved results
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing test. Practice text is generated per difficulty level, your speed and accuracy are measured against a countdown, and results are saved for signed-in users."
)]
pub struct Cli {
    /// difficulty of the generated practice text
    #[clap(short = 'l', long, value_enum)]
    level: Option<Level>,

    /// test length in seconds: 15, 30 or 60
    #[clap(short = 's', long, value_parser = parse_duration)]
    duration: Option<TestDuration>,

    /// custom text to type instead of generated text
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// color theme
    #[clap(long, value_enum)]
    theme: Option<Theme>,

    /// where results are saved
    #[clap(long, value_enum)]
    storage: Option<StorageKind>,

    /// path to the config file
    #[clap(long)]
    config: Option<PathBuf>,

    /// restore default display settings
    #[clap(long)]
    reset_settings: bool,
}

impl Cli {
    /// Command line values win over the config file
    fn apply(&self, cfg: &mut Config) {
        if let Some(level) = self.level {
            cfg.level = level;
        }
        if let Some(duration) = self.duration {
            cfg.duration = duration;
        }
        if self.reset_settings {
            cfg.display = DisplaySettings::default();
        }
        if let Some(theme) = self.theme {
            cfg.display.theme = theme;
        }
        if let Some(storage) = self.storage {
            cfg.storage = storage;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// What the dashboard shows for the signed-in user
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub identity: Option<Identity>,
    pub history: Vec<StoredResult>,
    pub summary: HistorySummary,
    pub note: Option<String>,
}

pub struct App {
    pub session: TypingSession,
    pub level: Level,
    pub display: DisplaySettings,
    pub state: AppState,
    pub loading: bool,
    pub practice: Option<PracticeText>,
    pub last_result: Option<TestResult>,
    pub reporter: ResultReporter,
    pub dashboard: DashboardData,
    pub bell: bool,
    dashboard_return: AppState,
    /// Number of the latest text fetch; older completions are dropped
    fetch_seq: u64,
    store: Option<Arc<SqliteResultStore>>,
    identity: Arc<dyn IdentityProvider>,
    text_source: Arc<dyn TextSource>,
    events: EventSender,
}

/// Collaborators the app is wired with
pub struct AppParts {
    pub text_source: Arc<dyn TextSource>,
    pub sink: Arc<dyn ResultSink>,
    pub store: Option<Arc<SqliteResultStore>>,
    pub identity: Arc<dyn IdentityProvider>,
    pub events: EventSender,
}

impl App {
    pub fn new(cfg: &Config, parts: AppParts) -> Self {
        let mut app = Self {
            session: TypingSession::new(String::new(), cfg.duration),
            level: cfg.level,
            display: cfg.display.clone(),
            state: AppState::Typing,
            loading: false,
            practice: None,
            last_result: None,
            reporter: ResultReporter::new(parts.sink, Arc::clone(&parts.identity)),
            dashboard: DashboardData::default(),
            bell: false,
            dashboard_return: AppState::Typing,
            fetch_seq: 0,
            store: parts.store,
            identity: parts.identity,
            text_source: parts.text_source,
            events: parts.events,
        };
        app.request_text();
        app
    }

    /// Fetch practice text for the current level in the background
    pub fn request_text(&mut self) {
        self.loading = true;
        self.fetch_seq += 1;
        let seq = self.fetch_seq;
        let source = Arc::clone(&self.text_source);
        let events = self.events.clone();
        let level = self.level;
        thread::spawn(move || {
            let text = fetch_practice_text(source.as_ref(), level);
            events.send(AppEvent::TextReady { seq, text });
        });
    }

    pub fn on_text_ready(&mut self, seq: u64, text: PracticeText) {
        if seq != self.fetch_seq {
            debug!("dropping text fetch #{seq}, #{} is current", self.fetch_seq);
            return;
        }
        if self.session.status() == Status::InProgress {
            warn!("text fetch #{seq} arrived during a running test, keeping current text");
            return;
        }
        info!(
            "practice text ready ({} chars{})",
            text.text.chars().count(),
            if text.is_fallback { ", fallback" } else { "" }
        );
        self.loading = false;
        self.session.set_target_text(text.text.clone());
        self.practice = Some(text);
    }

    pub fn start(&mut self) {
        if self.loading || self.session.target().is_empty() {
            return;
        }
        self.session.start();
        if self.session.status() == Status::Finished {
            self.on_finished();
        }
    }

    pub fn set_level(&mut self, level: Level) {
        if self.session.status() == Status::InProgress {
            return;
        }
        self.level = level;
        self.back_to_typing();
        self.request_text();
    }

    pub fn set_duration(&mut self, duration: TestDuration) {
        if self.session.status() == Status::InProgress {
            return;
        }
        self.session.set_duration(duration);
        self.back_to_typing();
    }

    /// New text and a fresh session
    pub fn restart(&mut self) {
        self.session.reset();
        self.back_to_typing();
        self.request_text();
    }

    fn back_to_typing(&mut self) {
        self.state = AppState::Typing;
        self.last_result = None;
        self.reporter.clear_current();
    }

    /// Returns true when the screen needs redrawing
    pub fn on_tick(&mut self) -> bool {
        if self.session.status() != Status::InProgress {
            return false;
        }
        if self.session.on_tick() {
            self.on_finished();
        }
        true
    }

    fn on_finished(&mut self) {
        let Some(result) = self.session.result(self.level) else {
            return;
        };
        info!(
            "test finished: {} wpm, {}% accuracy, {} mistakes",
            result.wpm, result.accuracy, result.mistakes
        );
        self.last_result = Some(result);
        self.state = AppState::Results;
        self.evaluate_save();
    }

    /// Submit the on-screen result unless it was already saved
    pub fn evaluate_save(&mut self) {
        let Some(result) = self.last_result else {
            return;
        };
        let events = self.events.clone();
        self.reporter
            .evaluate(&result, self.session.typed().len(), move |outcome| {
                events.send(AppEvent::Submitted(outcome));
            });
    }

    pub fn on_submitted(&mut self, outcome: SubmissionOutcome) {
        self.reporter.on_outcome(outcome);
        if self.state == AppState::Dashboard {
            self.load_dashboard();
        }
    }

    pub fn open_dashboard(&mut self) {
        self.dashboard_return = self.state;
        self.state = AppState::Dashboard;
        self.load_dashboard();
    }

    fn load_dashboard(&mut self) {
        let identity = self.identity.current();
        let mut data = DashboardData {
            identity: identity.clone(),
            ..DashboardData::default()
        };
        match (identity, &self.store) {
            (None, _) => {}
            (Some(_), None) => {
                data.note = Some("history is kept by the remote save endpoint".into());
            }
            (Some(id), Some(store)) => {
                match store.history(&id.user_id).and_then(|h| {
                    let summary = store.summary(&id.user_id)?;
                    Ok((h, summary))
                }) {
                    Ok((history, summary)) => {
                        data.history = history;
                        data.summary = summary;
                    }
                    Err(e) => {
                        error!("failed to load history: {e}");
                        data.note = Some(format!("could not load history: {e}"));
                    }
                }
            }
        }
        self.dashboard = data;
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Control {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if key.code == KeyCode::Esc || (ctrl && key.code == KeyCode::Char('c')) {
            return Control::Quit;
        }

        match self.state {
            AppState::Typing => match self.session.status() {
                Status::InProgress => {
                    if ctrl && key.code == KeyCode::Char('r') {
                        self.session.reset();
                        return Control::Continue;
                    }
                    let input = key_input(&key);
                    let mistakes_before = self.session.mistakes();
                    let finished = self.session.handle_key_event(input);
                    if let KeyInput::Char(_) = input {
                        let missed = self.session.mistakes() > mistakes_before;
                        self.bell = (missed && self.display.sound_on_error)
                            || self.display.sound_on_click;
                    }
                    if finished {
                        self.on_finished();
                    }
                }
                Status::Waiting => match key.code {
                    KeyCode::Enter => self.start(),
                    KeyCode::Tab => self.set_duration(self.session.duration().cycle()),
                    KeyCode::Char('d') => self.open_dashboard(),
                    KeyCode::Char(c @ '1'..='3') => {
                        self.set_level(Level::ALL[c as usize - '1' as usize])
                    }
                    _ => {}
                },
                Status::Finished => {}
            },
            AppState::Results => match key.code {
                KeyCode::Char('r') => self.restart(),
                KeyCode::Char('s') => self.evaluate_save(),
                KeyCode::Char('d') => self.open_dashboard(),
                KeyCode::Tab => self.set_duration(self.session.duration().cycle()),
                KeyCode::Char(c @ '1'..='3') => {
                    self.set_level(Level::ALL[c as usize - '1' as usize])
                }
                _ => {}
            },
            AppState::Dashboard => match key.code {
                KeyCode::Char('b') | KeyCode::Backspace => self.state = self.dashboard_return,
                KeyCode::Char('r') => self.restart(),
                _ => {}
            },
        }
        Control::Continue
    }

    /// Persisted choices to write back on exit
    pub fn save_into(&self, cfg: &mut Config) {
        cfg.level = self.level;
        cfg.duration = self.session.duration();
    }
}

fn build_sink(
    cfg: &Config,
) -> Result<(Arc<dyn ResultSink>, Option<Arc<SqliteResultStore>>), StoreError> {
    if cfg.storage == StorageKind::Remote {
        match cfg.save_url.as_deref().map(|url| HttpResultSink::new(url)) {
            Some(Ok(sink)) => {
                info!("saving results to {}", sink.url());
                return Ok((Arc::new(sink), None));
            }
            Some(Err(e)) => warn!("remote storage unavailable ({e}), saving locally"),
            None => warn!("remote storage selected without save_url, saving locally"),
        }
    }
    let store = match SqliteResultStore::new() {
        Ok(store) => store,
        Err(e) => {
            error!("cannot open result store ({e}), keeping results in memory");
            SqliteResultStore::in_memory()?
        }
    };
    let store = Arc::new(store);
    Ok((store.clone(), Some(store)))
}

fn build_text_source(cli: &Cli, cfg: &Config) -> Arc<dyn TextSource> {
    if let Some(prompt) = &cli.prompt {
        return Arc::new(StaticText(prompt.clone()));
    }
    match GeminiTextSource::new(cfg.gemini_api_key.clone()) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            warn!("text generation unavailable: {e}");
            Arc::new(StaticText(String::new()))
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Err(e) = logging::init() {
        eprintln!("logging disabled: {e}");
    }

    let config_store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let mut cfg = config_store.load();
    cli.apply(&mut cfg);
    if cli.reset_settings {
        config_store.save(&cfg)?;
    }

    let (sink, result_store) = build_sink(&cfg)?;
    let text_source = build_text_source(&cli, &cfg);
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(ConfiguredIdentity::from_env(cfg.account.clone()));

    let mut runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    let mut app = App::new(
        &cfg,
        AppParts {
            text_source,
            sink,
            store: result_store,
            identity,
            events: runner.sender(),
        },
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = run_app(&mut terminal, &mut app, &mut runner, || {
        execute!(io::stdout(), Print('\x07'))
    });

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.save_into(&mut cfg);
    if let Err(e) = config_store.save(&cfg) {
        warn!(
            "could not save config to {}: {e}",
            config_store.path().display()
        );
    }

    outcome
}

fn run_app<B: Backend, E: EventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &mut Runner<E, T>,
    mut ring: impl FnMut() -> io::Result<()>,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        let was_waiting = app.session.status() == Status::Waiting;

        let redraw = match runner.step() {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => true,
            AppEvent::Key(key) => {
                if app.on_key(key) == Control::Quit {
                    break;
                }
                true
            }
            AppEvent::TextReady { seq, text } => {
                app.on_text_ready(seq, text);
                true
            }
            AppEvent::Submitted(outcome) => {
                app.on_submitted(outcome);
                true
            }
        };

        if was_waiting && app.session.status() == Status::InProgress {
            runner.realign();
        }
        if std::mem::take(&mut app.bell) {
            ring()?;
        }
        if redraw {
            terminal.draw(|f| ui::draw(app, f))?;
        }
    }

    Ok(())
}
