pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use clearpoints::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore, MAX_POINTS},
    history::{summarize, HistoryLog, HistorySummary, RoundRecord},
    layout::Board,
    logging,
    runtime::{CrosstermEventSource, FixedTicker, GameEvent, Runner},
    session::{GameSession, Phase},
};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::Duration,
};

const TICK_RATE_MS: u64 = 50;
const MAX_TYPED_DIGITS: usize = 4;

/// clear the points: click the numbered circles in order, as fast as you can
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Numbered points are scattered over the board. Click them in ascending order before making a mistake; a wrong point ends the round. Autoplay can clear the board for you on a fixed cadence."
)]
pub struct Cli {
    /// number of points on the board (overrides the saved setting)
    #[clap(short = 'p', long)]
    points: Option<u32>,

    /// start with autoplay armed
    #[clap(long)]
    autoplay: bool,

    /// seed for reproducible layouts
    #[clap(long)]
    seed: Option<u64>,

    /// do not record finished rounds in the history log
    #[clap(long)]
    no_history: bool,
}

impl Cli {
    /// Layer command line overrides on top of the stored settings
    fn apply(&self, mut config: Config) -> Config {
        if let Some(points) = self.points {
            config.points = points.clamp(1, MAX_POINTS);
        }
        if self.autoplay {
            config.autoplay = true;
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Playing,
    ConfirmRestart,
}

/// What the event loop must do after a key press
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    None,
    Quit,
    ConfigChanged,
}

#[derive(Debug)]
pub struct App {
    pub session: GameSession,
    pub state: AppState,
    pub config: Config,
    /// Digits typed towards a click-by-number
    pub typed: String,
    pub area: Rect,
    pub history: Option<HistoryLog>,
    pub summary: HistorySummary,
    recorded_round: Option<u64>,
}

impl App {
    pub fn new(cli: &Cli, config: Config, area: Rect, history: Option<HistoryLog>) -> Self {
        let config = config.sanitized();
        let (width, height) = ui::board_pixels(ui::board_area(area));
        let board = Board::with_geometry(width, height, config.geometry());
        let mut session = match cli.seed {
            Some(seed) => GameSession::with_seed(board, seed),
            None => GameSession::new(board),
        };
        if config.autoplay {
            session.arm_autoplay();
        }
        // a fresh session is idle, so configure cannot be rejected here
        let _ = session.configure(config.points);

        let mut app = Self {
            session,
            state: AppState::Playing,
            config,
            typed: String::new(),
            area,
            history,
            summary: HistorySummary::default(),
            recorded_round: None,
        };
        app.refresh_summary();
        app
    }

    pub fn advance(&mut self, dt: Duration) {
        self.session.advance(dt);
    }

    pub fn on_resize(&mut self, area: Rect) {
        self.area = area;
        let (width, height) = ui::board_pixels(ui::board_area(area));
        self.session.resize(width, height);
    }

    pub fn on_mouse(&mut self, mouse: MouseEvent) {
        if self.state != AppState::Playing {
            return;
        }
        if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
            let board = ui::board_area(self.area);
            let token_size = self.session.board().geometry.token_size;
            let hit = ui::token_at_cell(
                board,
                self.session.tokens(),
                token_size,
                mouse.column,
                mouse.row,
            );
            if let Some(id) = hit {
                self.session.click(id);
            }
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.kind != KeyEventKind::Press {
            return KeyAction::None;
        }
        // ctrl+c to quit
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyAction::Quit;
        }

        match self.state {
            AppState::ConfirmRestart => {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => {
                        self.restart();
                    }
                    KeyCode::Char('n') | KeyCode::Esc => {
                        self.state = AppState::Playing;
                    }
                    _ => {}
                }
                KeyAction::None
            }
            AppState::Playing => match key.code {
                KeyCode::Esc => KeyAction::Quit,
                KeyCode::Char('r') => {
                    if self.session.phase().is_terminal() {
                        self.restart();
                    } else {
                        self.state = AppState::ConfirmRestart;
                    }
                    KeyAction::None
                }
                KeyCode::Char('a') => {
                    self.session.toggle_autoplay();
                    KeyAction::None
                }
                KeyCode::Char('+') | KeyCode::Char('=') => self.change_points(1),
                KeyCode::Char('-') => self.change_points(-1),
                KeyCode::Char(c) if c.is_ascii_digit() => {
                    if self.typed.len() < MAX_TYPED_DIGITS {
                        self.typed.push(c);
                    }
                    KeyAction::None
                }
                KeyCode::Backspace => {
                    self.typed.pop();
                    KeyAction::None
                }
                KeyCode::Enter => {
                    if let Ok(id) = self.typed.parse::<u32>() {
                        self.session.click(id);
                    }
                    self.typed.clear();
                    KeyAction::None
                }
                _ => KeyAction::None,
            },
        }
    }

    fn restart(&mut self) {
        self.session.restart();
        self.typed.clear();
        self.state = AppState::Playing;
    }

    fn change_points(&mut self, delta: i64) -> KeyAction {
        let points = (self.config.points as i64 + delta).clamp(1, MAX_POINTS as i64) as u32;
        match self.session.configure(points) {
            Ok(()) => {
                self.config.points = points;
                self.refresh_summary();
                KeyAction::ConfigChanged
            }
            Err(err) => {
                tracing::debug!(%err, "point count change ignored");
                KeyAction::None
            }
        }
    }

    /// Log the round once it has ended
    pub fn record_if_finished(&mut self) {
        if !self.session.phase().is_terminal() || self.recorded_round == Some(self.session.round()) {
            return;
        }
        self.recorded_round = Some(self.session.round());

        let Some(record) = RoundRecord::from_session(&self.session) else {
            return;
        };
        if let Some(history) = &self.history {
            if let Err(err) = history.append(&record) {
                tracing::warn!(%err, "could not record round");
            }
        }
        self.refresh_summary();
    }

    fn refresh_summary(&mut self) {
        let records = match &self.history {
            Some(history) => history.load().unwrap_or_else(|err| {
                tracing::warn!(%err, "could not read round history");
                Vec::new()
            }),
            None => Vec::new(),
        };
        self.summary = summarize(&records, self.session.total_tokens());
    }

    pub fn is_round_active(&self) -> bool {
        matches!(self.session.phase(), Phase::Ready | Phase::Running)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        // logging is best effort; the game runs without it
        let _ = logging::init(&path);
    }

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    if let Err(err) = store.save(&config) {
        tracing::warn!(%err, "could not save settings");
    }
    let history = if cli.no_history {
        None
    } else {
        HistoryLog::new()
    };

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let mut app = App::new(
        &cli,
        config,
        Rect::new(0, 0, size.width, size.height),
        history,
    );
    let result = start_tui(&mut terminal, &mut app, &store);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    store: &impl ConfigStore,
) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| ui(app, f))?;

    loop {
        let event = runner.step();
        app.advance(runner.elapsed_since_last());

        match event {
            GameEvent::Tick => {}
            GameEvent::Resize(cols, rows) => app.on_resize(Rect::new(0, 0, cols, rows)),
            GameEvent::Mouse(mouse) => app.on_mouse(mouse),
            GameEvent::Key(key) => match app.on_key(key) {
                KeyAction::Quit => break,
                KeyAction::ConfigChanged => {
                    if let Err(err) = store.save(&app.config) {
                        tracing::warn!(%err, "could not save settings");
                    }
                }
                KeyAction::None => {}
            },
        }

        app.record_if_finished();
        terminal.draw(|f| ui(app, f))?;
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    f.render_widget(&*app, f.area());
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use clearpoints::history::RoundOutcome;
    use clearpoints::layout::Visibility;
    use tempfile::tempdir;

    fn test_cli() -> Cli {
        Cli::parse_from(["clearpoints", "--seed", "5", "--no-history"])
    }

    fn test_app(points: u32) -> App {
        let config = Config {
            points,
            ..Config::default()
        };
        App::new(&test_cli(), config, Rect::new(0, 0, 120, 40), None)
    }

    fn press(app: &mut App, code: KeyCode) -> KeyAction {
        app.on_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_id(app: &mut App, id: u32) {
        for c in id.to_string().chars() {
            press(app, KeyCode::Char(c));
        }
        press(app, KeyCode::Enter);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["clearpoints"]);
        assert_eq!(cli.points, None);
        assert!(!cli.autoplay);
        assert_eq!(cli.seed, None);
        assert!(!cli.no_history);
    }

    #[test]
    fn test_cli_points() {
        let cli = Cli::parse_from(["clearpoints", "-p", "25"]);
        assert_eq!(cli.points, Some(25));

        let cli = Cli::parse_from(["clearpoints", "--points", "7"]);
        assert_eq!(cli.points, Some(7));
    }

    #[test]
    fn test_cli_apply_overrides_config() {
        let cli = Cli::parse_from(["clearpoints", "-p", "0", "--autoplay"]);
        let config = cli.apply(Config::default());
        assert_eq!(config.points, 1);
        assert!(config.autoplay);

        let cli = Cli::parse_from(["clearpoints"]);
        let stored = Config {
            points: 42,
            ..Config::default()
        };
        assert_eq!(cli.apply(stored.clone()), stored);
    }

    #[test]
    fn test_app_starts_ready() {
        let app = test_app(10);
        assert_eq!(app.session.phase(), Phase::Ready);
        assert_eq!(app.session.tokens().len(), 10);
        assert_eq!(app.state, AppState::Playing);
    }

    #[test]
    fn test_typed_clicks_clear_board() {
        let mut app = test_app(3);
        for id in 1..=3 {
            type_id(&mut app, id);
        }
        assert_eq!(app.session.phase(), Phase::Completed);
        assert!(app.typed.is_empty());
    }

    #[test]
    fn test_typed_wrong_id_loses() {
        let mut app = test_app(3);
        type_id(&mut app, 2);
        assert_eq!(app.session.phase(), Phase::Failed);
    }

    #[test]
    fn test_backspace_edits_typed_id() {
        let mut app = test_app(3);
        press(&mut app, KeyCode::Char('3'));
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.next_expected(), 2);
    }

    fn left_click(app: &mut App, column: u16, row: u16) {
        app.on_mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        });
    }

    #[test]
    fn test_mouse_click_hits_token() {
        let mut app = test_app(2);
        let board = ui::board_area(app.area);
        let token = app.session.tokens()[0];
        let rect = ui::token_rect(board, &token, 40).unwrap();

        // bottom-right corner of the drawn box
        left_click(&mut app, rect.right() - 1, rect.bottom() - 1);
        assert_eq!(app.session.tokens()[0].visibility, Visibility::Fading);
        assert_eq!(app.session.phase(), Phase::Running);
    }

    #[test]
    fn test_mouse_click_on_empty_cell_is_ignored() {
        let mut app = test_app(1);
        let board = ui::board_area(app.area);
        // padding keeps the top-left board cell clear
        left_click(&mut app, board.x, board.y);
        assert_eq!(app.session.phase(), Phase::Ready);
        // outside the board
        left_click(&mut app, 0, 0);
        assert_eq!(app.session.phase(), Phase::Ready);
    }

    #[test]
    fn test_restart_asks_for_confirmation_mid_round() {
        let mut app = test_app(3);
        type_id(&mut app, 1);
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.state, AppState::ConfirmRestart);

        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.state, AppState::Playing);
        assert_eq!(app.session.phase(), Phase::Running);

        press(&mut app, KeyCode::Char('r'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.session.phase(), Phase::Ready);
        assert_eq!(app.session.next_expected(), 1);
    }

    #[test]
    fn test_restart_after_finish_is_immediate() {
        let mut app = test_app(2);
        type_id(&mut app, 2);
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.state, AppState::Playing);
        assert_eq!(app.session.phase(), Phase::Ready);
    }

    #[test]
    fn test_points_change_only_between_rounds() {
        let mut app = test_app(3);
        assert_eq!(press(&mut app, KeyCode::Char('+')), KeyAction::None);
        assert_eq!(app.config.points, 3);

        type_id(&mut app, 3);
        assert_eq!(press(&mut app, KeyCode::Char('+')), KeyAction::ConfigChanged);
        assert_eq!(app.config.points, 4);
        assert_eq!(app.session.tokens().len(), 4);
    }

    #[test]
    fn test_autoplay_toggle_key() {
        let mut app = test_app(3);
        press(&mut app, KeyCode::Char('a'));
        assert!(app.session.autoplay_armed());
        press(&mut app, KeyCode::Char('a'));
        assert!(!app.session.autoplay_armed());
    }

    #[test]
    fn test_quit_keys() {
        let mut app = test_app(3);
        assert_eq!(press(&mut app, KeyCode::Esc), KeyAction::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.on_key(ctrl_c), KeyAction::Quit);
    }

    #[test]
    fn test_round_recorded_once() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::with_path(dir.path().join("history.csv"));
        let config = Config {
            points: 2,
            ..Config::default()
        };
        let mut app = App::new(&test_cli(), config, Rect::new(0, 0, 120, 40), Some(log.clone()));

        type_id(&mut app, 1);
        app.advance(Duration::from_millis(700));
        type_id(&mut app, 2);
        app.record_if_finished();
        app.record_if_finished();

        let records = log.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_matches!(records[0].outcome, RoundOutcome::Completed);
        assert_eq!(app.summary.best_secs, Some(0.7));
    }

    #[test]
    fn test_resize_reaches_session() {
        let mut app = test_app(4);
        app.on_resize(Rect::new(0, 0, 200, 60));
        app.advance(Duration::from_secs(1));
        let (w, h) = ui::board_pixels(ui::board_area(app.area));
        assert_eq!(app.session.board().width, w);
        assert_eq!(app.session.board().height, h);
    }

    #[test]
    fn test_ui_renders_ready_board() {
        use ratatui::{backend::TestBackend, Terminal};

        let mut app = test_app(5);
        let backend = TestBackend::new(120, 40);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| ui(&mut app, f)).unwrap();

        let content: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("Clear The Points"));
        assert!(content.contains("5 points"));
    }
}
