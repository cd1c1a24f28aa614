use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;

use f1_terminal::api::{F1Api, HttpApi};
use f1_terminal::config::{ApiSource, Config};
use f1_terminal::controller::Controller;
use f1_terminal::demo_api::DemoApi;
use f1_terminal::provider::spawn_provider;
use f1_terminal::state::{DashboardState, Delta, ProviderCommand};
use f1_terminal::ui::{self, SelectorFocus, UiState};

struct App {
    controller: Controller,
    ui: UiState,
    should_quit: bool,
}

impl App {
    fn new(cmd_tx: mpsc::Sender<ProviderCommand>, log_lines: usize) -> Self {
        Self {
            controller: Controller::with_state(
                DashboardState::with_log_capacity(log_lines),
                Some(cmd_tx),
            ),
            ui: UiState::default(),
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.ui.help_overlay {
            match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('?') | KeyCode::Esc => self.ui.help_overlay = false,
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Tab => self.ui.focus = self.ui.focus.next(),
            KeyCode::BackTab => self.ui.focus = self.ui.focus.prev(),
            KeyCode::Right | KeyCode::Char('l') => self.change_focused(true),
            KeyCode::Left | KeyCode::Char('h') => self.change_focused(false),
            KeyCode::Char('r') | KeyCode::Char('R') => self.controller.toggle_session(),
            KeyCode::Enter | KeyCode::F(5) => self.controller.refresh(),
            KeyCode::Char('?') => self.ui.help_overlay = true,
            _ => {}
        }
    }

    fn change_focused(&mut self, forward: bool) {
        match self.ui.focus {
            SelectorFocus::Year => self.controller.step_year(forward),
            SelectorFocus::Round => self.controller.step_round(forward),
            SelectorFocus::Session => self.controller.toggle_session(),
        }
    }
}

fn main() -> Result<()> {
    let config = Config::load();

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let api: Box<dyn F1Api + Send> = match config.source {
        ApiSource::Http => Box::new(HttpApi::new(&config.api_base)?),
        ApiSource::Demo => Box::new(DemoApi::new(config.demo_seed)),
    };
    spawn_provider(api, tx, cmd_rx);

    let mut app = App::new(cmd_tx, config.log_lines);
    match config.source {
        ApiSource::Http => app
            .controller
            .push_log(format!("[INFO] Backend: {}", config.api_base)),
        ApiSource::Demo => app.controller.push_log("[INFO] Backend: demo data"),
    }

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    app.controller.bootstrap();
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            app.controller.apply(delta);
        }

        terminal.draw(|f| ui::draw(f, app.controller.state(), &app.ui))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
