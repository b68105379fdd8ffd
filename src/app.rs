use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use probespeed::{
    Direction, ProbeRecord, ProbeRequest, ProbeResult, ProbeState, Settings, SettingsField, TrafficGenerator,
};
use std::time::Duration;
use tokio::sync::mpsc;

const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Main,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Download,
    Upload,
}

impl Panel {
    pub fn next(self) -> Self {
        match self {
            Panel::Download => Panel::Upload,
            Panel::Upload => Panel::Download,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Panel::Download => Direction::Download,
            Panel::Upload => Direction::Upload,
        }
    }
}

pub struct App {
    pub generator: TrafficGenerator,
    pub status: ProbeResult,
    pub request: Option<ProbeRequest>,
    pub should_quit: bool,

    // UI state
    pub view: AppView,
    pub selected_panel: Panel,
    pub message: Option<String>,

    // Settings
    pub settings: Settings,
    pub selected_setting: SettingsField,

    // Completed probes, oldest first
    pub history: Vec<ProbeRecord>,

    results_rx: mpsc::UnboundedReceiver<ProbeRecord>,
}

impl App {
    pub fn new(
        generator: TrafficGenerator,
        settings: Settings,
        results_rx: mpsc::UnboundedReceiver<ProbeRecord>,
    ) -> Self {
        Self {
            status: generator.status(),
            request: generator.request(),
            generator,
            should_quit: false,
            view: AppView::Main,
            selected_panel: Panel::Download,
            message: None,
            settings,
            selected_setting: SettingsField::UploadSize,
            history: Vec::new(),
            results_rx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.state == ProbeState::Running
    }

    /// Polls the generator and drains completed probes.
    pub fn refresh(&mut self) {
        self.status = self.generator.status();
        self.request = self.generator.request();

        while let Ok(record) = self.results_rx.try_recv() {
            self.history.push(record);
            // Keep last 100 probes
            if self.history.len() > MAX_HISTORY {
                self.history.remove(0);
            }
        }
    }

    pub fn handle_key_event(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match self.view {
            AppView::Main => self.handle_main_key(key),
            AppView::Settings => self.handle_settings_key(key),
        }
    }

    fn handle_main_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Some(AppAction::Quit)
            }
            KeyCode::Char('s') => {
                if !self.is_running() {
                    self.view = AppView::Settings;
                }
                None
            }
            KeyCode::Char('u') => Some(AppAction::Start(Direction::Upload)),
            KeyCode::Char('d') => Some(AppAction::Start(Direction::Download)),
            KeyCode::Enter => Some(AppAction::Start(self.selected_panel.direction())),
            KeyCode::Char('c') => Some(AppAction::Cleanup),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Right | KeyCode::Left => {
                self.selected_panel = self.selected_panel.next();
                None
            }
            _ => None,
        }
    }

    fn handle_settings_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => {
                self.view = AppView::Main;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_setting = self.selected_setting.prev();
                None
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.selected_setting = self.selected_setting.next();
                None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.settings.decrease(self.selected_setting);
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.settings.increase(self.selected_setting);
                None
            }
            _ => None,
        }
    }

    pub fn apply(&mut self, action: AppAction) {
        match action {
            AppAction::Quit => self.should_quit = true,
            AppAction::Start(direction) => self.start_probe(direction),
            AppAction::Cleanup => {
                self.message = match self.generator.cleanup() {
                    Ok(()) => Some("worker released".to_string()),
                    Err(e) => Some(e.to_string()),
                };
            }
        }
        self.refresh();
    }

    fn start_probe(&mut self, direction: Direction) {
        let (size, url) = match direction {
            Direction::Upload => (self.settings.upload_size_bytes, &self.settings.upload_url),
            Direction::Download => (self.settings.download_budget_bytes, &self.settings.download_url),
        };

        self.selected_panel = match direction {
            Direction::Upload => Panel::Upload,
            Direction::Download => Panel::Download,
        };
        self.message = match self.generator.try_perform(direction, size, url) {
            Ok(()) => None,
            Err(e) => Some(e.to_string()),
        };
    }

    /// Rates of completed probes in one direction, in Mbps.
    pub fn samples(&self, direction: Direction) -> Vec<f64> {
        self.history
            .iter()
            .filter(|(request, result)| request.direction == direction && result.state == ProbeState::Finished)
            .map(|(_, result)| to_mbps(rate_for(direction, result)))
            .collect()
    }

    /// Latest completed result for a direction, if any.
    pub fn last_result(&self, direction: Direction) -> Option<&ProbeResult> {
        self.history
            .iter()
            .rev()
            .find(|(request, _)| request.direction == direction)
            .map(|(_, result)| result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    Start(Direction),
    Cleanup,
}

pub fn rate_for(direction: Direction, result: &ProbeResult) -> f64 {
    match direction {
        Direction::Download => result.datarate_dl,
        Direction::Upload => result.datarate_ul,
    }
}

pub fn to_mbps(bytes_per_second: f64) -> f64 {
    bytes_per_second * 8.0 / 1_000_000.0
}

pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}
