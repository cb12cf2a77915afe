/// Main TUI application

use anyhow::Result;
use crossterm::{
    event::{self, Event as TermEvent, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

use crate::core::vitals::QUICK_INTERVENTIONS;
use crate::core::{
    Action, DeskError, Event, ReceivingDesk, Referral, RejectReason, VitalsInput,
};
use crate::core::referral::Avpu;
use crate::core::seed;
use crate::screens::Dashboard;
use crate::utils::{AppConfig, DEFAULT_EVENT_LIMIT, MAX_ICU_BEDS};

/// Events kept for the Events screen
const MAX_EVENTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Queue,
    Analytics,
    Events,
    Facility,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Queue => "Queue",
            Screen::Analytics => "Analytics",
            Screen::Events => "Events",
            Screen::Facility => "Facility",
        }
    }

    pub fn all() -> &'static [Screen] {
        &[Screen::Queue, Screen::Analytics, Screen::Events, Screen::Facility]
    }
}

/// Field labels of the vitals form, in entry order
pub const VITALS_FIELDS: [&str; 6] = ["HR", "SBP", "RR", "SpO2", "Temp °C", "AVPU"];

#[derive(Debug, Clone, PartialEq)]
pub struct VitalsForm {
    pub values: [String; 6],
    pub active: usize,
}

impl VitalsForm {
    pub fn prefilled(referral: &Referral) -> Self {
        let v = VitalsInput::from_referral(referral);
        Self {
            values: [
                v.hr.to_string(),
                v.sbp.to_string(),
                v.rr.to_string(),
                v.spo2.to_string(),
                format!("{:.1}", v.temp),
                v.avpu.to_string(),
            ],
            active: 0,
        }
    }

    pub fn parse(&self) -> crate::core::Result<VitalsInput> {
        fn number<T: std::str::FromStr>(label: &str, raw: &str) -> crate::core::Result<T> {
            raw.trim()
                .parse()
                .map_err(|_| DeskError::invalid(format!("{} is not a number: '{}'", label, raw)))
        }

        Ok(VitalsInput {
            hr: number("HR", &self.values[0])?,
            sbp: number("SBP", &self.values[1])?,
            rr: number("RR", &self.values[2])?,
            spo2: number("SpO2", &self.values[3])?,
            temp: number("Temp", &self.values[4])?,
            avpu: self.values[5].parse::<Avpu>().map_err(DeskError::InvalidInput)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterventionPicker {
    pub checked: Vec<bool>,
    /// Rows are the quick list followed by one free-text row
    pub cursor: usize,
    pub custom: String,
}

impl InterventionPicker {
    pub fn new() -> Self {
        Self {
            checked: vec![false; QUICK_INTERVENTIONS.len()],
            cursor: 0,
            custom: String::new(),
        }
    }

    pub fn on_custom_row(&self) -> bool {
        self.cursor == QUICK_INTERVENTIONS.len()
    }

    pub fn toggle(&mut self) {
        if let Some(flag) = self.checked.get_mut(self.cursor) {
            *flag = !*flag;
        }
    }

    pub fn selected_names(&self) -> Vec<String> {
        let mut names: Vec<String> = QUICK_INTERVENTIONS
            .iter()
            .zip(&self.checked)
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.to_string())
            .collect();
        names.extend(
            self.custom
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        );
        names
    }
}

impl Default for InterventionPicker {
    fn default() -> Self {
        Self::new()
    }
}

/// Modal input over the current screen
#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    Reject { id: String, selected: usize },
    Vitals { id: String, form: VitalsForm },
    Interventions { id: String, picker: InterventionPicker },
}

pub struct App {
    dashboard: Dashboard,
    desk: ReceivingDesk,
    facility: String,
    seed_count: usize,
    current_screen: Screen,
    selected_index: usize,
    should_quit: bool,
    status_message: Option<String>,
    show_help: bool,
    // Search/filter state
    search_mode: bool,
    search_buffer: String,
    // Ids of the queue rows currently shown
    visible_ids: Vec<String>,
    detail_view: Option<String>,
    dialog: Option<Dialog>,
    recent_events: Vec<Event>,
    // Background event log polling
    events_rx: tokio::sync::mpsc::UnboundedReceiver<Vec<Event>>,
}

impl App {
    pub async fn new(desk: ReceivingDesk, config: &AppConfig) -> Result<Self> {
        let store = desk.events().clone();
        let mut recent_events = store.recent(MAX_EVENTS as i64).await?;
        recent_events.reverse();
        let start_id = store.last_id().await?;

        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let interval = config.refresh();

        // Poll the event log so changes from other desks show up live
        tokio::spawn(async move {
            let mut last_id = start_id;
            loop {
                tokio::time::sleep(interval).await;
                match store.poll_events_since(last_id, None, DEFAULT_EVENT_LIMIT).await {
                    Ok(events) => {
                        if let Some(last) = events.last() {
                            last_id = last.id;
                            if events_tx.send(events).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "event poll failed"),
                }
            }
        });

        let mut app = Self {
            dashboard: Dashboard::new(),
            desk,
            facility: config.facility.clone(),
            seed_count: config.seed_count,
            current_screen: Screen::Queue,
            selected_index: 0,
            should_quit: false,
            status_message: None,
            show_help: false,
            search_mode: false,
            search_buffer: String::new(),
            visible_ids: Vec::new(),
            detail_view: None,
            dialog: None,
            recent_events,
            events_rx,
        };
        app.refresh_views();
        Ok(app)
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Push current desk state into the dashboard
    fn refresh_views(&mut self) {
        let queue = self.desk.incoming_queue(&self.facility);
        let shown = crate::core::queue::search(&queue, &self.search_buffer);
        self.visible_ids = shown.iter().map(|r| r.id.clone()).collect();
        self.dashboard
            .update_queue(shown.into_iter().cloned().collect());

        self.dashboard.update_analytics(self.desk.analytics(&self.facility));
        self.dashboard.update_events(self.recent_events.clone());

        let facilities = self
            .desk
            .facilities()
            .names()
            .iter()
            .map(|name| (name.clone(), self.desk.facilities().meta(name)))
            .collect();
        self.dashboard.update_facility(self.facility.clone(), facilities);

        if self.selected_index >= self.visible_ids.len() {
            self.selected_index = self.visible_ids.len().saturating_sub(1);
        }
    }

    fn selected_id(&self) -> Option<String> {
        self.detail_view
            .clone()
            .or_else(|| self.visible_ids.get(self.selected_index).cloned())
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn run_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<()> {
        loop {
            // New events from the background poller (non-blocking)
            while let Ok(events) = self.events_rx.try_recv() {
                self.ingest_events(events);
            }

            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let TermEvent::Key(key_event) = event::read()? {
                    if key_event.kind == event::KeyEventKind::Press {
                        self.handle_key(key_event.code).await?;
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn ingest_events(&mut self, events: Vec<Event>) {
        let reloaded = self.desk.observe(&events);
        for event in events {
            self.recent_events.insert(0, event);
        }
        self.recent_events.truncate(MAX_EVENTS);

        if reloaded {
            self.set_status("Updated from another desk".to_string());
        }
        self.refresh_views();
    }

    pub async fn handle_key(&mut self, key: KeyCode) -> Result<()> {
        if self.dialog.is_some() {
            return self.handle_dialog_key(key).await;
        }

        if self.search_mode {
            self.handle_search_key(key);
            return Ok(());
        }

        // Clear status message on any key
        self.clear_status();

        match key {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                if self.show_help {
                    self.show_help = false;
                } else if self.detail_view.is_some() {
                    self.detail_view = None;
                } else if !self.search_buffer.is_empty() {
                    self.search_buffer.clear();
                    self.refresh_views();
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('?') | KeyCode::F(1) => self.show_help = !self.show_help,
            KeyCode::Tab | KeyCode::Right => self.switch_screen(self.next_screen()),
            KeyCode::BackTab | KeyCode::Left => self.switch_screen(self.prev_screen()),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.switch_screen(Screen::all()[idx]);
            }
            KeyCode::Char('r') => {
                if self.desk.reload() {
                    self.set_status("Reloaded from snapshot".to_string());
                } else {
                    self.set_status("No snapshot on disk yet".to_string());
                }
                self.refresh_views();
            }
            KeyCode::Char('f') => self.cycle_facility(true),
            KeyCode::Char('F') => self.cycle_facility(false),
            _ => match self.current_screen {
                Screen::Queue => self.handle_queue_key(key).await,
                Screen::Facility => self.handle_facility_key(key).await,
                Screen::Analytics | Screen::Events => {}
            },
        }

        Ok(())
    }

    fn switch_screen(&mut self, screen: Screen) {
        self.current_screen = screen;
        self.detail_view = None;
        self.selected_index = 0;
    }

    fn next_screen(&self) -> Screen {
        let screens = Screen::all();
        let current_idx = screens.iter().position(|s| *s == self.current_screen).unwrap_or(0);
        screens[(current_idx + 1) % screens.len()]
    }

    fn prev_screen(&self) -> Screen {
        let screens = Screen::all();
        let current_idx = screens.iter().position(|s| *s == self.current_screen).unwrap_or(0);
        screens[(current_idx + screens.len() - 1) % screens.len()]
    }

    fn cycle_facility(&mut self, forward: bool) {
        let registry = self.desk.facilities();
        let next = if forward {
            registry.next_after(&self.facility)
        } else {
            registry.prev_before(&self.facility)
        };
        if let Some(next) = next {
            self.facility = next.to_string();
            self.selected_index = 0;
            self.detail_view = None;
            self.set_status(format!("Facility: {}", self.facility));
            self.refresh_views();
        }
    }

    async fn handle_queue_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::Char('k') if self.detail_view.is_none() => {
                self.selected_index = self.selected_index.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') if self.detail_view.is_none() => {
                if self.selected_index + 1 < self.visible_ids.len() {
                    self.selected_index += 1;
                }
            }
            KeyCode::Char('/') if self.detail_view.is_none() => {
                self.search_mode = true;
                self.set_status(format!("Search: {} (Enter to apply, Esc to cancel)", self.search_buffer));
            }
            KeyCode::Enter => {
                if let Some(id) = self.visible_ids.get(self.selected_index) {
                    self.detail_view = Some(id.clone());
                }
            }
            KeyCode::Char('a') => self.run_action(Action::Accept).await,
            KeyCode::Char('e') => self.run_action(Action::EnRoute).await,
            KeyCode::Char('v') => self.run_action(Action::Arrive).await,
            KeyCode::Char('h') => self.run_action(Action::Handover).await,
            KeyCode::Char('x') => {
                if let Some(id) = self.selected_id() {
                    self.dialog = Some(Dialog::Reject { id, selected: 0 });
                }
            }
            KeyCode::Char('t') => {
                if let Some(id) = self.selected_id() {
                    if let Ok(referral) = self.desk.referral(&id) {
                        let form = VitalsForm::prefilled(referral);
                        self.dialog = Some(Dialog::Vitals { id, form });
                    }
                }
            }
            KeyCode::Char('i') => {
                if let Some(id) = self.selected_id() {
                    self.dialog = Some(Dialog::Interventions {
                        id,
                        picker: InterventionPicker::new(),
                    });
                }
            }
            _ => {}
        }
    }

    async fn handle_facility_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Char('-') => {
                let current = self.desk.facilities().meta(&self.facility).icu_open;
                let beds = if key == KeyCode::Char('-') {
                    current.saturating_sub(1)
                } else {
                    (current + 1).min(MAX_ICU_BEDS)
                };
                match self.desk.set_icu_open(&self.facility, beds).await {
                    Ok(meta) => self.set_status(format!("ICU beds open: {}", meta.icu_open)),
                    Err(e) => self.set_status(format!("✗ {}", e)),
                }
                self.refresh_views();
            }
            KeyCode::Char('n') => {
                let seed = seed::clock_seed();
                match self.desk.new_day(seed, self.seed_count).await {
                    Ok(count) => self.set_status(format!("✓ New day loaded: {} referrals (seed {})", count, seed)),
                    Err(e) => self.set_status(format!("✗ New day failed: {}", e)),
                }
                self.selected_index = 0;
                self.refresh_views();
            }
            _ => {}
        }
    }

    async fn run_action(&mut self, action: Action) {
        let Some(id) = self.selected_id() else {
            self.set_status("No referral selected".to_string());
            return;
        };

        match self.desk.apply(&id, action).await {
            Ok(updated) => self.set_status(format!("✓ {} → {}", updated.id, updated.status)),
            Err(e) => self.set_status(format!("✗ {}", e)),
        }
        // Referrals leaving the active set drop out of the queue and the detail view
        if let Some(open) = &self.detail_view {
            if self.desk.referral(open).map(|r| !r.status.is_active()).unwrap_or(true) {
                self.detail_view = None;
            }
        }
        self.refresh_views();
    }

    fn handle_search_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char(c) => {
                self.search_buffer.push(c);
                self.selected_index = 0;
                self.refresh_views();
                self.set_status(format!("Search: {} (Enter to apply, Esc to cancel)", self.search_buffer));
            }
            KeyCode::Backspace => {
                self.search_buffer.pop();
                self.refresh_views();
                self.set_status(format!("Search: {} (Enter to apply, Esc to cancel)", self.search_buffer));
            }
            KeyCode::Enter => {
                self.search_mode = false;
                if self.search_buffer.is_empty() {
                    self.set_status("Search cleared".to_string());
                } else {
                    self.set_status(format!(
                        "Found {} matches for '{}'",
                        self.visible_ids.len(),
                        self.search_buffer
                    ));
                }
            }
            KeyCode::Esc => {
                self.search_mode = false;
                self.search_buffer.clear();
                self.refresh_views();
                self.set_status("Search cancelled".to_string());
            }
            _ => {}
        }
    }

    async fn handle_dialog_key(&mut self, key: KeyCode) -> Result<()> {
        let Some(mut dialog) = self.dialog.take() else {
            return Ok(());
        };

        if key == KeyCode::Esc {
            self.set_status("Cancelled".to_string());
            return Ok(());
        }

        let submit = match &mut dialog {
            Dialog::Reject { selected, .. } => match key {
                KeyCode::Up => {
                    *selected = selected.saturating_sub(1);
                    false
                }
                KeyCode::Down => {
                    *selected = (*selected + 1).min(RejectReason::all().len() - 1);
                    false
                }
                KeyCode::Enter => true,
                _ => false,
            },
            Dialog::Vitals { form, .. } => match key {
                KeyCode::Tab | KeyCode::Down => {
                    form.active = (form.active + 1) % VITALS_FIELDS.len();
                    false
                }
                KeyCode::BackTab | KeyCode::Up => {
                    form.active = (form.active + VITALS_FIELDS.len() - 1) % VITALS_FIELDS.len();
                    false
                }
                KeyCode::Backspace => {
                    form.values[form.active].pop();
                    false
                }
                KeyCode::Char(c) => {
                    form.values[form.active].push(c);
                    false
                }
                KeyCode::Enter => true,
                _ => false,
            },
            Dialog::Interventions { picker, .. } => match key {
                KeyCode::Up => {
                    picker.cursor = picker.cursor.saturating_sub(1);
                    false
                }
                KeyCode::Down => {
                    picker.cursor = (picker.cursor + 1).min(QUICK_INTERVENTIONS.len());
                    false
                }
                KeyCode::Char(c) if picker.on_custom_row() => {
                    picker.custom.push(c);
                    false
                }
                KeyCode::Backspace if picker.on_custom_row() => {
                    picker.custom.pop();
                    false
                }
                KeyCode::Char(' ') => {
                    picker.toggle();
                    false
                }
                KeyCode::Enter => true,
                _ => false,
            },
        };

        if !submit {
            self.dialog = Some(dialog);
            return Ok(());
        }

        let outcome = match &dialog {
            Dialog::Reject { id, selected } => {
                let reason = RejectReason::all()[*selected];
                self.desk
                    .apply(id, Action::Reject(reason))
                    .await
                    .map(|r| format!("✓ {} rejected: {}", r.id, reason))
            }
            Dialog::Vitals { id, form } => match form.parse() {
                Ok(input) => self
                    .desk
                    .record_vitals(id, input)
                    .await
                    .map(|r| format!("✓ Vitals saved for {}", r.id)),
                Err(e) => Err(e),
            },
            Dialog::Interventions { id, picker } => self
                .desk
                .record_interventions(id, &picker.selected_names())
                .await
                .map(|r| format!("✓ Interventions saved for {} ({} total)", r.id, r.interventions.len())),
        };

        match outcome {
            Ok(message) => {
                self.set_status(message);
                if let Dialog::Reject { .. } = dialog {
                    self.detail_view = None;
                }
            }
            Err(e) => {
                // Keep the form open so the entry can be corrected
                self.set_status(format!("✗ {}", e));
                if !matches!(dialog, Dialog::Reject { .. }) {
                    self.dialog = Some(dialog);
                }
            }
        }
        self.refresh_views();
        Ok(())
    }

    fn render(&self, frame: &mut ratatui::Frame) {
        let detail = self
            .detail_view
            .as_deref()
            .and_then(|id| self.desk.referral(id).ok());

        self.dashboard.render(
            frame,
            self.current_screen,
            self.selected_index,
            self.status_message.as_deref(),
            self.show_help,
            self.search_mode,
            &self.search_buffer,
            detail,
            self.dialog.as_ref(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persistence::SnapshotStore;
    use crate::core::referral::tests::sample_referral;
    use crate::core::referral::Status;
    use crate::core::EventStore;

    async fn app_in(dir: &std::path::Path) -> App {
        let events = EventStore::open(&dir.join("events.db")).await.unwrap();
        let desk = ReceivingDesk::with_stores(SnapshotStore::new(dir.join("data.json")), events, "tui", 2025, 140)
            .await
            .unwrap();
        let config = AppConfig {
            refresh_interval: "1h".to_string(),
            ..AppConfig::default()
        };
        App::new(desk, &config).await.unwrap()
    }

    #[test]
    fn test_vitals_form_parse() {
        let referral = sample_referral("AAAA1111", Status::Enroute);
        let mut form = VitalsForm::prefilled(&referral);
        assert_eq!(form.values[0], "118");
        assert_eq!(form.values[4], "37.0");

        let input = form.parse().unwrap();
        assert_eq!(input.hr, 118);
        assert_eq!(input.avpu, Avpu::A);

        form.values[2] = "fast".to_string();
        assert!(form.parse().is_err());
    }

    #[test]
    fn test_intervention_picker_names() {
        let mut picker = InterventionPicker::new();
        picker.toggle();
        picker.cursor = 4;
        picker.toggle();
        picker.custom = "Splint, , Suction".to_string();

        assert_eq!(picker.selected_names(), vec!["Oxygen", "TXA", "Splint", "Suction"]);

        picker.cursor = QUICK_INTERVENTIONS.len();
        assert!(picker.on_custom_row());
    }

    #[test]
    fn test_screen_cycle_covers_all() {
        assert_eq!(Screen::all().len(), 4);
        assert_eq!(Screen::Facility.title(), "Facility");
    }

    #[tokio::test]
    async fn test_accept_from_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path()).await;

        let Some(idx) = app
            .visible_ids
            .iter()
            .position(|id| app.desk.referral(id).map(|r| r.status == Status::Prealert).unwrap_or(false))
        else {
            return;
        };
        app.selected_index = idx;
        let id = app.visible_ids[idx].clone();

        app.handle_key(KeyCode::Char('a')).await.unwrap();
        assert_eq!(app.desk.referral(&id).unwrap().status, Status::Accepted);
        assert!(app.status_message.as_deref().unwrap_or("").starts_with('✓'));
    }

    #[tokio::test]
    async fn test_reject_dialog_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path()).await;
        if app.visible_ids.is_empty() {
            return;
        }
        let id = app.visible_ids[0].clone();

        app.handle_key(KeyCode::Char('x')).await.unwrap();
        assert!(matches!(app.dialog, Some(Dialog::Reject { .. })));

        app.handle_key(KeyCode::Down).await.unwrap();
        app.handle_key(KeyCode::Enter).await.unwrap();
        assert!(app.dialog.is_none());

        let referral = app.desk.referral(&id).unwrap();
        assert_eq!(referral.status, Status::Rejected);
        assert_eq!(referral.audit_log.last().unwrap().reason.as_deref(), Some("No specialist"));
        assert!(!app.visible_ids.contains(&id));
    }

    #[tokio::test]
    async fn test_search_narrows_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path()).await;
        if app.visible_ids.is_empty() {
            return;
        }
        let id = app.visible_ids[0].clone();

        app.handle_key(KeyCode::Char('/')).await.unwrap();
        for c in id.chars() {
            app.handle_key(KeyCode::Char(c)).await.unwrap();
        }
        app.handle_key(KeyCode::Enter).await.unwrap();

        assert!(!app.search_mode);
        assert_eq!(app.visible_ids, vec![id]);

        app.handle_key(KeyCode::Esc).await.unwrap();
        assert!(app.search_buffer.is_empty());
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_facility_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path()).await;
        let start = app.facility.clone();

        app.handle_key(KeyCode::Char('4')).await.unwrap();
        assert_eq!(app.current_screen, Screen::Facility);

        let beds = app.desk.facilities().meta(&start).icu_open;
        app.handle_key(KeyCode::Char('+')).await.unwrap();
        assert_eq!(app.desk.facilities().meta(&start).icu_open, (beds + 1).min(MAX_ICU_BEDS));

        app.handle_key(KeyCode::Char('f')).await.unwrap();
        assert_ne!(app.facility, start);
        app.handle_key(KeyCode::Char('F')).await.unwrap();
        assert_eq!(app.facility, start);
    }
}
