//! TUI Application - main event loop and terminal management
//!
//! This module contains the core TUI application logic including:
//! - Terminal setup and restoration
//! - Routing push connection events into the store
//! - Fallback loads while the push feed is down
//! - Event loop for keyboard, server messages and fetch completions
//! - View switching between Issues, Completed and Agents

use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::connection::{ConnectionEvent, ConnectionState, PushConnection};
use super::notifications::{NotificationLevel, NotificationManager};
use super::views::{AgentsView, IssueTreeView};
use crate::api::{ApiClient, Endpoint, Payload};
use crate::config::ResolvedConfig;
use crate::models::Issue;
use crate::source::{DataSource, Debouncer, Resource, ScopeTicket, ScopeTracker};
use crate::store::{ClientMessage, PushMessage, RecentToken, Scope, Selection, Store, StoreEvent};

/// How often the loop wakes to poll the keyboard
const TICK: Duration = Duration::from_millis(100);

/// Delay before loading a rig's issues after switching to it
const RIG_SWITCH_DEBOUNCE: Duration = Duration::from_millis(250);

/// Active view in the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    Issues,
    Completed,
    Agents,
}

/// Completion of a background pull load.
#[derive(Debug)]
pub enum FetchResult {
    Rigs(Resource<Payload>),
    Issues(ScopeTicket<String>, Resource<Payload>),
    Agents(Vec<(String, Resource<Payload>)>),
}

/// TUI Application state
pub struct TuiApp {
    config: ResolvedConfig,
    store: Store,
    source: DataSource,
    connection: Option<PushConnection>,
    connection_state: ConnectionState,
    /// Whether to quit the application
    should_quit: bool,
    active_view: ActiveView,
    /// Rig catalog in server order
    rigs: Vec<String>,
    /// Rig whose issues are shown
    rig_scope: ScopeTracker<String>,
    issues_view: IssueTreeView,
    completed_view: IssueTreeView,
    agents_view: AgentsView,
    notifications: NotificationManager,
    /// Issue shown in the detail pane
    detail: Option<Arc<Issue>>,
    /// Last key pressed (for gg detection)
    last_key: Option<KeyCode>,
    fetches: mpsc::UnboundedSender<FetchResult>,
    expiries: mpsc::UnboundedSender<RecentToken>,
    rig_switch: Debouncer,
    /// Last fallback poll while the push feed is down
    last_poll: Option<Instant>,
}

impl TuiApp {
    /// Create a new TUI application. Results of background loads arrive on
    /// the receivers paired with `fetches` and `expiries`.
    pub fn new(
        config: ResolvedConfig,
        fetches: mpsc::UnboundedSender<FetchResult>,
        expiries: mpsc::UnboundedSender<RecentToken>,
    ) -> Self {
        let source = DataSource::new(ApiClient::new(config.base_url()), config.cache_ttls());
        let store = Store::with_highlight_window(config.highlight_window.value);
        let overscan = config.overscan.value;
        let limit = config.full_render_limit.value;
        let mut rig_scope = ScopeTracker::new();
        if let Some(rig) = config.rig() {
            rig_scope.switch(rig.to_string());
        }
        Self {
            config,
            store,
            source,
            connection: None,
            connection_state: ConnectionState::Reconnecting {
                attempt: 0,
                next_retry: None,
            },
            should_quit: false,
            active_view: ActiveView::Issues,
            rigs: Vec::new(),
            rig_scope,
            issues_view: IssueTreeView::issues(overscan, limit),
            completed_view: IssueTreeView::completed(overscan, limit),
            agents_view: AgentsView::new(),
            notifications: NotificationManager::new(),
            detail: None,
            last_key: None,
            fetches,
            expiries,
            rig_switch: Debouncer::new(),
            last_poll: None,
        }
    }

    fn attach(&mut self, connection: PushConnection) {
        connection.send(ClientMessage::Subscribe { rigs: Vec::new() });
        self.connection = Some(connection);
    }

    pub fn current_rig(&self) -> Option<&str> {
        self.rig_scope.current().map(String::as_str)
    }

    pub fn active_view(&self) -> ActiveView {
        self.active_view
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    fn spawn_fetch<F>(&self, fetch: F)
    where
        F: std::future::Future<Output = FetchResult> + Send + 'static,
    {
        let tx = self.fetches.clone();
        tokio::spawn(async move {
            let _ = tx.send(fetch.await);
        });
    }

    /// Load the rig catalog.
    pub fn load_rigs(&self) {
        let source = self.source.clone();
        self.spawn_fetch(async move { FetchResult::Rigs(source.rigs().await) });
    }

    /// Feed views from the live buffers where the store has them.
    fn sync_live(&mut self) {
        if let Some(rig) = self.current_rig().map(str::to_string) {
            if let Selection::Live(Payload::Issues(items)) = self.store.select(&Scope::Issues(rig)) {
                self.issues_view.set_live(Arc::clone(&items));
                self.completed_view.set_live(items);
            }
        }
        for rig in self.rigs.clone() {
            if let Selection::Live(Payload::Agents(agents)) =
                self.store.select(&Scope::Agents(rig.clone()))
            {
                self.agents_view.update_rig(&rig, Resource::live(agents));
            }
        }
    }

    /// Load through the cache whatever the store cannot serve live.
    fn load_fallbacks(&mut self) {
        self.last_poll = Some(Instant::now());
        self.load_issues_fallback();
        self.load_agents_fallback(false);
    }

    fn load_issues_fallback(&self) {
        let Some(ticket) = self.rig_scope.ticket() else {
            return;
        };
        let selection = self.store.select(&Scope::Issues(ticket.scope.clone()));
        if selection.is_live() {
            return;
        }
        let source = self.source.clone();
        self.spawn_fetch(async move {
            let resource = source.resolve(selection).await;
            FetchResult::Issues(ticket, resource)
        });
    }

    fn load_agents_fallback(&self, errored_only: bool) {
        let rigs: Vec<String> = self
            .rigs
            .iter()
            .filter(|rig| !self.store.select(&Scope::Agents((*rig).clone())).is_live())
            .filter(|rig| {
                !errored_only
                    || self
                        .agents_view
                        .rigs
                        .iter()
                        .any(|section| &section.rig == *rig && section.agents.error.is_some())
            })
            .cloned()
            .collect();
        if rigs.is_empty() {
            return;
        }
        let source = self.source.clone();
        self.spawn_fetch(async move { FetchResult::Agents(source.agents_for_rigs(&rigs).await) });
    }

    /// Retry loads that failed in the active view.
    fn retry(&mut self) {
        if self.rigs.is_empty() {
            self.source.cache().expire(&Endpoint::Rigs.path());
            self.load_rigs();
            return;
        }
        match self.active_view {
            ActiveView::Issues | ActiveView::Completed => {
                let Some(ticket) = self.rig_scope.ticket() else {
                    return;
                };
                let scope = Scope::Issues(ticket.scope.clone());
                if self.store.select(&scope).is_live() {
                    return;
                }
                let source = self.source.clone();
                self.spawn_fetch(async move {
                    let resource = source.retry(&scope).await;
                    FetchResult::Issues(ticket, resource)
                });
            }
            ActiveView::Agents => {
                if !self.agents_view.has_errors() {
                    return;
                }
                for section in &self.agents_view.rigs {
                    if section.agents.error.is_some() {
                        let path = Endpoint::Agents {
                            rig: section.rig.clone(),
                        }
                        .path();
                        self.source.cache().expire(&path);
                    }
                }
                self.load_agents_fallback(true);
            }
        }
    }

    /// Apply a completed background load.
    pub fn apply_fetch(&mut self, result: FetchResult) {
        match result {
            FetchResult::Rigs(resource) => self.apply_rigs(resource),
            FetchResult::Issues(ticket, resource) => {
                let Some(resource) = self.rig_scope.accept(&ticket, resource) else {
                    return;
                };
                if self.store.select(&Scope::Issues(ticket.scope)).is_live() {
                    debug!("live issues arrived first, ignoring fallback load");
                    return;
                }
                let issues = resource.filter_map(Payload::into_issues);
                self.completed_view.set_resource(issues.clone());
                self.issues_view.set_resource(issues);
            }
            FetchResult::Agents(results) => {
                for (rig, resource) in results {
                    if !self.rigs.contains(&rig)
                        || self.store.select(&Scope::Agents(rig.clone())).is_live()
                    {
                        continue;
                    }
                    self.agents_view
                        .update_rig(&rig, resource.filter_map(Payload::into_agents));
                }
            }
        }
    }

    fn apply_rigs(&mut self, resource: Resource<Payload>) {
        let error = resource.error.clone();
        let Some(rigs) = resource.filter_map(Payload::into_rigs).data else {
            if let Some(error) = error {
                self.notifications.sticky(
                    NotificationLevel::Error,
                    format!("Could not load rigs: {} (r: retry)", error),
                    Instant::now(),
                );
            }
            return;
        };
        self.rigs = rigs.iter().map(|rig| rig.name.clone()).collect();
        info!(count = self.rigs.len(), "rig catalog loaded");
        self.agents_view.retain_rigs(&self.rigs);

        let keep_current = self
            .current_rig()
            .is_some_and(|rig| self.rigs.iter().any(|name| name == rig));
        if !keep_current {
            if let Some(first) = self.rigs.first().cloned() {
                if let Some(rig) = self.current_rig() {
                    warn!(rig, "configured rig not in catalog, showing {}", first);
                }
                self.switch_rig(first);
            }
        }
        if let Some(connection) = &self.connection {
            connection.send(ClientMessage::Subscribe {
                rigs: self.rigs.clone(),
            });
        }
        self.sync_live();
        self.load_fallbacks();
    }

    /// Show `rig` in the issue views.
    fn switch_rig(&mut self, rig: String) {
        if self.current_rig() == Some(rig.as_str()) {
            return;
        }
        debug!(%rig, "switching rig");
        self.rig_scope.switch(rig);
        self.issues_view.reset();
        self.completed_view.reset();
        self.detail = None;
        self.sync_live();

        let Some(ticket) = self.rig_scope.ticket() else {
            return;
        };
        let selection = self.store.select(&Scope::Issues(ticket.scope.clone()));
        if selection.is_live() {
            self.rig_switch.cancel();
            return;
        }
        let source = self.source.clone();
        let tx = self.fetches.clone();
        self.rig_switch.schedule(RIG_SWITCH_DEBOUNCE, async move {
            let resource = source.resolve(selection).await;
            let _ = tx.send(FetchResult::Issues(ticket, resource));
        });
    }

    fn cycle_rig(&mut self, forward: bool) {
        if self.rigs.is_empty() {
            return;
        }
        let len = self.rigs.len();
        let current = self
            .current_rig()
            .and_then(|rig| self.rigs.iter().position(|name| name == rig));
        let next = match (current, forward) {
            (Some(idx), true) => (idx + 1) % len,
            (Some(idx), false) => (idx + len - 1) % len,
            (None, _) => 0,
        };
        self.switch_rig(self.rigs[next].clone());
    }

    // ------------------------------------------------------------------
    // Push events
    // ------------------------------------------------------------------

    /// Route a connection event into the store and views.
    pub fn handle_connection_event(&mut self, event: ConnectionEvent, now: Instant) {
        match event {
            ConnectionEvent::Connected => {
                self.connection_state = ConnectionState::Connected;
                self.store.apply(StoreEvent::Connected, now);
                self.notifications
                    .notify(NotificationLevel::Success, "Connected to server", now);
                self.sync_live();
            }
            ConnectionEvent::Message(message) => self.handle_push_message(message, now),
            ConnectionEvent::Disconnected { reason } => {
                let was_connected = self.store.is_connected();
                self.store.apply(StoreEvent::Disconnected, now);
                if was_connected {
                    self.notifications.notify(
                        NotificationLevel::Warning,
                        format!("Connection lost: {}", reason),
                        now,
                    );
                }
                self.load_fallbacks();
            }
            ConnectionEvent::Reconnecting { attempt, delay } => {
                self.connection_state = ConnectionState::Reconnecting {
                    attempt,
                    next_retry: Some(now + delay),
                };
            }
            ConnectionEvent::GaveUp => {
                self.connection_state = ConnectionState::Disconnected;
                self.notifications.sticky(
                    NotificationLevel::Error,
                    "Server unreachable, showing polled data (R: reconnect)",
                    now,
                );
            }
        }
    }

    fn handle_push_message(&mut self, message: PushMessage, now: Instant) {
        self.adopt_pulled(&message);
        if let PushMessage::MailReceived { payload } = &message {
            self.notifications.notify(
                NotificationLevel::Info,
                format!("Mail from {}: {}", payload.from, payload.subject),
                now,
            );
        }
        if let Some(token) = self.store.apply(StoreEvent::Message(message), now) {
            let window = self.store.snapshot().recent.window();
            let tx = self.expiries.clone();
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                let _ = tx.send(token);
            });
        }
        self.sync_live();
    }

    /// Seed the rig's live buffer from the cached pull before an
    /// incremental message creates it.
    fn adopt_pulled(&mut self, message: &PushMessage) {
        let scope = match message {
            PushMessage::IssueCreated { rig, .. } | PushMessage::IssueChanged { rig, .. } => {
                Scope::Issues(rig.clone())
            }
            PushMessage::AgentStateChanged { rig, .. } => Scope::Agents(rig.clone()),
            _ => return,
        };
        if let Some(cached) = self.source.cache().peek(&scope.cache_key()) {
            self.store.adopt(&scope, cached.value);
        }
    }

    /// Clear an expired highlight.
    pub fn expire(&mut self, token: RecentToken) {
        self.store.expire_recent(&token);
    }

    /// Periodic housekeeping.
    pub fn tick(&mut self, now: Instant) {
        self.notifications.cleanup(now);
        self.store.prune_recent(now);
        if !self.store.is_connected() {
            let due = self.last_poll.is_none_or(|last| {
                now.saturating_duration_since(last) >= self.config.default_ttl.value
            });
            if due {
                self.load_fallbacks();
            }
        }
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    fn next_view(&mut self) {
        self.active_view = match self.active_view {
            ActiveView::Issues => ActiveView::Completed,
            ActiveView::Completed => ActiveView::Agents,
            ActiveView::Agents => ActiveView::Issues,
        };
    }

    fn active_tree(&mut self) -> Option<&mut IssueTreeView> {
        match self.active_view {
            ActiveView::Issues => Some(&mut self.issues_view),
            ActiveView::Completed => Some(&mut self.completed_view),
            ActiveView::Agents => None,
        }
    }

    /// Handle keyboard events
    pub fn handle_key(&mut self, key: KeyCode) {
        let last_key = self.last_key.replace(key);
        match key {
            KeyCode::Esc if self.detail.is_some() => self.detail = None,
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            // View switching
            KeyCode::Tab => self.next_view(),
            KeyCode::Char('1') => self.active_view = ActiveView::Issues,
            KeyCode::Char('2') => self.active_view = ActiveView::Completed,
            KeyCode::Char('3') => self.active_view = ActiveView::Agents,
            KeyCode::Char(']') => self.cycle_rig(true),
            KeyCode::Char('[') => self.cycle_rig(false),
            KeyCode::Char('r') => self.retry(),
            KeyCode::Char('R') => {
                if let Some(connection) = &self.connection {
                    connection.reconnect();
                }
            }
            KeyCode::Char('x') => self.notifications.dismiss_oldest(),
            KeyCode::Char('g') => {
                if last_key == Some(KeyCode::Char('g')) {
                    self.move_first();
                    self.last_key = None;
                }
            }
            KeyCode::Char('G') | KeyCode::End => self.move_last(),
            KeyCode::Home => self.move_first(),
            KeyCode::Char('j') | KeyCode::Down => match self.active_tree() {
                Some(view) => view.tree_mut().move_next(),
                None => self.agents_view.select_next(),
            },
            KeyCode::Char('k') | KeyCode::Up => match self.active_tree() {
                Some(view) => view.tree_mut().move_previous(),
                None => self.agents_view.select_previous(),
            },
            KeyCode::Char('l') | KeyCode::Right => {
                if let Some(view) = self.active_tree() {
                    view.tree_mut().expand_or_descend();
                }
            }
            KeyCode::Char('h') | KeyCode::Left => {
                if let Some(view) = self.active_tree() {
                    view.tree_mut().collapse_or_ascend();
                }
            }
            KeyCode::Char(' ') => {
                if let Some(view) = self.active_tree() {
                    view.tree_mut().toggle_focused();
                }
            }
            KeyCode::Char('e') => {
                if let Some(view) = self.active_tree() {
                    view.tree_mut().expand_all();
                }
            }
            KeyCode::Char('c') => {
                if let Some(view) = self.active_tree() {
                    view.tree_mut().collapse_all();
                }
            }
            KeyCode::Enter => {
                self.detail = self
                    .active_tree()
                    .and_then(|view| view.tree().selected());
            }
            _ => {}
        }
    }

    fn move_first(&mut self) {
        match self.active_tree() {
            Some(view) => view.tree_mut().move_first(),
            None => self.agents_view.select_first(),
        }
    }

    fn move_last(&mut self) {
        match self.active_tree() {
            Some(view) => view.tree_mut().move_last(),
            None => self.agents_view.select_last(),
        }
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title bar
                Constraint::Min(5),    // Main content
                Constraint::Length(3), // Status bar
            ])
            .split(area);

        self.render_title_bar(frame, chunks[0]);

        let main = if self.detail.is_some() && self.active_view != ActiveView::Agents {
            let split = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);
            self.render_detail(frame, split[1]);
            split[0]
        } else {
            chunks[1]
        };

        let snapshot = self.store.snapshot();
        let now = Instant::now();
        let is_recent = |id: &str| snapshot.is_recent(id, now);
        match self.active_view {
            ActiveView::Issues => self.issues_view.render(frame, main, is_recent),
            ActiveView::Completed => self.completed_view.render(frame, main, is_recent),
            ActiveView::Agents => self.agents_view.render(frame, main),
        }

        self.render_status_bar(frame, chunks[2]);
        self.notifications.render(frame, chunks[1]);
    }

    /// Render the title bar with rig and connection status
    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let state = &self.connection_state;
        let (status_indicator, status_color, status_text) = if state.is_connected() {
            ("●", Color::Green, "Live".to_string())
        } else if state.is_reconnecting() {
            match state.reconnect_attempt() {
                0 => ("○", Color::Yellow, "Connecting...".to_string()),
                attempt => (
                    "○",
                    Color::Yellow,
                    format!("Reconnecting (attempt {})...", attempt),
                ),
            }
        } else {
            ("✗", Color::Red, "Polling".to_string())
        };

        let view_style = Style::default().add_modifier(Modifier::BOLD);
        let inactive_style = Style::default().fg(Color::DarkGray);
        let tab = |label: &'static str, view: ActiveView| {
            let style = if self.active_view == view {
                view_style
            } else {
                inactive_style
            };
            Span::styled(label, style)
        };

        let rig = format!("  rig: {}", self.current_rig().unwrap_or("-"));
        let status_display = format!("[{}] {}", status_indicator, status_text);
        let used = 40 + rig.chars().count() + status_display.chars().count();
        let padding = (area.width as usize).saturating_sub(used + 2);

        let title = Paragraph::new(Line::from(vec![
            Span::raw(" "),
            tab("[1] Issues", ActiveView::Issues),
            Span::raw(" | "),
            tab("[2] Completed", ActiveView::Completed),
            Span::raw(" | "),
            tab("[3] Agents", ActiveView::Agents),
            Span::styled(rig, Style::default().fg(Color::Cyan)),
            Span::raw(" ".repeat(padding)),
            Span::styled(status_display, Style::default().fg(status_color)),
        ]))
        .block(Block::default().borders(Borders::ALL));

        frame.render_widget(title, area);
    }

    fn render_detail(&self, frame: &mut Frame, area: Rect) {
        let Some(issue) = &self.detail else {
            return;
        };
        let label = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(Span::styled(
                issue.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::from(vec![Span::styled("ID:       ", label), Span::raw(issue.id.clone())]),
            Line::from(vec![
                Span::styled("Status:   ", label),
                Span::raw(issue.status.as_str()),
            ]),
            Line::from(vec![
                Span::styled("Type:     ", label),
                Span::raw(issue.issue_type.clone()),
            ]),
            Line::from(vec![
                Span::styled("Priority: ", label),
                Span::raw(format!("P{}", issue.priority)),
            ]),
            Line::from(vec![
                Span::styled("Assignee: ", label),
                Span::raw(issue.display_assignee()),
            ]),
            Line::from(vec![
                Span::styled("Updated:  ", label),
                Span::raw(issue.updated_at.format("%Y-%m-%d %H:%M").to_string()),
            ]),
        ];
        if !issue.labels.is_empty() {
            let labels: Vec<&str> = issue.labels.iter().map(String::as_str).collect();
            lines.push(Line::from(vec![
                Span::styled("Labels:   ", label),
                Span::raw(labels.join(", ")),
            ]));
        }
        if let Some(description) = &issue.description {
            lines.push(Line::default());
            lines.extend(description.lines().map(|line| Line::from(line.to_string())));
        }

        let widget = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(" Detail (Esc: close) "));
        frame.render_widget(Clear, area);
        frame.render_widget(widget, area);
    }

    /// Render the status bar with keybindings
    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let keys = match self.active_view {
            ActiveView::Agents => " Tab/1-3:View  [/]:Rig  j/k:Navigate  gg/G:Top/Bottom  r:Retry  q:Quit",
            _ => {
                " Tab/1-3:View  [/]:Rig  j/k:Move  h/l:Collapse/Expand  Space:Toggle  e/c:All  Enter:Detail  r:Retry  q:Quit"
            }
        };
        let status = Paragraph::new(keys)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(status, area);
    }
}

/// Setup the terminal for TUI mode
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    Terminal::new(backend)
}

/// Restore the terminal to normal mode
fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Ticker for keyboard polling and housekeeping. It lives for the whole
/// loop, so a busy channel arm cannot keep resetting it.
fn input_ticker() -> Interval {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Run the TUI application against the server in `config`.
///
/// The dashboard starts even when the server is down: the push feed keeps
/// retrying in the background and views fall back to polled data.
pub async fn run_tui(config: ResolvedConfig) -> crate::Result<()> {
    let (fetch_tx, mut fetches) = mpsc::unbounded_channel();
    let (expiry_tx, mut expiries) = mpsc::unbounded_channel();
    let ws_url = config.ws_url();
    info!(url = %ws_url, rig = ?config.rig(), "starting dashboard");

    let mut app = TuiApp::new(config, fetch_tx, expiry_tx);
    let (connection, mut events) = PushConnection::spawn(ws_url);
    app.attach(connection);
    app.load_rigs();

    let mut ticker = input_ticker();

    let mut terminal = setup_terminal()?;
    let result = async {
        loop {
            terminal.draw(|frame| app.render(frame))?;

            tokio::select! {
                _ = ticker.tick() => {
                    while event::poll(Duration::ZERO)? {
                        if let Event::Key(key) = event::read()? {
                            if key.kind == KeyEventKind::Press {
                                app.handle_key(key.code);
                            }
                        }
                    }
                    app.tick(Instant::now());
                }
                Some(event) = events.recv() => app.handle_connection_event(event, Instant::now()),
                Some(result) = fetches.recv() => app.apply_fetch(result),
                Some(token) = expiries.recv() => app.expire(token),
            }

            if app.should_quit() {
                break;
            }
        }
        Ok::<(), crate::Error>(())
    }
    .await;

    restore_terminal()?;
    info!("dashboard closed");
    result
}
