// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use sift_app::{
    ModerationAction, Record, RecordId, RecordStatus, StatusFilter, SubmissionRefusal, TextField,
    ViewCommand, ViewEvent, ViewState,
};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

/// Character count above which a text field collapses to a preview.
pub const PREVIEW_LIMIT: usize = 100;

const TOAST_SECONDS: u64 = 3;
const MISSING_TEXT: &str = "n/a";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearToast { token: u64 },
    TableChanged { generation: u64 },
}

/// Owner side of a change-feed subscription. Closing it tells the reader
/// thread to stop forwarding events; the thread itself winds down on the
/// next event or stream error.
#[derive(Debug)]
pub struct ChannelHandle {
    stop: Arc<AtomicBool>,
}

impl ChannelHandle {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self { stop }
    }

    pub fn close(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

pub trait AppRuntime {
    fn load_records(&mut self, table: &str) -> Result<Vec<Record>>;
    fn submit_status(&mut self, table: &str, id: RecordId, action: ModerationAction) -> Result<()>;
    fn open_channel(
        &mut self,
        table: &str,
        generation: u64,
        tx: Sender<InternalEvent>,
    ) -> Result<ChannelHandle>;
}

#[derive(Debug, Default)]
struct ViewData {
    tables: Vec<String>,
    cursor: usize,
    help_visible: bool,
    toast_token: u64,
    generation: u64,
    channel: Option<ChannelHandle>,
}

pub fn run_app<R: AppRuntime>(
    state: &mut ViewState,
    runtime: &mut R,
    tables: Vec<String>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData {
        tables,
        ..ViewData::default()
    };
    if !view_data.tables.iter().any(|table| *table == state.table) {
        view_data.tables.insert(0, state.table.clone());
    }

    let (internal_tx, internal_rx) = mpsc::channel();

    reload(state, runtime, &mut view_data);
    reopen_channel(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    if let Some(channel) = view_data.channel.take() {
        channel.close();
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut ViewState,
    runtime: &mut R,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearToast { token } if token == view_data.toast_token => {
                state.dispatch(ViewCommand::ClearToast);
            }
            InternalEvent::ClearToast { .. } => {}
            InternalEvent::TableChanged { generation } if generation == view_data.generation => {
                reload(state, runtime, view_data);
            }
            // Events from a channel that was already replaced.
            InternalEvent::TableChanged { .. } => {}
        }
    }
}

/// Replaces the record list wholesale. A failed fetch leaves the list empty
/// rather than surfacing an error; the view shows whatever the service last
/// answered with.
fn reload<R: AppRuntime>(state: &mut ViewState, runtime: &mut R, view_data: &mut ViewData) {
    state.dispatch(ViewCommand::BeginLoad);
    let records = runtime.load_records(&state.table).unwrap_or_default();
    state.dispatch(ViewCommand::FinishLoad(records));
    clamp_cursor(state, view_data);
}

fn reopen_channel<R: AppRuntime>(
    state: &mut ViewState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Some(channel) = view_data.channel.take() {
        channel.close();
    }
    view_data.generation = view_data.generation.saturating_add(1);
    match runtime.open_channel(&state.table, view_data.generation, internal_tx.clone()) {
        Ok(handle) => view_data.channel = Some(handle),
        Err(error) => emit_toast(
            state,
            view_data,
            internal_tx,
            format!("change feed unavailable: {error}"),
        ),
    }
}

fn schedule_toast_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(TOAST_SECONDS));
        let _ = sender.send(InternalEvent::ClearToast { token });
    });
}

fn emit_toast(
    state: &mut ViewState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(ViewCommand::ShowToast(message.into()));
    view_data.toast_token = view_data.toast_token.saturating_add(1);
    schedule_toast_clear(internal_tx, view_data.toast_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut ViewState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        view_data.help_visible = false;
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Char('j') | KeyCode::Down => move_cursor(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_cursor(state, view_data, -1),
        KeyCode::Char('g') => view_data.cursor = 0,
        KeyCode::Char('G') => {
            view_data.cursor = state.filtered().len().saturating_sub(1);
        }
        KeyCode::Char('f') => {
            let next = state.filter.next();
            state.dispatch(ViewCommand::SetFilter(next));
            clamp_cursor(state, view_data);
        }
        KeyCode::Char(digit @ '1'..='4') => {
            let index = digit as usize - '1' as usize;
            if let Some(filter) = StatusFilter::ALL.get(index) {
                state.dispatch(ViewCommand::SetFilter(*filter));
                clamp_cursor(state, view_data);
            }
        }
        KeyCode::Char('a') => {
            submit(state, runtime, view_data, internal_tx, ModerationAction::Approve);
        }
        KeyCode::Char('r') => {
            submit(state, runtime, view_data, internal_tx, ModerationAction::Reject);
        }
        KeyCode::Char('d') => toggle_expansion(state, view_data, TextField::Draft),
        KeyCode::Char('c') => toggle_expansion(state, view_data, TextField::Content),
        KeyCode::Char('R') => reload(state, runtime, view_data),
        KeyCode::Char('t') => {
            if let Some(next) = next_table(&view_data.tables, &state.table) {
                state.dispatch(ViewCommand::SelectTable(next));
                reload(state, runtime, view_data);
                reopen_channel(state, runtime, view_data, internal_tx);
            }
        }
        _ => {}
    }
    false
}

fn submit<R: AppRuntime>(
    state: &mut ViewState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    action: ModerationAction,
) {
    let Some(id) = selected_id(state, view_data) else {
        return;
    };

    let events = state.dispatch(ViewCommand::BeginSubmission(id, action));
    for event in events {
        match event {
            ViewEvent::SubmissionStarted { id, action } => {
                let outcome = runtime.submit_status(&state.table, id, action);
                state.dispatch(ViewCommand::SettleSubmission);
                match outcome {
                    Ok(()) => {
                        emit_toast(state, view_data, internal_tx, success_toast(action, id));
                        reload(state, runtime, view_data);
                    }
                    Err(error) => {
                        emit_toast(state, view_data, internal_tx, failure_toast(&error));
                    }
                }
            }
            ViewEvent::SubmissionRefused { reason, .. } => {
                emit_toast(state, view_data, internal_tx, refusal_toast(reason));
            }
            _ => {}
        }
    }
}

fn success_toast(action: ModerationAction, id: RecordId) -> String {
    format!(
        "successfully {} id {id}",
        action.resulting_status().as_str()
    )
}

fn failure_toast(error: &anyhow::Error) -> String {
    format!("error updating status: {error}")
}

fn refusal_toast(reason: SubmissionRefusal) -> &'static str {
    match reason {
        SubmissionRefusal::AlreadyInFlight => "another update is still in flight",
        SubmissionRefusal::UnknownRecord => "record not found",
        SubmissionRefusal::AlreadySettled => "record is already settled",
    }
}

fn toggle_expansion(state: &mut ViewState, view_data: &mut ViewData, field: TextField) {
    if let Some(id) = selected_id(state, view_data) {
        state.dispatch(ViewCommand::ToggleExpansion(id, field));
    }
}

fn selected_id(state: &ViewState, view_data: &ViewData) -> Option<RecordId> {
    state
        .filtered()
        .get(view_data.cursor)
        .map(|record| record.id)
}

fn move_cursor(state: &ViewState, view_data: &mut ViewData, delta: isize) {
    let count = state.filtered().len();
    if count == 0 {
        view_data.cursor = 0;
        return;
    }
    let current = view_data.cursor as isize;
    view_data.cursor = current.saturating_add(delta).clamp(0, count as isize - 1) as usize;
}

fn clamp_cursor(state: &ViewState, view_data: &mut ViewData) {
    let count = state.filtered().len();
    view_data.cursor = if count == 0 {
        0
    } else {
        view_data.cursor.min(count - 1)
    };
}

fn next_table(tables: &[String], current: &str) -> Option<String> {
    if tables.len() < 2 {
        return None;
    }
    let position = tables.iter().position(|table| table == current)?;
    Some(tables[(position + 1) % tables.len()].clone())
}

/// Collapses a nullable text field to what the card shows. Fields at or
/// under the limit render whole with no affordance; longer ones carry a
/// `[more]`/`[less]` marker depending on the expansion flag.
fn field_preview(text: Option<&str>, expanded: bool) -> String {
    let Some(text) = text else {
        return MISSING_TEXT.to_owned();
    };
    if text.chars().count() <= PREVIEW_LIMIT {
        return text.to_owned();
    }
    if expanded {
        return format!("{text} [less]");
    }
    let prefix: String = text.chars().take(PREVIEW_LIMIT).collect();
    format!("{prefix}... [more]")
}

fn status_color(status: RecordStatus) -> Color {
    match status {
        RecordStatus::Pending => Color::Yellow,
        RecordStatus::Approved => Color::Green,
        RecordStatus::Rejected => Color::Red,
    }
}

fn render(frame: &mut Frame, state: &ViewState, view_data: &ViewData) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(3),
    ])
    .split(frame.area());

    render_header(frame, state, chunks[0]);
    render_body(frame, state, view_data, chunks[1]);
    render_footer(frame, state, chunks[2]);

    if view_data.help_visible {
        render_help_overlay(frame);
    }
}

fn render_header(frame: &mut Frame, state: &ViewState, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", state.table),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
    ];
    for filter in StatusFilter::ALL {
        let style = if filter == state.filter {
            Style::default()
                .add_modifier(Modifier::BOLD)
                .add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        spans.push(Span::styled(format!(" {} ", filter.label()), style));
    }
    spans.push(Span::raw(format!(
        "  {}/{} records",
        state.filtered().len(),
        state.records.len()
    )));

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("sift"));
    frame.render_widget(header, area);
}

fn render_body(frame: &mut Frame, state: &ViewState, view_data: &ViewData, area: Rect) {
    let block = Block::default().borders(Borders::ALL);

    let visible = state.filtered();
    if visible.is_empty() {
        let text = if state.loading {
            "loading records ...".to_owned()
        } else {
            format!("no {} records", state.filter.label())
        };
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let mut lines = Vec::new();
    let mut selected_start = 0usize;
    for (index, record) in visible.iter().enumerate() {
        if index == view_data.cursor {
            selected_start = lines.len();
        }
        lines.extend(card_lines(state, record, index == view_data.cursor));
        lines.push(Line::default());
    }

    // Keep the selected card in view without tracking exact wrap heights.
    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = selected_start.saturating_sub(inner_height / 2) as u16;

    let body = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(body, area);
}

fn card_lines<'a>(state: &ViewState, record: &'a Record, selected: bool) -> Vec<Line<'a>> {
    let status = record.effective_status();
    let marker = if selected { "▶ " } else { "  " };
    let mut title_style = Style::default().add_modifier(Modifier::BOLD);
    if selected {
        title_style = title_style.add_modifier(Modifier::REVERSED);
    }

    let mut lines = vec![Line::from(vec![
        Span::raw(marker),
        Span::styled(format!("#{}", record.id), title_style),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", status.as_str()),
            Style::default().fg(status_color(status)),
        ),
    ])];

    for field in [TextField::Draft, TextField::Content] {
        let expanded = state.is_expanded(record.id, field);
        let preview = field_preview(record.text(field), expanded);
        lines.push(Line::from(vec![
            Span::styled(
                format!("    {}: ", field.label()),
                Style::default().add_modifier(Modifier::DIM),
            ),
            Span::raw(preview),
        ]));
    }
    lines
}

fn render_footer(frame: &mut Frame, state: &ViewState, area: Rect) {
    let line = match &state.toast {
        Some(message) => Line::from(Span::styled(
            message.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        None => Line::from(Span::styled(
            "a approve  r reject  d/c expand  f filter  ? help  q quit",
            Style::default().add_modifier(Modifier::DIM),
        )),
    };
    let footer = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect(60, 60, frame.area());
    let text = help_overlay_text().join("\n");
    let help = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("help"))
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(help, area);
}

fn help_overlay_text() -> Vec<&'static str> {
    vec![
        "j/k, arrows  move between records",
        "g/G          first / last record",
        "a            approve selected record",
        "r            reject selected record",
        "d            expand/collapse draft text",
        "c            expand/collapse content text",
        "f, 1-4       status filter",
        "t            switch table",
        "R            reload from the service",
        "q, ctrl-q    quit",
        "",
        "press any key to close",
    ]
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(area);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(vertical[1])[1]
}
