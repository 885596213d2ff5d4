// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use leadsync_api::{LeadsApi, perform};
use leadsync_app::{
    ApiOutcome, ApiRequest, ControlEvent, ControlKind, Effect, IntakeStatus, MetricsPanel,
    NewLead, RemovalToken, RequestId, RescheduleDialog, RowActionKind, RowView, Session, Stage,
    UiAction, ViewKind, classify,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);
const FORM_FIELDS: [&str; 6] = ["im", "company", "agent", "email", "task", "date"];
const TASK_FIELD: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    Reply { id: RequestId, outcome: ApiOutcome },
    RemovalDue { token: RemovalToken },
    ClearStatus { token: u64 },
}

/// Carries session effects off the UI thread. Whatever it starts must report
/// back through `InternalEvent`s.
pub trait EffectRunner {
    fn send(&mut self, id: RequestId, request: ApiRequest);
    fn schedule_removal(&mut self, token: RemovalToken, delay: Duration);
    fn schedule_status_clear(&mut self, token: u64);
}

/// Runs each request on a short-lived worker thread and each timer on a
/// sleeping thread.
pub struct ThreadedRunner<A> {
    api: A,
    tx: Sender<InternalEvent>,
}

impl<A> ThreadedRunner<A> {
    pub fn new(api: A, tx: Sender<InternalEvent>) -> Self {
        Self { api, tx }
    }
}

impl<A: LeadsApi + Clone + Send + 'static> EffectRunner for ThreadedRunner<A> {
    fn send(&mut self, id: RequestId, request: ApiRequest) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = perform(&api, &request);
            let _ = tx.send(InternalEvent::Reply { id, outcome });
        });
    }

    fn schedule_removal(&mut self, token: RemovalToken, delay: Duration) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            let _ = tx.send(InternalEvent::RemovalDue { token });
        });
    }

    fn schedule_status_clear(&mut self, token: u64) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            thread::sleep(STATUS_CLEAR_DELAY);
            let _ = tx.send(InternalEvent::ClearStatus { token });
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LeadFormUi {
    lead: NewLead,
    field: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ViewData {
    active: ViewKind,
    selected: [usize; 2],
    alerts: VecDeque<String>,
    reschedule_input: String,
    form: Option<LeadFormUi>,
    help_visible: bool,
    status: Option<String>,
    status_token: u64,
}

impl Default for ViewData {
    fn default() -> Self {
        Self {
            active: ViewKind::Dashboard,
            selected: [0; 2],
            alerts: VecDeque::new(),
            reschedule_input: String::new(),
            form: None,
            help_visible: false,
            status: None,
            status_token: 0,
        }
    }
}

pub fn run_app<A>(api: A, session: &mut Session) -> Result<()>
where
    A: LeadsApi + Clone + Send + 'static,
{
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (internal_tx, internal_rx) = mpsc::channel();
    let mut runner = ThreadedRunner::new(api, internal_tx);
    let mut view_data = ViewData::default();

    let effects = session.start();
    apply_effects(&mut runner, &mut view_data, effects);
    info!("ui started");

    let mut result = Ok(());
    loop {
        process_internal_events(session, &mut runner, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, session, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(session, &mut runner, &mut view_data, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    info!("ui stopped");
    result
}

fn process_internal_events<E: EffectRunner>(
    session: &mut Session,
    runner: &mut E,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        handle_internal_event(session, runner, view_data, event);
    }
}

fn handle_internal_event<E: EffectRunner>(
    session: &mut Session,
    runner: &mut E,
    view_data: &mut ViewData,
    event: InternalEvent,
) {
    let effects = match event {
        InternalEvent::Reply { id, outcome } => session.handle_reply(id, outcome),
        InternalEvent::RemovalDue { token } => session.removal_elapsed(token),
        InternalEvent::ClearStatus { token } => {
            if token == view_data.status_token {
                view_data.status = None;
            }
            return;
        }
    };
    apply_effects(runner, view_data, effects);

    if view_data.form.is_some() && session.intake() == &IntakeStatus::Saved {
        view_data.form = None;
        session.reset_intake();
        emit_status(runner, view_data, "lead saved");
    }
}

fn apply_effects<E: EffectRunner>(runner: &mut E, view_data: &mut ViewData, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Send { id, request } => runner.send(id, request),
            Effect::ScheduleRemoval { token, delay } => runner.schedule_removal(token, delay),
            Effect::Alert(message) => view_data.alerts.push_back(message),
        }
    }
}

fn dispatch<E: EffectRunner>(
    session: &mut Session,
    runner: &mut E,
    view_data: &mut ViewData,
    action: UiAction,
) {
    let effects = session.dispatch(action);
    apply_effects(runner, view_data, effects);
}

fn emit_status<E: EffectRunner>(runner: &mut E, view_data: &mut ViewData, message: impl Into<String>) {
    view_data.status = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    runner.schedule_status_clear(view_data.status_token);
}

const fn view_index(view: ViewKind) -> usize {
    match view {
        ViewKind::Dashboard => 0,
        ViewKind::LeadsPage => 1,
    }
}

fn selected_row<'a>(session: &'a Session, view_data: &ViewData) -> Option<&'a RowView> {
    let rows = session.table(view_data.active).rows();
    let last = rows.len().checked_sub(1)?;
    rows.get(view_data.selected[view_index(view_data.active)].min(last))
}

fn move_selection(session: &Session, view_data: &mut ViewData, delta: isize) {
    let len = session.table(view_data.active).rows().len();
    let slot = &mut view_data.selected[view_index(view_data.active)];
    if len == 0 {
        *slot = 0;
        return;
    }
    let current = (*slot).min(len - 1) as isize;
    *slot = (current + delta).clamp(0, len as isize - 1) as usize;
}

fn handle_key_event<E: EffectRunner>(
    session: &mut Session,
    runner: &mut E,
    view_data: &mut ViewData,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if !view_data.alerts.is_empty() {
        view_data.alerts.pop_front();
        return false;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    if session.reschedule().is_open() {
        handle_reschedule_key(session, runner, view_data, key);
        return false;
    }

    if view_data.form.is_some() {
        handle_form_key(session, runner, view_data, key);
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Tab | KeyCode::BackTab => {
            let next = view_data.active.toggle();
            view_data.active = next;
            dispatch(session, runner, view_data, UiAction::ViewOpened(next));
        }
        KeyCode::Char('j') | KeyCode::Down => move_selection(session, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_selection(session, view_data, -1),
        KeyCode::Char('g') | KeyCode::Home => move_selection(session, view_data, isize::MIN / 2),
        KeyCode::Char('G') | KeyCode::End => move_selection(session, view_data, isize::MAX / 2),
        KeyCode::Char('t') => change_selector(session, runner, view_data, ControlKind::TaskSelect, |row| {
            row.task.next().as_str()
        }),
        KeyCode::Char('T') => change_selector(session, runner, view_data, ControlKind::TaskSelect, |row| {
            row.task.prev().as_str()
        }),
        KeyCode::Char('s') => change_selector(session, runner, view_data, ControlKind::StageSelect, |row| {
            row.stage.map_or(Stage::ALL[0], Stage::next).as_str()
        }),
        KeyCode::Char('S') => change_selector(session, runner, view_data, ControlKind::StageSelect, |row| {
            row.stage
                .map_or(Stage::ALL[Stage::ALL.len() - 1], Stage::prev)
                .as_str()
        }),
        KeyCode::Char('c') => activate(session, runner, view_data, RowActionKind::Complete),
        KeyCode::Char('d') => activate(session, runner, view_data, RowActionKind::Delete),
        KeyCode::Char('r') => activate(session, runner, view_data, RowActionKind::Reschedule),
        KeyCode::Char('R') => {
            let view = view_data.active;
            dispatch(session, runner, view_data, UiAction::ViewOpened(view));
            emit_status(runner, view_data, format!("reloading {}", view.label()));
        }
        KeyCode::Char('a') => {
            session.reset_intake();
            view_data.form = Some(LeadFormUi {
                lead: NewLead::blank(),
                field: 0,
            });
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        _ => {}
    }
    false
}

fn change_selector<E: EffectRunner>(
    session: &mut Session,
    runner: &mut E,
    view_data: &mut ViewData,
    kind: ControlKind,
    choose: impl FnOnce(&RowView) -> &'static str,
) {
    let view = view_data.active;
    let Some(row) = selected_row(session, view_data) else {
        return;
    };
    if row.exiting {
        return;
    }
    let Some(control) = row.control(kind).cloned() else {
        return;
    };
    let value = choose(row);
    if let Some(action) = classify(view, &control, ControlEvent::Changed(value.to_owned())) {
        dispatch(session, runner, view_data, action);
    }
}

fn activate<E: EffectRunner>(
    session: &mut Session,
    runner: &mut E,
    view_data: &mut ViewData,
    action: RowActionKind,
) {
    let view = view_data.active;
    let Some(row) = selected_row(session, view_data) else {
        return;
    };
    let Some(control) = row.control(ControlKind::Action(action)).cloned() else {
        emit_status(
            runner,
            view_data,
            format!(
                "{} is not available on the {} view",
                action.label().to_ascii_lowercase(),
                view.label()
            ),
        );
        return;
    };
    if action == RowActionKind::Reschedule {
        view_data.reschedule_input = row.action_date.clone();
    }
    if let Some(ui_action) = classify(view, &control, ControlEvent::Clicked) {
        debug!(view = view.label(), action = action.label(), "row action");
        dispatch(session, runner, view_data, ui_action);
    }
}

fn handle_reschedule_key<E: EffectRunner>(
    session: &mut Session,
    runner: &mut E,
    view_data: &mut ViewData,
    key: KeyEvent,
) {
    let submitting = matches!(session.reschedule(), RescheduleDialog::Submitting { .. });
    match key.code {
        KeyCode::Esc => {
            dispatch(session, runner, view_data, UiAction::RescheduleCancelled);
            view_data.reschedule_input.clear();
        }
        KeyCode::Enter if !submitting => {
            let action_date = view_data.reschedule_input.trim().to_owned();
            dispatch(
                session,
                runner,
                view_data,
                UiAction::RescheduleSubmitted { action_date },
            );
        }
        KeyCode::Backspace if !submitting => {
            view_data.reschedule_input.pop();
        }
        KeyCode::Char(ch) if !submitting => view_data.reschedule_input.push(ch),
        _ => {}
    }
}

fn form_text_field(lead: &mut NewLead, field: usize) -> Option<&mut String> {
    match field {
        0 => Some(&mut lead.im),
        1 => Some(&mut lead.company_name),
        2 => Some(&mut lead.agent_name),
        3 => Some(&mut lead.email),
        5 => Some(&mut lead.date),
        _ => None,
    }
}

fn handle_form_key<E: EffectRunner>(
    session: &mut Session,
    runner: &mut E,
    view_data: &mut ViewData,
    key: KeyEvent,
) {
    if key.code == KeyCode::Esc {
        view_data.form = None;
        session.reset_intake();
        return;
    }
    if key.code == KeyCode::Enter {
        if session.intake() == &IntakeStatus::Submitting {
            return;
        }
        let lead = view_data.form.as_ref().map(|form| form.lead.clone());
        if let Some(lead) = lead {
            dispatch(session, runner, view_data, UiAction::LeadSubmitted(lead));
        }
        return;
    }

    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    let fields = FORM_FIELDS.len();
    match key.code {
        KeyCode::Tab | KeyCode::Down => form.field = (form.field + 1) % fields,
        KeyCode::BackTab | KeyCode::Up => form.field = (form.field + fields - 1) % fields,
        KeyCode::Left if form.field == TASK_FIELD => form.lead.task = form.lead.task.prev(),
        KeyCode::Right | KeyCode::Char(' ') if form.field == TASK_FIELD => {
            form.lead.task = form.lead.task.next();
        }
        KeyCode::Backspace => {
            if let Some(value) = form_text_field(&mut form.lead, form.field) {
                value.pop();
            }
        }
        KeyCode::Char(ch) => {
            if let Some(value) = form_text_field(&mut form.lead, form.field) {
                value.push(ch);
            }
        }
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame<'_>, session: &Session, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let tab_titles = ViewKind::ALL
        .iter()
        .map(|view| view.label().to_owned())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("leadsync").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(view_index(view_data.active));
    frame.render_widget(tabs, layout[0]);

    let metrics = Paragraph::new(metrics_text(session.metrics()))
        .block(Block::default().borders(Borders::ALL).title("tasks"));
    frame.render_widget(metrics, layout[1]);

    render_table(frame, layout[2], session, view_data);

    let status = Paragraph::new(status_text(view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, layout[3]);

    if session.reschedule().is_open() {
        let area = centered_rect(50, 25, frame.area());
        frame.render_widget(Clear, area);
        let dialog = Paragraph::new(render_reschedule_text(session.reschedule(), view_data))
            .block(Block::default().title("reschedule").borders(Borders::ALL));
        frame.render_widget(dialog, area);
    }

    if let Some(form) = &view_data.form {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(render_form_text(form, session.intake()))
            .block(Block::default().title("add lead").borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }

    if let Some(alert) = view_data.alerts.front() {
        let area = centered_rect(50, 20, frame.area());
        frame.render_widget(Clear, area);
        let modal = Paragraph::new(format!("{alert}\n\npress any key"))
            .style(Style::default().fg(Color::Red))
            .block(Block::default().title("alert").borders(Borders::ALL));
        frame.render_widget(modal, area);
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    session: &Session,
    view_data: &ViewData,
) {
    let table = session.table(view_data.active);
    let selected = selected_row(session, view_data).map(|row| row.lead_id.clone());

    let header = Row::new(
        ["IM", "Company", "Agent", "Email", "Action date", "Task", "Stage", "Actions"].map(
            |label| {
                Cell::from(label).style(
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                )
            },
        ),
    );

    let rows = table.rows().iter().map(|row| {
        let mut style = Style::default();
        if row.exiting {
            style = style
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT);
        }
        if selected.as_ref() == Some(&row.lead_id) {
            style = style.bg(Color::DarkGray);
        }
        Row::new(row_cells(row)).style(style)
    });

    let widths = [
        Constraint::Length(10),
        Constraint::Min(12),
        Constraint::Min(12),
        Constraint::Min(16),
        Constraint::Length(19),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Min(10),
    ];
    let title = format!(
        "{} ({} of {})",
        view_data.active.label(),
        table.rows().len(),
        table.snapshot().len()
    );
    let widget = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(widget, area);
}

fn row_cells(row: &RowView) -> Vec<String> {
    let actions = row
        .controls
        .iter()
        .filter_map(|control| match control.kind {
            ControlKind::Action(action) => Some(action.label()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" / ");
    vec![
        row.im.clone(),
        row.company_name.clone(),
        row.agent_name.clone(),
        row.email.clone(),
        row.action_date.clone(),
        row.task.label().to_owned(),
        row.stage.map_or("-", Stage::label).to_owned(),
        actions,
    ]
}

fn metrics_text(metrics: MetricsPanel) -> String {
    let show = |value: Option<i64>| value.map_or_else(|| "-".to_owned(), |count| count.to_string());
    format!(
        "overdue: {} | due today: {} | open: {}",
        show(metrics.overdue),
        show(metrics.due_today),
        show(metrics.open)
    )
}

fn render_reschedule_text(dialog: &RescheduleDialog, view_data: &ViewData) -> String {
    let lead = dialog
        .lead_id()
        .map(ToString::to_string)
        .unwrap_or_default();
    let footer = if matches!(dialog, RescheduleDialog::Submitting { .. }) {
        "saving..."
    } else {
        "enter save | esc cancel"
    };
    format!(
        "lead {lead}\nnew action date (YYYY-MM-DD)\n> {}\n\n{footer}",
        view_data.reschedule_input
    )
}

fn intake_message(intake: &IntakeStatus) -> String {
    match intake {
        IntakeStatus::Idle => String::new(),
        IntakeStatus::Invalid(message) => message.clone(),
        IntakeStatus::Submitting => "saving...".to_owned(),
        IntakeStatus::EmailRejected => {
            "email rejected by the server -- check the address and retry".to_owned()
        }
        IntakeStatus::Failed(message) => format!("save failed: {message}"),
        IntakeStatus::Saved => "saved".to_owned(),
    }
}

fn render_form_text(form: &LeadFormUi, intake: &IntakeStatus) -> String {
    let lead = &form.lead;
    let values = [
        lead.im.as_str(),
        lead.company_name.as_str(),
        lead.agent_name.as_str(),
        lead.email.as_str(),
        lead.task.label(),
        if lead.date.is_empty() { "YYYY-MM-DD" } else { lead.date.as_str() },
    ];
    let mut lines = FORM_FIELDS
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (label, value))| {
            let cursor = if index == form.field { ">" } else { " " };
            format!("{cursor} {label:<8} {value}")
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    let message = intake_message(intake);
    if !message.is_empty() {
        lines.push(message);
    }
    lines.push("tab/shift+tab field | left/right task | enter save | esc cancel".to_owned());
    lines.join("\n")
}

fn status_text(view_data: &ViewData) -> String {
    let hints = match view_data.active {
        ViewKind::Dashboard => {
            "j/k move | t/T task | s/S stage | c complete | r reschedule | a add | R reload | tab leads | ? help | q quit"
        }
        ViewKind::LeadsPage => {
            "j/k move | t/T task | s/S stage | r reschedule | d delete | a add | R reload | tab dashboard | ? help | q quit"
        }
    };
    let badge = view_data.active.label().to_ascii_uppercase();
    match &view_data.status {
        Some(status) => format!("{badge} | {status} | {hints}"),
        None => format!("{badge} | {hints}"),
    }
}

fn help_overlay_text() -> &'static str {
    "nav: j/k up/down | g/G first/last | tab switch view | R reload | ? help | q quit\n\
row: t/T task | s/S stage | c complete (dashboard) | d delete (leads) | r reschedule\n\
reschedule: type date | enter save | esc cancel\n\
add lead: a open | tab/shift+tab field | left/right task | enter save | esc cancel\n\
alerts: any key dismiss"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
