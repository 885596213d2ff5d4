// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::{
    ActionDate, ApiError, ApiOutcome, ApiReply, ApiRequest, EditField, LeadId, LeadMetrics,
    ReconciliationPolicy, RemovalToken, RequestId, RowActionKind, TableController, UiAction,
    ViewKind,
};

/// How long a completed row shows its exit treatment before it leaves the
/// table.
pub const EXIT_DELAY: Duration = Duration::from_millis(200);

pub const COMPLETE_FAILED_ALERT: &str = "Couldn't complete. Try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send {
        id: RequestId,
        request: ApiRequest,
    },
    ScheduleRemoval {
        token: RemovalToken,
        delay: Duration,
    },
    Alert(String),
}

/// The reschedule dialog is modal and shared by both views, so it holds a
/// single pending target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RescheduleDialog {
    #[default]
    Closed,
    Open {
        view: ViewKind,
        lead_id: LeadId,
    },
    Submitting {
        view: ViewKind,
        lead_id: LeadId,
        request: RequestId,
    },
}

impl RescheduleDialog {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    pub fn lead_id(&self) -> Option<&LeadId> {
        match self {
            Self::Closed => None,
            Self::Open { lead_id, .. } | Self::Submitting { lead_id, .. } => Some(lead_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsPanel {
    pub overdue: Option<i64>,
    pub due_today: Option<i64>,
    pub open: Option<i64>,
}

impl MetricsPanel {
    fn apply(&mut self, metrics: LeadMetrics) {
        self.overdue = Some(metrics.tasks_status);
        self.due_today = Some(metrics.tasks_due_count);
        self.open = Some(metrics.tasks_open);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IntakeStatus {
    #[default]
    Idle,
    Invalid(String),
    Submitting,
    EmailRejected,
    Failed(String),
    Saved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingRequest {
    Reload(ViewKind),
    FieldEdit {
        view: ViewKind,
        lead_id: LeadId,
        field: EditField,
    },
    Complete(RemovalToken),
    Delete {
        view: ViewKind,
        lead_id: LeadId,
    },
    Reschedule {
        view: ViewKind,
        lead_id: LeadId,
    },
    Metrics,
    CreateLead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCompletion {
    view: ViewKind,
    lead_id: LeadId,
    generation: u64,
    next_sibling: Option<LeadId>,
    detached: Option<crate::DetachedRow>,
    timer_fired: bool,
    confirmed: bool,
}

/// Client-side state for both lead tables plus the shared dialog, metrics
/// widgets, and add-lead form. It performs no I/O: every operation returns
/// the effects a driver has to carry out, and the driver feeds request
/// outcomes and timer expiries back in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    dashboard: TableController,
    leads_page: TableController,
    reschedule: RescheduleDialog,
    metrics: MetricsPanel,
    intake: IntakeStatus,
    in_flight: BTreeMap<RequestId, PendingRequest>,
    completions: BTreeMap<RemovalToken, PendingCompletion>,
    next_request: u64,
    next_token: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            dashboard: TableController::new(ViewKind::Dashboard),
            leads_page: TableController::new(ViewKind::LeadsPage),
            reschedule: RescheduleDialog::Closed,
            metrics: MetricsPanel::default(),
            intake: IntakeStatus::Idle,
            in_flight: BTreeMap::new(),
            completions: BTreeMap::new(),
            next_request: 0,
            next_token: 0,
        }
    }

    pub fn table(&self, view: ViewKind) -> &TableController {
        match view {
            ViewKind::Dashboard => &self.dashboard,
            ViewKind::LeadsPage => &self.leads_page,
        }
    }

    fn table_mut(&mut self, view: ViewKind) -> &mut TableController {
        match view {
            ViewKind::Dashboard => &mut self.dashboard,
            ViewKind::LeadsPage => &mut self.leads_page,
        }
    }

    pub fn reschedule(&self) -> &RescheduleDialog {
        &self.reschedule
    }

    pub fn metrics(&self) -> MetricsPanel {
        self.metrics
    }

    pub fn intake(&self) -> &IntakeStatus {
        &self.intake
    }

    pub fn reset_intake(&mut self) {
        self.intake = IntakeStatus::Idle;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending_completions(&self) -> usize {
        self.completions.len()
    }

    /// Initial load: the dashboard opens first.
    pub fn start(&mut self) -> Vec<Effect> {
        self.dispatch(UiAction::ViewOpened(ViewKind::Dashboard))
    }

    pub fn dispatch(&mut self, action: UiAction) -> Vec<Effect> {
        match action {
            UiAction::TaskChanged {
                view,
                lead_id,
                task,
            } => {
                self.table_mut(view).set_task(&lead_id, task);
                let request = ApiRequest::UpdateTask {
                    lead_id: lead_id.clone(),
                    task,
                };
                self.edit_field(view, lead_id, EditField::Task, request)
            }
            UiAction::StageChanged {
                view,
                lead_id,
                stage,
            } => {
                self.table_mut(view).set_stage(&lead_id, stage);
                let request = ApiRequest::UpdateStage {
                    lead_id: lead_id.clone(),
                    stage,
                };
                self.edit_field(view, lead_id, EditField::Stage, request)
            }
            UiAction::Completed { view, lead_id } => self.complete(view, lead_id),
            UiAction::Deleted { view, lead_id } => self.delete(view, lead_id),
            UiAction::RescheduleRequested { view, lead_id } => {
                self.open_reschedule(view, lead_id);
                Vec::new()
            }
            UiAction::RescheduleSubmitted { action_date } => self.submit_reschedule(&action_date),
            UiAction::RescheduleCancelled => {
                if self.reschedule.is_open() {
                    debug!("reschedule dialog closed");
                }
                self.reschedule = RescheduleDialog::Closed;
                Vec::new()
            }
            UiAction::LeadSubmitted(form) => {
                if let Err(error) = form.validate() {
                    self.intake = IntakeStatus::Invalid(error.to_string());
                    return Vec::new();
                }
                self.intake = IntakeStatus::Submitting;
                vec![self.send(ApiRequest::CreateLead(form), PendingRequest::CreateLead)]
            }
            UiAction::ViewOpened(view) => {
                let mut effects = self.reload(view);
                if view == ViewKind::Dashboard {
                    effects.push(self.send(ApiRequest::FetchMetrics, PendingRequest::Metrics));
                }
                effects
            }
            UiAction::ReloadRequested(view) => self.reload(view),
            UiAction::MetricsRequested => {
                vec![self.send(ApiRequest::FetchMetrics, PendingRequest::Metrics)]
            }
        }
    }

    pub fn handle_reply(&mut self, id: RequestId, outcome: ApiOutcome) -> Vec<Effect> {
        let Some(pending) = self.in_flight.remove(&id) else {
            debug!(request = id.get(), "reply for unknown request ignored");
            return Vec::new();
        };

        match pending {
            PendingRequest::Reload(view) => self.finish_reload(view, outcome),
            PendingRequest::FieldEdit {
                view,
                lead_id,
                field,
            } => self.finish_field_edit(view, &lead_id, field, outcome),
            PendingRequest::Complete(token) => self.settle_completion(token, outcome),
            PendingRequest::Delete { view, lead_id } => {
                // The reload shows whether the lead is really gone.
                match outcome {
                    Ok(_) => info!(lead_id = %lead_id, "lead deleted"),
                    Err(error) => warn!(lead_id = %lead_id, %error, "delete failed; reloading anyway"),
                }
                self.reload(view)
            }
            PendingRequest::Reschedule { view, lead_id } => {
                if matches!(
                    &self.reschedule,
                    RescheduleDialog::Submitting { request, .. } if *request == id
                ) {
                    self.reschedule = RescheduleDialog::Closed;
                }
                match outcome {
                    Ok(_) => info!(lead_id = %lead_id, "lead rescheduled"),
                    Err(error) => warn!(lead_id = %lead_id, %error, "reschedule failed"),
                }
                self.reload(view)
            }
            PendingRequest::Metrics => {
                match outcome {
                    Ok(ApiReply::Metrics(metrics)) => self.metrics.apply(metrics),
                    Ok(other) => warn!(reply = ?other, "metrics request returned no metrics"),
                    Err(error) => warn!(%error, "metrics refresh failed"),
                }
                Vec::new()
            }
            PendingRequest::CreateLead => match outcome {
                Ok(_) => {
                    info!("lead created");
                    self.intake = IntakeStatus::Saved;
                    self.reload(ViewKind::Dashboard)
                }
                Err(ApiError::Validation(message)) => {
                    warn!(%message, "lead email rejected");
                    self.intake = IntakeStatus::EmailRejected;
                    Vec::new()
                }
                Err(error) => {
                    error!(%error, "create lead failed");
                    self.intake = IntakeStatus::Failed(error.to_string());
                    Vec::new()
                }
            },
        }
    }

    /// Timer expiry for an optimistic removal.
    pub fn removal_elapsed(&mut self, token: RemovalToken) -> Vec<Effect> {
        let Some(pending) = self.completions.get_mut(&token) else {
            debug!(token = token.get(), "removal skipped; completion already settled");
            return Vec::new();
        };
        pending.timer_fired = true;

        let table = match pending.view {
            ViewKind::Dashboard => &mut self.dashboard,
            ViewKind::LeadsPage => &mut self.leads_page,
        };
        if table.generation() == pending.generation {
            pending.detached = table.detach(&pending.lead_id, pending.next_sibling.clone());
        } else {
            debug!(lead_id = %pending.lead_id, "removal skipped; table re-rendered");
        }

        if pending.confirmed {
            self.completions.remove(&token);
        }
        Vec::new()
    }

    fn allocate_request(&mut self, pending: PendingRequest) -> RequestId {
        self.next_request += 1;
        let id = RequestId::new(self.next_request);
        self.in_flight.insert(id, pending);
        id
    }

    fn send(&mut self, request: ApiRequest, pending: PendingRequest) -> Effect {
        let id = self.allocate_request(pending);
        debug!(request = id.get(), kind = request.label(), "request queued");
        Effect::Send { id, request }
    }

    fn reload(&mut self, view: ViewKind) -> Vec<Effect> {
        let scope = self.table(view).scope();
        vec![self.send(ApiRequest::FetchLeads(scope), PendingRequest::Reload(view))]
    }

    fn finish_reload(&mut self, view: ViewKind, outcome: ApiOutcome) -> Vec<Effect> {
        let fetched = outcome.and_then(|reply| match reply {
            ApiReply::Leads(leads) => Ok(leads),
            other => Err(ApiError::Decode {
                what: "lead list",
                message: format!("unexpected reply {other:?}"),
            }),
        });
        match self.table_mut(view).apply_fetch(fetched) {
            Ok(()) => Vec::new(),
            Err(error) => {
                error!(view = view.label(), %error, "reload failed; keeping previous rows");
                vec![Effect::Alert(format!(
                    "Couldn't load {} leads: {error}",
                    view.label()
                ))]
            }
        }
    }

    fn edit_field(
        &mut self,
        view: ViewKind,
        lead_id: LeadId,
        field: EditField,
        request: ApiRequest,
    ) -> Vec<Effect> {
        debug!(view = view.label(), lead_id = %lead_id, field = field.as_str(), "field edit");
        vec![self.send(
            request,
            PendingRequest::FieldEdit {
                view,
                lead_id,
                field,
            },
        )]
    }

    fn finish_field_edit(
        &mut self,
        view: ViewKind,
        lead_id: &LeadId,
        field: EditField,
        outcome: ApiOutcome,
    ) -> Vec<Effect> {
        match outcome {
            Ok(_) => {
                info!(lead_id = %lead_id, field = field.as_str(), "field updated");
                match view.policy() {
                    ReconciliationPolicy::OptimisticLocal => Vec::new(),
                    ReconciliationPolicy::PessimisticReload => self.reload(view),
                }
            }
            Err(error) => {
                warn!(lead_id = %lead_id, field = field.as_str(), %error, "field update failed");
                let verb = if error.is_transport() {
                    "Error updating"
                } else {
                    "Failed to update"
                };
                vec![Effect::Alert(format!("{verb} {}", field.as_str()))]
            }
        }
    }

    fn complete(&mut self, view: ViewKind, lead_id: LeadId) -> Vec<Effect> {
        if !view.offers(RowActionKind::Complete) {
            debug!(view = view.label(), "complete is not offered here");
            return Vec::new();
        }
        let table = self.table_mut(view);
        let Some(next_sibling) = table.begin_exit(&lead_id) else {
            debug!(lead_id = %lead_id, "complete ignored; row absent or already exiting");
            return Vec::new();
        };
        let generation = table.generation();

        self.next_token += 1;
        let token = RemovalToken::new(self.next_token);
        self.completions.insert(
            token,
            PendingCompletion {
                view,
                lead_id: lead_id.clone(),
                generation,
                next_sibling,
                detached: None,
                timer_fired: false,
                confirmed: false,
            },
        );
        info!(lead_id = %lead_id, "completing lead");

        let send = self.send(
            ApiRequest::Complete { lead_id },
            PendingRequest::Complete(token),
        );
        vec![
            Effect::ScheduleRemoval {
                token,
                delay: EXIT_DELAY,
            },
            send,
        ]
    }

    fn settle_completion(&mut self, token: RemovalToken, outcome: ApiOutcome) -> Vec<Effect> {
        match outcome {
            Ok(_) => {
                let settled = match self.completions.get_mut(&token) {
                    Some(pending) if pending.timer_fired => true,
                    Some(pending) => {
                        pending.confirmed = true;
                        false
                    }
                    None => false,
                };
                if settled {
                    self.completions.remove(&token);
                }
                Vec::new()
            }
            Err(error) => {
                if let Some(pending) = self.completions.remove(&token) {
                    warn!(lead_id = %pending.lead_id, %error, "complete failed; restoring row");
                    let table = self.table_mut(pending.view);
                    if table.generation() == pending.generation {
                        match pending.detached {
                            Some(detached) => {
                                let placement = table.reinsert(detached);
                                debug!(?placement, "row restored");
                            }
                            None => {
                                table.clear_exit(&pending.lead_id);
                            }
                        }
                    }
                }
                vec![Effect::Alert(COMPLETE_FAILED_ALERT.to_owned())]
            }
        }
    }

    fn delete(&mut self, view: ViewKind, lead_id: LeadId) -> Vec<Effect> {
        if !view.offers(RowActionKind::Delete) {
            debug!(view = view.label(), "delete is not offered here");
            return Vec::new();
        }
        info!(lead_id = %lead_id, "deleting lead");
        vec![self.send(
            ApiRequest::Delete {
                lead_id: lead_id.clone(),
            },
            PendingRequest::Delete { view, lead_id },
        )]
    }

    fn open_reschedule(&mut self, view: ViewKind, lead_id: LeadId) {
        if !view.offers(RowActionKind::Reschedule) {
            return;
        }
        if self.reschedule.is_open() {
            debug!(lead_id = %lead_id, "reschedule dialog already open");
            return;
        }
        self.reschedule = RescheduleDialog::Open { view, lead_id };
    }

    fn submit_reschedule(&mut self, raw: &str) -> Vec<Effect> {
        let RescheduleDialog::Open { view, lead_id } = self.reschedule.clone() else {
            debug!("reschedule submit without an open dialog");
            return Vec::new();
        };
        let Some(action_date) = ActionDate::parse_day(raw) else {
            return vec![Effect::Alert(format!("{raw:?} is not a date -- use YYYY-MM-DD"))];
        };

        let request = ApiRequest::Reschedule {
            lead_id: lead_id.clone(),
            action_date: action_date.as_str().to_owned(),
        };
        let id = self.allocate_request(PendingRequest::Reschedule {
            view,
            lead_id: lead_id.clone(),
        });
        self.reschedule = RescheduleDialog::Submitting {
            view,
            lead_id,
            request: id,
        };
        vec![Effect::Send { id, request }]
    }
}
