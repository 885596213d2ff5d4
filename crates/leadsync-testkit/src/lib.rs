// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use leadsync_api::{LeadsApi, perform};
use leadsync_app::{
    ActionDate, ApiError, ApiRequest, Effect, Lead, LeadId, LeadMetrics, NewLead, RemovalToken,
    RequestId, Session, Stage, Task, UiAction, ViewScope,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::macros::date;
use time::{Date, Duration};
use tracing::debug;

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 12] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Turner", "Brooks",
];
const COMPANY_STEMS: [&str; 12] = [
    "Northwind", "Globex", "Initech", "Umbrella", "Hooli", "Vandelay", "Acme", "Stark",
    "Wayne", "Tyrell", "Soylent", "Cyberdyne",
];
const COMPANY_SUFFIXES: [&str; 5] = ["Ltd", "Group", "Labs", "Trading", "Holdings"];

/// Fixed reference day for generated action dates.
pub const REFERENCE_DAY: Date = date!(2026 - 03 - 01);

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for plausible leads. The same seed always yields the
/// same sequence.
#[derive(Debug, Clone)]
pub struct LeadFaker {
    rng: DeterministicRng,
    next_id: u64,
}

impl LeadFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 0,
        }
    }

    pub fn lead(&mut self) -> Lead {
        self.next_id += 1;
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let stem = self.pick(&COMPANY_STEMS);
        let suffix = self.pick(&COMPANY_SUFFIXES);
        let task = Task::ALL[self.rng.int_n(Task::ALL.len())];
        let stage = Stage::ALL[self.rng.int_n(Stage::ALL.len())];
        let day = REFERENCE_DAY + Duration::days(self.rng.int_n(60) as i64);
        let hour = 8 + self.rng.int_n(10);

        Lead {
            id: LeadId::from(self.next_id.to_string()),
            im: format!("IM-{:04}", self.next_id),
            company_name: format!("{stem} {suffix}"),
            agent_name: format!("{first} {last}"),
            email: format!(
                "{}.{}@{}.test",
                first.to_ascii_lowercase(),
                last.to_ascii_lowercase(),
                stem.to_ascii_lowercase()
            ),
            task,
            stage: Some(stage),
            action_date: ActionDate::new(format!("{}T{hour:02}:00", iso_day(day))),
        }
    }

    pub fn leads(&mut self, count: usize) -> Vec<Lead> {
        (0..count).map(|_| self.lead()).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

fn iso_day(day: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        day.year(),
        u8::from(day.month()),
        day.day()
    )
}

/// Hand-built lead with a fixed action date, for tests that care about
/// ordering.
pub fn lead(id: &str, action_date: &str) -> Lead {
    Lead {
        id: LeadId::new(id),
        im: format!("IM-{id}"),
        company_name: format!("{id} Co"),
        agent_name: "Quinn Reed".to_owned(),
        email: format!("lead{id}@example.test"),
        task: Task::Contact,
        stage: Some(Stage::New),
        action_date: ActionDate::new(action_date),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Endpoint {
    FetchLeads,
    UpdateTask,
    UpdateStage,
    Reschedule,
    Complete,
    Delete,
    FetchMetrics,
    CreateLead,
}

#[derive(Debug, Clone)]
struct StoredLead {
    lead: Lead,
    done: bool,
}

#[derive(Debug, Default)]
struct BackendState {
    leads: Vec<StoredLead>,
    failures: BTreeMap<Endpoint, VecDeque<ApiError>>,
    calls: Vec<Endpoint>,
    metrics: LeadMetrics,
    next_id: u64,
}

/// In-memory backend with per-endpoint failure injection. Clones share one
/// store, so a test can keep a handle while a driver owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub fn new(leads: Vec<Lead>) -> Self {
        let backend = Self::default();
        {
            let mut state = backend.lock();
            state.next_id = 1_000;
            state.leads = leads
                .into_iter()
                .map(|lead| StoredLead { lead, done: false })
                .collect();
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a failure for the next call to `endpoint`.
    pub fn fail_next(&self, endpoint: Endpoint, error: ApiError) {
        self.lock()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(error);
    }

    pub fn set_metrics(&self, metrics: LeadMetrics) {
        self.lock().metrics = metrics;
    }

    pub fn calls(&self) -> Vec<Endpoint> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| **call == endpoint)
            .count()
    }

    pub fn lead(&self, lead_id: &LeadId) -> Option<Lead> {
        self.lock()
            .leads
            .iter()
            .find(|stored| &stored.lead.id == lead_id)
            .map(|stored| stored.lead.clone())
    }

    pub fn is_done(&self, lead_id: &LeadId) -> bool {
        self.lock()
            .leads
            .iter()
            .any(|stored| &stored.lead.id == lead_id && stored.done)
    }

    fn enter(&self, endpoint: Endpoint) -> Result<MutexGuard<'_, BackendState>, ApiError> {
        let mut state = self.lock();
        state.calls.push(endpoint);
        if let Some(error) = state
            .failures
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
        {
            debug!(?endpoint, %error, "injected failure");
            return Err(error);
        }
        Ok(state)
    }

    fn with_lead(
        &self,
        endpoint: Endpoint,
        lead_id: &LeadId,
        apply: impl FnOnce(&mut StoredLead),
    ) -> Result<(), ApiError> {
        let mut state = self.enter(endpoint)?;
        let stored = state
            .leads
            .iter_mut()
            .find(|stored| &stored.lead.id == lead_id)
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: "Lead not found".to_owned(),
            })?;
        apply(stored);
        Ok(())
    }
}

impl LeadsApi for FakeBackend {
    fn fetch_leads(&self, scope: ViewScope) -> Result<Vec<Lead>, ApiError> {
        let state = self.enter(Endpoint::FetchLeads)?;
        Ok(state
            .leads
            .iter()
            .filter(|stored| scope == ViewScope::LeadPage || !stored.done)
            .map(|stored| stored.lead.clone())
            .collect())
    }

    fn update_task(&self, lead_id: &LeadId, task: Task) -> Result<(), ApiError> {
        self.with_lead(Endpoint::UpdateTask, lead_id, |stored| {
            stored.lead.task = task;
        })
    }

    fn update_stage(&self, lead_id: &LeadId, stage: Stage) -> Result<(), ApiError> {
        self.with_lead(Endpoint::UpdateStage, lead_id, |stored| {
            stored.lead.stage = Some(stage);
        })
    }

    fn reschedule(&self, lead_id: &LeadId, action_date: &str) -> Result<(), ApiError> {
        self.with_lead(Endpoint::Reschedule, lead_id, |stored| {
            stored.lead.action_date = ActionDate::new(action_date);
            stored.done = false;
        })
    }

    fn complete(&self, lead_id: &LeadId) -> Result<(), ApiError> {
        self.with_lead(Endpoint::Complete, lead_id, |stored| {
            stored.done = true;
        })
    }

    fn delete(&self, lead_id: &LeadId) -> Result<(), ApiError> {
        let mut state = self.enter(Endpoint::Delete)?;
        let before = state.leads.len();
        state.leads.retain(|stored| &stored.lead.id != lead_id);
        if state.leads.len() == before {
            return Err(ApiError::Status {
                status: 404,
                message: "Lead not found".to_owned(),
            });
        }
        Ok(())
    }

    fn fetch_metrics(&self) -> Result<LeadMetrics, ApiError> {
        Ok(self.enter(Endpoint::FetchMetrics)?.metrics)
    }

    fn create_lead(&self, lead: &NewLead) -> Result<Option<LeadId>, ApiError> {
        let mut state = self.enter(Endpoint::CreateLead)?;
        if !lead.email.contains('@') {
            return Err(ApiError::Validation(
                leadsync_app::EMAIL_REJECTED_MARKER.to_owned(),
            ));
        }
        state.next_id += 1;
        let id = LeadId::from(state.next_id.to_string());
        state.leads.push(StoredLead {
            lead: Lead {
                id: id.clone(),
                im: lead.im.clone(),
                company_name: lead.company_name.clone(),
                agent_name: lead.agent_name.clone(),
                email: lead.email.clone(),
                task: lead.task,
                stage: Some(Stage::New),
                action_date: ActionDate::new(lead.date.clone()),
            },
            done: false,
        });
        Ok(Some(id))
    }
}

/// Drives a `Session` against a backend one step at a time. Requests and
/// removal timers queue up until the test releases them, so interleavings
/// are explicit.
#[derive(Debug)]
pub struct Harness<A: LeadsApi> {
    pub session: Session,
    pub backend: A,
    requests: VecDeque<(RequestId, ApiRequest)>,
    timers: VecDeque<RemovalToken>,
    alerts: Vec<String>,
}

impl<A: LeadsApi> Harness<A> {
    pub fn new(backend: A) -> Self {
        Self {
            session: Session::new(),
            backend,
            requests: VecDeque::new(),
            timers: VecDeque::new(),
            alerts: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        let effects = self.session.start();
        self.apply(effects);
    }

    pub fn dispatch(&mut self, action: UiAction) {
        let effects = self.session.dispatch(action);
        self.apply(effects);
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Performs the oldest queued request and feeds its outcome back.
    pub fn deliver_next(&mut self) -> bool {
        let Some((id, request)) = self.requests.pop_front() else {
            return false;
        };
        let outcome = perform(&self.backend, &request);
        let effects = self.session.handle_reply(id, outcome);
        self.apply(effects);
        true
    }

    /// Performs the newest queued request, overtaking anything sent before it.
    pub fn deliver_latest(&mut self) -> bool {
        let Some((id, request)) = self.requests.pop_back() else {
            return false;
        };
        let outcome = perform(&self.backend, &request);
        let effects = self.session.handle_reply(id, outcome);
        self.apply(effects);
        true
    }

    /// Delivers every queued request, including follow-ups, but leaves
    /// timers alone.
    pub fn settle_requests(&mut self) {
        while self.deliver_next() {}
    }

    pub fn fire_timers(&mut self) {
        while let Some(token) = self.timers.pop_front() {
            let effects = self.session.removal_elapsed(token);
            self.apply(effects);
        }
    }

    pub fn run_until_idle(&mut self) {
        loop {
            self.settle_requests();
            if self.timers.is_empty() {
                break;
            }
            self.fire_timers();
        }
    }

    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { id, request } => self.requests.push_back((id, request)),
                Effect::ScheduleRemoval { token, .. } => self.timers.push_back(token),
                Effect::Alert(message) => self.alerts.push(message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Endpoint, FakeBackend, LeadFaker, lead};
    use leadsync_api::LeadsApi;
    use leadsync_app::{ApiError, LeadId, ViewScope};
    use std::collections::BTreeSet;

    #[test]
    fn faker_is_deterministic_per_seed() {
        let left = LeadFaker::new(42).leads(5);
        let right = LeadFaker::new(42).leads(5);
        assert_eq!(left, right);
    }

    #[test]
    fn faker_ids_are_unique_and_dates_parse() {
        let leads = LeadFaker::new(7).leads(25);
        let ids = leads.iter().map(|lead| lead.id.clone()).collect::<BTreeSet<_>>();
        assert_eq!(ids.len(), 25);
        assert!(leads.iter().all(|lead| lead.action_date.timestamp().is_some()));
        assert!(leads.iter().all(|lead| lead.email.contains('@')));
    }

    #[test]
    fn completed_leads_leave_dashboard_scope_only() {
        let backend = FakeBackend::new(vec![lead("1", "2026-01-01"), lead("2", "2026-01-02")]);
        backend.complete(&LeadId::new("1")).expect("complete should succeed");

        let dashboard = backend
            .fetch_leads(ViewScope::Dashboard)
            .expect("fetch should succeed");
        let everything = backend
            .fetch_leads(ViewScope::LeadPage)
            .expect("fetch should succeed");
        assert_eq!(dashboard.len(), 1);
        assert_eq!(everything.len(), 2);
        assert!(backend.is_done(&LeadId::new("1")));
    }

    #[test]
    fn injected_failures_fire_once_and_are_recorded() {
        let backend = FakeBackend::new(vec![lead("1", "2026-01-01")]);
        backend.fail_next(
            Endpoint::Delete,
            ApiError::Status {
                status: 500,
                message: "boom".to_owned(),
            },
        );

        assert!(backend.delete(&LeadId::new("1")).is_err());
        assert!(backend.delete(&LeadId::new("1")).is_ok());
        assert_eq!(backend.call_count(Endpoint::Delete), 2);
        assert!(backend.lead(&LeadId::new("1")).is_none());
    }

    #[test]
    fn unknown_lead_is_not_found() {
        let backend = FakeBackend::new(Vec::new());
        let error = backend
            .complete(&LeadId::new("missing"))
            .expect_err("unknown lead should fail");
        assert_eq!(error.status(), Some(404));
    }
}
