// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::ids::*;

pub const DASHBOARD_ROW_CAP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Contact,
    FollowUp,
    Reply,
}

impl Task {
    pub const ALL: [Self; 3] = [Self::Contact, Self::FollowUp, Self::Reply];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::FollowUp => "follow_up",
            Self::Reply => "reply",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contact" => Some(Self::Contact),
            "follow_up" => Some(Self::FollowUp),
            "reply" => Some(Self::Reply),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Contact => "Contact",
            Self::FollowUp => "Follow up",
            Self::Reply => "Reply",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self, 1)
    }

    pub fn prev(self) -> Self {
        cycle(&Self::ALL, self, -1)
    }
}

/// Pipeline phase. `Won` and `Lost` are capitalized on the wire; the backend
/// compares them verbatim when computing metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "contacted")]
    Contacted,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "Won")]
    Won,
    #[serde(rename = "Lost")]
    Lost,
}

impl Stage {
    pub const ALL: [Self; 5] = [
        Self::New,
        Self::Contacted,
        Self::InProgress,
        Self::Won,
        Self::Lost,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::InProgress => "in_progress",
            Self::Won => "Won",
            Self::Lost => "Lost",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "in_progress" => Some(Self::InProgress),
            "Won" => Some(Self::Won),
            "Lost" => Some(Self::Lost),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Contacted => "Contacted",
            Self::InProgress => "In Progress",
            Self::Won => "Won",
            Self::Lost => "Lost",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self, 1)
    }

    pub fn prev(self) -> Self {
        cycle(&Self::ALL, self, -1)
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, delta: isize) -> T {
    let index = all.iter().position(|item| *item == current).unwrap_or(0) as isize;
    let len = all.len() as isize;
    all[(index + delta).rem_euclid(len) as usize]
}

/// Scheduled action date as sent by the server. The raw text is what gets
/// displayed; the parsed timestamp only drives ordering.
#[derive(Debug, Clone)]
pub struct ActionDate {
    raw: String,
    parsed: Option<PrimitiveDateTime>,
}

impl ActionDate {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = parse_action_date(&raw);
        Self { raw, parsed }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let parsed = parse_action_date(raw)?;
        Some(Self {
            raw: raw.trim().to_owned(),
            parsed: Some(parsed),
        })
    }

    /// Outgoing dates: the backend only takes a bare `YYYY-MM-DD`.
    pub fn parse_day(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let date = Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()?;
        Some(Self {
            raw: raw.to_owned(),
            parsed: Some(PrimitiveDateTime::new(date, Time::MIDNIGHT)),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn timestamp(&self) -> Option<PrimitiveDateTime> {
        self.parsed
    }

    pub fn date(&self) -> Option<Date> {
        self.parsed.map(PrimitiveDateTime::date)
    }

    /// Most-future first; dates the client cannot read sink to the bottom.
    pub fn cmp_descending(&self, other: &Self) -> Ordering {
        other.parsed.cmp(&self.parsed)
    }
}

impl PartialEq for ActionDate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for ActionDate {}

impl Serialize for ActionDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ActionDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self::new(raw.unwrap_or_default()))
    }
}

fn parse_action_date(raw: &str) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        let utc = value.to_offset(UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(utc.date(), utc.time()));
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    ) {
        return Some(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Some(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    ) {
        return Some(value);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub im: String,
    pub company_name: String,
    pub agent_name: String,
    pub email: String,
    pub task: Task,
    /// `None` when the backend has no stage on record or sends one this
    /// client does not know.
    #[serde(default, deserialize_with = "lenient_stage")]
    pub stage: Option<Stage>,
    pub action_date: ActionDate,
}

fn lenient_stage<'de, D>(deserializer: D) -> Result<Option<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Stage::parse))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeadMetrics {
    pub tasks_status: i64,
    pub tasks_due_count: i64,
    pub tasks_open: i64,
}

/// Server-side filter a view's fetch asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewScope {
    Dashboard,
    LeadPage,
}

impl ViewScope {
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::LeadPage => "leadpage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationPolicy {
    OptimisticLocal,
    PessimisticReload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCap {
    Limited(usize),
    Unlimited,
}

impl RowCap {
    pub fn visible(self, available: usize) -> usize {
        match self {
            Self::Limited(limit) => available.min(limit),
            Self::Unlimited => available,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowActionKind {
    Complete,
    Reschedule,
    Delete,
}

impl RowActionKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Complete => "Complete",
            Self::Reschedule => "Reschedule",
            Self::Delete => "Delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditField {
    Task,
    Stage,
}

impl EditField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Stage => "stage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewKind {
    Dashboard,
    LeadsPage,
}

impl ViewKind {
    pub const ALL: [Self; 2] = [Self::Dashboard, Self::LeadsPage];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::LeadsPage => "leads",
        }
    }

    pub const fn scope(self) -> ViewScope {
        match self {
            Self::Dashboard => ViewScope::Dashboard,
            Self::LeadsPage => ViewScope::LeadPage,
        }
    }

    pub const fn policy(self) -> ReconciliationPolicy {
        match self {
            Self::Dashboard => ReconciliationPolicy::OptimisticLocal,
            Self::LeadsPage => ReconciliationPolicy::PessimisticReload,
        }
    }

    pub const fn row_cap(self) -> RowCap {
        match self {
            Self::Dashboard => RowCap::Limited(DASHBOARD_ROW_CAP),
            Self::LeadsPage => RowCap::Unlimited,
        }
    }

    pub const fn actions(self) -> &'static [RowActionKind] {
        match self {
            Self::Dashboard => &[RowActionKind::Complete, RowActionKind::Reschedule],
            Self::LeadsPage => &[RowActionKind::Reschedule, RowActionKind::Delete],
        }
    }

    pub fn offers(self, action: RowActionKind) -> bool {
        self.actions().contains(&action)
    }

    pub const fn toggle(self) -> Self {
        match self {
            Self::Dashboard => Self::LeadsPage,
            Self::LeadsPage => Self::Dashboard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionDate, Lead, RowCap, Stage, Task, ViewKind};
    use crate::LeadId;
    use std::cmp::Ordering;

    #[test]
    fn stage_wire_names_keep_capitalized_terminal_states() {
        assert_eq!(Stage::Won.as_str(), "Won");
        assert_eq!(Stage::parse("Lost"), Some(Stage::Lost));
        assert_eq!(Stage::parse("lost"), None);
        assert_eq!(Stage::parse("in_progress"), Some(Stage::InProgress));
    }

    #[test]
    fn task_and_stage_cycle_wraps() {
        assert_eq!(Task::Reply.next(), Task::Contact);
        assert_eq!(Task::Contact.prev(), Task::Reply);
        assert_eq!(Stage::Lost.next(), Stage::New);
    }

    #[test]
    fn action_date_accepts_server_and_form_shapes() {
        for raw in [
            "2026-03-01",
            "2026-03-01T09:30",
            "2026-03-01T09:30:00",
            "2026-03-01 09:30:00",
            "2026-03-01T09:30:00.250000",
            "2026-03-01T09:30:00Z",
        ] {
            assert!(ActionDate::parse(raw).is_some(), "failed to parse {raw}");
        }
        assert!(ActionDate::parse("next tuesday").is_none());
        assert!(ActionDate::parse("").is_none());
    }

    #[test]
    fn outgoing_dates_must_be_bare_days() {
        assert_eq!(
            ActionDate::parse_day(" 2026-05-01 ").map(|date| date.as_str().to_owned()),
            Some("2026-05-01".to_owned())
        );
        assert!(ActionDate::parse_day("2026-05-01T10:00").is_none());
        assert!(ActionDate::parse_day("2026-05-01T10:00:00Z").is_none());
        assert!(ActionDate::parse_day("2026-02-30").is_none());
    }

    #[test]
    fn unreadable_dates_sort_after_readable_ones() {
        let readable = ActionDate::new("2020-01-01");
        let unreadable = ActionDate::new("soon");
        assert_eq!(readable.cmp_descending(&unreadable), Ordering::Less);
        assert_eq!(unreadable.cmp_descending(&readable), Ordering::Greater);
    }

    #[test]
    fn lead_decodes_numeric_ids_and_wire_enums() -> serde_json::Result<()> {
        let lead: Lead = serde_json::from_str(
            r#"{"id":42,"im":"IM-1","company_name":"Acme","agent_name":"Ana","email":"ana@acme.io","task":"follow_up","stage":"Won","action_date":"2026-02-01"}"#,
        )?;
        assert_eq!(lead.id, LeadId::new("42"));
        assert_eq!(lead.task, Task::FollowUp);
        assert_eq!(lead.stage, Some(Stage::Won));
        assert_eq!(lead.action_date.as_str(), "2026-02-01");
        Ok(())
    }

    #[test]
    fn missing_or_unknown_stage_does_not_sink_the_list() -> serde_json::Result<()> {
        let leads: Vec<Lead> = serde_json::from_str(
            r#"[
                {"id":1,"im":"IM-1","company_name":"Acme","agent_name":"Ana","email":"ana@acme.io","task":"contact","stage":"new","action_date":"2026-02-01"},
                {"id":2,"im":"IM-2","company_name":"Acme","agent_name":"Bo","email":"bo@acme.io","task":"reply","stage":null,"action_date":"2026-02-02"},
                {"id":3,"im":"IM-3","company_name":"Acme","agent_name":"Cy","email":"cy@acme.io","task":"reply","stage":"archived","action_date":"2026-02-03"},
                {"id":4,"im":"IM-4","company_name":"Acme","agent_name":"Di","email":"di@acme.io","task":"reply","action_date":"2026-02-04"}
            ]"#,
        )?;
        let stages = leads.iter().map(|lead| lead.stage).collect::<Vec<_>>();
        assert_eq!(stages, vec![Some(Stage::New), None, None, None]);
        Ok(())
    }

    #[test]
    fn views_differ_in_cap_and_actions() {
        assert_eq!(ViewKind::Dashboard.row_cap(), RowCap::Limited(5));
        assert_eq!(ViewKind::LeadsPage.row_cap(), RowCap::Unlimited);
        assert!(ViewKind::Dashboard.offers(super::RowActionKind::Complete));
        assert!(!ViewKind::Dashboard.offers(super::RowActionKind::Delete));
        assert!(ViewKind::LeadsPage.offers(super::RowActionKind::Delete));
        assert_eq!(RowCap::Limited(5).visible(12), 5);
        assert_eq!(RowCap::Unlimited.visible(12), 12);
    }
}
