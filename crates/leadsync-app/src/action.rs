// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{ControlKind, LeadId, NewLead, RowActionKind, RowControl, Stage, Task, ViewKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    TaskChanged {
        view: ViewKind,
        lead_id: LeadId,
        task: Task,
    },
    StageChanged {
        view: ViewKind,
        lead_id: LeadId,
        stage: Stage,
    },
    Completed {
        view: ViewKind,
        lead_id: LeadId,
    },
    Deleted {
        view: ViewKind,
        lead_id: LeadId,
    },
    RescheduleRequested {
        view: ViewKind,
        lead_id: LeadId,
    },
    RescheduleSubmitted {
        action_date: String,
    },
    RescheduleCancelled,
    LeadSubmitted(NewLead),
    ViewOpened(ViewKind),
    ReloadRequested(ViewKind),
    MetricsRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Changed(String),
    Clicked,
}

/// Turns an event on a row control into an action. Pairs that make no sense
/// (a click on a selector, an unknown option value) classify to `None`.
pub fn classify(view: ViewKind, control: &RowControl, event: ControlEvent) -> Option<UiAction> {
    let lead_id = control.lead_id.clone();
    match (control.kind, event) {
        (ControlKind::TaskSelect, ControlEvent::Changed(value)) => {
            Task::parse(&value).map(|task| UiAction::TaskChanged {
                view,
                lead_id,
                task,
            })
        }
        (ControlKind::StageSelect, ControlEvent::Changed(value)) => {
            Stage::parse(&value).map(|stage| UiAction::StageChanged {
                view,
                lead_id,
                stage,
            })
        }
        (ControlKind::Action(action), ControlEvent::Clicked) => Some(match action {
            RowActionKind::Complete => UiAction::Completed { view, lead_id },
            RowActionKind::Delete => UiAction::Deleted { view, lead_id },
            RowActionKind::Reschedule => UiAction::RescheduleRequested { view, lead_id },
        }),
        _ => None,
    }
}
