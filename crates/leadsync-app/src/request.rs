// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::{Lead, LeadId, LeadMetrics, NewLead, Stage, Task, ViewScope};

/// Marker the create endpoint embeds in its body when the email validator
/// rejects an address.
pub const EMAIL_REJECTED_MARKER: &str = "Email format incorrect";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    FetchLeads(ViewScope),
    UpdateTask { lead_id: LeadId, task: Task },
    UpdateStage { lead_id: LeadId, stage: Stage },
    Reschedule { lead_id: LeadId, action_date: String },
    Complete { lead_id: LeadId },
    Delete { lead_id: LeadId },
    FetchMetrics,
    CreateLead(NewLead),
}

impl ApiRequest {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::FetchLeads(_) => "fetch leads",
            Self::UpdateTask { .. } => "update task",
            Self::UpdateStage { .. } => "update stage",
            Self::Reschedule { .. } => "reschedule",
            Self::Complete { .. } => "complete",
            Self::Delete { .. } => "delete",
            Self::FetchMetrics => "fetch metrics",
            Self::CreateLead(_) => "create lead",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiReply {
    Leads(Vec<Lead>),
    Metrics(LeadMetrics),
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("cannot reach {url} -- check [server].base_url and that the backend is running ({message})")]
    Transport { url: String, message: String },
    #[error("server error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("rejected by server validation: {0}")]
    Validation(String),
    #[error("decode {what}: {message}")]
    Decode { what: &'static str, message: String },
}

impl ApiError {
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiOutcome = Result<ApiReply, ApiError>;
