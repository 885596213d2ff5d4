// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use leadsync_app::{
    ApiError, ApiOutcome, ApiReply, ApiRequest, EMAIL_REJECTED_MARKER, Lead, LeadId, LeadMetrics,
    NewLead, Stage, Task, ViewScope,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{ACCEPT, COOKIE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// The backend operations the session issues. The HTTP client implements it
/// for real; tests swap in an in-memory store.
pub trait LeadsApi {
    fn fetch_leads(&self, scope: ViewScope) -> Result<Vec<Lead>, ApiError>;
    fn update_task(&self, lead_id: &LeadId, task: Task) -> Result<(), ApiError>;
    fn update_stage(&self, lead_id: &LeadId, stage: Stage) -> Result<(), ApiError>;
    fn reschedule(&self, lead_id: &LeadId, action_date: &str) -> Result<(), ApiError>;
    fn complete(&self, lead_id: &LeadId) -> Result<(), ApiError>;
    fn delete(&self, lead_id: &LeadId) -> Result<(), ApiError>;
    fn fetch_metrics(&self) -> Result<LeadMetrics, ApiError>;
    fn create_lead(&self, lead: &NewLead) -> Result<Option<LeadId>, ApiError>;
}

/// Carries out one queued request and packages the result for
/// `Session::handle_reply`.
pub fn perform<A: LeadsApi + ?Sized>(api: &A, request: &ApiRequest) -> ApiOutcome {
    let outcome = match request {
        ApiRequest::FetchLeads(scope) => api.fetch_leads(*scope).map(ApiReply::Leads),
        ApiRequest::UpdateTask { lead_id, task } => {
            api.update_task(lead_id, *task).map(|()| ApiReply::Accepted)
        }
        ApiRequest::UpdateStage { lead_id, stage } => {
            api.update_stage(lead_id, *stage).map(|()| ApiReply::Accepted)
        }
        ApiRequest::Reschedule {
            lead_id,
            action_date,
        } => api
            .reschedule(lead_id, action_date)
            .map(|()| ApiReply::Accepted),
        ApiRequest::Complete { lead_id } => api.complete(lead_id).map(|()| ApiReply::Accepted),
        ApiRequest::Delete { lead_id } => api.delete(lead_id).map(|()| ApiReply::Accepted),
        ApiRequest::FetchMetrics => api.fetch_metrics().map(ApiReply::Metrics),
        ApiRequest::CreateLead(lead) => api.create_lead(lead).map(|_| ApiReply::Accepted),
    };
    if let Err(error) = &outcome {
        warn!(kind = request.label(), %error, "request failed");
    }
    outcome
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    session: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, session: Option<&str>, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("server.base_url must not be empty");
        }
        let base_url = Url::parse(trimmed).with_context(|| {
            format!("server.base_url {trimmed:?} is not a URL -- use a form like http://localhost:8000")
        })?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            bail!(
                "server.base_url must be an http(s) URL, got {:?}",
                base_url.as_str()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            session: session
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn lead_url(&self, lead_id: &LeadId, action: &str) -> Url {
        self.url(&["api", "leads", lead_id.as_str(), action])
    }

    /// Sends the request and returns the status with the full body text.
    fn execute(&self, builder: RequestBuilder) -> Result<(StatusCode, String), ApiError> {
        let mut builder = builder.header(ACCEPT, "application/json");
        if let Some(session) = &self.session {
            builder = builder.header(COOKIE, format!("id={session}"));
        }
        let response = builder
            .send()
            .map_err(|error| connection_error(self.base_url(), &error))?;
        let status = response.status();
        let body = response.text().map_err(|error| ApiError::Decode {
            what: "response body",
            message: error.to_string(),
        })?;
        debug!(status = status.as_u16(), bytes = body.len(), "response received");
        Ok((status, body))
    }

    fn expect_success(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        let (status, body) = self.execute(builder)?;
        if !status.is_success() {
            return Err(clean_error_response(status, &body));
        }
        Ok(body)
    }
}

impl LeadsApi for Client {
    fn fetch_leads(&self, scope: ViewScope) -> Result<Vec<Lead>, ApiError> {
        let mut url = self.url(&["api", "getleads"]);
        url.query_pairs_mut().append_pair("source", scope.as_query());
        let body = self.expect_success(self.http.get(url))?;
        let envelope: LeadsEnvelope = decode("lead list", &body)?;
        Ok(envelope.leads)
    }

    fn update_task(&self, lead_id: &LeadId, task: Task) -> Result<(), ApiError> {
        let request = self
            .http
            .patch(self.lead_url(lead_id, "task"))
            .json(&serde_json::json!({ "task": task.as_str() }));
        self.expect_success(request).map(|_| ())
    }

    fn update_stage(&self, lead_id: &LeadId, stage: Stage) -> Result<(), ApiError> {
        let request = self
            .http
            .patch(self.lead_url(lead_id, "stage"))
            .json(&serde_json::json!({ "stage": stage.as_str() }));
        self.expect_success(request).map(|_| ())
    }

    fn reschedule(&self, lead_id: &LeadId, action_date: &str) -> Result<(), ApiError> {
        let request = self
            .http
            .patch(self.lead_url(lead_id, "reschedule"))
            .json(&serde_json::json!({ "action_date": action_date }));
        self.expect_success(request).map(|_| ())
    }

    fn complete(&self, lead_id: &LeadId) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.lead_url(lead_id, "complete"))
            .json(&serde_json::json!({}));
        self.expect_success(request).map(|_| ())
    }

    fn delete(&self, lead_id: &LeadId) -> Result<(), ApiError> {
        let request = self
            .http
            .delete(self.lead_url(lead_id, "delete"))
            .json(&serde_json::json!({ "leadId": lead_id }));
        self.expect_success(request).map(|_| ())
    }

    fn fetch_metrics(&self) -> Result<LeadMetrics, ApiError> {
        let body = self.expect_success(self.http.get(self.url(&["api", "leads", "metrics"])))?;
        decode("metrics", &body)
    }

    fn create_lead(&self, lead: &NewLead) -> Result<Option<LeadId>, ApiError> {
        let request = self.http.post(self.url(&["api", "leads"])).json(lead);
        let (status, body) = self.execute(request)?;
        // The validator's rejection is recognized by body text, whatever the
        // status code.
        if body.contains(EMAIL_REJECTED_MARKER) {
            return Err(ApiError::Validation(EMAIL_REJECTED_MARKER.to_owned()));
        }
        if !status.is_success() {
            return Err(clean_error_response(status, &body));
        }
        let created: CreatedEnvelope = decode("create lead response", &body)?;
        Ok(created.id)
    }
}

fn decode<T: DeserializeOwned>(what: &'static str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|error| ApiError::Decode {
        what,
        message: error.to_string(),
    })
}

fn connection_error(base_url: &str, error: &reqwest::Error) -> ApiError {
    ApiError::Transport {
        url: base_url.to_owned(),
        message: error.to_string(),
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> ApiError {
    let status = status.as_u16();
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.detail.or(parsed.error)
        && !message.is_empty()
    {
        return ApiError::Status { status, message };
    }

    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return ApiError::Status {
            status,
            message: body.trim().to_owned(),
        };
    }

    ApiError::Status {
        status,
        message: "request rejected".to_owned(),
    }
}

#[derive(Debug, Deserialize)]
struct LeadsEnvelope {
    leads: Vec<Lead>,
}

#[derive(Debug, Deserialize)]
struct CreatedEnvelope {
    #[serde(default)]
    id: Option<LeadId>,
}

/// Error bodies come in two shapes: `{"detail": ...}` from raised HTTP
/// errors and `{"ok": false, "error": ...}` from hand-built responses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<String>,
    error: Option<String>,
}
