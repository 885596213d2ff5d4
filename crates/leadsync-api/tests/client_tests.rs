// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use leadsync_api::{Client, LeadsApi, perform};
use leadsync_app::{
    ApiError, ApiReply, ApiRequest, LeadId, NewLead, Stage, Task, ViewScope,
};
use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

struct Captured {
    method: String,
    url: String,
    body: String,
    cookie: Option<String>,
    accept: Option<String>,
}

fn serve_once(status: u16, reply: &'static str) -> Result<(String, JoinHandle<Captured>)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("request body should read");
        let header = |name: &'static str| {
            request
                .headers()
                .iter()
                .find(|header| header.field.equiv(name))
                .map(|header| header.value.as_str().to_owned())
        };
        let captured = Captured {
            method: request.method().to_string(),
            url: request.url().to_owned(),
            body,
            cookie: header("Cookie"),
            accept: header("Accept"),
        };
        let response = Response::from_string(reply)
            .with_status_code(status)
            .with_header(
                Header::from_bytes("Content-Type", "application/json")
                    .expect("valid content type header"),
            );
        request.respond(response).expect("response should succeed");
        captured
    });

    Ok((addr, handle))
}

fn join(handle: JoinHandle<Captured>) -> Captured {
    handle.join().expect("server thread should join")
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let client = Client::new("http://127.0.0.1:1", None, Duration::from_millis(50))
        .expect("client should initialize");

    let error = client
        .fetch_metrics()
        .expect_err("metrics should fail for unreachable endpoint");
    assert!(error.is_transport());
    assert!(error.to_string().contains("[server].base_url"));
}

#[test]
fn fetch_leads_sends_scope_cookie_and_accept() -> Result<()> {
    let (addr, handle) = serve_once(
        200,
        r#"{"ok":true,"leads":[{"id":12,"im":"IM-12","company_name":"Acme","agent_name":"Kai","email":"kai@acme.test","task":"follow_up","stage":"in_progress","action_date":"2026-04-01T09:30:00"}]}"#,
    )?;

    let client = Client::new(&addr, Some("s3ss10n"), Duration::from_secs(1))?;
    let leads = client.fetch_leads(ViewScope::LeadPage)?;

    let captured = join(handle);
    assert_eq!(captured.method, "GET");
    assert_eq!(captured.url, "/api/getleads?source=leadpage");
    assert_eq!(captured.cookie.as_deref(), Some("id=s3ss10n"));
    assert_eq!(captured.accept.as_deref(), Some("application/json"));

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].id, LeadId::new("12"));
    assert_eq!(leads[0].task, Task::FollowUp);
    assert_eq!(leads[0].stage, Some(Stage::InProgress));
    Ok(())
}

#[test]
fn stage_edit_patches_wire_value() -> Result<()> {
    let (addr, handle) = serve_once(200, r#"{"ok":true}"#)?;

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    client.update_stage(&LeadId::new("7"), Stage::Won)?;

    let captured = join(handle);
    assert_eq!(captured.method, "PATCH");
    assert_eq!(captured.url, "/api/leads/7/stage");
    let body: serde_json::Value = serde_json::from_str(&captured.body)?;
    assert_eq!(body, serde_json::json!({ "stage": "Won" }));
    assert_eq!(captured.cookie, None);
    Ok(())
}

#[test]
fn delete_sends_lead_id_in_body() -> Result<()> {
    let (addr, handle) = serve_once(200, r#"{"ok":true}"#)?;

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    client.delete(&LeadId::new("9"))?;

    let captured = join(handle);
    assert_eq!(captured.method, "DELETE");
    assert_eq!(captured.url, "/api/leads/9/delete");
    let body: serde_json::Value = serde_json::from_str(&captured.body)?;
    assert_eq!(body, serde_json::json!({ "leadId": "9" }));
    Ok(())
}

#[test]
fn complete_posts_empty_object_through_perform() -> Result<()> {
    let (addr, handle) = serve_once(200, r#"{"ok":true,"lead_id":"3"}"#)?;

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    let reply = perform(
        &client,
        &ApiRequest::Complete {
            lead_id: LeadId::new("3"),
        },
    )?;
    assert_eq!(reply, ApiReply::Accepted);

    let captured = join(handle);
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.url, "/api/leads/3/complete");
    assert_eq!(captured.body, "{}");
    Ok(())
}

#[test]
fn status_errors_carry_server_detail() -> Result<()> {
    let (addr, handle) = serve_once(404, r#"{"detail":"Lead not found"}"#)?;

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    let error = client
        .update_task(&LeadId::new("404"), Task::Reply)
        .expect_err("missing lead should fail");
    join(handle);

    assert_eq!(
        error,
        ApiError::Status {
            status: 404,
            message: "Lead not found".to_owned(),
        }
    );
    assert!(!error.is_transport());
    Ok(())
}

#[test]
fn metrics_decode_verbatim() -> Result<()> {
    let (addr, handle) = serve_once(
        200,
        r#"{"ok":true,"tasks_status":4,"tasks_due_count":2,"tasks_open":11}"#,
    )?;

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    let metrics = client.fetch_metrics()?;
    let captured = join(handle);

    assert_eq!(captured.url, "/api/leads/metrics");
    assert_eq!(metrics.tasks_status, 4);
    assert_eq!(metrics.tasks_due_count, 2);
    assert_eq!(metrics.tasks_open, 11);
    Ok(())
}

#[test]
fn create_lead_detects_email_rejection() -> Result<()> {
    let (addr, handle) = serve_once(400, r#"{"ok":false,"error":"Email format incorrect"}"#)?;

    let client = Client::new(&addr, Some("abc"), Duration::from_secs(1))?;
    let lead = NewLead {
        im: "IM-9".to_owned(),
        company_name: "Globex".to_owned(),
        agent_name: "Rowan".to_owned(),
        email: "nope".to_owned(),
        task: Task::Contact,
        date: "2026-06-01".to_owned(),
    };
    let error = client
        .create_lead(&lead)
        .expect_err("rejected email should fail");

    let captured = join(handle);
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.url, "/api/leads");
    let body: serde_json::Value = serde_json::from_str(&captured.body)?;
    assert_eq!(body["email"], "nope");
    assert_eq!(body["task"], "contact");
    assert!(matches!(error, ApiError::Validation(_)));
    Ok(())
}

#[test]
fn create_lead_returns_new_id() -> Result<()> {
    let (addr, handle) = serve_once(200, r#"{"ok":true,"id":55}"#)?;

    let client = Client::new(&addr, None, Duration::from_secs(1))?;
    let id = client.create_lead(&NewLead {
        im: "IM-55".to_owned(),
        company_name: "Initech".to_owned(),
        agent_name: "Drew".to_owned(),
        email: "drew@initech.test".to_owned(),
        task: Task::Reply,
        date: "2026-06-02T08:00".to_owned(),
    })?;
    join(handle);

    assert_eq!(id, Some(LeadId::new("55")));
    Ok(())
}
