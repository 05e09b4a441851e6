mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use sitework_api::store::{EntityKind, EntityStore};

struct Seeded {
    project_id: String,
    task_id: String,
}

/// Build a project with dependents in every collection the cascade
/// covers, through the public API.
async fn seed_project(client: &reqwest::Client, server: &common::TestServer) -> Result<Seeded> {
    let admin = common::admin_token();

    let res = client
        .post(server.url("/api/projects/create"))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Harbor Point Garage",
            "project_manager": "pm@example.com",
            "superintendent": "supe@example.com",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let project_id = body["data"]["id"].as_str().expect("project id").to_string();

    let mut task_id = String::new();
    for title in ["Excavate", "Form and pour"] {
        let res = client
            .post(server.url("/api/tasks/create"))
            .bearer_auth(&admin)
            .json(&json!({ "project_id": project_id, "title": title }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await?;
        task_id = body["data"]["id"].as_str().expect("task id").to_string();
    }

    let res = client
        .post(server.url("/api/rfis/create"))
        .bearer_auth(&admin)
        .json(&json!({
            "project_id": project_id,
            "subject": "Rebar spacing",
            "question": "Drawing S-201 conflicts with the spec. Which governs?",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(server.url("/api/cost-codes/create"))
        .bearer_auth(&admin)
        .json(&json!({
            "project_id": project_id,
            "code": "03-3000",
            "budget": "125000.00",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let cost_code_id = body["data"]["id"].as_str().expect("cost code id").to_string();

    let res = client
        .post(server.url("/api/financials/create"))
        .bearer_auth(&admin)
        .json(&json!({
            "project_id": project_id,
            "description": "Cast-in-place concrete",
            "amount": "118400.00",
            "cost_code_id": cost_code_id,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(server.url("/api/documents/create"))
        .bearer_auth(&admin)
        .json(&json!({ "project_id": project_id, "title": "Structural drawings" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let document_id = body["data"]["id"].as_str().expect("document id").to_string();

    let res = client
        .post(server.url("/api/documents/link"))
        .bearer_auth(&admin)
        .json(&json!({
            "document_id": document_id,
            "target_kind": "tasks",
            "target_id": task_id,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    Ok(Seeded { project_id, task_id })
}

#[tokio::test]
async fn non_admins_cannot_create_or_delete_projects() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let user = common::user_token("pm@example.com");

    let res = client
        .post(server.url("/api/projects/create"))
        .bearer_auth(&user)
        .json(&json!({
            "name": "Unauthorized",
            "project_manager": "pm@example.com",
            "superintendent": "supe@example.com",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let seeded = seed_project(&client, &server).await?;
    let res = client
        .post(server.url("/api/projects/delete"))
        .bearer_auth(&user)
        .json(&json!({ "project_id": seeded.project_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn cascade_delete_removes_every_dependent() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let seeded = seed_project(&client, &server).await?;

    let res = client
        .post(server.url("/api/projects/delete"))
        .bearer_auth(common::admin_token())
        .json(&json!({ "project_id": seeded.project_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["deleted"]["tasks"], 2);
    assert_eq!(body["data"]["deleted"]["rfis"], 1);
    assert_eq!(body["data"]["deleted"]["financial_lines"], 1);
    assert_eq!(body["data"]["deleted"]["cost_codes"], 1);
    assert_eq!(body["data"]["deleted"]["documents"], 1);
    assert_eq!(body["data"]["deleted"]["document_links"], 1);
    assert_eq!(body["data"]["deleted"]["projects"], 1);
    assert_eq!(body["data"]["errors"].as_array().map(Vec::len), Some(0));
    assert!(body.get("warning").is_none());

    // The project is gone
    let res = client
        .post(server.url("/api/projects/get"))
        .bearer_auth(common::admin_token())
        .json(&json!({ "project_id": seeded.project_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // And the store holds no dependents for it
    for kind in EntityKind::PROJECT_SCOPED {
        assert_eq!(server.store.count(kind), 0, "leftover {} records", kind);
    }

    // A follow-up integrity check sees no orphans
    let res = client
        .post(server.url("/api/admin/integrity-check"))
        .bearer_auth(common::admin_token())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["total_issues"], 0);
    Ok(())
}

#[tokio::test]
async fn cascade_delete_is_idempotent() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let seeded = seed_project(&client, &server).await?;

    for expected_total in [8, 0] {
        let res = client
            .post(server.url("/api/projects/delete"))
            .bearer_auth(common::admin_token())
            .json(&json!({ "project_id": seeded.project_id }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await?;
        assert_eq!(body["data"]["total_deleted"], expected_total);
        assert_eq!(body["data"]["errors"].as_array().map(Vec::len), Some(0));
    }
    Ok(())
}

#[tokio::test]
async fn privileged_mutations_leave_an_audit_trail() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let seeded = seed_project(&client, &server).await?;

    let res = client
        .post(server.url("/api/projects/delete"))
        .bearer_auth(common::admin_token())
        .json(&json!({ "project_id": seeded.project_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let records = server.store.list(EntityKind::AuditLog, None).await?;
    assert!(!records.is_empty());

    let actions: Vec<&str> = records
        .iter()
        .filter_map(|r| r.get("action").and_then(|v| v.as_str()))
        .collect();
    assert!(actions.contains(&"project.create"));
    assert!(actions.contains(&"task.create"));
    assert!(actions.contains(&"project.delete"));

    let delete_entry = records
        .iter()
        .find(|r| r.get("action").and_then(|v| v.as_str()) == Some("project.delete"))
        .expect("project.delete entry");
    assert_eq!(
        delete_entry.get("user_email").and_then(|v| v.as_str()),
        Some("admin@example.com")
    );
    assert!(delete_entry.get("timestamp").is_some());

    // Audit logs survive the cascade: they are never project-scoped
    assert_eq!(server.store.count(EntityKind::Task), 0);
    assert!(server.store.count(EntityKind::AuditLog) > 0);

    // The delete entry records what the cascade removed
    assert_eq!(delete_entry["details"]["deleted"]["tasks"], 2);
    Ok(())
}

#[tokio::test]
async fn schedule_changes_are_recorded_in_task_history() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let seeded = seed_project(&client, &server).await?;

    let res = client
        .post(server.url("/api/tasks/update"))
        .bearer_auth(common::user_token("pm@example.com"))
        .json(&json!({
            "task_id": seeded.task_id,
            "start_date": "2026-09-01",
            "end_date": "2026-09-20",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let records = server.store.list(EntityKind::ScheduleAuditLog, None).await?;
    assert_eq!(records.len(), 2); // one entry per changed date field

    let fields: Vec<&str> = records
        .iter()
        .filter_map(|r| r.get("field").and_then(|v| v.as_str()))
        .collect();
    assert!(fields.contains(&"start_date"));
    assert!(fields.contains(&"end_date"));
    assert_eq!(
        records[0].get("changed_by").and_then(|v| v.as_str()),
        Some("pm@example.com")
    );
    Ok(())
}
