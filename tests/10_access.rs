mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn create_project(
    client: &reqwest::Client,
    server: &common::TestServer,
    assigned_users: &[&str],
) -> Result<String> {
    let res = client
        .post(server.url("/api/projects/create"))
        .bearer_auth(common::admin_token())
        .json(&json!({
            "name": "Riverside Medical Center",
            "project_manager": "pm@example.com",
            "superintendent": "supe@example.com",
            "assigned_users": assigned_users,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    Ok(body["data"]["id"].as_str().expect("project id").to_string())
}

async fn create_task(
    client: &reqwest::Client,
    server: &common::TestServer,
    project_id: &str,
) -> Result<String> {
    let res = client
        .post(server.url("/api/tasks/create"))
        .bearer_auth(common::admin_token())
        .json(&json!({ "project_id": project_id, "title": "Pour footings" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    Ok(body["data"]["id"].as_str().expect("task id").to_string())
}

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/auth/whoami"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "UNAUTHENTICATED");

    let res = client
        .post(server.url("/api/auth/whoami"))
        .header("authorization", "Bearer not-a-real-token")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn whoami_echoes_the_resolved_identity() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/auth/whoami"))
        .bearer_auth(common::user_token("crew@example.com"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["email"], "crew@example.com");
    assert_eq!(body["data"]["role"], "user");
    Ok(())
}

#[tokio::test]
async fn unassigned_user_cannot_read_a_project() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let project_id = create_project(&client, &server, &[]).await?;

    let res = client
        .post(server.url("/api/projects/get"))
        .bearer_auth(common::user_token("stranger@example.com"))
        .json(&json!({ "project_id": project_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "FORBIDDEN");

    // The project manager sees it without being in assigned_users
    let res = client
        .post(server.url("/api/projects/get"))
        .bearer_auth(common::user_token("pm@example.com"))
        .json(&json!({ "project_id": project_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn missing_project_is_not_found_even_for_admin() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/projects/get"))
        .bearer_auth(common::admin_token())
        .json(&json!({ "project_id": "ghost" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn project_list_is_scoped_to_the_caller() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    create_project(&client, &server, &["crew@example.com"]).await?;
    create_project(&client, &server, &[]).await?;

    let res = client
        .post(server.url("/api/projects/list"))
        .bearer_auth(common::user_token("crew@example.com"))
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let res = client
        .post(server.url("/api/projects/list"))
        .bearer_auth(common::admin_token())
        .json(&json!({}))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    Ok(())
}

/// A user outside the project gets 403 and deletes nothing; the same
/// call succeeds once an admin assigns them, and the task disappears
/// from subsequent listings.
#[tokio::test]
async fn task_delete_denied_until_user_is_assigned() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let project_id = create_project(&client, &server, &[]).await?;
    let task_id = create_task(&client, &server, &project_id).await?;

    let outsider = common::user_token("outsider@example.com");

    let res = client
        .post(server.url("/api/tasks/delete"))
        .bearer_auth(&outsider)
        .json(&json!({ "task_id": task_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Nothing was deleted
    let res = client
        .post(server.url("/api/tasks/list"))
        .bearer_auth(common::admin_token())
        .json(&json!({ "project_id": project_id }))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    // Admin assigns the user to the project
    let res = client
        .post(server.url("/api/projects/update"))
        .bearer_auth(common::admin_token())
        .json(&json!({
            "project_id": project_id,
            "assigned_users": ["outsider@example.com"],
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // The same call now succeeds
    let res = client
        .post(server.url("/api/tasks/delete"))
        .bearer_auth(&outsider)
        .json(&json!({ "task_id": task_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(server.url("/api/tasks/list"))
        .bearer_auth(&outsider)
        .json(&json!({ "project_id": project_id }))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn member_cannot_update_the_project_itself() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = reqwest::Client::new();
    let project_id = create_project(&client, &server, &["crew@example.com"]).await?;

    let res = client
        .post(server.url("/api/projects/update"))
        .bearer_auth(common::user_token("crew@example.com"))
        .json(&json!({ "project_id": project_id, "name": "Hijacked" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Manager tier may update
    let res = client
        .post(server.url("/api/projects/update"))
        .bearer_auth(common::user_token("pm@example.com"))
        .json(&json!({ "project_id": project_id, "name": "Riverside Phase II" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["name"], "Riverside Phase II");
    Ok(())
}
