//! HTTP API tests through the router, with the provider disabled.

mod common;

use axum::http::{header, StatusCode};
use serde_json::json;

use campaigns::queue::Schedule;
use campaigns::store::{CampaignRepo, CampaignStatus};

use common::{
    body_json, empty_request, json_request, upload_request, MemoryQueue, TestApp, ADMIN_EMAIL,
    RECIPIENTS_CSV, USER_EMAIL,
};

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let response = app.send(empty_request("GET", "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_login_success_sets_cookie() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            "POST",
            "/api/login",
            None,
            &json!({ "email": ADMIN_EMAIL, "password": "password" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["uid"], app.admin.id);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            "POST",
            "/api/login",
            None,
            &json!({ "email": ADMIN_EMAIL, "password": "nope" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_session_roundtrip_and_logout() {
    let app = TestApp::new().await;

    let anonymous = app.send(empty_request("GET", "/api/session", None)).await;
    assert_eq!(body_json(anonymous).await, json!({ "user": null }));

    let cookie = app.login(USER_EMAIL).await;
    let session = app.send(empty_request("GET", "/api/session", Some(&cookie))).await;
    let body = body_json(session).await;
    assert_eq!(body["user"]["email"], USER_EMAIL);
    assert_eq!(body["user"]["role"], "standard");

    let logout = app.send(empty_request("POST", "/api/logout", Some(&cookie))).await;
    let cleared = logout.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(body_json(logout).await, json!({ "success": true }));
}

#[tokio::test]
async fn test_forged_cookie_is_unauthorized() {
    let app = TestApp::new().await;
    let response = app
        .send(empty_request("GET", "/api/campaigns", Some("session=abc.def")))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "message": "Unauthorized" }));
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_users_require_admin() {
    let app = TestApp::new().await;

    let anonymous = app.send(empty_request("GET", "/api/users", None)).await;
    assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);

    let cookie = app.login(USER_EMAIL).await;
    let standard = app.send(empty_request("GET", "/api/users", Some(&cookie))).await;
    assert_eq!(standard.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_crud() {
    let app = TestApp::new().await;
    let cookie = app.login(ADMIN_EMAIL).await;

    let created = app
        .send(json_request(
            "POST",
            "/api/users",
            Some(&cookie),
            &json!({ "email": "new@example.com", "password": "secret" }),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = body_json(created).await;
    assert_eq!(created["role"], "standard");
    let uid = created["uid"].as_i64().unwrap();

    let duplicate = app
        .send(json_request(
            "POST",
            "/api/users",
            Some(&cookie),
            &json!({ "email": "new@example.com", "password": "other" }),
        ))
        .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let updated = app
        .send(json_request(
            "PUT",
            &format!("/api/users/{uid}"),
            Some(&cookie),
            &json!({ "role": "admin", "password": "" }),
        ))
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(body_json(updated).await["role"], "admin");

    let taken = app
        .send(json_request(
            "PUT",
            &format!("/api/users/{uid}"),
            Some(&cookie),
            &json!({ "email": USER_EMAIL }),
        ))
        .await;
    assert_eq!(taken.status(), StatusCode::BAD_REQUEST);

    let listed = app.send(empty_request("GET", "/api/users", Some(&cookie))).await;
    assert_eq!(body_json(listed).await.as_array().unwrap().len(), 3);

    let deleted = app
        .send(empty_request("DELETE", &format!("/api/users/{uid}"), Some(&cookie)))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let missing = app
        .send(empty_request("DELETE", &format!("/api/users/{uid}"), Some(&cookie)))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let unknown = app
        .send(json_request("PUT", "/api/users/999", Some(&cookie), &json!({ "role": "admin" })))
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = TestApp::new().await;
    let cookie = app.login(ADMIN_EMAIL).await;

    let response = app
        .send(empty_request("DELETE", &format!("/api/users/{}", app.admin.id), Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Templates
// =============================================================================

#[tokio::test]
async fn test_templates_sample_without_provider() {
    let app = TestApp::new().await;
    let cookie = app.login(USER_EMAIL).await;

    let response = app.send(empty_request("GET", "/api/templates", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!([{ "sid": "HX123", "friendly_name": "egresados_bienvenida", "body": "Cuerpo de ejemplo." }])
    );
}

#[tokio::test]
async fn test_template_creation_validation() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN_EMAIL).await;
    let user = app.login(USER_EMAIL).await;
    let payload = json!({ "name": "egresados_x", "type": "twilio/text", "body": "Hola {{1}}" });

    let standard = app
        .send(json_request("POST", "/api/templates", Some(&user), &payload))
        .await;
    assert_eq!(standard.status(), StatusCode::FORBIDDEN);

    let media_without_url = app
        .send(json_request(
            "POST",
            "/api/templates",
            Some(&admin),
            &json!({ "name": "egresados_x", "type": "twilio/media", "body": "Hola" }),
        ))
        .await;
    assert_eq!(media_without_url.status(), StatusCode::BAD_REQUEST);

    let no_provider = app
        .send(json_request("POST", "/api/templates", Some(&admin), &payload))
        .await;
    assert_eq!(no_provider.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Campaigns
// =============================================================================

#[tokio::test]
async fn test_campaign_intake_enqueues_and_stores_file() {
    let app = TestApp::new().await;
    let cookie = app.login(USER_EMAIL).await;

    let response = app
        .send(upload_request(
            Some(&cookie),
            &[
                ("templateId", "HX123"),
                ("templateName", "egresados_bienvenida"),
                ("scheduleType", "now"),
            ],
            Some(RECIPIENTS_CSV),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let campaign = body_json(response).await;
    assert_eq!(campaign["status"], "Queued");
    assert_eq!(campaign["recipients"], 3);
    assert_eq!(campaign["templateName"], "egresados_bienvenida");
    assert_eq!(campaign["success_count"], 0);
    assert!(campaign.get("user_id").is_none());

    let jobs = app.queue.jobs();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.campaign_id, campaign["id"].as_i64().unwrap());
    assert_eq!(job.template_sid, "HX123");
    assert_eq!(job.schedule, Schedule::Now);
    assert!(job.recipient_file.starts_with(app.upload_dir.path()));
    assert_eq!(std::fs::read_to_string(&job.recipient_file).unwrap(), RECIPIENTS_CSV);
}

#[tokio::test]
async fn test_campaign_intake_scheduled() {
    let app = TestApp::new().await;
    let cookie = app.login(USER_EMAIL).await;

    let response = app
        .send(upload_request(
            Some(&cookie),
            &[
                ("templateId", "HX123"),
                ("templateName", "egresados_bienvenida"),
                ("scheduleType", "later"),
                ("scheduledAt", "2030-01-15T14:00:00Z"),
            ],
            Some(RECIPIENTS_CSV),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let campaign = body_json(response).await;
    assert_eq!(campaign["scheduledAt"], "2030-01-15T14:00:00Z");
    assert!(matches!(app.queue.jobs()[0].schedule, Schedule::Later { .. }));
}

#[tokio::test]
async fn test_campaign_intake_rejections() {
    let app = TestApp::new().await;
    let cookie = app.login(USER_EMAIL).await;

    let unauthenticated = app
        .send(upload_request(None, &[("templateId", "HX123")], Some(RECIPIENTS_CSV)))
        .await;
    assert_eq!(unauthenticated.status(), StatusCode::FORBIDDEN);

    let no_file = app
        .send(upload_request(Some(&cookie), &[("templateId", "HX123")], None))
        .await;
    assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);

    let later_without_time = app
        .send(upload_request(
            Some(&cookie),
            &[("templateId", "HX123"), ("scheduleType", "later")],
            Some(RECIPIENTS_CSV),
        ))
        .await;
    assert_eq!(later_without_time.status(), StatusCode::BAD_REQUEST);

    let no_valid_rows = app
        .send(upload_request(
            Some(&cookie),
            &[("templateId", "HX123"), ("scheduleType", "now")],
            Some("+5215550001\n"),
        ))
        .await;
    assert_eq!(no_valid_rows.status(), StatusCode::BAD_REQUEST);

    assert!(app.queue.jobs().is_empty());
    assert!(CampaignRepo::list_for_user(&app.pool, app.user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_enqueue_failure_marks_internal_error() {
    let app = TestApp::with_queue(MemoryQueue::failing()).await;
    let cookie = app.login(USER_EMAIL).await;

    let response = app
        .send(upload_request(
            Some(&cookie),
            &[("templateId", "HX123"), ("scheduleType", "now")],
            Some(RECIPIENTS_CSV),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let campaigns = CampaignRepo::list_for_user(&app.pool, app.user.id).await.unwrap();
    assert_eq!(campaigns.len(), 1);
    assert_eq!(campaigns[0].status, CampaignStatus::InternalError);
    assert!(!app
        .upload_dir
        .path()
        .join("uploads")
        .join(format!("campaign_{}.csv", campaigns[0].id))
        .exists());
}

#[tokio::test]
async fn test_campaign_queries_are_scoped_to_owner() {
    let app = TestApp::new().await;
    let user = app.login(USER_EMAIL).await;
    let admin = app.login(ADMIN_EMAIL).await;

    let created = app
        .send(upload_request(
            Some(&user),
            &[("templateId", "HX123"), ("scheduleType", "now")],
            Some(RECIPIENTS_CSV),
        ))
        .await;
    let id = body_json(created).await["id"].as_i64().unwrap();
    CampaignRepo::record_error(&app.pool, id, "+5215550002", "blocked").await.unwrap();

    let own = app.send(empty_request("GET", "/api/campaigns", Some(&user))).await;
    assert_eq!(body_json(own).await.as_array().unwrap().len(), 1);

    let others = app.send(empty_request("GET", "/api/campaigns", Some(&admin))).await;
    assert_eq!(body_json(others).await, json!([]));

    let errors = app
        .send(empty_request("GET", &format!("/api/campaigns/{id}/errors"), Some(&user)))
        .await;
    assert_eq!(
        body_json(errors).await,
        json!([{ "phone": "+5215550002", "error": "blocked" }])
    );

    let foreign_errors = app
        .send(empty_request("GET", &format!("/api/campaigns/{id}/errors"), Some(&admin)))
        .await;
    assert_eq!(foreign_errors.status(), StatusCode::NOT_FOUND);

    let foreign_delete = app
        .send(empty_request("DELETE", &format!("/api/campaigns/{id}"), Some(&admin)))
        .await;
    assert_eq!(foreign_delete.status(), StatusCode::NOT_FOUND);

    let recipient_file = app.queue.jobs()[0].recipient_file.clone();
    assert!(recipient_file.exists());

    let deleted = app
        .send(empty_request("DELETE", &format!("/api/campaigns/{id}"), Some(&user)))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert!(CampaignRepo::list_errors(&app.pool, id).await.unwrap().is_empty());
    assert!(!recipient_file.exists());
}

#[tokio::test]
async fn test_reports_need_provider() {
    let app = TestApp::new().await;
    let cookie = app.login(USER_EMAIL).await;

    let bad_format = app
        .send(empty_request("GET", "/api/reports?format=xml", Some(&cookie)))
        .await;
    assert_eq!(bad_format.status(), StatusCode::BAD_REQUEST);

    let disabled = app
        .send(empty_request("GET", "/api/reports?days=3", Some(&cookie)))
        .await;
    assert_eq!(disabled.status(), StatusCode::SERVICE_UNAVAILABLE);
}
