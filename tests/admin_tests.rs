mod common;

use bizdir::db::{Grade, UserStatus};
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let t = test_app().await;
    create_user(&t.db, "user@example.com", false).await;
    let session = login(&t.app, "user@example.com", false).await;

    let anonymous = send(&t.app, request("GET", "/api/admin/users", None)).await;
    assert_eq!(anonymous.status(), 401);

    let regular = send(&t.app, request("GET", "/api/admin/users", Some(&session.cookies()))).await;
    assert_eq!(regular.status(), 403);
    assert!(set_cookies(&regular).is_empty());
}

#[tokio::test]
async fn test_admin_lists_users() {
    let t = test_app().await;
    create_user(&t.db, "admin@example.com", true).await;
    create_user(&t.db, "user@example.com", false).await;
    let admin = login(&t.app, "admin@example.com", false).await;

    let response = send(&t.app, request("GET", "/api/admin/users", Some(&admin.cookies()))).await;
    assert_eq!(response.status(), 200);
    let users = body_json(response).await;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[tokio::test]
async fn test_revoked_admin_flag_wins_over_token_claim() {
    let t = test_app().await;
    let admin = create_user(&t.db, "admin@example.com", true).await;
    let session = login(&t.app, "admin@example.com", false).await;

    t.db.users().set_admin(&admin.id, false).await.unwrap();

    // The access token still claims admin, the stored flag no longer does.
    let me = body_json(
        send(&t.app, request("GET", "/api/auth/me", Some(&session.access_only()))).await,
    )
    .await;
    assert_eq!(me["user"]["is_admin"], true);

    let response = send(&t.app, request("GET", "/api/admin/users", Some(&session.cookies()))).await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_admin_changes_grade() {
    let t = test_app().await;
    create_user(&t.db, "admin@example.com", true).await;
    let user = create_user(&t.db, "user@example.com", false).await;
    let admin = login(&t.app, "admin@example.com", false).await;

    let response = send(
        &t.app,
        json_request(
            "PUT",
            &format!("/api/admin/users/{}/grade", user.id),
            json!({ "grade": "enterprise" }),
            Some(&admin.cookies()),
        ),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_json(response).await["grade"], "enterprise");

    let stored = t.db.users().get_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.grade, Grade::Enterprise);

    let unknown_grade = send(
        &t.app,
        json_request(
            "PUT",
            &format!("/api/admin/users/{}/grade", user.id),
            json!({ "grade": "platinum" }),
            Some(&admin.cookies()),
        ),
    )
    .await;
    assert_eq!(unknown_grade.status(), 422);

    let missing = send(
        &t.app,
        json_request(
            "PUT",
            &format!("/api/admin/users/{}/grade", uuid::Uuid::new_v4()),
            json!({ "grade": "basic" }),
            Some(&admin.cookies()),
        ),
    )
    .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_admin_suspends_user() {
    let t = test_app().await;
    let admin_user = create_user(&t.db, "admin@example.com", true).await;
    let user = create_user(&t.db, "user@example.com", false).await;
    let admin = login(&t.app, "admin@example.com", false).await;
    let victim = login(&t.app, "user@example.com", false).await;

    let response = send(
        &t.app,
        json_request(
            "PUT",
            &format!("/api/admin/users/{}/status", user.id),
            json!({ "status": "suspended" }),
            Some(&admin.cookies()),
        ),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_json(response).await["status"], "suspended");

    let stored = t.db.users().get_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.status, UserStatus::Suspended);

    let refresh = send(
        &t.app,
        request("POST", "/api/auth/refresh", Some(&victim.refresh_only())),
    )
    .await;
    assert_eq!(refresh.status(), 403);

    let own = send(
        &t.app,
        json_request(
            "PUT",
            &format!("/api/admin/users/{}/status", admin_user.id),
            json!({ "status": "suspended" }),
            Some(&admin.cookies()),
        ),
    )
    .await;
    assert_eq!(own.status(), 400);
    assert_eq!(body_json(own).await["error"], "Cannot change your own status");

    // Reinstating lets the user refresh again.
    let reinstated = send(
        &t.app,
        json_request(
            "PUT",
            &format!("/api/admin/users/{}/status", user.id),
            json!({ "status": "active" }),
            Some(&admin.cookies()),
        ),
    )
    .await;
    assert_eq!(reinstated.status(), 200);
    let refresh = send(
        &t.app,
        request("POST", "/api/auth/refresh", Some(&victim.refresh_only())),
    )
    .await;
    assert_eq!(refresh.status(), 200);
}
