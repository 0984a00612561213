//! End-to-end tests for register, login, self, refresh and logout.

mod common;

use axum::http::StatusCode;
use common::{
    access_cookie, create_test_app, empty_request, extract_set_cookies, json_body, json_request,
    refresh_cookie, seed_user, session_cookie, set_cookie_value,
};
use gatehouse::db::Role;
use serde_json::json;
use tower::ServiceExt;

fn register_body(email: &str) -> serde_json::Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": email,
        "password": "analytical-engine"
    })
}

#[tokio::test]
async fn test_welcome_route() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app.oneshot(empty_request("GET", "/", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"Welcome to auth service.");
}

#[tokio::test]
async fn test_register_sets_both_cookies() {
    let (app, db, jwt) = create_test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            register_body("ada@example.com"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookies = extract_set_cookies(&response);
    assert_eq!(cookies.len(), 2);

    let access_header = cookies
        .iter()
        .find(|c| c.starts_with("accessToken="))
        .unwrap();
    assert!(access_header.contains("HttpOnly"));
    assert!(access_header.contains("SameSite=Strict"));
    assert!(access_header.contains("Max-Age=3600"));
    let refresh_header = cookies
        .iter()
        .find(|c| c.starts_with("refreshToken="))
        .unwrap();
    assert!(refresh_header.contains("Max-Age=31536000"));

    let body = json_body(response).await;
    let id = body["id"].as_i64().unwrap();

    let user = db.users().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.role, Role::Customer);
    assert_ne!(user.password_hash, "analytical-engine");

    let access = jwt
        .verify_access_token(&set_cookie_value(&cookies, "accessToken").unwrap())
        .unwrap();
    assert_eq!(access.sub, id.to_string());
    assert_eq!(access.role, Role::Customer);

    let refresh = jwt
        .verify_refresh_token(&set_cookie_value(&cookies, "refreshToken").unwrap())
        .unwrap();
    let record_id = refresh.record_id().unwrap();
    let record = db.refresh_tokens().get_by_id(record_id).await.unwrap().unwrap();
    assert_eq!(record.user_id, id);
}

#[tokio::test]
async fn test_register_duplicate_email_fails() {
    let (app, _db, _jwt) = create_test_app().await;

    let first = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            register_body("ada@example.com"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            register_body("ADA@example.com"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body = json_body(second).await;
    assert_eq!(body["errors"][0]["message"], "Email already exists!");
}

#[tokio::test]
async fn test_register_missing_field_fails() {
    let (app, db, _jwt) = create_test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": "   ",
                "password": "analytical-engine"
            }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["errors"][0]["message"], "Email is required.");
    assert!(db.users().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_login_self() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            register_body("ada@example.com"),
            None,
        ))
        .await
        .unwrap();
    let id = json_body(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "analytical-engine" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = extract_set_cookies(&response);
    let access = set_cookie_value(&cookies, "accessToken").unwrap();
    assert_eq!(json_body(response).await["id"], id);

    let response = app
        .oneshot(empty_request(
            "GET",
            "/auth/self",
            Some(&access_cookie(&access)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["id"], id);
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["firstName"], "Ada");
    assert_eq!(body["role"], "customer");
    assert!(body.get("password").is_none());
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (app, db, _jwt) = create_test_app().await;
    seed_user(&db, "ada@example.com", "analytical-engine", Role::Customer).await;

    let unknown = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "nobody@example.com", "password": "analytical-engine" }),
            None,
        ))
        .await
        .unwrap();
    let wrong = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "difference-engine" }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    assert!(extract_set_cookies(&unknown).is_empty());
    assert!(extract_set_cookies(&wrong).is_empty());

    let unknown = json_body(unknown).await;
    let wrong = json_body(wrong).await;
    assert_eq!(unknown, wrong);
    assert_eq!(
        unknown["errors"][0]["message"],
        "Email or password does not match."
    );
}

#[tokio::test]
async fn test_login_with_corrupt_hash_is_rejected_like_wrong_password() {
    let (app, db, _jwt) = create_test_app().await;
    db.users()
        .create(&gatehouse::db::NewUser {
            first_name: "Broken",
            last_name: "Hash",
            email: "broken@example.com",
            password_hash: "not-a-bcrypt-hash",
            role: Role::Customer,
            tenant_id: None,
        })
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "broken@example.com", "password": "whatever" }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(
        body["errors"][0]["message"],
        "Email or password does not match."
    );
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let (app, db, jwt) = create_test_app().await;
    let (user_id, session) =
        common::authenticated_user(&db, &jwt, "ada@example.com", Role::Customer).await;

    let response = app
        .clone()
        .oneshot(empty_request(
            "POST",
            "/auth/refresh",
            Some(&refresh_cookie(&session.refresh.token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    let new_access = set_cookie_value(&cookies, "accessToken").unwrap();
    let new_refresh = set_cookie_value(&cookies, "refreshToken").unwrap();
    assert_ne!(new_refresh, session.refresh.token);
    assert_eq!(json_body(response).await["id"], user_id);

    assert_eq!(
        jwt.verify_access_token(&new_access).unwrap().user_id(),
        Some(user_id)
    );
    let new_record = jwt
        .verify_refresh_token(&new_refresh)
        .unwrap()
        .record_id()
        .unwrap();
    let store = db.refresh_tokens();
    assert!(store.exists_by_id(new_record).await.unwrap());
    assert!(!store.exists_by_id(session.record.id).await.unwrap());

    // The old refresh token has been rotated out.
    let replay = app
        .oneshot(empty_request(
            "POST",
            "/auth/refresh",
            Some(&refresh_cookie(&session.refresh.token)),
        ))
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert!(extract_set_cookies(&replay).is_empty());
}

#[tokio::test]
async fn test_refresh_picks_up_role_change() {
    let (app, db, jwt) = create_test_app().await;
    let (user_id, session) =
        common::authenticated_user(&db, &jwt, "ada@example.com", Role::Customer).await;

    db.users()
        .update(
            user_id,
            &gatehouse::db::UserUpdate {
                first_name: "Ada",
                last_name: "Lovelace",
                role: Role::Manager,
                tenant_id: None,
            },
        )
        .await
        .unwrap();

    let response = app
        .oneshot(empty_request(
            "POST",
            "/auth/refresh",
            Some(&refresh_cookie(&session.refresh.token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    let access = set_cookie_value(&cookies, "accessToken").unwrap();
    assert_eq!(jwt.verify_access_token(&access).unwrap().role, Role::Manager);
}

#[tokio::test]
async fn test_refresh_for_deleted_user_fails() {
    let (app, db, jwt) = create_test_app().await;
    let (user_id, session) =
        common::authenticated_user(&db, &jwt, "ada@example.com", Role::Customer).await;

    db.users().delete(user_id).await.unwrap();

    // Deleting the user cascades to its refresh records.
    let response = app
        .oneshot(empty_request(
            "POST",
            "/auth/refresh",
            Some(&refresh_cookie(&session.refresh.token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app
        .oneshot(empty_request("POST", "/auth/refresh", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["errors"][0]["type"], "UnauthorizedError");
}

#[tokio::test]
async fn test_logout_deletes_record_and_clears_cookies() {
    let (app, db, jwt) = create_test_app().await;
    let (_user_id, session) =
        common::authenticated_user(&db, &jwt, "ada@example.com", Role::Customer).await;

    let response = app
        .clone()
        .oneshot(empty_request(
            "POST",
            "/auth/logout",
            Some(&session_cookie(&session)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    assert_eq!(set_cookie_value(&cookies, "accessToken").as_deref(), Some(""));
    assert_eq!(set_cookie_value(&cookies, "refreshToken").as_deref(), Some(""));
    assert_eq!(json_body(response).await, serde_json::json!({}));

    assert!(
        !db.refresh_tokens()
            .exists_by_id(session.record.id)
            .await
            .unwrap()
    );

    let response = app
        .oneshot(empty_request(
            "POST",
            "/auth/refresh",
            Some(&refresh_cookie(&session.refresh.token)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_requires_both_tokens() {
    let (app, db, jwt) = create_test_app().await;
    let (_user_id, session) =
        common::authenticated_user(&db, &jwt, "ada@example.com", Role::Customer).await;

    let response = app
        .oneshot(empty_request(
            "POST",
            "/auth/logout",
            Some(&access_cookie(&session.access.token)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(
        db.refresh_tokens()
            .exists_by_id(session.record.id)
            .await
            .unwrap()
    );
}
