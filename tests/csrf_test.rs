mod common;

use axum::http::{Method, StatusCode};
use common::*;
use portal_auth::api::{RouteMeta, routes};
use serde_json::json;

fn app_with_widgets() -> axum::Router {
    test_app_with(
        routes()
            .put("/widgets", || async { "updated" }, RouteMeta::public())
            .patch("/widgets", || async { "patched" }, RouteMeta::public())
            .delete("/widgets", || async { "deleted" }, RouteMeta::public()),
    )
}

#[tokio::test]
async fn test_get_mints_session_once() {
    let app = test_app();
    let mut cookies = Cookies::default();

    let req = request(Method::GET, "/health", &cookies, None, None);
    let response = send(&app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    let names = set_cookie_names(&response);
    assert!(names.iter().any(|n| n == "sid"));
    assert!(names.iter().any(|n| n == "csrfToken"));

    let token = cookies.get("csrfToken").unwrap().to_string();
    assert_eq!(token.len(), 43);

    // Known session: nothing new is minted.
    let req = request(Method::GET, "/health", &cookies, None, None);
    let response = send(&app, &mut cookies, req).await;
    assert!(set_cookie_names(&response).is_empty());
    assert_eq!(cookies.get("csrfToken"), Some(token.as_str()));
}

#[tokio::test]
async fn test_missing_and_wrong_token_get_identical_rejection() {
    let app = app_with_widgets();
    let mut cookies = Cookies::default();
    let req = request(Method::GET, "/health", &cookies, None, None);
    send(&app, &mut cookies, req).await;

    let req = request(Method::PUT, "/widgets", &cookies, None, None);
    let missing = send(&app, &mut cookies, req).await;
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);
    let missing = body_json(missing).await;

    let req = request(Method::PUT, "/widgets", &cookies, Some("x".repeat(43).as_str()), None);
    let wrong = send(&app, &mut cookies, req).await;
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
    assert_eq!(missing, body_json(wrong).await);

    assert_eq!(
        missing,
        json!({
            "error": {
                "code": "CSRF_REJECTED",
                "message": "Forbidden: invalid or missing CSRF token"
            }
        })
    );
}

#[tokio::test]
async fn test_matching_token_passes_every_mutating_verb() {
    let app = app_with_widgets();
    let mut cookies = Cookies::default();
    let req = request(Method::GET, "/health", &cookies, None, None);
    send(&app, &mut cookies, req).await;
    let token = cookies.get("csrfToken").unwrap().to_string();

    for method in [Method::PUT, Method::PATCH, Method::DELETE] {
        let req = request(method.clone(), "/widgets", &cookies, Some(&token), None);
        let response = send(&app, &mut cookies, req).await;
        assert_eq!(response.status(), StatusCode::OK, "{method}");
    }
}

#[tokio::test]
async fn test_token_from_another_session_is_rejected() {
    let app = app_with_widgets();

    let mut alice = Cookies::default();
    let req = request(Method::GET, "/health", &alice, None, None);
    send(&app, &mut alice, req).await;

    let mut mallory = Cookies::default();
    let req = request(Method::GET, "/health", &mallory, None, None);
    send(&app, &mut mallory, req).await;
    let mallory_token = mallory.get("csrfToken").unwrap().to_string();

    let req = request(Method::DELETE, "/widgets", &alice, Some(&mallory_token), None);
    let response = send(&app, &mut alice, req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_first_post_without_session_is_rejected_but_mints_one() {
    let app = test_app();
    let mut cookies = Cookies::default();

    let req = request(Method::POST, "/auth/logout", &cookies, Some("guess"), None);
    let response = send(&app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The browser now holds a session it can use on the next attempt.
    let token = cookies.get("csrfToken").unwrap().to_string();
    let req = request(Method::POST, "/auth/logout", &cookies, Some(&token), None);
    let response = send(&app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_is_exempt() {
    let app = test_app();
    let mut cookies = Cookies::default();

    let req = request(
        Method::POST,
        "/auth/login",
        &cookies,
        None,
        Some(login_body(VIEWER_EMAIL, PASSWORD)),
    );
    let response = send(&app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_issues_exactly_one_session() {
    let app = test_app();

    // A refused login leaves no session behind.
    let mut cookies = Cookies::default();
    let req = request(
        Method::POST,
        "/auth/login",
        &cookies,
        None,
        Some(login_body(VIEWER_EMAIL, "wrong password")),
    );
    let response = send(&app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_names(&response).is_empty());
    assert!(cookies.get("sid").is_none());

    // A first login without any cookie sets one sid, and it is the live one.
    let req = request(
        Method::POST,
        "/auth/login",
        &cookies,
        None,
        Some(login_body(VIEWER_EMAIL, PASSWORD)),
    );
    let response = send(&app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    let names = set_cookie_names(&response);
    assert_eq!(names.iter().filter(|n| *n == "sid").count(), 1);
    assert_eq!(names.iter().filter(|n| *n == "csrfToken").count(), 1);

    let token = cookies.get("csrfToken").unwrap().to_string();
    let req = request(Method::POST, "/auth/logout", &cookies, Some(&token), None);
    assert_eq!(send(&app, &mut cookies, req).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_requires_token() {
    let app = test_app();
    let mut cookies = login(&app, VIEWER_EMAIL).await;

    let req = request(Method::POST, "/auth/refresh", &cookies, None, None);
    let response = send(&app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_rotates_csrf_session() {
    let app = test_app();
    let mut cookies = Cookies::default();
    let req = request(Method::GET, "/health", &cookies, None, None);
    send(&app, &mut cookies, req).await;
    let before_sid = cookies.get("sid").unwrap().to_string();
    let before_token = cookies.get("csrfToken").unwrap().to_string();

    let req = request(
        Method::POST,
        "/auth/login",
        &cookies,
        None,
        Some(login_body(ADMIN_EMAIL, PASSWORD)),
    );
    let response = send(&app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::OK);

    let after_token = cookies.get("csrfToken").unwrap().to_string();
    assert_ne!(cookies.get("sid").unwrap(), before_sid);
    assert_ne!(after_token, before_token);

    // The pre-login pair is dead.
    let mut stale = cookies.clone();
    stale.set("sid", &before_sid);
    stale.set("csrfToken", &before_token);
    let req = request(Method::POST, "/auth/logout", &stale, Some(&before_token), None);
    let response = send(&app, &mut stale, req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The new one works.
    let req = request(Method::POST, "/auth/logout", &cookies, Some(&after_token), None);
    let response = send(&app, &mut cookies, req).await;
    assert_eq!(response.status(), StatusCode::OK);
}
