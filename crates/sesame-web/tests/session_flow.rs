mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{TEST_ORIGIN, TestServer, session_key};
use sesame_core::{IdGenerator, SessionKey};
use sesame_store::{SessionStore as _, StoreLookup};
use sesame_store_redb::RedbStore;

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn login_sets_cookie_and_stores_flag() {
    let (server, store) = TestServer::start().await;
    let driver = server.driver();

    let resp = driver.login().await;
    assert_eq!(resp.status(), 200);

    let set_cookie = resp
        .headers()
        .get("set-cookie")
        .expect("Login must set the session cookie")
        .to_str()
        .unwrap()
        .to_owned();
    assert!(set_cookie.starts_with("session-id="), "{set_cookie}");
    assert!(set_cookie.contains("HttpOnly"), "{set_cookie}");
    assert!(set_cookie.contains("Path=/"), "{set_cookie}");
    assert!(set_cookie.contains("Max-Age=604800"), "{set_cookie}");
    assert!(!set_cookie.contains("Secure"), "{set_cookie}");
    assert_eq!(resp.text().await.unwrap(), "Logged in");

    let token = driver.token().expect("Cookie in jar");
    let id = IdGenerator::new(session_key()).verify(&token).unwrap();
    assert_eq!(
        store.get(&id).await.unwrap(),
        StoreLookup::Found(br#"{"authenticated":true}"#.to_vec())
    );

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn logged_in_client_sees_secret() {
    let (server, _store) = TestServer::start().await;
    let driver = server.driver();

    driver.login().await;

    let resp = driver.get("/secret").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Secret");

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn secret_without_cookie_is_bad_request() {
    let (server, _store) = TestServer::start().await;

    let resp = server.driver().get("/secret").await;
    assert_eq!(resp.status(), 400);
    let body = resp.text().await.unwrap();
    assert!(body.contains("No cookie found"), "{body}");

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn unknown_session_is_forbidden() {
    let (server, _store) = TestServer::start().await;
    let driver = server.driver();

    driver.set_token(IdGenerator::new(session_key()).new_id().as_str());

    let resp = driver.get("/secret").await;
    assert_eq!(resp.status(), 403);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Forbidden"), "{body}");

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn forged_or_garbage_cookie_is_forbidden() {
    let (server, store) = TestServer::start().await;
    let driver = server.driver();
    // Would turn any store lookup into a 500.
    store.fail_get.store(true, Ordering::SeqCst);

    let foreign = IdGenerator::new(SessionKey::derive_from(b"attacker").unwrap()).new_id();
    for token in [foreign.as_str(), "garbage"] {
        driver.set_token(token);
        assert_eq!(driver.get("/secret").await.status(), 403);
    }

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn logout_ends_session() {
    let (server, store) = TestServer::start().await;
    let driver = server.driver();

    driver.login().await;
    let token = driver.token().unwrap();

    let resp = driver.post("/logout").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Logged out");
    assert_eq!(driver.token(), None);
    assert!(store.inner.is_empty());

    // Replaying the old cookie gets nowhere.
    driver.set_token(&token);
    assert_eq!(driver.get("/secret").await.status(), 403);

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn logout_via_get() {
    let (server, store) = TestServer::start().await;
    let driver = server.driver();

    driver.login().await;
    assert_eq!(driver.get("/logout").await.status(), 200);
    assert!(store.inner.is_empty());

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn logout_without_cookie_is_bad_request() {
    let (server, _store) = TestServer::start().await;

    assert_eq!(server.driver().post("/logout").await.status(), 400);

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn logout_succeeds_when_store_delete_fails() {
    let (server, store) = TestServer::start().await;
    let driver = server.driver();

    driver.login().await;
    store.fail_delete.store(true, Ordering::SeqCst);

    let resp = driver.post("/logout").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(driver.token(), None);

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn relogin_keeps_session_id() {
    let (server, _store) = TestServer::start().await;
    let driver = server.driver();

    driver.login().await;
    let first = driver.token().unwrap();
    driver.login().await;

    assert_eq!(driver.token().unwrap(), first);

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn store_outage_is_server_error() {
    let (server, store) = TestServer::start().await;
    let driver = server.driver();

    driver.login().await;
    store.fail_get.store(true, Ordering::SeqCst);

    let resp = driver.get("/secret").await;
    assert_eq!(resp.status(), 500);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Internal Server Error"), "{body}");

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn failed_login_sets_no_cookie() {
    let (server, store) = TestServer::start().await;
    let driver = server.driver();
    store.fail_put.store(true, Ordering::SeqCst);

    let resp = driver.login().await;
    assert_eq!(resp.status(), 500);
    assert!(resp.headers().get("set-cookie").is_none());
    assert_eq!(driver.token(), None);

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn cors_preflight_allows_configured_origin_only() {
    let (server, _store) = TestServer::start().await;
    let driver = server.driver();
    let client = reqwest::Client::new();

    let preflight = |origin: &'static str| {
        client
            .request(reqwest::Method::OPTIONS, driver.url("/login"))
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .send()
    };

    let resp = preflight(TEST_ORIGIN).await.unwrap();
    assert_eq!(resp.status(), 200);
    let headers = resp.headers();
    assert_eq!(headers["access-control-allow-origin"], TEST_ORIGIN);
    assert_eq!(headers["access-control-allow-credentials"], "true");

    let resp = preflight("http://evil.example").await.unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn unknown_route_is_not_found() {
    let (server, _store) = TestServer::start().await;

    assert_eq!(server.driver().get("/nope").await.status(), 404);

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn redb_sessions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.redb");

    let token = {
        let store = Arc::new(RedbStore::open(&path).await.unwrap());
        let server = TestServer::start_with_store(store).await;
        let driver = server.driver();
        driver.login().await;
        let token = driver.token().unwrap();
        drop(driver);
        server.shutdown().await;
        token
    };

    let store = Arc::new(RedbStore::open(&path).await.unwrap());
    let server = TestServer::start_with_store(store).await;
    let driver = server.driver();
    driver.set_token(&token);

    assert_eq!(driver.get("/secret").await.status(), 200);

    server.shutdown().await;
}
