//! Tests for the HTTP query API

use mailsink::MailStore;

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn serve(store: Arc<MailStore>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let app = mailsink::http::router(store);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

async fn get(addr: &str, path: &str) -> (u16, String) {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw).into_owned();

    let status: u16 = text
        .split_whitespace()
        .nth(1)
        .expect("status line")
        .parse()
        .expect("status code");
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

fn capture(store: &MailStore, from: &str, rcpt: &[&str], data: &str) {
    let handle = store.create_session("192.0.2.1:4242".to_owned(), false);
    handle.set_client_host("client.example.com");
    handle.set_sender(from, None);
    for addr in rcpt {
        handle.add_recipient(addr, None);
    }
    if !data.is_empty() {
        handle.write_transcript(data.to_owned());
    }
}

fn sample_mail(from: &str, to: &str, subject: &str) -> String {
    format!("From: {from}\r\nTo: {to}\r\nSubject: {subject}\r\n\r\nhello\r\n")
}

#[tokio::test]
async fn test_list_empty_store() {
    let store = Arc::new(MailStore::new());
    let addr = serve(Arc::clone(&store)).await;

    let (status, body) = get(&addr, "/").await;
    assert_eq!(status, 200);
    assert_eq!(body.trim(), "[]");
}

#[tokio::test]
async fn test_list_all_captured_mail() {
    let store = Arc::new(MailStore::new());
    capture(
        &store,
        "sender@example.com",
        &["recipient@example.com"],
        &sample_mail("sender@example.com", "recipient@example.com", "Hi"),
    );
    let addr = serve(Arc::clone(&store)).await;

    let (status, body) = get(&addr, "/").await;
    assert_eq!(status, 200);

    let views: Value = serde_json::from_str(&body).unwrap();
    let views = views.as_array().unwrap();
    assert_eq!(views.len(), 1);

    // The wire format uses camelCase keys
    assert_eq!(views[0]["smtpFrom"], "sender@example.com");
    assert_eq!(views[0]["smtpTo"][0], "recipient@example.com");
    assert_eq!(views[0]["clientHost"], "client.example.com");
    assert_eq!(views[0]["clientAddr"], "192.0.2.1:4242");
    assert_eq!(views[0]["tlsUsed"], false);
    assert_eq!(views[0]["authenticated"], false);
    assert!(views[0]["receivedTime"].is_string());
    assert_eq!(views[0]["from"][0]["address"], "sender@example.com");
}

#[tokio::test]
async fn test_search_hit_and_miss() {
    let store = Arc::new(MailStore::new());
    capture(
        &store,
        "sender@example.com",
        &["recipient@example.com"],
        &sample_mail("sender@example.com", "recipient@example.com", "Hi"),
    );
    let addr = serve(Arc::clone(&store)).await;

    let (status, body) = get(&addr, "/search/to?email=recipient@example.com").await;
    assert_eq!(status, 200);
    let hits: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let (status, body) = get(&addr, "/search/to?email=nobody@example.com").await;
    assert_eq!(status, 200);
    let hits: Value = serde_json::from_str(&body).unwrap();
    assert!(hits.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_invalid_field() {
    let store = Arc::new(MailStore::new());
    let addr = serve(store).await;

    let (status, body) = get(&addr, "/search/subject?email=a@example.com").await;
    assert_eq!(status, 400);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("invalid search field"));

    // Field tokens are case-sensitive
    let (status, _) = get(&addr, "/search/TO?email=a@example.com").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_search_missing_email() {
    let store = Arc::new(MailStore::new());
    let addr = serve(store).await;

    let (status, body) = get(&addr, "/search/to").await;
    assert_eq!(status, 400);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "missing required parameter: email");

    let (status, _) = get(&addr, "/search/to?email=").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_search_invalid_email_format() {
    let store = Arc::new(MailStore::new());
    let addr = serve(store).await;

    let (status, body) = get(&addr, "/search/to?email=not-an-address").await;
    assert_eq!(status, 400);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "invalid email format");
}

#[tokio::test]
async fn test_search_bcc_asymmetry_over_http() {
    let store = Arc::new(MailStore::new());
    // Blind recipient: delivered via the envelope, absent from headers
    capture(
        &store,
        "sender@example.com",
        &["visible@example.com", "hidden@example.com"],
        &sample_mail("sender@example.com", "visible@example.com", "Hi"),
    );
    let addr = serve(Arc::clone(&store)).await;

    let (status, body) = get(&addr, "/search/to?email=hidden@example.com").await;
    assert_eq!(status, 200);
    let hits: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let (status, body) = get(&addr, "/search/bcc?email=hidden@example.com").await;
    assert_eq!(status, 200);
    let hits: Value = serde_json::from_str(&body).unwrap();
    assert!(hits.as_array().unwrap().is_empty());
}
