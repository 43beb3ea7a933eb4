//! Integration tests for job execution
//!
//! These tests use wiremock to create mock HTTP servers and run jobs through
//! the full lifecycle: submission, execution, events and persistence.

use page_lens::config::Config;
use page_lens::crawler::Coordinator;
use page_lens::hub::{CrawlEvent, EventHub, EventPayload};
use page_lens::state::JobStatus;
use page_lens::storage::SqliteStorage;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with short timeouts
fn create_test_config(page_timeout_secs: u64) -> Config {
    let mut config = Config::default();
    config.crawler.page_timeout_secs = page_timeout_secs;
    config.crawler.probe_timeout_secs = 1;
    config.crawler.max_concurrent_probes = 4;
    config.user_agent.crawler_name = "TestBot".to_string();
    config
}

fn coordinator(config: &Config) -> Coordinator<SqliteStorage> {
    let hub = EventHub::new(&config.hub);
    Coordinator::new(config, SqliteStorage::new_in_memory().unwrap(), hub).unwrap()
}

/// Subscribes a channel for `owner` and returns its receiving end
async fn subscribe(
    coordinator: &Coordinator<SqliteStorage>,
    owner: &str,
) -> mpsc::Receiver<Arc<str>> {
    let (tx, rx) = mpsc::channel(64);
    coordinator.hub().subscribe(owner, tx).await.unwrap();
    rx
}

/// Collects events until the terminal one arrives
async fn events_until_terminal(rx: &mut mpsc::Receiver<Arc<str>>) -> Vec<CrawlEvent> {
    let mut events = Vec::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for events")
            .expect("subscription closed");
        let event: CrawlEvent = serde_json::from_str(&message).unwrap();
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            return events;
        }
    }
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_scenario_page_analysis() {
    let server = MockServer::start().await;
    // The page is fetched via 127.0.0.1; the external link points at another host
    let other = MockServer::start().await;
    let other_port = url::Url::parse(&other.uri()).unwrap().port().unwrap();
    mount_page(
        &server,
        "/",
        format!(
            r#"<title>Test</title><h1>A</h1><h1>B</h1><a href="/x">x</a><a href="http://localhost:{other_port}/y">y</a>"#
        ),
    )
    .await;
    Mock::given(method("HEAD"))
        .and(path("/y"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&other)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = create_test_config(5);
    let coordinator = coordinator(&config);
    let mut events = subscribe(&coordinator, "alice").await;

    let job = coordinator
        .create_job("alice", &format!("{}/", server.uri()))
        .unwrap();
    coordinator.start_job("alice", job.id).unwrap().await.unwrap();

    let received = events_until_terminal(&mut events).await;
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].kind(), "started");
    assert_eq!(received[0].status, JobStatus::Running);
    assert_eq!(received[1].kind(), "completed");

    let stored = coordinator.get_job("alice", job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.failure_reason.is_none());

    let result = stored.result.expect("completed job has a result");
    assert_eq!(result.title.as_deref(), Some("Test"));
    assert_eq!(result.heading_counts.get("h1"), 2);
    for tag in ["h2", "h3", "h4", "h5", "h6"] {
        assert_eq!(result.heading_counts.get(tag), 0);
    }
    assert_eq!(result.internal_link_count, 1);
    assert_eq!(result.external_link_count, 1);
    assert_eq!(result.markup_version, "HTML5");
    assert!(!result.has_login_form);
    assert!(result.broken_links.is_empty(), "{:?}", result.broken_links);

    // The completed event carries the same result that was persisted
    match &received[1].payload {
        EventPayload::Completed { data } => assert_eq!(data, &result),
        other => panic!("expected completed payload, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_timeout_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<title>Too late</title>")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = create_test_config(1);
    let coordinator = coordinator(&config);
    let mut events = subscribe(&coordinator, "alice").await;

    let job = coordinator
        .create_job("alice", &format!("{}/", server.uri()))
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);

    let execution = coordinator.start_job("alice", job.id).unwrap();
    assert_eq!(
        coordinator.get_job("alice", job.id).unwrap().status,
        JobStatus::Running
    );
    execution.await.unwrap();

    let received = events_until_terminal(&mut events).await;
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].kind(), "started");
    assert_eq!(received[1].kind(), "error");
    assert_eq!(received[1].status, JobStatus::Failed);
    match &received[1].payload {
        EventPayload::Error { error } => assert!(error.contains("timeout"), "{}", error),
        other => panic!("expected error payload, got {:?}", other),
    }

    // Nothing else is published for this execution
    assert!(tokio::time::timeout(Duration::from_millis(200), events.recv())
        .await
        .is_err());

    let stored = coordinator.get_job("alice", job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.result.is_none());
    assert!(stored.failure_reason.is_some());
}

#[tokio::test]
async fn test_http_error_status_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(5);
    let coordinator = coordinator(&config);
    let job = coordinator
        .create_job("alice", &format!("{}/", server.uri()))
        .unwrap();
    coordinator.start_job("alice", job.id).unwrap().await.unwrap();

    let stored = coordinator.get_job("alice", job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(
        stored.failure_reason.as_deref(),
        Some("HTTP 503: Service Unavailable")
    );
}

#[tokio::test]
async fn test_rerun_replaces_previous_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>First</title></head><body><h2>Only</h2></body></html>",
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        "<html><body><h3>One</h3><h3>Two</h3></body></html>".to_string(),
    )
    .await;

    let config = create_test_config(5);
    let coordinator = coordinator(&config);
    let job = coordinator
        .create_job("alice", &format!("{}/", server.uri()))
        .unwrap();

    coordinator.start_job("alice", job.id).unwrap().await.unwrap();
    let first = coordinator.get_job("alice", job.id).unwrap().result.unwrap();
    assert_eq!(first.title.as_deref(), Some("First"));
    assert_eq!(first.heading_counts.get("h2"), 1);

    coordinator.rerun_job("alice", job.id).unwrap().await.unwrap();
    let rerun = coordinator.get_job("alice", job.id).unwrap();
    assert_eq!(rerun.status, JobStatus::Completed);

    let second = rerun.result.unwrap();
    assert_eq!(second.title, None);
    assert_eq!(second.heading_counts.get("h2"), 0);
    assert_eq!(second.heading_counts.get("h3"), 2);
}

#[tokio::test]
async fn test_rerun_after_success_can_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>Up</title>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = create_test_config(5);
    let coordinator = coordinator(&config);
    let job = coordinator
        .create_job("alice", &format!("{}/", server.uri()))
        .unwrap();

    coordinator.start_job("alice", job.id).unwrap().await.unwrap();
    assert!(coordinator.get_job("alice", job.id).unwrap().result.is_some());

    coordinator.rerun_job("alice", job.id).unwrap().await.unwrap();
    let stored = coordinator.get_job("alice", job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.result.is_none());
    assert_eq!(
        stored.failure_reason.as_deref(),
        Some("HTTP 500: Internal Server Error")
    );
}

#[tokio::test]
async fn test_broken_links_merged_in_discovery_order() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(
        &server,
        "/",
        format!(
            r#"<html><body>
            <a href="/ok">ok</a>
            <a href="/missing">missing</a>
            <a href="{base}/error">error</a>
            <a href="/missing#again">duplicate</a>
            <a href="mailto:someone@example.com">mail</a>
            <a href="">empty</a>
            </body></html>"#
        ),
    )
    .await;
    Mock::given(method("HEAD"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/error"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = create_test_config(5);
    let coordinator = coordinator(&config);
    let job = coordinator
        .create_job("alice", &format!("{}/", base))
        .unwrap();
    coordinator.start_job("alice", job.id).unwrap().await.unwrap();

    let result = coordinator.get_job("alice", job.id).unwrap().result.unwrap();
    let broken: Vec<(String, u16)> = result
        .broken_links
        .iter()
        .map(|b| (b.url.clone(), b.status_code))
        .collect();
    assert_eq!(
        broken,
        vec![
            (format!("{}/missing", base), 404),
            (format!("{}/error", base), 500),
        ]
    );
}

#[tokio::test]
async fn test_events_scoped_to_owner() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Mine</title>".to_string()).await;

    let config = create_test_config(5);
    let coordinator = coordinator(&config);
    let mut alice = subscribe(&coordinator, "alice").await;
    let mut bob = subscribe(&coordinator, "bob").await;

    let job = coordinator
        .create_job("alice", &format!("{}/", server.uri()))
        .unwrap();
    coordinator.start_job("alice", job.id).unwrap().await.unwrap();

    let received = events_until_terminal(&mut alice).await;
    assert_eq!(received.len(), 2);

    // Bob's subscription sees nothing from alice's job
    assert!(tokio::time::timeout(Duration::from_millis(200), bob.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn test_jobs_survive_reopening_database() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("jobs.db");

    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Persisted</title>".to_string()).await;

    let config = create_test_config(5);
    let job_id = {
        let hub = EventHub::new(&config.hub);
        let coordinator =
            Coordinator::new(&config, SqliteStorage::new(&db_path).unwrap(), hub).unwrap();
        let job = coordinator
            .create_job("alice", &format!("{}/", server.uri()))
            .unwrap();
        coordinator.start_job("alice", job.id).unwrap().await.unwrap();
        job.id
    };

    let hub = EventHub::new(&config.hub);
    let coordinator = Coordinator::new(&config, SqliteStorage::new(&db_path).unwrap(), hub).unwrap();
    let stored = coordinator.get_job("alice", job_id).unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(
        stored.result.unwrap().title.as_deref(),
        Some("Persisted")
    );
}
