// HTTP-level tests for the webhook listener.
//
// Most cases drive the Router directly via tower::ServiceExt::oneshot; one
// case goes through a real socket to cover start/stop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt as _;

use polywire_core::config::WebhookConfig;
use polywire_core::webhook::{router, EventBus, MarketEventHandler, WebhookServer};
use polywire_core::{Error, Result};

const BODY_LIMIT: usize = 1024 * 1024;
const PATH: &str = "/market-event";

fn recording_bus(event: &str) -> (Arc<EventBus>, Arc<Mutex<Vec<Value>>>) {
    let bus = Arc::new(EventBus::new());
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    bus.subscribe(event, move |data| {
        sink.lock().unwrap().push(data.clone());
        Ok(())
    });
    (bus, received)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .expect("build request")
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[tokio::test]
async fn market_added_is_acknowledged_and_delivered_once() {
    let (bus, received) = recording_bus("market_added");
    let data = json!({
        "markets": [{"condition_id": "x", "question": "q", "description": "d", "tokens": ["YES", "NO"]}]
    });
    let payload = json!({"event": "market_added", "data": data});

    let resp = router(bus, PATH)
        .oneshot(post(PATH, payload.to_string()))
        .await
        .expect("oneshot");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "OK");
    assert_eq!(*received.lock().unwrap(), vec![data]);
}

#[tokio::test]
async fn missing_event_is_bad_request_without_dispatch() {
    let (bus, received) = recording_bus("market_added");

    let resp = router(bus, PATH).oneshot(post(PATH, "{}")).await.expect("oneshot");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(resp).await, "Bad payload: Missing 'event'");
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unparseable_body_is_bad_request() {
    let (bus, received) = recording_bus("market_added");

    let resp = router(bus, PATH)
        .oneshot(post(PATH, "{\"event\": \"market_added\""))
        .await
        .expect("oneshot");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(resp).await.starts_with("Bad payload: "));
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn other_paths_are_not_found() {
    let (bus, received) = recording_bus("market_added");
    let payload = json!({"event": "market_added", "data": {}}).to_string();

    let resp = router(bus, PATH)
        .oneshot(post("/market_event", payload))
        .await
        .expect("oneshot");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn other_methods_on_the_event_path_are_not_found() {
    let (bus, received) = recording_bus("market_added");
    let req = Request::builder()
        .method("GET")
        .uri(PATH)
        .body(Body::empty())
        .expect("build request");

    let resp = router(bus, PATH).oneshot(req).await.expect("oneshot");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_event_is_still_acknowledged() {
    let (bus, received) = recording_bus("market_added");
    let payload = json!({"event": "something_else"}).to_string();

    let resp = router(bus, PATH).oneshot(post(PATH, payload)).await.expect("oneshot");

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failing_callback_does_not_block_the_next_or_the_response() {
    let bus = Arc::new(EventBus::new());
    bus.subscribe("market_resolved", |_| Err(Error::Other("index unavailable".into())));
    let hits = Arc::new(Mutex::new(0));
    let counter = hits.clone();
    bus.subscribe("market_resolved", move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    let payload = json!({"event": "market_resolved", "data": {"markets": []}}).to_string();
    let resp = router(bus, PATH).oneshot(post(PATH, payload)).await.expect("oneshot");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(*hits.lock().unwrap(), 1);
}

/// Records which slot received which payload
#[derive(Default)]
struct SlotRecorder {
    calls: Mutex<Vec<(&'static str, Value)>>,
}

impl MarketEventHandler for SlotRecorder {
    fn on_market_added(&self, data: &Value) -> Result<()> {
        self.calls.lock().unwrap().push(("added", data.clone()));
        Ok(())
    }

    fn on_market_resolved(&self, data: &Value) -> Result<()> {
        self.calls.lock().unwrap().push(("resolved", data.clone()));
        Ok(())
    }

    fn on_payout_logs(&self, data: &Value) -> Result<()> {
        self.calls.lock().unwrap().push(("payouts", data.clone()));
        Ok(())
    }
}

#[tokio::test]
async fn served_over_a_real_socket() {
    let recorder = Arc::new(SlotRecorder::default());
    let bus = Arc::new(EventBus::new());
    bus.register_handler(recorder.clone());

    let mut server = WebhookServer::new(
        WebhookConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        },
        bus,
    );
    let addr = server.start().await.expect("start");
    let url = format!("http://{}{}", addr, PATH);
    let client = reqwest::Client::new();

    for (event, data) in [
        ("payout_logs", json!({"payouts": []})),
        ("market_resolved", json!({"markets": [{"condition_id": "x", "winning_token": "NO"}]})),
    ] {
        let resp = client
            .post(&url)
            .json(&json!({"event": event, "data": data}))
            .send()
            .await
            .expect("send");
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.expect("text"), "OK");
    }

    let resp = client.post(&url).body("{}").send().await.expect("send");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    server.stop().await;
    // Fresh client so no pooled connection is reused
    assert!(reqwest::Client::new().post(&url).body("{}").send().await.is_err());

    let calls = recorder.calls.lock().unwrap();
    let slots: Vec<_> = calls.iter().map(|(slot, _)| *slot).collect();
    assert_eq!(slots, vec!["payouts", "resolved"]);
    assert_eq!(calls[1].1["markets"][0]["winning_token"], "NO");
}

/// Blocks each caller until `parties` callers have arrived or the wait times out
struct Rendezvous {
    arrived: Mutex<usize>,
    all_here: Condvar,
    parties: usize,
}

impl Rendezvous {
    fn new(parties: usize) -> Self {
        Self {
            arrived: Mutex::new(0),
            all_here: Condvar::new(),
            parties,
        }
    }

    fn meet(&self, timeout: Duration) -> bool {
        let mut arrived = self.arrived.lock().unwrap();
        *arrived += 1;
        self.all_here.notify_all();
        let (_arrived, wait) = self
            .all_here
            .wait_timeout_while(arrived, timeout, |n| *n < self.parties)
            .unwrap();
        !wait.timed_out()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_dispatch_in_parallel() {
    let rendezvous = Arc::new(Rendezvous::new(2));
    let met = Arc::new(AtomicUsize::new(0));

    let bus = Arc::new(EventBus::new());
    let (gate, counter) = (rendezvous.clone(), met.clone());
    bus.subscribe("market_added", move |_| {
        // Counts only when both requests are inside a callback at once
        if gate.meet(Duration::from_secs(5)) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    });

    let mut server = WebhookServer::new(
        WebhookConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        },
        bus,
    );
    let addr = server.start().await.expect("start");
    let url = format!("http://{}{}", addr, PATH);
    let payload = json!({"event": "market_added", "data": {"markets": []}});

    let first = reqwest::Client::new().post(&url).json(&payload).send();
    let second = reqwest::Client::new().post(&url).json(&payload).send();
    let (first, second) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(first, second)
    })
    .await
    .expect("both requests answered");

    assert_eq!(first.expect("send").status(), reqwest::StatusCode::OK);
    assert_eq!(second.expect("send").status(), reqwest::StatusCode::OK);
    assert_eq!(met.load(Ordering::SeqCst), 2);

    server.stop().await;
}
