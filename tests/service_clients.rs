mod support;

use serde_json::json;
use std::time::Duration;

use support::{closed_base_url, StubServer};
use vbic_console::health::{format_status, HealthPoller, ServiceEndpoint};
use vbic_console::recognize;
use vbic_console::tools::parse_echo_payload;
use vbic_console::ui;
use vbic_console::{
    EncodedImage, InferenceClient, JpegEncoder, Language, LiveError, RasterFrame, ReviewClient,
    TaskCreate, TaskPage, ToolsClient,
};
use vbic_console::frame::Encoder;

const TIMEOUT: Duration = Duration::from_secs(5);

fn jpeg(name: &str) -> EncodedImage {
    let frame = RasterFrame::new(vec![120u8; 64 * 48 * 3], 64, 48);
    JpegEncoder::default().encode(&frame, name).expect("encode")
}

#[test]
fn health_codes_are_recorded_per_probe() {
    let server = StubServer::start(|request| match request.path() {
        "/api/inference/healthz" => (200, "ok".into()),
        "/api/inference/readyz" => (503, "warming up".into()),
        "/api/inference/livez" => (200, "ok".into()),
        _ => (404, String::new()),
    });
    let services = vec![ServiceEndpoint::new("inference", "Inference", "/api/inference")];
    let poller = HealthPoller::new(&server.base_url(), &services, TIMEOUT).unwrap();

    let results = poller.poll();
    assert_eq!(results.len(), 1);
    let (service, health) = &results[0];
    assert_eq!(service.key, "inference");
    assert_eq!(health.codes(), [200, 503, 200]);
    assert!(!health.is_healthy());

    let probed: Vec<String> = server.requests().iter().map(|r| r.path().to_string()).collect();
    assert_eq!(
        probed,
        vec![
            "/api/inference/healthz",
            "/api/inference/readyz",
            "/api/inference/livez"
        ]
    );
}

#[test]
fn unreachable_service_reports_offline() {
    let services = vec![ServiceEndpoint::new("catalog", "Catalog", "/api/catalog")];
    let poller =
        HealthPoller::new(&closed_base_url(), &services, Duration::from_millis(500)).unwrap();

    let (_, health) = poller.poll().remove(0);
    assert_eq!(health.codes(), [0, 0, 0]);
    assert_eq!(format_status(Language::En, Some(health.healthz)), "offline");
}

#[test]
fn inference_upload_is_single_file_multipart() {
    let server = StubServer::start(|request| {
        assert_eq!(request.path(), "/api/inference/predict");
        (
            200,
            r#"{"predictions":[{"label":"apple","confidence":0.91,"box":{"x":1,"y":2,"w":3,"h":4}}]}"#
                .into(),
        )
    });
    let client = InferenceClient::new(&server.base_url(), "/api/inference", TIMEOUT).unwrap();
    let image = jpeg("webcam-capture-1.jpg");

    let report = recognize::recognize(&client, &image).unwrap();
    assert_eq!(report.image_name, "webcam-capture-1.jpg");
    assert_eq!(report.natural_size, Some((64, 48)));
    assert_eq!(report.top().unwrap().label, "apple");

    let request = server.requests_to("/api/inference/predict").remove(0);
    assert_eq!(request.method, "POST");
    let content_type = request.header("content-type").unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = request.body_text();
    assert!(body.contains(
        "Content-Disposition: form-data; name=\"file\"; filename=\"webcam-capture-1.jpg\""
    ));
    assert!(body.contains("Content-Type: image/jpeg"));
    assert_eq!(body.matches("Content-Disposition").count(), 1);
}

#[test]
fn png_upload_keeps_its_size_for_the_overlay() {
    let server = StubServer::start(|_| {
        (
            200,
            r#"{"predictions":[{"label":"pear","confidence":0.8,"box":{"x":20,"y":10,"w":40,"h":20}}]}"#
                .into(),
        )
    });
    let client = InferenceClient::new(&server.base_url(), "/api/inference", TIMEOUT).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shelf.png");
    image::RgbImage::new(80, 40).save(&path).unwrap();

    let report = recognize::recognize_file(&client, &path).unwrap();
    assert_eq!(report.image_name, "shelf.png");
    assert_eq!(report.natural_size, Some((80, 40)));
    let rect = report.overlay((40.0, 20.0)).unwrap();
    assert_eq!(
        (rect.left, rect.top, rect.width, rect.height),
        (10.0, 5.0, 20.0, 10.0)
    );

    let body = server.requests_to("/api/inference/predict").remove(0).body_text();
    assert!(body.contains("filename=\"shelf.png\""));
    assert!(body.contains("Content-Type: image/png"));
}

#[test]
fn inference_error_status_is_typed() {
    let server = StubServer::start(|_| (500, r#"{"detail":"boom"}"#.into()));
    let client = InferenceClient::new(&server.base_url(), "/api/inference", TIMEOUT).unwrap();

    let err = client.predict_once(&jpeg("a.jpg")).unwrap_err();
    assert_eq!(err, LiveError::PredictionStatus(500));
    assert_eq!(err.to_string(), "Inference failed (500)");

    let garbled = StubServer::start(|_| (200, "not json".into()));
    let client = InferenceClient::new(&garbled.base_url(), "/api/inference", TIMEOUT).unwrap();
    assert!(matches!(
        client.predict_once(&jpeg("a.jpg")),
        Err(LiveError::PredictionFailed(_))
    ));

    let offline = InferenceClient::new(&closed_base_url(), "/api/inference", TIMEOUT).unwrap();
    assert!(matches!(
        offline.predict_once(&jpeg("a.jpg")),
        Err(LiveError::PredictionFailed(_))
    ));
}

#[test]
fn review_tasks_create_and_list() {
    let server = StubServer::start(|request| match (request.method.as_str(), request.path()) {
        ("POST", "/api/review-tasks/tasks") => (
            201,
            r#"{"id":3,"created_at":"2024-05-01T10:00:00","label":"apple",
                "confidence":0.91,"image_name":"apple.jpg","status":"pending"}"#
                .into(),
        ),
        ("GET", "/api/review-tasks/tasks") => (
            200,
            r#"[{"id":3,"created_at":"2024-05-01T10:00:00","label":"apple",
                 "confidence":0.91,"image_name":null,"status":"pending"}]"#
                .into(),
        ),
        _ => (404, String::new()),
    });
    let client = ReviewClient::new(&server.base_url(), "/api/review-tasks", TIMEOUT).unwrap();

    let created = client
        .create_task(&TaskCreate {
            label: "apple".into(),
            confidence: 0.91,
            image_name: Some("apple.jpg".into()),
        })
        .unwrap()
        .expect("created task echoed");
    assert_eq!(created.id, 3);

    let tasks = client.list_tasks(Some(TaskPage::new(20, 10).unwrap())).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].image_display(), "—");

    let posted = server.requests_to("/api/review-tasks/tasks");
    assert_eq!(
        posted[0].json(),
        json!({"label": "apple", "confidence": 0.91, "image_name": "apple.jpg"})
    );
    assert!(posted[1].target.contains("offset=20"));
    assert!(posted[1].target.contains("limit=10"));
}

#[test]
fn review_failures_carry_status() {
    let server = StubServer::start(|_| (503, String::new()));
    let client = ReviewClient::new(&server.base_url(), "/api/review-tasks", TIMEOUT).unwrap();

    let err = client
        .create_task(&TaskCreate {
            label: "apple".into(),
            confidence: 0.5,
            image_name: None,
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "Task creation failed (503)");
    let err = client.list_tasks(None).unwrap_err();
    assert_eq!(err.to_string(), "Failed to load tasks (503)");
}

#[test]
fn assistant_tools_round_trip() {
    let server = StubServer::start(|request| match request.path() {
        "/api/operator-assistant/tools" => (
            200,
            r#"[{"name":"echo","description":"Echo input"},{"name":"summarize"}]"#.into(),
        ),
        "/api/operator-assistant/tools/echo" => (200, request.body_text()),
        "/api/operator-assistant/tools/summarize" => (200, r#"{"summary":"short"}"#.into()),
        _ => (404, String::new()),
    });
    let client =
        ToolsClient::new(&server.base_url(), "/api/operator-assistant", TIMEOUT).unwrap();

    let tools = client.list_tools().unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[1].description, None);

    let echoed = client.echo(&parse_echo_payload("{broken")).unwrap();
    assert_eq!(echoed, json!({}));

    let summary = client.summarize("a long receipt").unwrap();
    assert_eq!(summary, json!({"summary": "short"}));
    let sent = server.requests_to("/api/operator-assistant/tools/summarize");
    assert_eq!(sent[0].json(), json!({"text": "a long receipt"}));
}

#[test]
fn failed_tool_listing_offers_no_tools() {
    let server = StubServer::start(|_| (500, r#"{"detail":"assistant down"}"#.into()));
    let client =
        ToolsClient::new(&server.base_url(), "/api/operator-assistant", TIMEOUT).unwrap();

    assert!(client.list_tools().is_err());
    let tools = client.available_tools();
    assert!(tools.is_empty());
    assert_eq!(ui::tool_list(Language::En, &tools), "No tools available\n");

    let offline =
        ToolsClient::new(&closed_base_url(), "/api/operator-assistant", TIMEOUT).unwrap();
    assert!(offline.available_tools().is_empty());
}

#[test]
fn rejected_tool_call_reports_service_detail() {
    let server = StubServer::start(|request| match request.path() {
        "/api/operator-assistant/tools/summarize" => (
            422,
            r#"{"detail":[{"loc":["body","text"],"msg":"field required"}]}"#.into(),
        ),
        _ => (500, "upstream exploded".into()),
    });
    let client =
        ToolsClient::new(&server.base_url(), "/api/operator-assistant", TIMEOUT).unwrap();

    let err = client.summarize("").unwrap_err().to_string();
    assert!(err.starts_with("Tool summarize failed (422): "));
    assert!(err.contains("field required"));

    let err = client.echo(&json!({})).unwrap_err().to_string();
    assert_eq!(err, "Tool echo failed (500)");
}
