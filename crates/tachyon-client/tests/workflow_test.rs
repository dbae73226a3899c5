//! End-to-end dataset, golden and evaluation workflows against a mock
//! backend.

mod common;

use std::time::Duration;

use serde_json::json;
use tachyon_client::{
    parse_golden_import, EvaluationRequest, EvaluationStatus, GoldenPatch, HistoryPoller, NewGolden,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{dataset_json, golden_json, hits, history_json, scoped};

#[tokio::test]
async fn test_dataset_and_golden_lifecycle() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(scoped("datasets")))
        .and(body_json(json!({"alias": "Sales-QA"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(dataset_json("d1", "Sales-QA")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(scoped("datasets")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([dataset_json("d1", "Sales-QA")])),
        )
        .mount(&server)
        .await;
    // empty until the golden is created
    Mock::given(method("GET"))
        .and(path(scoped("datasets/d1/goldens")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(scoped("datasets/d1/goldens")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([golden_json("g1", "Q", "A")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(scoped("datasets/d1/goldens")))
        .respond_with(ResponseTemplate::new(201).set_body_json(golden_json("g1", "Q", "A")))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server);

    let dataset = client.create_dataset("Sales-QA").await.unwrap();
    assert_eq!(dataset.id, "d1");
    assert_eq!(dataset.num_goldens, 0);

    let datasets = client.get_datasets().await.unwrap();
    assert!(datasets.iter().any(|d| d.id == "d1"));
    assert_eq!(hits(&server, "GET", &scoped("datasets")).await, 1);

    assert!(client.get_goldens("d1").await.unwrap().is_empty());

    let golden = client
        .create_golden("d1", &NewGolden::new("Q", "A"))
        .await
        .unwrap();
    assert_eq!(golden.id, "g1");

    let goldens = client.get_goldens("d1").await.unwrap();
    assert_eq!(goldens, vec![golden]);
    assert_eq!(hits(&server, "GET", &scoped("datasets/d1/goldens")).await, 2);
}

#[tokio::test]
async fn test_update_and_delete_golden() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(scoped("datasets/d1/goldens/g1")))
        .and(body_json(json!({"expectedOutput": "A2", "tags": ["smoke"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(golden_json("g1", "Q", "A2")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(scoped("datasets/d1/goldens/g1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server);

    let patch = GoldenPatch::default()
        .with_expected_output("A2")
        .with_tags(vec!["smoke".into()]);
    let updated = client.update_golden("d1", "g1", &patch).await.unwrap();
    assert_eq!(updated.expected_output, "A2");

    // blanking a required field never reaches the server
    let blank = GoldenPatch::default().with_input(" ");
    assert!(client.update_golden("d1", "g1", &blank).await.is_err());

    client.delete_golden("d1", "g1").await.unwrap();
}

#[tokio::test]
async fn test_invalid_import_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(scoped("datasets/d1/goldens/import")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let client = common::client(&server);

    let err = parse_golden_import(r#"[{"input": "a"}]"#).unwrap_err();
    assert!(err.message().contains("expectedOutput"));

    let err = client
        .import_goldens("d1", &[NewGolden::new("a", "")])
        .await
        .unwrap_err();
    assert_eq!(err.status(), 400);
    assert!(err.message().contains("expectedOutput"));
}

#[tokio::test]
async fn test_import_posts_array_and_clears_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(scoped("datasets/d1/goldens")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(scoped("datasets/d1/goldens/import")))
        .and(body_json(json!([
            {"input": "Q1", "expectedOutput": "A1", "context": "", "retrievalContext": "", "count": 0, "tags": []},
            {"input": "Q2", "expectedOutput": "A2", "context": "", "retrievalContext": "", "count": 0, "tags": []}
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            golden_json("g1", "Q1", "A1"),
            golden_json("g2", "Q2", "A2")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server);
    client.get_goldens("d1").await.unwrap();

    let goldens =
        parse_golden_import(r#"[{"input":"Q1","expectedOutput":"A1"},{"input":"Q2","expectedOutput":"A2"}]"#)
            .unwrap();
    let created = client.import_goldens("d1", &goldens).await.unwrap();
    assert_eq!(created.len(), 2);

    client.get_goldens("d1").await.unwrap();
    assert_eq!(hits(&server, "GET", &scoped("datasets/d1/goldens")).await, 2);
}

#[tokio::test]
async fn test_submit_and_check_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(scoped("evaluations")))
        .and(body_json(json!({
            "evaluation_name": "nightly",
            "dataset_id": "d1",
            "model_id": "gemini_pro_2_0",
            "temperature": "0.2",
            "parameters": [{"name": "top_k", "value": "5"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_json("e1", "d1", "pending")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(scoped("evaluations/e1/status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "running",
            "progress": 40.0,
            "message": "scoring",
            "details": {
                "totalGoldens": 10,
                "processedGoldens": 4,
                "startTime": "2024-01-01T00:00:00Z",
                "currentGolden": {"id": "g5", "input": "Q5", "status": "processing"}
            }
        })))
        .mount(&server)
        .await;

    let client = common::client(&server);
    let request = EvaluationRequest::new("nightly", "d1", "gemini_pro_2_0", 0.2)
        .with_parameter("top_k", "5");
    let run = client.submit_evaluation(&request).await.unwrap();
    assert_eq!(run.id, "e1");
    assert_eq!(run.status, EvaluationStatus::Pending);

    let report = client.get_evaluation_status("e1").await.unwrap();
    assert_eq!(report.status, EvaluationStatus::Running);
    assert_eq!(report.details.processed_goldens, 4);
    assert_eq!(report.details.current_golden.unwrap().id, "g5");
}

#[tokio::test]
async fn test_history_with_null_fields_still_lists() {
    let server = MockServer::start().await;
    let mut sparse = history_json("e2", "d1", "failed");
    sparse["parameters"] = json!(null);
    sparse["temperature"] = json!(null);
    sparse["result"] = json!(null);
    Mock::given(method("GET"))
        .and(path(scoped("evaluations")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([history_json("e1", "d1", "completed"), sparse])),
        )
        .mount(&server)
        .await;

    let client = common::client(&server);
    let history = client.get_evaluation_history().await.unwrap();

    assert_eq!(history.len(), 2);
    assert!(history[1].parameters.is_empty());
    assert_eq!(history[1].temperature, "");
    assert_eq!(history[1].status, EvaluationStatus::Failed);
}

#[tokio::test]
async fn test_poller_publishes_until_run_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(scoped("datasets")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([dataset_json("d1", "Sales-QA")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(scoped("evaluations")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_json("e1", "d1", "running")])))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(scoped("evaluations")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_json("e1", "d1", "completed")])))
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut handle = HistoryPoller::new(client.clone(), "e1")
        .with_interval(Duration::from_millis(20))
        .start();

    let mut observed = Vec::new();
    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(snapshot) = handle.changed().await {
            assert_eq!(snapshot.tracked().unwrap().dataset_name, "Sales-QA");
            observed.push(snapshot.tracked_status().unwrap());
        }
    })
    .await;
    assert!(finished.is_ok(), "poller did not finish");

    assert_eq!(observed.last(), Some(&EvaluationStatus::Completed));
    assert!(handle.latest().unwrap().is_finished());
    assert!(handle.is_finished());

    // no polling after the terminal snapshot
    let polls = hits(&server, "GET", &scoped("evaluations")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hits(&server, "GET", &scoped("evaluations")).await, polls);
}

#[tokio::test]
async fn test_poller_never_reports_regressed_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(scoped("datasets")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(scoped("evaluations")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            history_json("e1", "d1", "running"),
            history_json("e0", "d1", "completed")
        ])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    // stale replica answers afterwards
    Mock::given(method("GET"))
        .and(path(scoped("evaluations")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            history_json("e1", "d1", "pending"),
            history_json("e0", "d1", "running")
        ])))
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut handle = HistoryPoller::new(client, "e1")
        .with_interval(Duration::from_millis(10))
        .start();

    for _ in 0..4 {
        let snapshot = tokio::time::timeout(Duration::from_secs(5), handle.changed())
            .await
            .unwrap()
            .unwrap();
        let status = |id: &str| snapshot.rows.iter().find(|r| r.id == id).unwrap().status;
        assert_eq!(status("e1"), EvaluationStatus::Running);
        assert_eq!(status("e0"), EvaluationStatus::Completed);
        // unknown dataset falls back to its id
        assert_eq!(snapshot.rows[0].dataset_name, "d1");
    }

    handle.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.is_finished());
}

#[tokio::test]
async fn test_dropping_handle_stops_polling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(scoped("datasets")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(scoped("evaluations")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_json("e1", "d1", "running")])))
        .mount(&server)
        .await;

    let client = common::client(&server);
    let mut handle = HistoryPoller::new(client, "e1")
        .with_interval(Duration::from_millis(10))
        .start();
    tokio::time::timeout(Duration::from_secs(5), handle.changed())
        .await
        .unwrap()
        .unwrap();
    drop(handle);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let polls = hits(&server, "GET", &scoped("evaluations")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hits(&server, "GET", &scoped("evaluations")).await, polls);
}
