//! HTTP-boundary tests for the classifier / finalization client.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use attendu_checkin::camera::CapturedFrame;
use attendu_checkin::client::{
    CheckInError, FinalizeOutcome, HttpRecognitionClient, RecognitionClient, ScanOutcome,
};
use attendu_config::ClassifierConfig;

fn frame() -> CapturedFrame {
    CapturedFrame {
        jpeg: vec![0xFF, 0xD8, 0xFF, 0xE0],
        width: 640,
        height: 480,
    }
}

fn client_for(server: &MockServer) -> HttpRecognitionClient {
    HttpRecognitionClient::new(ClassifierConfig {
        recognition_url: format!("{}/api/face-recognition", server.uri()),
        finalize_url: format!("{}/api/attendance/finalize", server.uri()),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn classify_posts_the_frame_and_maps_a_pending_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/face-recognition"))
        .and(body_partial_json(json!({
            "classId": "cls-1",
            "studentId": "stu-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "pending",
            "recordId": "rec-9",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client.classify(&frame(), "cls-1", "stu-1").await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Pending {
            record_id: Some("rec-9".to_string())
        }
    );
}

#[tokio::test]
async fn classify_accepts_the_snake_case_record_id_spelling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/face-recognition"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "pending",
            "record_id": "rec-10",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client.classify(&frame(), "cls-1", "stu-1").await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Pending {
            record_id: Some("rec-10".to_string())
        }
    );
}

#[tokio::test]
async fn classify_maps_success_and_already_marked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/face-recognition"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "attendance_status": "Present",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client.classify(&frame(), "cls-1", "stu-1").await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Recorded {
            attendance_status: "Present".to_string()
        }
    );

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/api/face-recognition"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "already_marked" })),
        )
        .mount(&server)
        .await;
    let outcome = client.classify(&frame(), "cls-1", "stu-1").await.unwrap();
    assert_eq!(outcome, ScanOutcome::AlreadyMarked);
}

#[tokio::test]
async fn classify_maps_an_unrecognized_status_to_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/face-recognition"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "no_match",
            "message": "Face recognition did not match.",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client.classify(&frame(), "cls-1", "stu-1").await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Rejected {
            message: Some("Face recognition did not match.".to_string())
        }
    );
}

#[tokio::test]
async fn classify_surfaces_backend_errors_with_their_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/face-recognition"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "message": "Recognizer is warming up.",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.classify(&frame(), "cls-1", "stu-1").await.unwrap_err();
    match err {
        CheckInError::Backend(message) => assert_eq!(message, "Recognizer is warming up."),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn finalize_maps_the_three_terminal_spellings() {
    for spelling in ["success", "finalized", "ok"] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/attendance/finalize"))
            .and(body_partial_json(json!({ "recordId": "rec-1" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "status": spelling })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client.finalize("rec-1").await.unwrap();
        assert_eq!(outcome, FinalizeOutcome::Finalized, "spelling {spelling}");
    }
}

#[tokio::test]
async fn finalize_maps_rejection_with_guidance_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/attendance/finalize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "rejected",
            "message": "Request must originate from campus.",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client.finalize("rec-1").await.unwrap();
    assert_eq!(
        outcome,
        FinalizeOutcome::Rejected {
            message: Some("Request must originate from campus.".to_string())
        }
    );
}

#[tokio::test]
async fn finalize_treats_an_unfamiliar_2xx_body_as_soft_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/attendance/finalize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client.finalize("rec-1").await.unwrap();
    assert_eq!(outcome, FinalizeOutcome::Completed { message: None });
}

#[tokio::test]
async fn finalize_turns_non_2xx_into_a_hard_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/attendance/finalize"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "message": "Store write failed.",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.finalize("rec-1").await.unwrap_err();
    match err {
        CheckInError::Finalize(message) => assert_eq!(message, "Store write failed."),
        other => panic!("unexpected error: {other:?}"),
    }
}
