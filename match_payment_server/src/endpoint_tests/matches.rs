use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use match_payment_engine::{
    db_types::{MatchPaymentState, MatchStage, StageLogEntry},
    flow_objects::{CancelResult, ExpiryOutcome},
    test_utils::{RecordingCapture, RecordingNotifier},
};
use mp_common::Money;
use serde_json::json;

use super::helpers::{create_match, get, join, new_match_body, pay, post, send_request, test_api};

fn state(body: &str) -> MatchPaymentState {
    serde_json::from_str(body).expect("Not a match payment state")
}

#[actix_web::test]
async fn health_endpoint() {
    let api = test_api(RecordingNotifier::default(), RecordingCapture::default()).await;
    let (status, body) = send_request(&api, TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn create_and_fetch_a_match() {
    let api = test_api(RecordingNotifier::default(), RecordingCapture::default()).await;
    let starts_at = Utc::now() + Duration::hours(4);
    let (status, body) = post(&api, "/matches", &new_match_body("m1", 4, 8, 800, starts_at)).await;
    assert_eq!(status, StatusCode::CREATED);
    let created = state(&body);
    assert_eq!(created.stage, MatchStage::FreeJoining);
    assert_eq!(created.current_player_count, 0);

    let (status, body) = get(&api, "/matches/m1").await;
    assert_eq!(status, StatusCode::OK);
    let fetched = state(&body);
    assert_eq!(fetched.match_id, created.match_id);
    assert_eq!(fetched.total_cost, Money::from(800));

    let (status, body) = post(&api, "/matches", &new_match_body("m1", 4, 8, 800, starts_at)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"Match m1 already exists"}"#);
}

#[actix_web::test]
async fn unknown_matches_are_not_found() {
    let api = test_api(RecordingNotifier::default(), RecordingCapture::default()).await;
    let (status, body) = get(&api, "/matches/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Match nope"}"#);
    let (status, _) = join(&api, "nope", "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn invalid_matches_are_rejected() {
    let api = test_api(RecordingNotifier::default(), RecordingCapture::default()).await;
    let body = new_match_body("m1", 8, 4, 800, Utc::now() + Duration::hours(4));
    let (status, _) = post(&api, "/matches", &body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post(&api, "/matches", &json!({ "match_id": "m2" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn reaching_quorum_opens_the_payment_window() {
    let notifier = RecordingNotifier::default();
    let api = test_api(notifier.clone(), RecordingCapture::default()).await;
    create_match(&api, "m1", 2, 4, 400).await;
    let (status, body) = join(&api, "m1", "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state(&body).stage, MatchStage::FreeJoining);

    let (status, body) = join(&api, "m1", "bob").await;
    assert_eq!(status, StatusCode::OK);
    let opened = state(&body);
    assert_eq!(opened.stage, MatchStage::PaymentWindow);
    assert_eq!(opened.cost_per_player, Money::from(200));
    let start = opened.payment_window_start.unwrap();
    assert_eq!(opened.payment_window_end.unwrap() - start, Duration::minutes(60));
    assert_eq!(notifier.sent().len(), 2);

    let (status, _) = join(&api, "m1", "bob").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = get(&api, "/matches/m1/stages").await;
    assert_eq!(status, StatusCode::OK);
    let log: Vec<StageLogEntry> = serde_json::from_str(&body).unwrap();
    let stages = log.iter().map(|e| (e.from_stage, e.to_stage)).collect::<Vec<_>>();
    assert_eq!(stages, vec![
        (MatchStage::FreeJoining, MatchStage::SoftLock),
        (MatchStage::SoftLock, MatchStage::PaymentWindow)
    ]);
}

#[actix_web::test]
async fn leaving_before_and_after_paying() {
    let api = test_api(RecordingNotifier::default(), RecordingCapture::default()).await;
    create_match(&api, "m1", 2, 4, 400).await;
    for user in ["alice", "bob", "carol"] {
        join(&api, "m1", user).await;
    }
    let (status, _) = pay(&api, "m1", "alice", 133).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&api, "/matches/m1/leave", &json!({ "user_id": "alice" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("already paid for"), "{body}");

    let (status, body) = post(&api, "/matches/m1/leave", &json!({ "user_id": "carol" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state(&body).current_player_count, 2);

    let (status, _) = post(&api, "/matches/m1/leave", &json!({ "user_id": "carol" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn expiring_an_open_window_is_refused() {
    let api = test_api(RecordingNotifier::default(), RecordingCapture::default()).await;
    create_match(&api, "m1", 2, 4, 400).await;

    // Nothing to close yet
    let (status, body) = post(&api, "/matches/m1/expire", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let outcome: ExpiryOutcome = serde_json::from_str(&body).unwrap();
    assert!(matches!(outcome, ExpiryOutcome::Unchanged { .. }));

    join(&api, "m1", "alice").await;
    join(&api, "m1", "bob").await;
    let (status, body) = post(&api, "/matches/m1/expire", &json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("still open"), "{body}");

    let (status, _) = post(&api, "/matches/m1/confirm", &json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn cancelling_refunds_and_closes_the_match() {
    let capture = RecordingCapture::default();
    let api = test_api(RecordingNotifier::default(), capture.clone()).await;
    create_match(&api, "m1", 2, 4, 400).await;
    join(&api, "m1", "alice").await;
    join(&api, "m1", "bob").await;
    pay(&api, "m1", "alice", 200).await;

    let (status, body) = post(&api, "/matches/m1/cancel", &json!({ "reason": "Pitch flooded" })).await;
    assert_eq!(status, StatusCode::OK);
    let result: CancelResult = serde_json::from_str(&body).unwrap();
    assert_eq!(result.state.stage, MatchStage::Cancelled);
    assert_eq!(result.state.cancel_reason.as_deref(), Some("Pitch flooded"));
    assert_eq!(result.refunds.len(), 1);
    assert_eq!(result.refunds[0].amount, Money::from(200));
    assert_eq!(capture.refunds().len(), 1);

    let (status, _) = join(&api, "m1", "carol").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = post(&api, "/matches/m1/cancel", &json!({ "reason": "again" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
