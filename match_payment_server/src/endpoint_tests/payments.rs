use actix_web::http::StatusCode;
use match_payment_engine::{
    db_types::{MatchPaymentState, MatchStage, UserId},
    traits::CaptureError,
};
use mp_common::Money;
use serde_json::json;

use super::{
    helpers::{create_match, get, join, pay, post, test_api},
    mocks::{quiet_notifier, MockCapture},
};

fn state(body: &str) -> MatchPaymentState {
    serde_json::from_str(body).expect("Not a match payment state")
}

#[actix_web::test]
async fn payments_are_charged_with_the_clients_key() {
    let mut capture = MockCapture::new();
    capture
        .expect_charge()
        .withf(|req| {
            req.user_id == UserId::from("alice") && req.amount == Money::from(200) && req.idempotency_key == "app-1234"
        })
        .times(1)
        .returning(|_| Ok("tx-1".to_string()));
    let api = test_api(quiet_notifier(), capture).await;
    create_match(&api, "m1", 2, 4, 400).await;
    join(&api, "m1", "alice").await;
    join(&api, "m1", "bob").await;

    let body = json!({ "user_id": "alice", "amount": 200, "idempotency_key": "app-1234" });
    let (status, body) = post(&api, "/matches/m1/pay", &body).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let paid = state(&body);
    let alice = paid.player_payments.iter().find(|p| p.user_id == UserId::from("alice")).unwrap();
    assert!(alice.is_paid);
    assert_eq!(alice.transaction_ref.as_deref(), Some("tx-1"));

    // A second payment is refused before the processor is called
    let (status, _) = pay(&api, "m1", "alice", 200).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn declined_charges_are_reported_as_gateway_errors() {
    let mut capture = MockCapture::new();
    capture.expect_charge().times(1).returning(|_| Err(CaptureError::Declined("insufficient funds".into())));
    capture.expect_refund().never();
    let api = test_api(quiet_notifier(), capture).await;
    create_match(&api, "m1", 2, 4, 400).await;
    join(&api, "m1", "alice").await;
    join(&api, "m1", "bob").await;

    let (status, body) = pay(&api, "m1", "alice", 200).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("insufficient funds"), "{body}");

    let (_, body) = get(&api, "/matches/m1").await;
    let state = state(&body);
    assert_eq!(state.stage, MatchStage::PaymentWindow);
    assert!(state.player_payments.iter().all(|p| p.amount_paid == Money::ZERO));
}

#[actix_web::test]
async fn payments_outside_the_window_never_reach_the_processor() {
    let mut capture = MockCapture::new();
    capture.expect_charge().never();
    let api = test_api(quiet_notifier(), capture).await;
    create_match(&api, "m1", 2, 4, 400).await;
    join(&api, "m1", "alice").await;

    let (status, body) = pay(&api, "m1", "alice", 200).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("not open"), "{body}");

    join(&api, "m1", "bob").await;
    let (status, _) = pay(&api, "m1", "alice", -5).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = pay(&api, "m1", "mallory", 200).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn payments_that_would_overflow_are_rejected() {
    let mut capture = MockCapture::new();
    capture.expect_charge().times(1).returning(|_| Ok("tx-1".to_string()));
    capture.expect_refund().never();
    let api = test_api(quiet_notifier(), capture).await;
    create_match(&api, "m1", 2, 4, 400).await;
    join(&api, "m1", "alice").await;
    join(&api, "m1", "bob").await;

    let (status, _) = pay(&api, "m1", "alice", 1).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = pay(&api, "m1", "alice", i64::MAX).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, body) = get(&api, "/matches/m1").await;
    let alice = state(&body).player_payments.into_iter().find(|p| p.user_id == UserId::from("alice")).unwrap();
    assert_eq!(alice.amount_paid, Money::from(1));
}
