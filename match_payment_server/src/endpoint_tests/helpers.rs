use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use match_payment_engine::{
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{NotificationDelivery, PaymentCapture},
    MatchFlowApi,
    SqliteDatabase,
};
use serde::Serialize;
use serde_json::json;

use crate::routes::{
    health,
    CancelMatchRoute,
    ConfirmMatchRoute,
    CreateMatchRoute,
    ExpireWindowRoute,
    GetMatchRoute,
    JoinMatchRoute,
    LeaveMatchRoute,
    PayRoute,
    StageLogRoute,
};

pub type TestApi<N, P> = web::Data<MatchFlowApi<SqliteDatabase, N, P>>;

/// A match flow API over a fresh database, wrapped for use as actix app data.
pub async fn test_api<N, P>(notifier: N, capture: P) -> TestApi<N, P>
where
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let db = prepare_test_env(&random_db_path()).await;
    web::Data::new(MatchFlowApi::new(db, notifier, capture, EventProducers::default()))
}

pub async fn send_request<N, P>(api: &TestApi<N, P>, req: TestRequest) -> (StatusCode, String)
where
    N: NotificationDelivery + 'static,
    P: PaymentCapture + 'static,
{
    let app = App::new()
        .app_data(api.clone())
        .service(health)
        .service(CreateMatchRoute::<SqliteDatabase, N, P>::new())
        .service(GetMatchRoute::<SqliteDatabase, N, P>::new())
        .service(StageLogRoute::<SqliteDatabase, N, P>::new())
        .service(JoinMatchRoute::<SqliteDatabase, N, P>::new())
        .service(LeaveMatchRoute::<SqliteDatabase, N, P>::new())
        .service(PayRoute::<SqliteDatabase, N, P>::new())
        .service(ExpireWindowRoute::<SqliteDatabase, N, P>::new())
        .service(ConfirmMatchRoute::<SqliteDatabase, N, P>::new())
        .service(CancelMatchRoute::<SqliteDatabase, N, P>::new());
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::call_service(&service, req.to_request()).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub async fn get<N, P>(api: &TestApi<N, P>, path: &str) -> (StatusCode, String)
where
    N: NotificationDelivery + 'static,
    P: PaymentCapture + 'static,
{
    send_request(api, TestRequest::get().uri(path)).await
}

pub async fn post<N, P, T>(api: &TestApi<N, P>, path: &str, body: &T) -> (StatusCode, String)
where
    N: NotificationDelivery + 'static,
    P: PaymentCapture + 'static,
    T: Serialize,
{
    send_request(api, TestRequest::post().uri(path).set_json(body)).await
}

pub fn new_match_body(id: &str, min: u32, max: u32, cost: i64, starts_at: DateTime<Utc>) -> serde_json::Value {
    json!({
        "match_id": id,
        "organizer_id": "organizer",
        "min_players": min,
        "max_players": max,
        "total_cost": cost,
        "starts_at": starts_at,
    })
}

/// A match starting four hours from now, which gives it a one hour payment window.
pub async fn create_match<N, P>(api: &TestApi<N, P>, id: &str, min: u32, max: u32, cost: i64)
where
    N: NotificationDelivery + 'static,
    P: PaymentCapture + 'static,
{
    let body = new_match_body(id, min, max, cost, Utc::now() + Duration::hours(4));
    let (status, body) = post(api, "/matches", &body).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

pub async fn join<N, P>(api: &TestApi<N, P>, id: &str, user: &str) -> (StatusCode, String)
where
    N: NotificationDelivery + 'static,
    P: PaymentCapture + 'static,
{
    post(api, &format!("/matches/{id}/join"), &json!({ "user_id": user })).await
}

pub async fn pay<N, P>(api: &TestApi<N, P>, id: &str, user: &str, amount: i64) -> (StatusCode, String)
where
    N: NotificationDelivery + 'static,
    P: PaymentCapture + 'static,
{
    post(api, &format!("/matches/{id}/pay"), &json!({ "user_id": user, "amount": amount })).await
}
