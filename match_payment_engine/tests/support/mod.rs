#![allow(dead_code)]
use chrono::{DateTime, Duration, TimeZone, Utc};
use log::*;
use match_payment_engine::{
    db_types::{MatchId, MatchPaymentState, NewMatch, UserId},
    events::EventProducers,
    helpers::{Clock, RetryPolicy},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        RecordingCapture,
        RecordingNotifier,
    },
    traits::MatchStore,
    MatchFlowApi,
    SqliteDatabase,
};
use mp_common::Money;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub type TestApi = MatchFlowApi<SqliteDatabase, RecordingNotifier, RecordingCapture>;

pub struct TestSystem {
    pub api: TestApi,
    pub db: SqliteDatabase,
    pub notifier: RecordingNotifier,
    pub capture: RecordingCapture,
    pub clock: Clock,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
}

pub fn player(i: usize) -> UserId {
    UserId::from(format!("player{i:02}"))
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let notifier = RecordingNotifier::default();
        let capture = RecordingCapture::default();
        let clock = Clock::manual(t0());
        let api = MatchFlowApi::new(db.clone(), notifier.clone(), capture.clone(), producers)
            .with_retry_policy(RetryPolicy::new(8, std::time::Duration::from_millis(2)))
            .with_clock(clock.clone());
        Self { api, db, notifier, capture, clock }
    }

    /// A match starting four hours from now, so quorum opens a 60 minute window.
    pub async fn create_match(&self, id: &str, min: u32, max: u32, total_cost: i64) -> MatchPaymentState {
        let new = NewMatch::new(
            MatchId::from(id),
            UserId::from("organizer"),
            min,
            max,
            Money::from(total_cost),
            self.clock.now() + Duration::hours(4),
        );
        self.api.create_match(new).await.expect("Error creating match")
    }

    pub async fn join_players(&self, id: &str, players: impl IntoIterator<Item = usize>) -> MatchPaymentState {
        let match_id = MatchId::from(id);
        let mut state = None;
        for i in players {
            state = Some(self.api.on_participant_join(&match_id, player(i)).await.expect("Error joining match"));
        }
        state.expect("No players joined")
    }

    pub async fn pay(&self, id: &str, players: impl IntoIterator<Item = usize>, amount: i64) -> MatchPaymentState {
        let match_id = MatchId::from(id);
        let mut state = None;
        for i in players {
            let res = self.api.on_payment_received(&match_id, &player(i), Money::from(amount)).await;
            state = Some(res.expect("Error recording payment"));
        }
        state.expect("No payments made")
    }

    pub async fn tear_down(mut self) {
        let url = self.db.url().to_string();
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = Sqlite::drop_database(&url).await {
            warn!("🚀️ Could not remove test database {url}: {e}");
        }
    }
}
