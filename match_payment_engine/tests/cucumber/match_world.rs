use chrono::{TimeZone, Utc};
use cucumber::World;
use log::*;
use match_payment_engine::{
    events::EventProducers,
    flow_objects::{ConfirmResult, ExpiryOutcome},
    helpers::{Clock, RetryPolicy},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        RecordingCapture,
        RecordingNotifier,
    },
    MatchFlowApi,
    MatchFlowError,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct MatchWorld {
    pub system: Option<MatchSystem>,
    pub last_error: Option<MatchFlowError>,
    pub last_expiry: Option<ExpiryOutcome>,
    pub last_confirm: Option<ConfirmResult>,
}

#[derive(Debug)]
pub struct MatchSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub api: MatchFlowApi<SqliteDatabase, RecordingNotifier, RecordingCapture>,
    pub notifier: RecordingNotifier,
    pub capture: RecordingCapture,
    pub clock: Clock,
}

impl MatchWorld {
    pub fn system(&self) -> &MatchSystem {
        self.system.as_ref().expect("Match system not initialised")
    }

    pub fn api(&self) -> &MatchFlowApi<SqliteDatabase, RecordingNotifier, RecordingCapture> {
        &self.system().api
    }
}

impl MatchSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        debug!("Created database: {db_path}");
        let notifier = RecordingNotifier::default();
        let capture = RecordingCapture::default();
        let clock = Clock::manual(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());
        let api = MatchFlowApi::new(db.clone(), notifier.clone(), capture.clone(), EventProducers::default())
            .with_retry_policy(RetryPolicy::new(8, std::time::Duration::from_millis(2)))
            .with_clock(clock.clone());
        Self { db_path, db, api, notifier, capture, clock }
    }
}
