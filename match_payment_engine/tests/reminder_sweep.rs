use chrono::Duration;
use match_payment_engine::{
    db_types::{MatchId, MatchStage},
    flow_objects::ExpiryOutcome,
    reminders::{ReminderKind, ReminderScheduler, ReminderStatus, SweepConfig, Urgency},
    test_utils::RecordingNotifier,
    traits::ReminderStore,
};

use crate::support::{player, TestSystem};

mod support;

fn config(owner: &str) -> SweepConfig {
    SweepConfig { owner: owner.to_string(), ..Default::default() }
}

#[tokio::test]
async fn deadline_reminder_closes_the_window() {
    let sys = TestSystem::new().await;
    sys.create_match("sweep", 2, 4, 300).await;
    sys.join_players("sweep", 1..=3).await;
    sys.pay("sweep", 1..=2, 150).await;
    let match_id = MatchId::from("sweep");
    let scheduler = ReminderScheduler::new(sys.db.clone(), sys.notifier.clone(), config("a"));

    // Nothing is due yet
    let result = scheduler.sweep(sys.clock.now(), &sys.api).await.unwrap();
    assert_eq!(result.claimed, 0);

    sys.clock.advance(Duration::minutes(61));
    let result = scheduler.sweep(sys.clock.now(), &sys.api).await.unwrap();
    // Only the unpaid player still has an active campaign
    assert_eq!(result.claimed, 1);
    assert_eq!(result.delivered, 1);
    assert_eq!(result.deadlines, vec![match_id.clone()]);
    assert_eq!(sys.notifier.count_with_urgency(Urgency::DeadlineReached), 1);
    assert_eq!(sys.notifier.sent_to(&player(3)).last().unwrap().message.title, "Removed from match");

    let state = sys.api.fetch_match(&match_id).await.unwrap();
    assert_eq!(state.stage, MatchStage::HardLock);
    assert_eq!(state.current_player_count, 2);
    let reminder = sys.db.fetch_reminder(&match_id, &player(3)).await.unwrap().unwrap();
    assert_eq!(reminder.status, ReminderStatus::Retired);

    // The backstop finds nothing left to do
    let outcomes = sys.api.expire_due_windows().await.unwrap();
    assert!(outcomes.is_empty());
    sys.tear_down().await;
}

#[tokio::test]
async fn backstop_closes_windows_when_everyone_paid() {
    let sys = TestSystem::new().await;
    sys.create_match("backstop", 2, 4, 300).await;
    sys.join_players("backstop", 1..=2).await;
    sys.pay("backstop", 1..=2, 150).await;
    let scheduler = ReminderScheduler::new(sys.db.clone(), sys.notifier.clone(), config("a"));

    sys.clock.advance(Duration::hours(2));
    let result = scheduler.sweep(sys.clock.now(), &sys.api).await.unwrap();
    assert_eq!(result.claimed, 0);

    let outcomes = sys.api.expire_due_windows().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], ExpiryOutcome::Locked { evicted, .. } if evicted.is_empty()));
    assert!(sys.api.expire_due_windows().await.unwrap().is_empty());
    sys.tear_down().await;
}

#[tokio::test]
async fn leased_reminders_are_not_fired_twice() {
    let sys = TestSystem::new().await;
    let match_id = MatchId::from("leases");
    let notifier_a = RecordingNotifier::default();
    let notifier_b = RecordingNotifier::default();
    let a = ReminderScheduler::new(sys.db.clone(), notifier_a.clone(), config("a"));
    let b = ReminderScheduler::new(sys.db.clone(), notifier_b.clone(), config("b"));
    let now = sys.clock.now();
    let deadline = now + Duration::days(10);
    for i in 1..=3 {
        a.create(&match_id, &player(i), deadline, now).await.unwrap();
    }

    // Somebody else is holding the seven-day reminders
    let at = now + Duration::days(3);
    let claimed = sys.db.claim_due_reminders(at, "crashed", Duration::seconds(120), 10).await.unwrap();
    assert_eq!(claimed.len(), 3);
    let result = b.sweep(at, &()).await.unwrap();
    assert_eq!(result.claimed, 0);

    // The lease runs out and the reminders are picked up
    let later = at + Duration::seconds(121);
    let result = b.sweep(later, &()).await.unwrap();
    assert_eq!(result.claimed, 3);
    assert_eq!(result.delivered, 3);
    assert_eq!(notifier_b.count_with_urgency(Urgency::SevenDay), 3);

    // ...exactly once
    let result = a.sweep(later, &()).await.unwrap();
    assert_eq!(result.claimed, 0);
    assert!(notifier_a.sent().is_empty());
    let reminder = sys.db.fetch_reminder(&match_id, &player(1)).await.unwrap().unwrap();
    assert_eq!(reminder.next_kind, Some(ReminderKind::ThreeDay));
    assert_eq!(reminder.next_fire_at, Some(now + Duration::days(7)));
    sys.tear_down().await;
}

#[tokio::test]
async fn failed_deliveries_still_advance() {
    let sys = TestSystem::new().await;
    let match_id = MatchId::from("offline");
    let scheduler = ReminderScheduler::new(sys.db.clone(), sys.notifier.clone(), config("a"));
    let now = sys.clock.now();
    scheduler.create(&match_id, &player(1), now + Duration::days(10), now).await.unwrap();

    sys.notifier.set_failing(true);
    let result = scheduler.sweep(now + Duration::days(3), &()).await.unwrap();
    assert_eq!(result.claimed, 1);
    assert_eq!(result.delivered, 0);
    assert_eq!(result.failed_deliveries, 1);
    let reminder = sys.db.fetch_reminder(&match_id, &player(1)).await.unwrap().unwrap();
    assert!(reminder.triggered.seven_day.is_some());
    assert_eq!(reminder.next_kind, Some(ReminderKind::ThreeDay));
    sys.tear_down().await;
}

#[tokio::test]
async fn ten_day_campaign_over_the_store() {
    let sys = TestSystem::new().await;
    let match_id = MatchId::from("campaign");
    let scheduler = ReminderScheduler::new(sys.db.clone(), sys.notifier.clone(), config("a"));
    let start = sys.clock.now();
    let deadline = start + Duration::days(10);
    scheduler.create(&match_id, &player(1), deadline, start).await.unwrap();

    let mut now = start;
    while now <= deadline + Duration::hours(1) {
        scheduler.sweep(now, &()).await.unwrap();
        now += Duration::minutes(30);
    }
    let n = &sys.notifier;
    assert_eq!(n.count_with_urgency(Urgency::SevenDay), 1);
    assert_eq!(n.count_with_urgency(Urgency::ThreeDay), 1);
    assert_eq!(n.count_with_urgency(Urgency::OneDay), 1);
    assert_eq!(n.count_with_urgency(Urgency::Hourly), 23);
    assert_eq!(n.count_with_urgency(Urgency::DeadlineReached), 1);
    let reminder = sys.db.fetch_reminder(&match_id, &player(1)).await.unwrap().unwrap();
    assert_eq!(reminder.status, ReminderStatus::Retired);
    assert!(reminder.next_fire_at.is_none());

    // Cancelling a retired campaign is a no-op
    scheduler.cancel(&match_id, &player(1)).await.unwrap();
    let reminder = sys.db.fetch_reminder(&match_id, &player(1)).await.unwrap().unwrap();
    assert_eq!(reminder.status, ReminderStatus::Retired);
    sys.tear_down().await;
}
