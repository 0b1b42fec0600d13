use chrono::Duration;
use cucumber::{given, then, when};
use match_payment_engine::{
    db_types::{MatchId, MatchStage, NewMatch, UserId},
    flow_objects::ExpiryOutcome,
};
use mp_common::Money;

use crate::cucumber::{match_world::MatchSystem, MatchWorld};

fn player(i: usize) -> UserId {
    UserId::from(format!("player{i:02}"))
}

#[given("a clean match database")]
async fn clean_database(world: &mut MatchWorld) {
    world.system = Some(MatchSystem::new().await);
}

#[given(
    expr = "match {word} needs {int} to {int} players, costs {int} and starts in {int} hours"
)]
async fn create_match(world: &mut MatchWorld, id: String, min: u32, max: u32, cost: i64, hours: i64) {
    let starts_at = world.system().clock.now() + Duration::hours(hours);
    let new = NewMatch::new(MatchId::from(id), UserId::from("organizer"), min, max, Money::from(cost), starts_at);
    world.api().create_match(new).await.expect("Error creating match");
}

#[when(expr = "players {int} to {int} join match {word}")]
async fn players_join(world: &mut MatchWorld, from: usize, to: usize, id: String) {
    let match_id = MatchId::from(id);
    for i in from..=to {
        world.api().on_participant_join(&match_id, player(i)).await.expect("Error joining match");
    }
}

#[when(expr = "players {int} to {int} pay {int} for match {word}")]
async fn players_pay(world: &mut MatchWorld, from: usize, to: usize, amount: i64, id: String) {
    let match_id = MatchId::from(id);
    for i in from..=to {
        world
            .api()
            .on_payment_received(&match_id, &player(i), Money::from(amount))
            .await
            .expect("Error recording payment");
    }
}

#[when(expr = "{int} minutes pass")]
async fn time_passes(world: &mut MatchWorld, minutes: i64) {
    world.system().clock.advance(Duration::minutes(minutes));
}

#[when(expr = "the payment window for match {word} expires")]
async fn window_expires(world: &mut MatchWorld, id: String) {
    let match_id = MatchId::from(id);
    match world.api().on_window_expired(&match_id).await {
        Ok(outcome) => world.last_expiry = Some(outcome),
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the organizer confirms match {word}")]
async fn organizer_confirms(world: &mut MatchWorld, id: String) {
    let match_id = MatchId::from(id);
    match world.api().on_confirm(&match_id).await {
        Ok(result) => world.last_confirm = Some(result),
        Err(e) => world.last_error = Some(e),
    }
}

#[then(expr = "match {word} is in stage {word}")]
async fn match_in_stage(world: &mut MatchWorld, id: String, stage: String) {
    let stage = stage.parse::<MatchStage>().expect("Not a valid stage");
    let state = world.api().fetch_match(&MatchId::from(id)).await.expect("Error fetching match");
    assert_eq!(state.stage, stage);
}

#[then(expr = "match {word} has {int} players paying {int} each")]
async fn match_has_players(world: &mut MatchWorld, id: String, count: u32, share: i64) {
    let state = world.api().fetch_match(&MatchId::from(id)).await.expect("Error fetching match");
    assert_eq!(state.current_player_count, count);
    assert_eq!(state.cost_per_player, Money::from(share));
}

#[then(expr = "the payment window for match {word} lasts {int} minutes")]
async fn window_length(world: &mut MatchWorld, id: String, minutes: i64) {
    let state = world.api().fetch_match(&MatchId::from(id)).await.expect("Error fetching match");
    let start = state.payment_window_start.expect("Window has not opened");
    let end = state.payment_window_end.expect("Window has not opened");
    assert_eq!(end - start, Duration::minutes(minutes));
}

#[then(expr = "{int} players were evicted")]
async fn players_evicted(world: &mut MatchWorld, count: usize) {
    let evicted = match world.last_expiry.as_ref().expect("The window has not expired") {
        ExpiryOutcome::Locked { evicted, .. } | ExpiryOutcome::QuorumLost { evicted, .. } => evicted.len(),
        ExpiryOutcome::Unchanged { .. } => 0,
    };
    assert_eq!(evicted, count);
}

#[then("the match lost quorum")]
async fn quorum_lost(world: &mut MatchWorld) {
    let outcome = world.last_expiry.as_ref().expect("The window has not expired");
    assert!(matches!(outcome, ExpiryOutcome::QuorumLost { .. }), "Expected quorum loss, got {outcome:?}");
}

#[then(expr = "{int} refunds of {int} were issued")]
async fn refunds_issued(world: &mut MatchWorld, count: usize, amount: i64) {
    let refunds = world.system().capture.refunds();
    assert_eq!(refunds.len(), count);
    assert!(refunds.iter().all(|r| r.amount == Money::from(amount)));
}

#[then(expr = "there were {int} settlement adjustments")]
async fn adjustments(world: &mut MatchWorld, count: usize) {
    let result = world.last_confirm.as_ref().expect("The match has not been confirmed");
    assert_eq!(result.adjustments.len(), count);
}

#[then(expr = "{int} players were told the match restarted")]
async fn told_restarted(world: &mut MatchWorld, count: usize) {
    let sent = world.system().notifier.sent();
    let told = sent.iter().filter(|n| n.message.title == "Match restarted").count();
    assert_eq!(told, count);
}
