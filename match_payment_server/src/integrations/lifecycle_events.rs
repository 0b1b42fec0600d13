use futures::future::BoxFuture;
use log::*;
use match_payment_engine::events::{
    EventHandlers,
    EventHooks,
    MatchConfirmedEvent,
    PaymentRecordedEvent,
    QuorumLostEvent,
    StageChangedEvent,
};

pub const LIFECYCLE_EVENT_BUFFER_SIZE: usize = 64;

/// Subscribes to every match lifecycle event and writes a line for each to the `mps::audit` log target.
///
/// Operators who need the events elsewhere (a message bus, an analytics store) hang their own hooks here.
pub fn create_lifecycle_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_stage_changed(|ev| {
        let StageChangedEvent { match_id, change, timestamp } = ev;
        logged(move || {
            info!(target: "mps::audit", "📬️ {match_id}: {} -> {} at {timestamp} ({})", change.from, change.to, change.reason)
        })
    });
    hooks.on_payment_recorded(|ev| {
        let PaymentRecordedEvent { match_id, user_id, amount, transaction_ref, settled } = ev;
        logged(move || {
            let settled = if settled { " Share settled." } else { "" };
            info!(target: "mps::audit", "📬️ {match_id}: {user_id} paid {amount} [{transaction_ref}].{settled}")
        })
    });
    hooks.on_quorum_lost(|ev| {
        let total = ev.total_refunded();
        let QuorumLostEvent { match_id, evicted, refunds } = ev;
        logged(move || {
            warn!(
                target: "mps::audit",
                "📬️ {match_id} lost quorum. {} players evicted, {} refunds totalling {total}",
                evicted.len(),
                refunds.len()
            )
        })
    });
    hooks.on_match_confirmed(|ev| {
        let MatchConfirmedEvent { state, adjustments } = ev;
        logged(move || {
            info!(
                target: "mps::audit",
                "📬️ {} confirmed with {} players at {} each. {} adjustments.",
                state.match_id,
                state.current_player_count,
                state.cost_per_player,
                adjustments.len()
            )
        })
    });
    EventHandlers::new(LIFECYCLE_EVENT_BUFFER_SIZE, hooks)
}

fn logged<F: FnOnce() + Send + 'static>(f: F) -> BoxFuture<'static, ()> {
    Box::pin(async move { f() })
}
