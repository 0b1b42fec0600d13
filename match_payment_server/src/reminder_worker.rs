use log::*;
use match_payment_engine::{reminders::ReminderScheduler, LedgerPaymentCapture, MatchFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::{config::ReminderConfig, integrations::notifier::ServerNotifier};

pub type ServerApi = MatchFlowApi<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>;
type WorkerScheduler = ReminderScheduler<SqliteDatabase, ServerNotifier>;

/// Starts the reminder worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every tick the worker
/// 1. sweeps due reminders, delivering them and closing the payment window of any match whose deadline reminder fired,
/// 2. closes any payment windows that ran out without a deadline reminder (e.g. because everyone had already paid).
pub fn start_reminder_worker(api: ServerApi, config: ReminderConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.sweep_interval);
        let scheduler = ReminderScheduler::new(api.db().clone(), api.notifier().clone(), config.sweep_config());
        info!("🕰️ Reminder worker started as {}", config.instance_id);
        loop {
            timer.tick().await;
            run_reminder_tick(&api, &scheduler).await;
        }
    })
}

/// One pass of the worker, timed by the API's clock. Returns the number of reminders that fired.
async fn run_reminder_tick(api: &ServerApi, scheduler: &WorkerScheduler) -> usize {
    trace!("🕰️ Running reminder sweep");
    let claimed = match scheduler.sweep(api.clock().now(), api).await {
        Ok(result) if result.claimed > 0 => {
            info!(
                "🕰️ {} reminders fired. {} delivered, {} failed, {} skipped",
                result.claimed, result.delivered, result.failed_deliveries, result.skipped_writes
            );
            if !result.deadlines.is_empty() {
                let ids = result.deadlines.iter().map(|m| m.to_string()).collect::<Vec<String>>().join(", ");
                debug!("🕰️ Deadlines reached for {ids}");
            }
            result.claimed
        },
        Ok(_) => 0,
        Err(e) => {
            error!("🕰️ Error running the reminder sweep: {e}");
            0
        },
    };
    match api.expire_due_windows().await {
        Ok(outcomes) if !outcomes.is_empty() => {
            info!("🕰️ {} overdue payment windows closed", outcomes.len())
        },
        Ok(_) => {},
        Err(e) => error!("🕰️ Error closing overdue payment windows: {e}"),
    }
    claimed
}
