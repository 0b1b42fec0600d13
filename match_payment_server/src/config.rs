use std::{env, fmt::Display, str::FromStr};

use log::*;
use match_payment_engine::{helpers::RetryPolicy, reminders::SweepConfig};
use mp_common::{
    helpers::{parse_boolean_flag, parse_number},
    Secret,
};

const DEFAULT_MPS_HOST: &str = "127.0.0.1";
const DEFAULT_MPS_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/match_payments.db";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_REMINDER_LEASE_SECS: i64 = 120;
const DEFAULT_SWEEP_BATCH_SIZE: i64 = 100;
const DEFAULT_DELIVERY_CONCURRENCY: usize = 16;
const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STORE_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_STORE_RETRY_BASE_MS: u64 = 50;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Run pending database migrations at start-up
    pub run_migrations: bool,
    pub reminders: ReminderConfig,
    pub retry: RetryPolicy,
    /// Where participant notifications are POSTed. When unset, notifications are only logged.
    pub notify_webhook_url: Option<Secret<String>>,
}

/// Settings for the reminder sweep and the payment window backstop.
#[derive(Clone, Debug)]
pub struct ReminderConfig {
    pub sweep_interval: std::time::Duration,
    pub instance_id: String,
    pub lease: chrono::Duration,
    pub batch_size: i64,
    pub delivery_concurrency: usize,
    pub delivery_timeout: std::time::Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            instance_id: random_instance_id(),
            lease: chrono::Duration::seconds(DEFAULT_REMINDER_LEASE_SECS),
            batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            delivery_concurrency: DEFAULT_DELIVERY_CONCURRENCY,
            delivery_timeout: std::time::Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECS),
        }
    }
}

impl ReminderConfig {
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            owner: self.instance_id.clone(),
            lease: self.lease,
            batch_size: self.batch_size,
            concurrency: self.delivery_concurrency,
            delivery_timeout: self.delivery_timeout,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPS_HOST.to_string(),
            port: DEFAULT_MPS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            run_migrations: true,
            reminders: ReminderConfig::default(),
            retry: RetryPolicy::default(),
            notify_webhook_url: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPS_HOST").ok().unwrap_or_else(|| DEFAULT_MPS_HOST.into());
        let port = env_number("MPS_PORT", DEFAULT_MPS_PORT);
        let database_url = env::var("MPS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MPS_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let run_migrations = parse_boolean_flag(env::var("MPS_RUN_MIGRATIONS").ok(), true);
        let instance_id = env::var("MPS_INSTANCE_ID").ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
            let id = random_instance_id();
            info!("🪛️ MPS_INSTANCE_ID is not set. This instance will claim reminders as {id}.");
            id
        });
        let reminders = ReminderConfig {
            sweep_interval: std::time::Duration::from_secs(
                env_number("MPS_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS).max(1),
            ),
            instance_id,
            lease: chrono::Duration::seconds(env_number("MPS_REMINDER_LEASE_SECS", DEFAULT_REMINDER_LEASE_SECS)),
            batch_size: env_number("MPS_SWEEP_BATCH_SIZE", DEFAULT_SWEEP_BATCH_SIZE),
            delivery_concurrency: env_number("MPS_DELIVERY_CONCURRENCY", DEFAULT_DELIVERY_CONCURRENCY),
            delivery_timeout: std::time::Duration::from_secs(env_number(
                "MPS_DELIVERY_TIMEOUT_SECS",
                DEFAULT_DELIVERY_TIMEOUT_SECS,
            )),
        };
        let retry = RetryPolicy::new(
            env_number("MPS_STORE_RETRY_ATTEMPTS", DEFAULT_STORE_RETRY_ATTEMPTS),
            std::time::Duration::from_millis(env_number("MPS_STORE_RETRY_BASE_MS", DEFAULT_STORE_RETRY_BASE_MS)),
        );
        let notify_webhook_url = env::var("MPS_NOTIFY_WEBHOOK_URL").ok().filter(|s| !s.trim().is_empty()).map(Secret::new);
        if notify_webhook_url.is_none() {
            info!("🪛️ MPS_NOTIFY_WEBHOOK_URL is not set. Participant notifications will only be logged.");
        }
        Self { host, port, database_url, run_migrations, reminders, retry, notify_webhook_url }
    }
}

/// Reads a numeric variable, falling back to `default` (with a warning) if the value is invalid.
fn env_number<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    <T as FromStr>::Err: Display,
{
    parse_number(env::var(name).ok(), default).unwrap_or_else(|e| {
        warn!("🪛️ Invalid configuration value for {name}. {e} Using the default, {default}, instead.");
        default
    })
}

fn random_instance_id() -> String {
    format!("mps-{:08x}", rand::random::<u32>())
}
