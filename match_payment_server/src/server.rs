use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use match_payment_engine::{events::EventProducers, helpers::Clock, LedgerPaymentCapture, MatchFlowApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{lifecycle_events::create_lifecycle_event_handlers, notifier::ServerNotifier},
    reminder_worker::{start_reminder_worker, ServerApi},
    routes::{
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
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    let handlers = create_lifecycle_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let api = create_match_api(&config, db, producers)?;
    let _worker = start_reminder_worker(api.clone(), config.reminders.clone());
    let srv = create_server_instance(config, api)?;
    srv.await?;
    Ok(())
}

pub fn create_match_api(
    config: &ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<ServerApi, ServerError> {
    let notifier = ServerNotifier::new(config.notify_webhook_url.clone(), config.reminders.delivery_timeout)?;
    info!("🚀️ Participant notifications go to {notifier:?}");
    let clock = Clock::System;
    let capture = LedgerPaymentCapture::new(db.clone()).with_clock(clock.clone());
    Ok(MatchFlowApi::new(db, notifier, capture, producers).with_retry_policy(config.retry).with_clock(clock))
}

pub fn create_server_instance(config: ServerConfig, api: ServerApi) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mps::access_log"))
            .app_data(web::Data::new(api.clone()))
            .service(health)
            .service(CreateMatchRoute::<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>::new())
            .service(GetMatchRoute::<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>::new())
            .service(StageLogRoute::<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>::new())
            .service(JoinMatchRoute::<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>::new())
            .service(LeaveMatchRoute::<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>::new())
            .service(PayRoute::<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>::new())
            .service(ExpireWindowRoute::<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>::new())
            .service(ConfirmMatchRoute::<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>::new())
            .service(CancelMatchRoute::<SqliteDatabase, ServerNotifier, LedgerPaymentCapture>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
