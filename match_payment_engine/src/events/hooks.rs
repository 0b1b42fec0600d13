use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    MatchConfirmedEvent,
    PaymentRecordedEvent,
    QuorumLostEvent,
    StageChangedEvent,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub stage_changed_producer: Vec<EventProducer<StageChangedEvent>>,
    pub quorum_lost_producer: Vec<EventProducer<QuorumLostEvent>>,
    pub payment_recorded_producer: Vec<EventProducer<PaymentRecordedEvent>>,
    pub match_confirmed_producer: Vec<EventProducer<MatchConfirmedEvent>>,
}

impl EventProducers {
    pub async fn stage_changed(&self, event: StageChangedEvent) {
        for p in &self.stage_changed_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn quorum_lost(&self, event: QuorumLostEvent) {
        for p in &self.quorum_lost_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn payment_recorded(&self, event: PaymentRecordedEvent) {
        for p in &self.payment_recorded_producer {
            p.publish_event(event.clone()).await;
        }
    }

    pub async fn match_confirmed(&self, event: MatchConfirmedEvent) {
        for p in &self.match_confirmed_producer {
            p.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_stage_changed: Option<EventHandler<StageChangedEvent>>,
    pub on_quorum_lost: Option<EventHandler<QuorumLostEvent>>,
    pub on_payment_recorded: Option<EventHandler<PaymentRecordedEvent>>,
    pub on_match_confirmed: Option<EventHandler<MatchConfirmedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_stage_changed = hooks.on_stage_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_quorum_lost = hooks.on_quorum_lost.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_recorded = hooks.on_payment_recorded.map(|f| EventHandler::new(buffer_size, f));
        let on_match_confirmed = hooks.on_match_confirmed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_stage_changed, on_quorum_lost, on_payment_recorded, on_match_confirmed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_stage_changed {
            result.stage_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_quorum_lost {
            result.quorum_lost_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_recorded {
            result.payment_recorded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_match_confirmed {
            result.match_confirmed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_stage_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_quorum_lost {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_recorded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_match_confirmed {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_stage_changed: Option<Handler<StageChangedEvent>>,
    pub on_quorum_lost: Option<Handler<QuorumLostEvent>>,
    pub on_payment_recorded: Option<Handler<PaymentRecordedEvent>>,
    pub on_match_confirmed: Option<Handler<MatchConfirmedEvent>>,
}

impl EventHooks {
    pub fn on_stage_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(StageChangedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_stage_changed = Some(Arc::new(f));
        self
    }

    pub fn on_quorum_lost<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(QuorumLostEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_quorum_lost = Some(Arc::new(f));
        self
    }

    pub fn on_payment_recorded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentRecordedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_payment_recorded = Some(Arc::new(f));
        self
    }

    pub fn on_match_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MatchConfirmedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_match_confirmed = Some(Arc::new(f));
        self
    }
}
