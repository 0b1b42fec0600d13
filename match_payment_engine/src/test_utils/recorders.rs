use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
    },
};

use mp_common::Money;
use tokio::sync::{watch, Notify};

use crate::{
    db_types::{MatchId, UserId},
    reminders::{NotificationMessage, Urgency},
    traits::{
        CaptureError,
        ChargeRequest,
        DeliveryError,
        NotificationDelivery,
        PaymentCapture,
        RefundRequest,
        TopUpRequest,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub user_id: UserId,
    pub message: NotificationMessage,
    pub urgency: Urgency,
}

/// A [`NotificationDelivery`] that remembers everything it was asked to send. It can be switched into a failing mode
/// to exercise delivery error handling.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, user_id: &UserId) -> Vec<SentNotification> {
        self.sent().into_iter().filter(|n| &n.user_id == user_id).collect()
    }

    pub fn count_with_urgency(&self, urgency: Urgency) -> usize {
        self.sent.lock().unwrap().iter().filter(|n| n.urgency == urgency).count()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl NotificationDelivery for RecordingNotifier {
    async fn send(&self, user_id: &UserId, message: &NotificationMessage, urgency: Urgency) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Failed("notifier offline".into()));
        }
        self.sent.lock().unwrap().push(SentNotification {
            user_id: user_id.clone(),
            message: message.clone(),
            urgency,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureCall {
    Charge(ChargeRequest),
    Refund(RefundRequest),
    TopUp(TopUpRequest),
}

impl CaptureCall {
    pub fn user_id(&self) -> &UserId {
        match self {
            CaptureCall::Charge(r) => &r.user_id,
            CaptureCall::Refund(r) => &r.user_id,
            CaptureCall::TopUp(r) => &r.user_id,
        }
    }

    pub fn amount(&self) -> Money {
        match self {
            CaptureCall::Charge(r) => r.amount,
            CaptureCall::Refund(r) => r.amount,
            CaptureCall::TopUp(r) => r.amount,
        }
    }
}

#[derive(Debug, Default)]
struct CaptureLedger {
    calls: Vec<CaptureCall>,
    by_key: HashMap<String, String>,
}

/// An in-memory [`PaymentCapture`] that honours idempotency keys and records every distinct request. Charges and
/// refunds can be made to fail independently, and refunds can be held open to line up competing calls.
#[derive(Debug, Clone)]
pub struct RecordingCapture {
    ledger: Arc<Mutex<CaptureLedger>>,
    fail_charges: Arc<AtomicBool>,
    fail_refunds: Arc<AtomicBool>,
    refund_gate: Arc<watch::Sender<bool>>,
    refund_waiting: Arc<Notify>,
}

impl Default for RecordingCapture {
    fn default() -> Self {
        let (refund_gate, _) = watch::channel(false);
        Self {
            ledger: Arc::default(),
            fail_charges: Arc::default(),
            fail_refunds: Arc::default(),
            refund_gate: Arc::new(refund_gate),
            refund_waiting: Arc::new(Notify::new()),
        }
    }
}

impl RecordingCapture {
    /// Refunds block until [`Self::release_refunds`] is called.
    pub fn hold_refunds(&self) {
        self.refund_gate.send_replace(true);
    }

    pub fn release_refunds(&self) {
        self.refund_gate.send_replace(false);
    }

    /// Resolves once a refund is blocked by [`Self::hold_refunds`].
    pub async fn refund_held(&self) {
        self.refund_waiting.notified().await;
    }

    async fn wait_for_refund_gate(&self) {
        let held = *self.refund_gate.borrow();
        if !held {
            return;
        }
        self.refund_waiting.notify_one();
        let mut gate = self.refund_gate.subscribe();
        loop {
            let held = *gate.borrow_and_update();
            if !held || gate.changed().await.is_err() {
                break;
            }
        }
    }

    pub fn set_fail_charges(&self, fail: bool) {
        self.fail_charges.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<CaptureCall> {
        self.ledger.lock().unwrap().calls.clone()
    }

    pub fn refunds(&self) -> Vec<RefundRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                CaptureCall::Refund(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn top_ups(&self) -> Vec<TopUpRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                CaptureCall::TopUp(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Net money taken from the user for the match: charges less refunds.
    pub fn net_for(&self, match_id: &MatchId, user_id: &UserId) -> Money {
        self.calls()
            .iter()
            .map(|c| match c {
                CaptureCall::Charge(r) if &r.match_id == match_id && &r.user_id == user_id => r.amount,
                CaptureCall::Refund(r) if &r.match_id == match_id && &r.user_id == user_id => -r.amount,
                _ => Money::ZERO,
            })
            .sum()
    }

    fn record(&self, key: &str, prefix: &str, call: CaptureCall) -> String {
        let mut ledger = self.ledger.lock().unwrap();
        if let Some(existing) = ledger.by_key.get(key) {
            return existing.clone();
        }
        let reference = format!("{prefix}-{}", ledger.calls.len() + 1);
        ledger.calls.push(call);
        ledger.by_key.insert(key.to_string(), reference.clone());
        reference
    }
}

impl PaymentCapture for RecordingCapture {
    async fn charge(&self, request: ChargeRequest) -> Result<String, CaptureError> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(CaptureError::Declined("card declined".into()));
        }
        let key = request.idempotency_key.clone();
        Ok(self.record(&key, "ch", CaptureCall::Charge(request)))
    }

    async fn refund(&self, request: RefundRequest) -> Result<String, CaptureError> {
        self.wait_for_refund_gate().await;
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(CaptureError::Unavailable("processor offline".into()));
        }
        let key = request.idempotency_key.clone();
        Ok(self.record(&key, "rf", CaptureCall::Refund(request)))
    }

    async fn request_top_up(&self, request: TopUpRequest) -> Result<String, CaptureError> {
        let key = request.idempotency_key.clone();
        Ok(self.record(&key, "tu", CaptureCall::TopUp(request)))
    }
}
