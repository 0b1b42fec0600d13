use mockall::mock;
use match_payment_engine::{
    db_types::UserId,
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

mock! {
    pub Notifier {}
    impl Clone for Notifier {
        fn clone(&self) -> Self;
    }
    impl NotificationDelivery for Notifier {
        async fn send(&self, user_id: &UserId, message: &NotificationMessage, urgency: Urgency) -> Result<(), DeliveryError>;
    }
}

mock! {
    pub Capture {}
    impl Clone for Capture {
        fn clone(&self) -> Self;
    }
    impl PaymentCapture for Capture {
        async fn charge(&self, request: ChargeRequest) -> Result<String, CaptureError>;
        async fn refund(&self, request: RefundRequest) -> Result<String, CaptureError>;
        async fn request_top_up(&self, request: TopUpRequest) -> Result<String, CaptureError>;
    }
}

/// A notifier that accepts every message.
pub fn quiet_notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_send().returning(|_, _, _| Ok(()));
    notifier
}
