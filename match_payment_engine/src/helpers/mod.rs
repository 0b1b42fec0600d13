mod clock;
mod ids;
mod retry;
mod timestamps;

pub use clock::Clock;
pub use ids::{new_idempotency_key, reminder_id};
pub use retry::RetryPolicy;
pub use timestamps::{from_millis, to_millis};
