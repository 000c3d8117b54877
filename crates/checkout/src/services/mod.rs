//! External collaborators: the payment processor and the notification
//! dispatcher, each with real and in-memory implementations.

pub mod notifier;
pub mod processor;
pub mod stripe;

pub use notifier::{
    HttpNotifier, InMemoryNotifier, LogNotifier, NoticeKind, NotificationTrigger, Notifier,
};
pub use processor::{
    InMemoryPaymentProcessor, IntentMetadata, PaymentIntent, PaymentProcessor, RecordedIntent,
};
pub use stripe::StripeClient;
