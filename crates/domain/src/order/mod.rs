//! Order entity, payment status and the patches that mutate it.

mod entity;
mod patch;
mod state;
mod value_objects;

pub use entity::{Order, OrderOrigin};
pub use patch::{OrderPatch, PatchOutcome, PaymentSignal, RepricePatch};
pub use state::OrderStatus;
pub use value_objects::{ItemId, Money};
