//! HTTP API handlers for meateye-fridge
//!
//! Authentication happens upstream; handlers trust the `x-member-id` header.

pub mod fridge;
pub mod health;
pub mod member;
pub mod notifications;
pub mod parts;
pub mod push;

pub use fridge::fridge_routes;
pub use health::health_routes;
pub use member::MemberId;
pub use notifications::notification_routes;
pub use parts::part_routes;
pub use push::push_routes;
