//! Service layer: HTTP envelope client, cart snapshot owner and notifications.

pub mod api_service;
pub mod cart_service;
pub mod notification_service;

pub use api_service::*;
pub use cart_service::CartService;
pub use notification_service::*;
