//! # Cart Sync
//!
//! Client-side shopping cart for a server-rendered shop.
//!
//! The server owns the cart. [`services::CartService`] keeps the last
//! snapshot the server confirmed and announces every change on the
//! [`event_bus::EventBus`]; components and the notification layer react to
//! those events instead of calling each other.
//!
//! ```text
//! ProductComponent ─┐                    ┌─> NotificationService ─> ToastTray
//!                   ├─> CartService ─> EventBus
//! CartComponent ────┘        │           └─> CartComponent (view state)
//!                            └─> ApiService ─> HTTP
//! ```
//!
//! [`app_system::AppContext`] builds and wires all of it from an
//! [`config::AppConfig`].

pub mod app_system;
pub mod components;
pub mod config;
pub mod domain;
pub mod error;
pub mod event_bus;
pub mod services;

#[cfg(test)]
mod test_support;
