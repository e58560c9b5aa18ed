//! Closed event types carried by the [`EventBus`](crate::event_bus::EventBus).
//!
//! Each channel has exactly one payload type, so subscribers match
//! exhaustively instead of inspecting loosely typed payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Cart, CartItem};

/// What happened to the cart. Every variant carries the snapshot the server
/// returned for the call that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded {
        product_id: u64,
        quantity: u32,
        item: Option<CartItem>,
        cart: Cart,
    },
    ItemRemoved {
        item_id: u64,
        item: Option<CartItem>,
        cart: Cart,
    },
    ItemUpdated {
        item_id: u64,
        quantity: u32,
        item: Option<CartItem>,
        cart: Cart,
    },
    CartCleared {
        cart: Cart,
    },
}

impl CartEvent {
    pub fn cart(&self) -> &Cart {
        match self {
            CartEvent::ItemAdded { cart, .. }
            | CartEvent::ItemRemoved { cart, .. }
            | CartEvent::ItemUpdated { cart, .. }
            | CartEvent::CartCleared { cart } => cart,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CartEvent::ItemAdded { .. } => "item_added",
            CartEvent::ItemRemoved { .. } => "item_removed",
            CartEvent::ItemUpdated { .. } => "item_updated",
            CartEvent::CartCleared { .. } => "cart_cleared",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
        };
        f.write_str(name)
    }
}

/// A user-facing message and how long it stays on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub duration: Option<Duration>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Failure classes the UI reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 422, field-keyed messages in [`ApiFailure::errors`].
    Validation,
    /// 401, the session is gone.
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 5xx
    Server,
    /// No HTTP response or an unreadable body.
    Network,
    Other,
}

impl ApiErrorKind {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            None => ApiErrorKind::Network,
            Some(422) => ApiErrorKind::Validation,
            Some(401) => ApiErrorKind::Unauthorized,
            Some(403) => ApiErrorKind::Forbidden,
            Some(404) => ApiErrorKind::NotFound,
            Some(status) if status >= 500 => ApiErrorKind::Server,
            Some(_) => ApiErrorKind::Other,
        }
    }
}

/// Describes a failed API call. Published on `api:error`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFailure {
    pub kind: ApiErrorKind,
    pub status: Option<u16>,
    pub message: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ApiFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::from_status(status),
            status,
            message: message.into(),
            errors: BTreeMap::new(),
        }
    }

    pub fn with_errors(mut self, errors: BTreeMap<String, Vec<String>>) -> Self {
        self.errors = errors;
        self
    }

    /// First message reported for any field, in field-name order.
    pub fn first_field_error(&self) -> Option<&str> {
        self.errors
            .values()
            .find_map(|messages| messages.first())
            .map(String::as_str)
    }
}

/// Channel names. Handlers register against one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    CartChanged,
    NotificationShow,
    ApiError,
    CartUpdated,
    LoginRedirect,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::CartChanged => "cart:changed",
            EventName::NotificationShow => "notification:show",
            EventName::ApiError => "api:error",
            EventName::CartUpdated => "cart:updated",
            EventName::LoginRedirect => "auth:redirect",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that travels over the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    CartChanged(CartEvent),
    NotificationShow(Notification),
    ApiError(ApiFailure),
    /// The page swapped cart markup without going through the cart service.
    CartUpdated,
    /// Navigate to the given login URL.
    LoginRedirect(String),
}

impl BusEvent {
    pub fn name(&self) -> EventName {
        match self {
            BusEvent::CartChanged(_) => EventName::CartChanged,
            BusEvent::NotificationShow(_) => EventName::NotificationShow,
            BusEvent::ApiError(_) => EventName::ApiError,
            BusEvent::CartUpdated => EventName::CartUpdated,
            BusEvent::LoginRedirect(_) => EventName::LoginRedirect,
        }
    }
}
