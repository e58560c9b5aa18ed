//! # Test Support
//!
//! Builders shared by the unit and integration tests.
//!
//! Services are wired against an `httpmock` server via [`test_config`]; the
//! JSON helpers produce payloads shaped like the shop's cart endpoints.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::domain::{BusEvent, EventName};
use crate::event_bus::EventBus;
use crate::services::{ApiService, CartService, NotificationService, ToastTray};

/// Config pointing at `base_url` with timers short enough for tests.
pub fn test_config(base_url: &str) -> AppConfig {
    AppConfig {
        notification_duration: Duration::from_secs(1),
        login_redirect_delay: Duration::from_millis(10),
        request_timeout: Some(Duration::from_secs(5)),
        ..AppConfig::new(base_url, "test-token")
    }
}

/// Collects every event published under `name`.
pub fn record_events(bus: &Arc<EventBus>, name: EventName) -> Arc<Mutex<Vec<BusEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(name, move |event| sink.lock().unwrap().push(event.clone()));
    seen
}

pub fn test_services(base_url: &str) -> (Arc<EventBus>, Arc<CartService>) {
    let bus = Arc::new(EventBus::new());
    let api = Arc::new(ApiService::new(&test_config(base_url), bus.clone()));
    (bus.clone(), Arc::new(CartService::new(api, bus)))
}

pub fn item_json(id: u64, product_id: u64, quantity: u32, price: f64) -> Value {
    json!({
        "id": id,
        "producto_id": product_id,
        "cantidad": quantity,
        "precio_unitario": price,
        "producto": {
            "id": product_id,
            "nombre": format!("Producto {product_id}"),
            "precio": price,
            "stock": 10
        }
    })
}

/// Wraps items in a cart payload with consistent aggregates.
pub fn cart_json(items: Vec<Value>) -> Value {
    let total_items: u64 = items.iter().filter_map(|i| i["cantidad"].as_u64()).sum();
    let total_price: f64 = items
        .iter()
        .map(|i| {
            i["cantidad"].as_f64().unwrap_or(0.0) * i["precio_unitario"].as_f64().unwrap_or(0.0)
        })
        .sum();
    json!({
        "items": items,
        "total_items": total_items,
        "total_precio": total_price
    })
}

/// A fully wired service set, notifications installed.
pub struct TestContext {
    pub bus: Arc<EventBus>,
    pub api: Arc<ApiService>,
    pub cart: Arc<CartService>,
    pub notifications: Arc<NotificationService>,
}

impl TestContext {
    pub fn new(base_url: &str) -> Self {
        let config = test_config(base_url);
        let bus = Arc::new(EventBus::new());
        let api = Arc::new(ApiService::new(&config, bus.clone()));
        let cart = Arc::new(CartService::new(api.clone(), bus.clone()));
        let notifications = Arc::new(NotificationService::new(
            &config,
            bus.clone(),
            Arc::new(ToastTray::new()),
        ));
        notifications.install();
        Self {
            bus,
            api,
            cart,
            notifications,
        }
    }
}
