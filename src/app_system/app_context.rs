use std::sync::Arc;

use tracing::info;

use super::container::{self, Container};
use crate::components::{CartComponent, ProductComponent};
use crate::config::AppConfig;
use crate::domain::Product;
use crate::event_bus::EventBus;
use crate::services::{ApiService, CartService, NotificationService, ToastTray};

/// Everything the cart UI needs, built once and passed down.
///
/// Responsible for constructing the services, wiring them to a shared bus,
/// and tearing the subscriptions down again.
#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub bus: Arc<EventBus>,
    pub api: Arc<ApiService>,
    pub cart: Arc<CartService>,
    pub notifications: Arc<NotificationService>,
    container: Container,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        info!(base_url = %config.base_url, "Starting cart context");

        let bus = Arc::new(EventBus::new());
        let api = Arc::new(ApiService::new(&config, bus.clone()));
        let cart = Arc::new(CartService::new(api.clone(), bus.clone()));
        let notifications = Arc::new(NotificationService::new(
            &config,
            bus.clone(),
            Arc::new(ToastTray::new()),
        ));
        notifications.install();

        let mut container = Container::new();
        container
            .register(container::EVENT_BUS, bus.clone())
            .register(container::API, api.clone())
            .register(container::CART, cart.clone())
            .register(container::NOTIFICATIONS, notifications.clone());

        Self {
            config,
            bus,
            api,
            cart,
            notifications,
            container,
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn cart_component(&self) -> Arc<CartComponent> {
        CartComponent::new(
            self.cart.clone(),
            self.notifications.clone(),
            self.bus.clone(),
            self.config.checkout_url.clone(),
        )
    }

    pub fn product_component(&self, product: Product) -> ProductComponent {
        ProductComponent::new(product, self.cart.clone(), self.notifications.clone())
    }

    pub fn shutdown(self) {
        info!("Shutting down cart context...");
        self.notifications.uninstall();
        self.notifications.tray().clear();
        info!("Cart context shutdown complete.");
    }
}
