use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, instrument};

use super::{LoadingGuard, LoadingState, MSG_EMPTY_CART, MSG_INVALID_QUANTITY};
use crate::domain::{BusEvent, Cart, EventName};
use crate::event_bus::{EventBus, Handler};
use crate::services::{CartService, NotificationService};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartViewState {
    pub cart: Cart,
    pub is_open: bool,
    pub is_loading: bool,
}

impl LoadingState for CartViewState {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }
}

/// Cart drawer / cart page binding.
pub struct CartComponent {
    cart: Arc<CartService>,
    notifications: Arc<NotificationService>,
    bus: Arc<EventBus>,
    checkout_url: String,
    state: watch::Sender<CartViewState>,
    loading: AtomicBool,
    subscriptions: Mutex<Vec<(EventName, Handler)>>,
}

impl std::fmt::Debug for CartComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartComponent")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl CartComponent {
    pub fn new(
        cart: Arc<CartService>,
        notifications: Arc<NotificationService>,
        bus: Arc<EventBus>,
        checkout_url: impl Into<String>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(CartViewState::default());
        Arc::new(Self {
            cart,
            notifications,
            bus,
            checkout_url: checkout_url.into(),
            state,
            loading: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    pub fn state(&self) -> CartViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CartViewState> {
        self.state.subscribe()
    }

    pub fn item_count(&self) -> u32 {
        self.state.borrow().cart.total_items
    }

    /// Loads the cart and starts following `cart:changed` and `cart:updated`.
    #[instrument(skip(self))]
    pub async fn init(self: &Arc<Self>) {
        self.listen();
        self.reload().await;
    }

    fn listen(self: &Arc<Self>) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        if !subscriptions.is_empty() {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let on_change: Handler = Arc::new(move |event: &BusEvent| {
            let Some(component) = weak.upgrade() else { return };
            match event {
                BusEvent::CartChanged(change) => {
                    let cart = change.cart().clone();
                    component.state.send_modify(|s| s.cart = cart);
                }
                BusEvent::CartUpdated => component.schedule_reload(),
                BusEvent::NotificationShow(_)
                | BusEvent::ApiError(_)
                | BusEvent::LoginRedirect(_) => {}
            }
        });
        for name in [EventName::CartChanged, EventName::CartUpdated] {
            subscriptions.push((name, self.bus.on(name, on_change.clone())));
        }
    }

    fn schedule_reload(self: &Arc<Self>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime, skipping reload");
            return;
        };
        let component = self.clone();
        runtime.spawn(async move {
            component.reload_when_idle().await;
        });
    }

    /// Reloads as soon as no other action holds the loading flag, so a
    /// page swap during a mutation is applied after it instead of dropped.
    async fn reload_when_idle(&self) {
        let mut state = self.state.subscribe();
        while !self.reload().await {
            let idle = state.wait_for(|s| !s.is_loading).await.is_ok();
            if !idle {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    pub fn destroy(&self) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        for (name, handler) in subscriptions.drain(..) {
            self.bus.off(name, Some(&handler));
        }
    }

    /// Pulls a fresh snapshot from the server.
    pub async fn reload(&self) -> bool {
        let Some(_guard) = LoadingGuard::acquire(&self.loading, &self.state) else {
            return false;
        };
        let cart = self.cart.refresh().await;
        self.state.send_modify(|s| s.cart = cart);
        true
    }

    pub fn toggle(&self) {
        self.state.send_modify(|s| s.is_open = !s.is_open);
    }

    pub fn open(&self) {
        self.state.send_modify(|s| s.is_open = true);
    }

    pub fn close(&self) {
        self.state.send_modify(|s| s.is_open = false);
    }

    /// Zero removes the line; negative quantities are rejected locally.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, item_id: u64, quantity: i64) -> bool {
        if quantity < 0 {
            self.notifications.warning(MSG_INVALID_QUANTITY);
            return false;
        }
        let Some(_guard) = LoadingGuard::acquire(&self.loading, &self.state) else {
            return false;
        };
        let ok = self.cart.update_quantity(item_id, quantity).await;
        self.sync_from_service(ok);
        ok
    }

    pub async fn increment(&self, item_id: u64) -> bool {
        match self.quantity_of(item_id) {
            Some(quantity) => self.update_quantity(item_id, quantity + 1).await,
            None => false,
        }
    }

    pub async fn decrement(&self, item_id: u64) -> bool {
        match self.quantity_of(item_id) {
            Some(quantity) => self.update_quantity(item_id, quantity - 1).await,
            None => false,
        }
    }

    fn quantity_of(&self, item_id: u64) -> Option<i64> {
        self.state
            .borrow()
            .cart
            .item(item_id)
            .map(|item| i64::from(item.quantity))
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, item_id: u64) -> bool {
        let Some(_guard) = LoadingGuard::acquire(&self.loading, &self.state) else {
            return false;
        };
        let ok = self.cart.remove_item(item_id).await;
        self.sync_from_service(ok);
        ok
    }

    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> bool {
        let Some(_guard) = LoadingGuard::acquire(&self.loading, &self.state) else {
            return false;
        };
        let ok = self.cart.clear_cart().await;
        self.sync_from_service(ok);
        ok
    }

    /// Where to send the user, or `None` when there is nothing to buy.
    pub fn checkout(&self) -> Option<String> {
        if self.state.borrow().cart.is_empty() {
            self.notifications.warning(MSG_EMPTY_CART);
            return None;
        }
        self.close();
        Some(self.checkout_url.clone())
    }

    fn sync_from_service(&self, ok: bool) {
        if !ok {
            return;
        }
        if let Some(cart) = self.cart.cached() {
            self.state.send_modify(|s| s.cart = cart);
        }
    }
}
