use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::{ApiFailure, BusEvent, Cart, CartEvent};
use crate::event_bus::EventBus;
use crate::services::{ApiResponse, ApiService};

/// Cart endpoints, relative to the API base URL.
pub mod endpoints {
    pub const CART: &str = "/api/carrito";
    pub const ADD: &str = "/api/carrito/agregar";
    pub const CLEAR: &str = "/api/carrito/vaciar";

    pub fn update(item_id: u64) -> String {
        format!("/api/carrito/actualizar/{item_id}")
    }

    pub fn remove(item_id: u64) -> String {
        format!("/api/carrito/eliminar/{item_id}")
    }
}

#[derive(Debug, Serialize)]
struct AddItemRequest {
    #[serde(rename = "producto_id")]
    product_id: u64,
    #[serde(rename = "cantidad")]
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct UpdateQuantityRequest {
    #[serde(rename = "cantidad")]
    quantity: u32,
}

/// `data` is either the cart itself or `{ "cart": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CartPayload {
    Wrapped { cart: Cart },
    Bare(Cart),
}

/// What a mutation response established.
enum Confirmation {
    /// The server's cart, now cached.
    Applied(Cart),
    /// The server accepted the change but no cart could be obtained.
    Unverified,
    Rejected,
}

/// Owns the client-side cart snapshot.
///
/// The snapshot only ever changes to what the server returned for a
/// successful call. Mutations report `false` when they did not happen,
/// whatever the cause; the cause itself is on the bus as `api:error` and in
/// [`last_failure`](Self::last_failure).
#[derive(Debug)]
pub struct CartService {
    api: Arc<ApiService>,
    bus: Arc<EventBus>,
    snapshot: Mutex<Option<Cart>>,
    last_failure: Mutex<Option<ApiFailure>>,
}

impl CartService {
    pub fn new(api: Arc<ApiService>, bus: Arc<EventBus>) -> Self {
        Self {
            api,
            bus,
            snapshot: Mutex::new(None),
            last_failure: Mutex::new(None),
        }
    }

    fn snapshot(&self) -> MutexGuard<'_, Option<Cart>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The snapshot as it is right now, without touching the network.
    pub fn cached(&self) -> Option<Cart> {
        self.snapshot().clone()
    }

    /// What went wrong on the most recent failed call.
    pub fn last_failure(&self) -> Option<ApiFailure> {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the cached snapshot, loading it first if there is none.
    ///
    /// Never fails: an unavailable cart reads as empty, and the next call
    /// tries the server again.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Cart {
        if let Some(cart) = self.cached() {
            return cart;
        }
        self.load().await.unwrap_or_else(Cart::empty)
    }

    /// Reloads from the server regardless of the cache.
    ///
    /// On failure the previous snapshot (or an empty cart) is returned.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Cart {
        match self.load().await {
            Some(cart) => cart,
            None => self.cached().unwrap_or_else(Cart::empty),
        }
    }

    async fn load(&self) -> Option<Cart> {
        debug!("Loading cart");
        let response = self.api.get(endpoints::CART).await;
        if !response.success {
            self.record_failure(&response);
            return None;
        }
        let cart = self.cart_from(&response)?;
        Some(self.apply(cart))
    }

    #[instrument(skip(self))]
    pub async fn add_item(&self, product_id: u64, quantity: u32) -> bool {
        let request = AddItemRequest { product_id, quantity };
        let response = self.api.post(endpoints::ADD, &request).await;
        let cart = match self.confirmed(&response).await {
            Confirmation::Applied(cart) => cart,
            Confirmation::Unverified => return true,
            Confirmation::Rejected => return false,
        };

        info!(total_items = cart.total_items, "Item added");
        let item = cart.item_for_product(product_id).cloned();
        self.bus.emit(BusEvent::CartChanged(CartEvent::ItemAdded {
            product_id,
            quantity,
            item,
            cart,
        }));
        true
    }

    /// Sets a line's quantity. Zero or less removes the line.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, item_id: u64, quantity: i64) -> bool {
        let Ok(quantity) = u32::try_from(quantity) else {
            if quantity <= 0 {
                return self.remove_item(item_id).await;
            }
            warn!("Quantity out of range");
            return false;
        };
        if quantity == 0 {
            return self.remove_item(item_id).await;
        }

        let request = UpdateQuantityRequest { quantity };
        let response = self.api.put(&endpoints::update(item_id), &request).await;
        let cart = match self.confirmed(&response).await {
            Confirmation::Applied(cart) => cart,
            Confirmation::Unverified => return true,
            Confirmation::Rejected => return false,
        };

        info!(total_items = cart.total_items, "Quantity updated");
        let item = cart.item(item_id).cloned();
        self.bus.emit(BusEvent::CartChanged(CartEvent::ItemUpdated {
            item_id,
            quantity,
            item,
            cart,
        }));
        true
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, item_id: u64) -> bool {
        let removed = self.cached().and_then(|cart| cart.item(item_id).cloned());
        let response = self.api.delete(&endpoints::remove(item_id)).await;
        let cart = match self.confirmed(&response).await {
            Confirmation::Applied(cart) => cart,
            Confirmation::Unverified => return true,
            Confirmation::Rejected => return false,
        };

        info!(total_items = cart.total_items, "Item removed");
        self.bus.emit(BusEvent::CartChanged(CartEvent::ItemRemoved {
            item_id,
            item: removed,
            cart,
        }));
        true
    }

    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> bool {
        let response = self.api.delete(endpoints::CLEAR).await;
        if !response.success {
            self.record_failure(&response);
            return false;
        }

        let cart = self.apply(Cart::empty());
        info!("Cart cleared");
        self.bus.emit(BusEvent::CartChanged(CartEvent::CartCleared { cart }));
        true
    }

    /// Units in the cart; zero when it cannot be loaded.
    pub async fn get_item_count(&self) -> u32 {
        self.get_cart().await.total_items
    }

    /// The server snapshot behind a successful mutation.
    ///
    /// A success without a cart in `data` is followed by a reload so the
    /// cache still only holds server state. If that reload fails the change
    /// is reported as unverified and nothing is announced.
    async fn confirmed(&self, response: &ApiResponse) -> Confirmation {
        if !response.success {
            self.record_failure(response);
            return Confirmation::Rejected;
        }
        if let Some(cart) = self.cart_from(response) {
            return Confirmation::Applied(self.apply(cart));
        }
        debug!("Response carried no cart, reloading");
        match self.load().await {
            Some(cart) => Confirmation::Applied(cart),
            None => {
                warn!("Change accepted but the cart could not be reloaded");
                Confirmation::Unverified
            }
        }
    }

    fn cart_from(&self, response: &ApiResponse) -> Option<Cart> {
        let data = response.data.clone()?;
        match serde_json::from_value::<CartPayload>(data) {
            Ok(CartPayload::Wrapped { cart }) | Ok(CartPayload::Bare(cart)) => Some(cart),
            Err(e) => {
                warn!(error = %e, "Response data is not a cart");
                None
            }
        }
    }

    fn apply(&self, cart: Cart) -> Cart {
        let cart = cart.normalized();
        if !cart.is_consistent() {
            warn!(
                total_items = cart.total_items,
                total_price = %cart.total_price,
                "Server cart totals do not match its items"
            );
        }
        *self.snapshot() = Some(cart.clone());
        cart
    }

    fn record_failure(&self, response: &ApiResponse) {
        if let Some(failure) = response.failure() {
            debug!(message = %failure.message, "Cart call failed");
            *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(failure);
        }
    }
}
