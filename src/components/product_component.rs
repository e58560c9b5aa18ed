use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::instrument;

use super::{LoadingGuard, LoadingState, MSG_INVALID_QUANTITY, MSG_OUT_OF_STOCK};
use crate::domain::{ApiErrorKind, Product};
use crate::services::{CartService, NotificationService};

#[derive(Debug, Clone, PartialEq)]
pub struct ProductViewState {
    pub product: Product,
    pub images: Vec<String>,
    pub tab_count: usize,
    pub quantity: u32,
    pub active_image: usize,
    pub active_tab: usize,
    pub is_loading: bool,
    /// Server validation messages keyed by field, shown next to the inputs.
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl LoadingState for ProductViewState {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }
}

/// Product detail page binding: quantity picker, gallery, tabs and the
/// add-to-cart button.
pub struct ProductComponent {
    cart: Arc<CartService>,
    notifications: Arc<NotificationService>,
    state: watch::Sender<ProductViewState>,
    loading: AtomicBool,
}

impl std::fmt::Debug for ProductComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductComponent")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ProductComponent {
    pub fn new(
        product: Product,
        cart: Arc<CartService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        let images = product.image.iter().cloned().collect();
        let (state, _) = watch::channel(ProductViewState {
            product,
            images,
            tab_count: 1,
            quantity: 1,
            active_image: 0,
            active_tab: 0,
            is_loading: false,
            field_errors: BTreeMap::new(),
        });
        Self {
            cart,
            notifications,
            state,
            loading: AtomicBool::new(false),
        }
    }

    pub fn with_gallery(self, images: Vec<String>) -> Self {
        self.state.send_modify(|s| {
            s.images = images;
            s.active_image = 0;
        });
        self
    }

    pub fn with_tab_count(self, tab_count: usize) -> Self {
        self.state.send_modify(|s| {
            s.tab_count = tab_count.max(1);
            s.active_tab = 0;
        });
        self
    }

    pub fn state(&self) -> ProductViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProductViewState> {
        self.state.subscribe()
    }

    fn max_quantity(state: &ProductViewState) -> u32 {
        state.product.stock.unwrap_or(u32::MAX).max(1)
    }

    pub fn increment_quantity(&self) {
        self.state.send_modify(|s| {
            if s.quantity < Self::max_quantity(s) {
                s.quantity += 1;
            }
        });
    }

    pub fn decrement_quantity(&self) {
        self.state.send_modify(|s| {
            if s.quantity > 1 {
                s.quantity -= 1;
            }
        });
    }

    /// Accepts `1..=stock`; anything else leaves the selection untouched.
    pub fn set_quantity(&self, quantity: i64) -> bool {
        let accepted = self.state.send_if_modified(|s| {
            match u32::try_from(quantity) {
                Ok(q) if q >= 1 && q <= Self::max_quantity(s) => {
                    s.quantity = q;
                    true
                }
                _ => false,
            }
        });
        if !accepted {
            self.notifications.warning(MSG_INVALID_QUANTITY);
        }
        accepted
    }

    pub fn set_active_image(&self, index: usize) -> bool {
        self.state.send_if_modified(|s| {
            if index < s.images.len() && index != s.active_image {
                s.active_image = index;
                true
            } else {
                false
            }
        })
    }

    pub fn next_image(&self) {
        self.state.send_if_modified(|s| {
            if s.images.len() < 2 {
                return false;
            }
            s.active_image = (s.active_image + 1) % s.images.len();
            true
        });
    }

    pub fn previous_image(&self) {
        self.state.send_if_modified(|s| {
            if s.images.len() < 2 {
                return false;
            }
            s.active_image = (s.active_image + s.images.len() - 1) % s.images.len();
            true
        });
    }

    pub fn set_active_tab(&self, index: usize) -> bool {
        self.state.send_if_modified(|s| {
            if index < s.tab_count && index != s.active_tab {
                s.active_tab = index;
                true
            } else {
                false
            }
        })
    }

    /// Adds the selected quantity. On success the picker resets to one; on a
    /// validation failure the field errors are kept for display.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self) -> bool {
        let (product_id, quantity, in_stock) = {
            let state = self.state.borrow();
            (state.product.id, state.quantity, state.product.in_stock())
        };
        if !in_stock {
            self.notifications.warning(MSG_OUT_OF_STOCK);
            return false;
        }
        if quantity < 1 {
            self.notifications.warning(MSG_INVALID_QUANTITY);
            return false;
        }
        let Some(_guard) = LoadingGuard::acquire(&self.loading, &self.state) else {
            return false;
        };
        self.state.send_modify(|s| s.field_errors.clear());

        let ok = self.cart.add_item(product_id, quantity).await;
        if ok {
            self.state.send_modify(|s| s.quantity = 1);
        } else if let Some(failure) = self.cart.last_failure() {
            if failure.kind == ApiErrorKind::Validation {
                self.state.send_modify(|s| s.field_errors = failure.errors);
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cart_service::endpoints;
    use crate::test_support::{cart_json, item_json, TestContext};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::time::Duration;

    fn mug() -> Product {
        Product::new(7, "Taza", Decimal::new(1000, 2))
            .with_image("taza.jpg")
            .with_stock(3)
    }

    fn component(ctx: &TestContext, product: Product) -> ProductComponent {
        ProductComponent::new(product, ctx.cart.clone(), ctx.notifications.clone())
    }

    #[tokio::test]
    async fn test_quantity_is_bounded_by_stock() {
        let ctx = TestContext::new("http://unused.test");
        let product = component(&ctx, mug());

        product.decrement_quantity();
        assert_eq!(product.state().quantity, 1);
        for _ in 0..5 {
            product.increment_quantity();
        }
        assert_eq!(product.state().quantity, 3);

        assert!(product.set_quantity(2));
        assert!(!product.set_quantity(0));
        assert!(!product.set_quantity(4));
        assert_eq!(product.state().quantity, 2);
    }

    #[tokio::test]
    async fn test_gallery_and_tabs_stay_in_range() {
        let ctx = TestContext::new("http://unused.test");
        let product = component(&ctx, mug())
            .with_gallery(vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()])
            .with_tab_count(2);

        assert!(product.set_active_image(2));
        assert!(!product.set_active_image(3));
        product.next_image();
        assert_eq!(product.state().active_image, 0);
        product.previous_image();
        assert_eq!(product.state().active_image, 2);

        assert!(product.set_active_tab(1));
        assert!(!product.set_active_tab(2));
        assert_eq!(product.state().active_tab, 1);
    }

    #[tokio::test]
    async fn test_add_to_cart_posts_selection_and_resets() {
        let server = MockServer::start_async().await;
        let add = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(endpoints::ADD)
                    .json_body(json!({ "producto_id": 7, "cantidad": 2 }));
                then.status(200).json_body(json!({
                    "success": true,
                    "data": cart_json(vec![item_json(1, 7, 2, 10.0)])
                }));
            })
            .await;
        let ctx = TestContext::new(&server.base_url());
        let product = component(&ctx, mug());
        product.increment_quantity();

        assert!(product.add_to_cart().await);

        add.assert_async().await;
        let state = product.state();
        assert_eq!(state.quantity, 1);
        assert!(!state.is_loading);
        assert_eq!(ctx.cart.cached().map(|c| c.total_items), Some(2));
    }

    #[tokio::test]
    async fn test_validation_errors_are_kept_per_field() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(endpoints::ADD);
                then.status(422).json_body(json!({
                    "message": "Datos inválidos",
                    "errors": { "cantidad": ["Solo quedan 2 unidades."] }
                }));
            })
            .await;
        let ctx = TestContext::new(&server.base_url());
        let product = component(&ctx, mug());

        assert!(!product.add_to_cart().await);

        let errors = product.state().field_errors;
        assert_eq!(errors.get("cantidad"), Some(&vec!["Solo quedan 2 unidades.".to_string()]));
    }

    #[tokio::test]
    async fn test_out_of_stock_never_calls_server() {
        let server = MockServer::start_async().await;
        let add = server
            .mock_async(|when, then| {
                when.method(POST).path(endpoints::ADD);
                then.status(200).json_body(json!({ "success": true }));
            })
            .await;
        let ctx = TestContext::new(&server.base_url());
        let product = component(&ctx, mug().with_stock(0));

        assert!(!product.add_to_cart().await);

        assert_eq!(add.hits_async().await, 0);
        let toasts = ctx.notifications.tray().visible();
        assert_eq!(toasts.last().map(|t| t.message.as_str()), Some(MSG_OUT_OF_STOCK));
    }

    #[tokio::test]
    async fn test_double_click_adds_once() {
        let server = MockServer::start_async().await;
        let add = server
            .mock_async(|when, then| {
                when.method(POST).path(endpoints::ADD);
                then.status(200)
                    .delay(Duration::from_millis(50))
                    .json_body(json!({
                        "success": true,
                        "data": cart_json(vec![item_json(1, 7, 1, 10.0)])
                    }));
            })
            .await;
        let ctx = TestContext::new(&server.base_url());
        let product = component(&ctx, mug());

        let (first, second) = tokio::join!(product.add_to_cart(), product.add_to_cart());

        assert!(first);
        assert!(!second);
        assert_eq!(add.hits_async().await, 1);
    }
}
