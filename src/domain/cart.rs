use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Product;

/// One line of a cart: a product, how many units and the price they were
/// added at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: u64,
    #[serde(rename = "producto_id")]
    pub product_id: u64,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(rename = "precio_unitario")]
    pub unit_price: Decimal,
    #[serde(rename = "producto")]
    pub product: Product,
}

impl CartItem {
    pub fn new(id: u64, product: Product, quantity: u32) -> Self {
        Self {
            id,
            product_id: product.id,
            quantity,
            unit_price: product.price,
            product,
        }
    }

    /// `None` when the product does not fit in a `Decimal`.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Full snapshot of a cart as last confirmed by the server.
///
/// The client never patches a snapshot in place; every successful mutation
/// replaces it with the one the server returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total_items: u32,
    #[serde(rename = "total_precio")]
    pub total_price: Decimal,
}

impl Default for Cart {
    fn default() -> Self {
        Self::empty()
    }
}

impl Cart {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_items: 0,
            total_price: Decimal::ZERO,
        }
    }

    /// Builds a cart whose aggregates are computed from `items`.
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let mut cart = Self {
            items,
            total_items: 0,
            total_price: Decimal::ZERO,
        };
        cart.total_items = cart.computed_total_items().unwrap_or(u32::MAX);
        cart.total_price = cart.computed_total_price().unwrap_or(Decimal::MAX);
        cart
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, item_id: u64) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_for_product(&self, product_id: u64) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Sum of line quantities; `None` on overflow.
    pub fn computed_total_items(&self) -> Option<u32> {
        self.items
            .iter()
            .try_fold(0u32, |total, item| total.checked_add(item.quantity))
    }

    /// Sum of line subtotals; `None` on overflow.
    pub fn computed_total_price(&self) -> Option<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |total, item| {
            item.subtotal().and_then(|subtotal| total.checked_add(subtotal))
        })
    }

    /// Whether both aggregates agree with the lines they summarise. A cart
    /// whose sums overflow is never consistent.
    pub fn is_consistent(&self) -> bool {
        self.computed_total_items() == Some(self.total_items)
            && self.computed_total_price() == Some(self.total_price)
    }

    /// Drops lines with a zero quantity. They add nothing to either
    /// aggregate, so the totals are left untouched.
    pub fn normalized(mut self) -> Self {
        self.items.retain(|item| item.quantity > 0);
        self
    }
}
