//! View bindings between the template layer and the services.
//!
//! Components hold UI-only state (loading flags, toggles, selections),
//! publish it through a `watch` channel for renderers, and delegate
//! everything else to the services.

pub mod cart_component;
pub mod product_component;

pub use cart_component::*;
pub use product_component::*;

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

pub const MSG_INVALID_QUANTITY: &str = "La cantidad no es válida";
pub const MSG_EMPTY_CART: &str = "Tu carrito está vacío";
pub const MSG_OUT_OF_STOCK: &str = "Producto sin stock";

/// State that carries an `is_loading` flag for the renderer.
pub trait LoadingState {
    fn set_loading(&mut self, loading: bool);
}

/// Held for the duration of one in-flight action.
///
/// Acquiring fails while another action of the same component is running;
/// dropping the guard clears the flag again, on success, failure or
/// cancellation alike.
pub(crate) struct LoadingGuard<'a, S: LoadingState> {
    flag: &'a AtomicBool,
    state: &'a watch::Sender<S>,
}

impl<'a, S: LoadingState> LoadingGuard<'a, S> {
    pub(crate) fn acquire(flag: &'a AtomicBool, state: &'a watch::Sender<S>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        state.send_modify(|s| s.set_loading(true));
        Some(Self { flag, state })
    }
}

impl<S: LoadingState> Drop for LoadingGuard<'_, S> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.state.send_modify(|s| s.set_loading(false));
    }
}
