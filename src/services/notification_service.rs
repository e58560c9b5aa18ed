use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::config::AppConfig;
use crate::domain::{
    ApiErrorKind, ApiFailure, BusEvent, CartEvent, EventName, Notification, NotificationKind,
};
use crate::event_bus::{EventBus, Handler};

pub const MSG_ITEM_ADDED: &str = "Producto agregado al carrito";
pub const MSG_ITEM_REMOVED: &str = "Producto eliminado del carrito";
pub const MSG_ITEM_UPDATED: &str = "Carrito actualizado";
pub const MSG_CART_CLEARED: &str = "Carrito vaciado";

/// A notification currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub duration: Duration,
}

/// Where toasts are rendered. Each one stays until its duration elapses or
/// it is dismissed.
#[derive(Debug, Default)]
pub struct ToastTray {
    toasts: Mutex<Vec<Toast>>,
    next_id: AtomicU64,
}

impl ToastTray {
    pub fn new() -> Self {
        Self::default()
    }

    fn toasts(&self) -> MutexGuard<'_, Vec<Toast>> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, kind: NotificationKind, message: String, duration: Duration) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.toasts().push(Toast {
            id,
            kind,
            message,
            duration,
        });
        id
    }

    /// Removes a toast. `false` when it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut toasts = self.toasts();
        let before = toasts.len();
        toasts.retain(|toast| toast.id != id);
        toasts.len() != before
    }

    pub fn visible(&self) -> Vec<Toast> {
        self.toasts().clone()
    }

    pub fn clear(&self) {
        self.toasts().clear();
    }
}

/// Turns cart and API events into transient user-facing messages.
pub struct NotificationService {
    bus: Arc<EventBus>,
    tray: Arc<ToastTray>,
    default_duration: Duration,
    login_url: String,
    login_redirect_delay: Duration,
    subscriptions: Mutex<Vec<(EventName, Handler)>>,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("tray", &self.tray)
            .field("default_duration", &self.default_duration)
            .finish_non_exhaustive()
    }
}

impl NotificationService {
    pub fn new(config: &AppConfig, bus: Arc<EventBus>, tray: Arc<ToastTray>) -> Self {
        Self {
            bus,
            tray,
            default_duration: config.notification_duration,
            login_url: config.login_url.clone(),
            login_redirect_delay: config.login_redirect_delay,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn tray(&self) -> &Arc<ToastTray> {
        &self.tray
    }

    /// Subscribes to `cart:changed` and `api:error`.
    ///
    /// Handlers hold a weak reference, so the bus never keeps the service
    /// alive on its own.
    pub fn install(self: &Arc<Self>) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        if !subscriptions.is_empty() {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let handler: Handler = Arc::new(move |event: &BusEvent| {
            if let Some(service) = weak.upgrade() {
                service.dispatch(event);
            }
        });
        for name in [EventName::CartChanged, EventName::ApiError] {
            subscriptions.push((name, self.bus.on(name, handler.clone())));
        }
    }

    pub fn uninstall(&self) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        for (name, handler) in subscriptions.drain(..) {
            self.bus.off(name, Some(&handler));
        }
    }

    fn dispatch(&self, event: &BusEvent) {
        match event {
            BusEvent::CartChanged(change) => self.on_cart_event(change),
            BusEvent::ApiError(failure) => self.on_api_error(failure),
            BusEvent::NotificationShow(_) | BusEvent::CartUpdated | BusEvent::LoginRedirect(_) => {}
        }
    }

    fn on_cart_event(&self, event: &CartEvent) {
        match event {
            CartEvent::ItemAdded { .. } => self.success(MSG_ITEM_ADDED),
            CartEvent::ItemRemoved { .. } => self.info(MSG_ITEM_REMOVED),
            CartEvent::ItemUpdated { .. } => self.info(MSG_ITEM_UPDATED),
            CartEvent::CartCleared { .. } => self.warning(MSG_CART_CLEARED),
        };
    }

    fn on_api_error(&self, failure: &ApiFailure) {
        let message = match failure.kind {
            ApiErrorKind::Validation => failure
                .first_field_error()
                .unwrap_or(failure.message.as_str()),
            _ => failure.message.as_str(),
        };
        self.error(message.to_string());

        if failure.kind == ApiErrorKind::Unauthorized {
            self.schedule_login_redirect();
        }
    }

    fn schedule_login_redirect(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime, redirecting immediately");
            self.bus.emit(BusEvent::LoginRedirect(self.login_url.clone()));
            return;
        };
        let bus = self.bus.clone();
        let url = self.login_url.clone();
        let delay = self.login_redirect_delay;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            info!(url = %url, "Session expired, redirecting to login");
            bus.emit(BusEvent::LoginRedirect(url));
        });
    }

    /// Publishes `notification:show` and puts a toast on screen.
    ///
    /// Returns the toast id so callers can dismiss it early.
    #[instrument(skip(self, message))]
    pub fn show(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        duration: Option<Duration>,
    ) -> u64 {
        let message = message.into();
        let duration = duration.unwrap_or(self.default_duration);
        debug!(%kind, message = %message, "Showing notification");

        self.bus.emit(BusEvent::NotificationShow(
            Notification::new(kind, message.clone()).with_duration(duration),
        ));
        let id = self.tray.push(kind, message, duration);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let tray = self.tray.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(duration).await;
                    tray.dismiss(id);
                });
            }
            Err(_) => debug!(id, "No runtime, toast stays until dismissed"),
        }
        id
    }

    pub fn dismiss(&self, id: u64) -> bool {
        self.tray.dismiss(id)
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.show(NotificationKind::Success, message, None)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.show(NotificationKind::Error, message, None)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.show(NotificationKind::Warning, message, None)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.show(NotificationKind::Info, message, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Cart;
    use crate::test_support::{record_events, test_config};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn service() -> (Arc<EventBus>, Arc<NotificationService>) {
        let bus = Arc::new(EventBus::new());
        let service = Arc::new(NotificationService::new(
            &test_config("http://unused.test"),
            bus.clone(),
            Arc::new(ToastTray::new()),
        ));
        service.install();
        (bus, service)
    }

    fn kinds(service: &NotificationService) -> Vec<(NotificationKind, String)> {
        service
            .tray()
            .visible()
            .into_iter()
            .map(|toast| (toast.kind, toast.message))
            .collect()
    }

    #[tokio::test]
    async fn test_show_emits_and_renders() {
        let (bus, service) = service();
        let shown = record_events(&bus, EventName::NotificationShow);

        let id = service.warning("Cuidado");

        assert_eq!(kinds(&service), vec![(NotificationKind::Warning, "Cuidado".to_string())]);
        assert_eq!(
            *shown.lock().unwrap(),
            vec![BusEvent::NotificationShow(
                Notification::new(NotificationKind::Warning, "Cuidado")
                    .with_duration(Duration::from_secs(1))
            )]
        );
        assert!(service.dismiss(id));
        assert!(!service.dismiss(id));
        assert!(service.tray().visible().is_empty());
    }

    #[tokio::test]
    async fn test_toasts_dismiss_themselves() {
        let (_bus, service) = service();

        service.show(NotificationKind::Info, "Breve", Some(Duration::from_millis(20)));
        service.show(NotificationKind::Success, "Largo", Some(Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(kinds(&service), vec![(NotificationKind::Success, "Largo".to_string())]);
    }

    #[tokio::test]
    async fn test_cart_events_map_to_fixed_messages() {
        let (bus, service) = service();
        let cart = Cart::empty();

        bus.emit(BusEvent::CartChanged(CartEvent::ItemAdded {
            product_id: 1,
            quantity: 1,
            item: None,
            cart: cart.clone(),
        }));
        bus.emit(BusEvent::CartChanged(CartEvent::ItemRemoved {
            item_id: 1,
            item: None,
            cart: cart.clone(),
        }));
        bus.emit(BusEvent::CartChanged(CartEvent::ItemUpdated {
            item_id: 1,
            quantity: 3,
            item: None,
            cart: cart.clone(),
        }));
        bus.emit(BusEvent::CartChanged(CartEvent::CartCleared { cart }));

        assert_eq!(
            kinds(&service),
            vec![
                (NotificationKind::Success, MSG_ITEM_ADDED.to_string()),
                (NotificationKind::Info, MSG_ITEM_REMOVED.to_string()),
                (NotificationKind::Info, MSG_ITEM_UPDATED.to_string()),
                (NotificationKind::Warning, MSG_CART_CLEARED.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_api_errors_become_error_toasts() {
        let (bus, service) = service();
        let mut errors = BTreeMap::new();
        errors.insert("cantidad".to_string(), vec!["Cantidad inválida".to_string()]);

        bus.emit(BusEvent::ApiError(ApiFailure::new(Some(500), "HTTP Error: 500")));
        bus.emit(BusEvent::ApiError(
            ApiFailure::new(Some(422), "Datos inválidos").with_errors(errors),
        ));

        assert_eq!(
            kinds(&service),
            vec![
                (NotificationKind::Error, "HTTP Error: 500".to_string()),
                (NotificationKind::Error, "Cantidad inválida".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_redirects_after_delay() {
        let (bus, service) = service();
        let redirects = record_events(&bus, EventName::LoginRedirect);

        bus.emit(BusEvent::ApiError(ApiFailure::new(Some(401), "No autenticado")));
        assert!(redirects.lock().unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            *redirects.lock().unwrap(),
            vec![BusEvent::LoginRedirect("/login".to_string())]
        );
        assert_eq!(kinds(&service), vec![(NotificationKind::Error, "No autenticado".to_string())]);
    }

    #[tokio::test]
    async fn test_uninstall_stops_reacting() {
        let (bus, service) = service();
        service.install();
        assert_eq!(bus.handler_count(EventName::CartChanged), 1);

        service.uninstall();
        bus.emit(BusEvent::CartChanged(CartEvent::CartCleared { cart: Cart::empty() }));

        assert_eq!(bus.handler_count(EventName::ApiError), 0);
        assert!(service.tray().visible().is_empty());
    }
}
