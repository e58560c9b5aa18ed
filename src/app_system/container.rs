use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ContainerError;

pub const EVENT_BUS: &str = "eventBus";
pub const API: &str = "api";
pub const CART: &str = "cart";
pub const NOTIFICATIONS: &str = "notifications";

type Entry = Arc<dyn Any + Send + Sync>;

/// Name-keyed registry of shared services.
///
/// Entries are looked up by name and downcast to the requested type.
#[derive(Default)]
pub struct Container {
    entries: HashMap<String, Entry>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("names", &self.names()).finish()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` under `name`, replacing any previous entry.
    pub fn register<T>(&mut self, name: impl Into<String>, service: Arc<T>) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(name.into(), service);
        self
    }

    pub fn resolve<T>(&self, name: &str) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
    {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ContainerError::NotRegistered(name.to_string()))?;
        entry
            .clone()
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
