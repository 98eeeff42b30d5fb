//! OperationRegistry - Handler の登録と管理
//!
//! - `register::<O, H>(handler)` で登録（内部で `TypedHandler` に包む）
//! - `HashMap<&'static str, Arc<dyn DynHandler>>` で管理
//! - 同じ operation 名の二重登録はエラー

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::operation::Operation;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for operation '{0}' is already registered")]
    AlreadyRegistered(&'static str),
}

#[derive(Default)]
pub struct OperationRegistry {
    handlers: HashMap<&'static str, Arc<dyn DynHandler>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<O: Operation, H: Handler<O> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(O::NAME) {
            return Err(RegistryError::AlreadyRegistered(O::NAME));
        }
        self.handlers
            .insert(O::NAME, Arc::new(TypedHandler::<O, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, operation: &str) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(operation).cloned()
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.handlers.contains_key(operation)
    }

    /// Registered names, sorted.
    pub fn operations(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
