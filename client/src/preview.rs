// client/src/preview.rs
use std::sync::RwLock;

use common::{PreviewIdentity, Role};

use crate::error::Result;
use crate::storage::SessionStore;

/// Owns the preview identity and keeps it in step with the store.
pub struct PreviewController {
    store: SessionStore,
    current: RwLock<PreviewIdentity>,
}

impl PreviewController {
    pub fn new(store: SessionStore) -> Self {
        let current = store.load_preview();
        Self {
            store,
            current: RwLock::new(current),
        }
    }

    pub fn current(&self) -> PreviewIdentity {
        *self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn enter(&self, role: Role) -> Result<PreviewIdentity> {
        self.store.save_preview(role)?;
        let identity = PreviewIdentity::with_role(role);
        *self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = identity;
        tracing::info!("Entered preview as {}", role);
        Ok(identity)
    }

    pub fn exit(&self) -> Result<()> {
        self.store.clear_preview()?;
        *self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = PreviewIdentity::default();
        tracing::debug!("Preview cleared");
        Ok(())
    }
}
