use std::path::Path;
use std::sync::Arc;

use pomo_core::identity::IdentityContext;
use pomo_core::{paths, OwnerId, Store};
use tokio::sync::broadcast;

use crate::auth::RegistryIdentity;

/// What changed for an owner. Sent as the SSE `update` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Tasks,
    Sessions,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Tasks => "tasks",
            ChangeKind::Sessions => "sessions",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Change {
    pub owner: OwnerId,
    pub kind: ChangeKind,
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub identity: Arc<dyn IdentityContext>,
    pub event_tx: broadcast::Sender<Change>,
}

impl AppState {
    pub fn new(store: Arc<Store>, identity: Arc<dyn IdentityContext>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            store,
            identity,
            event_tx,
        }
    }

    /// Open the data file and user registry under an initialized root.
    pub fn open(root: &Path) -> pomo_core::Result<Self> {
        if !paths::is_initialized(root) {
            return Err(pomo_core::PomoError::NotInitialized);
        }
        let store = Store::open(&paths::db_path(root))?;
        let identity = RegistryIdentity::load(root)?;
        Ok(Self::new(Arc::new(store), Arc::new(identity)))
    }

    /// Tell `owner`'s other clients to refresh. Nobody listening is fine.
    pub fn notify(&self, owner: &OwnerId, kind: ChangeKind) {
        let _ = self.event_tx.send(Change {
            owner: owner.clone(),
            kind,
        });
    }
}
