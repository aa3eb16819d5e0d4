use std::sync::Arc;

use pomo_core::session::{IdempotencyKey, NewSession, Recorded};
use pomo_core::timer::Completion;
use pomo_core::{OwnerId, Store};

use crate::error::ClientError;
use crate::sync::SessionSink;

/// Records sessions straight into a local store, for running without a server.
#[derive(Clone)]
pub struct LocalSink {
    store: Arc<Store>,
    owner: OwnerId,
}

impl LocalSink {
    pub fn new(store: Arc<Store>, owner: OwnerId) -> Self {
        Self { store, owner }
    }
}

impl SessionSink for LocalSink {
    async fn record(&self, completion: &Completion) -> Result<Recorded, ClientError> {
        let store = Arc::clone(&self.store);
        let owner = self.owner.clone();
        let new = NewSession::from(completion);
        let key = IdempotencyKey::from(completion.id);
        let recorded = tokio::task::spawn_blocking(move || {
            store.record_session(&owner, &new, Some(&key))
        })
        .await
        .map_err(|e| ClientError::Join(e.to_string()))??;
        Ok(recorded)
    }
}
