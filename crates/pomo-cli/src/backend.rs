use anyhow::{bail, Context};
use pomo_client::ApiClient;
use pomo_core::identity::{IdentityContext, UserRegistry};
use pomo_core::session::Session;
use pomo_core::task::Task;
use pomo_core::{paths, OwnerId, PomoError, Store};
use std::path::Path;
use std::sync::Arc;

/// Where task and session commands read and write: the local data file, or a
/// running `pomo serve` when a server URL is given.
pub enum Backend {
    Local { store: Arc<Store>, owner: OwnerId },
    Remote(ApiClient),
}

const NO_TOKEN: &str =
    "no token: pass --token or set POMO_TOKEN (create one with 'pomo user add <email>')";

impl Backend {
    pub fn connect(root: &Path, token: Option<&str>, server: Option<&str>) -> anyhow::Result<Self> {
        let token = require_token(token)?;
        if let Some(server) = server {
            let client = ApiClient::new(server, token).context("failed to build HTTP client")?;
            return Ok(Backend::Remote(client));
        }
        let (store, owner) = open_local(root, token)?;
        Ok(Backend::Local { store, owner })
    }

    pub async fn list_tasks(&self) -> anyhow::Result<Vec<Task>> {
        Ok(match self {
            Backend::Local { store, owner } => store.list_tasks(owner)?,
            Backend::Remote(api) => api.list_tasks().await?,
        })
    }

    pub async fn add_task(&self, description: &str) -> anyhow::Result<Task> {
        Ok(match self {
            Backend::Local { store, owner } => store.add_task(owner, description)?,
            Backend::Remote(api) => api.add_task(description).await?,
        })
    }

    pub async fn set_task_completion(&self, id: &str, done: bool) -> anyhow::Result<Task> {
        Ok(match self {
            Backend::Local { store, owner } => store
                .set_task_completion(owner, id, done)
                .map_err(|e| match e {
                    e if e.is_not_found() => PomoError::TaskNotFound(id.to_string()),
                    e => e,
                })?,
            Backend::Remote(api) => api.set_task_completion(id, done).await?,
        })
    }

    pub async fn delete_completed_tasks(&self) -> anyhow::Result<usize> {
        Ok(match self {
            Backend::Local { store, owner } => store.delete_completed_tasks(owner)?,
            Backend::Remote(api) => api.delete_completed_tasks().await?,
        })
    }

    pub async fn session_history(&self) -> anyhow::Result<Vec<Session>> {
        Ok(match self {
            Backend::Local { store, owner } => store.session_history(owner)?,
            Backend::Remote(api) => api.session_history().await?,
        })
    }
}

pub fn require_token(token: Option<&str>) -> anyhow::Result<&str> {
    match token.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => bail!(NO_TOKEN),
    }
}

/// Open the local data file and resolve `token` against the user registry.
pub fn open_local(root: &Path, token: &str) -> anyhow::Result<(Arc<Store>, OwnerId)> {
    if !paths::is_initialized(root) {
        return Err(PomoError::NotInitialized.into());
    }
    let registry = UserRegistry::load(root).context("failed to load users.yaml")?;
    let owner = registry
        .resolve(token)
        .context("token not recognized; check POMO_TOKEN")?;
    let store = Store::open(&paths::db_path(root)).with_context(|| {
        format!(
            "failed to open {} (is 'pomo serve' running? pass --server to go through it)",
            paths::DB_FILE
        )
    })?;
    Ok((Arc::new(store), owner))
}

/// Single-threaded runtime for one command.
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
