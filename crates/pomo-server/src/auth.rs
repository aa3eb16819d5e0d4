use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use pomo_core::identity::{IdentityContext, UserRegistry};
use pomo_core::{paths, OwnerId, PomoError};

use crate::error::json_error;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// RegistryIdentity
// ---------------------------------------------------------------------------

/// `users.yaml`-backed identity that picks up users registered while the
/// server is running. An unknown credential reloads the file, but only when
/// its modification time differs from the copy in memory.
pub struct RegistryIdentity {
    root: PathBuf,
    loaded: RwLock<Loaded>,
}

struct Loaded {
    registry: UserRegistry,
    modified: Option<SystemTime>,
}

impl Loaded {
    fn read(root: &Path) -> pomo_core::Result<Self> {
        // Stat before reading so a write racing the load is seen next time.
        let modified = users_modified(root);
        Ok(Self {
            registry: UserRegistry::load(root)?,
            modified,
        })
    }
}

fn users_modified(root: &Path) -> Option<SystemTime> {
    std::fs::metadata(paths::users_path(root))
        .and_then(|m| m.modified())
        .ok()
}

impl RegistryIdentity {
    pub fn load(root: &Path) -> pomo_core::Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            loaded: RwLock::new(Loaded::read(root)?),
        })
    }

    /// Resolve against the in-memory registry, also returning the mtime it
    /// was loaded at.
    fn resolve_cached(
        &self,
        credential: &str,
    ) -> (pomo_core::Result<OwnerId>, Option<SystemTime>) {
        let resolve = |loaded: &Loaded| (loaded.registry.resolve(credential), loaded.modified);
        match self.loaded.read() {
            Ok(loaded) => resolve(&*loaded),
            Err(poisoned) => resolve(&*poisoned.into_inner()),
        }
    }
}

impl IdentityContext for RegistryIdentity {
    fn resolve(&self, credential: &str) -> pomo_core::Result<OwnerId> {
        let cached_at = match self.resolve_cached(credential) {
            (Err(PomoError::Unauthenticated), cached_at) if !credential.trim().is_empty() => {
                cached_at
            }
            (other, _) => return other,
        };
        if users_modified(&self.root) == cached_at {
            return Err(PomoError::Unauthenticated);
        }
        tracing::info!("users.yaml changed, reloading");
        let fresh = Loaded::read(&self.root)?;
        let owner = fresh.registry.resolve(credential);
        match self.loaded.write() {
            Ok(mut loaded) => *loaded = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        owner
    }
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Resolve `Authorization: Bearer <token>` to an [`OwnerId`] and attach it to
/// the request. Anything else is answered with 401 before reaching a handler.
pub async fn auth_middleware(State(app): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(credential) = bearer_token(&req) else {
        tracing::warn!(path = %req.uri().path(), "request without bearer token");
        return json_error(StatusCode::UNAUTHORIZED, "unauthenticated");
    };

    let identity = app.identity.clone();
    let resolved = tokio::task::spawn_blocking(move || identity.resolve(&credential)).await;
    match resolved {
        Ok(Ok(owner)) => {
            tracing::debug!(owner = %owner, "request authenticated");
            req.extensions_mut().insert(owner);
            next.run(req).await
        }
        Ok(Err(PomoError::Unauthenticated)) => {
            tracing::warn!(path = %req.uri().path(), "rejected unknown credential");
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated")
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "identity lookup failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
        Err(e) => {
            tracing::error!(error = %e, "identity lookup panicked");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn bearer_token(req: &Request) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
