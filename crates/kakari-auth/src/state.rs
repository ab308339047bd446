//! In-memory authentication state.
//!
//! [`AuthStore`] is the single source of truth for whether the user is signed
//! in. It only changes through [`AuthStore::dispatch`], and every committed
//! action is published to subscribers synchronously, after the lock is
//! released, so a listener may read the store or dispatch again.
//!
//! ```text
//!  Uninitialized ── Initialize(false) ──► Anonymous ◄──┐
//!        │                                  │          │ Logout
//!        └──── Initialize(true) ──► Authenticated ◄────┘
//!                                           ▲ Login
//! ```

use crate::types::UserProfile;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    /// Set by the first `Initialize` and never cleared.
    pub is_initialized: bool,
    pub is_authenticated: bool,
    pub user: Option<UserProfile>,
}

impl AuthState {
    pub fn phase(&self) -> AuthPhase {
        match (self.is_initialized, self.is_authenticated) {
            (_, true) => AuthPhase::Authenticated,
            (false, false) => AuthPhase::Uninitialized,
            (true, false) => AuthPhase::Anonymous,
        }
    }
}

/// Coarse view of [`AuthState`] for display and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Uninitialized,
    Anonymous,
    Authenticated,
}

impl std::fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuthPhase::Uninitialized => "uninitialized",
            AuthPhase::Anonymous => "anonymous",
            AuthPhase::Authenticated => "authenticated",
        };
        f.write_str(label)
    }
}

/// Actions accepted by [`AuthStore::dispatch`].
///
/// Serialized with a `type` tag (`INITIALIZE`, `LOGIN`, `LOGOUT`); any other
/// tag deserializes to [`AuthAction::Unknown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthAction {
    Initialize {
        is_authenticated: bool,
        #[serde(default)]
        user: Option<UserProfile>,
    },
    Login {
        user: UserProfile,
    },
    Logout,
    #[serde(other)]
    Unknown,
}

impl AuthAction {
    fn name(&self) -> &'static str {
        match self {
            AuthAction::Initialize { .. } => "INITIALIZE",
            AuthAction::Login { .. } => "LOGIN",
            AuthAction::Logout => "LOGOUT",
            AuthAction::Unknown => "UNKNOWN",
        }
    }
}

/// Pure transition function. Returns `None` when the action is ignored.
fn reduce(state: &AuthState, action: AuthAction) -> Option<AuthState> {
    match action {
        AuthAction::Initialize {
            is_authenticated,
            user,
        } => Some(AuthState {
            is_initialized: true,
            is_authenticated,
            user,
        }),
        AuthAction::Login { user } => Some(AuthState {
            is_initialized: state.is_initialized,
            is_authenticated: true,
            user: Some(user),
        }),
        AuthAction::Logout => Some(AuthState {
            is_initialized: state.is_initialized,
            is_authenticated: false,
            user: None,
        }),
        AuthAction::Unknown => None,
    }
}

/// Callback invoked with the new state after each committed action.
pub type AuthListener = Arc<dyn Fn(&AuthState) + Send + Sync>;

struct Inner {
    state: Mutex<AuthState>,
    listeners: Mutex<Vec<(u64, AuthListener)>>,
    next_listener_id: AtomicU64,
}

/// Shared, observable authentication state. Clones share the same state.
#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<Inner>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(AuthState::default()),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.inner.state.lock().clone()
    }

    pub fn phase(&self) -> AuthPhase {
        self.inner.state.lock().phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.lock().is_authenticated
    }

    /// Apply `action` and notify subscribers. Unknown actions are ignored.
    pub fn dispatch(&self, action: AuthAction) -> AuthState {
        let name = action.name();
        let (old_phase, new_state) = {
            let mut state = self.inner.state.lock();
            let old_phase = state.phase();
            match reduce(&state, action) {
                Some(next) => {
                    *state = next;
                    (old_phase, state.clone())
                }
                None => {
                    debug!(action = name, "Ignoring unrecognized auth action");
                    return state.clone();
                }
            }
        };

        debug!(
            action = name,
            old_phase = %old_phase,
            new_phase = %new_state.phase(),
            "Auth state transition"
        );
        self.notify(&new_state);
        new_state
    }

    /// Register `listener`; it stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn notify(&self, state: &AuthState) {
        let listeners: Vec<AuthListener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }
}

/// Handle that keeps a listener registered.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
