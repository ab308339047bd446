//! Session bootstrap.
//!
//! Resolves the initial authentication state from the persisted access token,
//! exactly once per process.
//!
//! ```text
//! Idle ──Start──► ReadingToken ──TokenFound──► Validating ──TokenLive──► FetchingProfile
//!                      │                           │                         │
//!                      │ NoToken                   │ TokenRejected           │ ProfileLoaded
//!                      ▼                           ▼                         ▼ ProfileFailed
//!                   Resolved ◄──────────────── Resolved ◄─────────────── Resolved
//! ```
//!
//! `Resolved` accepts no input and `Start` is only valid from `Idle`, so a
//! second [`SessionBootstrapper::run`] cannot restart the sequence.

use crate::identity::IdentityApi;
use crate::session_store::SessionStore;
use crate::state::{AuthAction, AuthStore};
use crate::token;
use crate::types::UserProfile;
use parking_lot::Mutex;
use rust_fsm::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub bootstrap_machine(Idle)

    Idle => {
        Start => ReadingToken
    },
    ReadingToken => {
        TokenFound => Validating,
        NoToken => Resolved
    },
    Validating => {
        TokenLive => FetchingProfile,
        TokenRejected => Resolved
    },
    FetchingProfile => {
        ProfileLoaded => Resolved,
        ProfileFailed => Resolved
    }
}

pub use bootstrap_machine::Input as BootstrapInput;
pub use bootstrap_machine::State as BootstrapState;
pub use bootstrap_machine::StateMachine as BootstrapMachine;

/// Why bootstrap resolved to the anonymous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousReason {
    /// No access token persisted.
    NoSession,
    /// The persisted token could not be read.
    StorageUnavailable,
    /// The persisted token is not a decodable bearer token.
    InvalidToken,
    /// The persisted token has expired.
    Expired,
    /// The identity service did not return a profile for the token.
    ProfileUnavailable,
}

impl std::fmt::Display for AnonymousReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AnonymousReason::NoSession => "no session",
            AnonymousReason::StorageUnavailable => "session storage unavailable",
            AnonymousReason::InvalidToken => "invalid token",
            AnonymousReason::Expired => "session expired",
            AnonymousReason::ProfileUnavailable => "profile unavailable",
        };
        f.write_str(label)
    }
}

/// Result of [`SessionBootstrapper::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    Authenticated(UserProfile),
    Anonymous(AnonymousReason),
    /// Bootstrap already ran (or is running) in this process; nothing was done.
    AlreadyRan,
}

impl BootstrapOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, BootstrapOutcome::Authenticated(_))
    }
}

/// Drives the initial `Initialize` dispatch from persisted credentials.
pub struct SessionBootstrapper {
    session: Arc<SessionStore>,
    identity: Arc<dyn IdentityApi>,
    store: AuthStore,
    machine: Mutex<BootstrapMachine>,
}

impl SessionBootstrapper {
    pub fn new(session: Arc<SessionStore>, identity: Arc<dyn IdentityApi>, store: AuthStore) -> Self {
        Self {
            session,
            identity,
            store,
            machine: Mutex::new(BootstrapMachine::new()),
        }
    }

    /// Current step of the bootstrap sequence.
    pub fn state(&self) -> BootstrapState {
        self.machine.lock().state().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == BootstrapState::Resolved
    }

    /// Resolve the initial auth state. Never fails: every error path
    /// dispatches `Initialize { is_authenticated: false }`.
    pub async fn run(&self) -> BootstrapOutcome {
        if let Err(current) = self.try_start() {
            debug!(state = ?current, "Session bootstrap already ran, skipping");
            return BootstrapOutcome::AlreadyRan;
        }

        let token = match self.session.current_access_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.advance(BootstrapInput::NoToken);
                return self.resolve_anonymous(AnonymousReason::NoSession);
            }
            Err(e) => {
                warn!(error = %e, "Could not read persisted session");
                self.advance(BootstrapInput::NoToken);
                return self.resolve_anonymous(AnonymousReason::StorageUnavailable);
            }
        };
        self.advance(BootstrapInput::TokenFound);

        match token::decode(&token) {
            Ok(claims) if claims.is_live() => {
                debug!(sub = ?claims.sub, exp = claims.exp, "Persisted token is live");
            }
            Ok(claims) => {
                debug!(sub = ?claims.sub, exp = claims.exp, "Persisted token has expired");
                self.advance(BootstrapInput::TokenRejected);
                return self.resolve_anonymous(AnonymousReason::Expired);
            }
            Err(e) => {
                warn!(error = %e, "Persisted token is malformed");
                self.advance(BootstrapInput::TokenRejected);
                return self.resolve_anonymous(AnonymousReason::InvalidToken);
            }
        }

        if let Err(e) = self.session.attach_to_requests(&token) {
            warn!(error = %e, "Persisted token cannot be sent as a header");
            self.advance(BootstrapInput::TokenRejected);
            return self.resolve_anonymous(AnonymousReason::InvalidToken);
        }
        self.advance(BootstrapInput::TokenLive);

        match self.identity.fetch_profile().await {
            Ok(profile) => {
                self.advance(BootstrapInput::ProfileLoaded);
                info!(user_id = ?profile.user_id(), "Session restored");
                self.store.dispatch(AuthAction::Initialize {
                    is_authenticated: true,
                    user: Some(profile.clone()),
                });
                BootstrapOutcome::Authenticated(profile)
            }
            Err(e) => {
                warn!(error = %e, "Could not load profile for persisted session");
                self.advance(BootstrapInput::ProfileFailed);
                self.session.detach_from_requests();
                self.resolve_anonymous(AnonymousReason::ProfileUnavailable)
            }
        }
    }

    /// Leave `Idle`, or report the state that prevents it.
    fn try_start(&self) -> Result<(), BootstrapState> {
        let mut machine = self.machine.lock();
        match machine.consume(&BootstrapInput::Start) {
            Ok(_) => {
                debug!("Session bootstrap started");
                Ok(())
            }
            Err(_) => Err(machine.state().clone()),
        }
    }

    fn advance(&self, input: BootstrapInput) {
        let mut machine = self.machine.lock();
        let old_state = machine.state().clone();
        if machine.consume(&input).is_err() {
            warn!(state = ?old_state, input = ?input, "Unexpected bootstrap input");
            return;
        }
        debug!(
            old_state = ?old_state,
            new_state = ?machine.state(),
            "Bootstrap transition"
        );
    }

    fn resolve_anonymous(&self, reason: AnonymousReason) -> BootstrapOutcome {
        info!(reason = %reason, "Starting signed out");
        self.store.dispatch(AuthAction::Initialize {
            is_authenticated: false,
            user: None,
        });
        BootstrapOutcome::Anonymous(reason)
    }
}
