//! Client-side session lifecycle for Kakari.
//!
//! This crate provides:
//! - **Token codec** ([`token`]): reads `sub`/`exp` from bearer tokens
//! - **Session store** ([`SessionStore`]): persisted token pair plus the bearer
//!   header on outgoing requests
//! - **Auth state** ([`AuthStore`]): observable signed-in/signed-out state
//! - **Bootstrap** ([`SessionBootstrapper`]): one-time restore of a persisted session
//! - **Route guards** ([`RouteGuard`]): redirect on auth state
//! - **Identity client** ([`IdentityClient`]) and the [`AuthService`] facade
//!
//! ## Startup
//!
//! ```no_run
//! # async fn example() -> kakari_auth::AuthResult<()> {
//! use kakari_auth::AuthService;
//! use kakari_config::{Config, Paths};
//!
//! let paths = Paths::new()?;
//! let config = Config::load(&paths)?;
//! let auth = AuthService::from_config(&config, &paths)?;
//! auth.bootstrap().await;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
mod error;
pub mod guard;
mod http;
pub mod identity;
mod service;
mod session_store;
pub mod state;
pub mod token;
mod types;

#[cfg(test)]
mod fakes;

pub use bootstrap::{AnonymousReason, BootstrapOutcome, SessionBootstrapper};
pub use error::{AuthError, AuthResult};
pub use guard::{GuardPolicy, GuardRoutes, GuardVerdict, Navigator, RouteGuard};
pub use http::RequestDefaults;
pub use identity::{IdentityApi, IdentityClient};
pub use service::AuthService;
pub use session_store::SessionStore;
pub use state::{AuthAction, AuthPhase, AuthState, AuthStore, Subscription};
pub use token::{Claims, DecodeError};
pub use types::{Registration, TokenPair, UserProfile};
