//! Route guards.
//!
//! A [`RouteGuard`] decides whether a view may render for the current
//! [`AuthState`], and redirects through a [`Navigator`] when it may not. Guards
//! subscribe to the [`AuthStore`] so a logout while a protected view is
//! mounted redirects immediately.

use crate::state::{AuthState, AuthStore, Subscription};
use kakari_config::{Config, DEFAULT_LANDING_PATH, DEFAULT_LOGIN_PATH};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Performs navigation for the host application.
pub trait Navigator: Send + Sync {
    /// Navigate to `path`, replacing the current history entry.
    fn replace(&self, path: &str);
}

/// Which auth state a route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPolicy {
    /// Only signed-in users; others go to the login route.
    Authenticated,
    /// Only signed-out users (login, registration); others go to the landing route.
    PublicRoute,
}

/// Redirect targets for the guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRoutes {
    pub login_path: String,
    pub landing_path: String,
}

impl Default for GuardRoutes {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            landing_path: DEFAULT_LANDING_PATH.to_string(),
        }
    }
}

impl GuardRoutes {
    pub fn from_config(config: &Config) -> Self {
        Self {
            login_path: config.login_path.clone(),
            landing_path: config.landing_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Render,
    Redirect(String),
}

/// Verdict for `policy` in `state`.
pub fn evaluate(policy: GuardPolicy, routes: &GuardRoutes, state: &AuthState) -> GuardVerdict {
    match (policy, state.is_authenticated) {
        (GuardPolicy::Authenticated, false) => GuardVerdict::Redirect(routes.login_path.clone()),
        (GuardPolicy::PublicRoute, true) => GuardVerdict::Redirect(routes.landing_path.clone()),
        _ => GuardVerdict::Render,
    }
}

/// A mounted guard. Stops reacting to state changes when dropped.
pub struct RouteGuard {
    store: AuthStore,
    policy: GuardPolicy,
    routes: GuardRoutes,
    _subscription: Subscription,
}

impl RouteGuard {
    /// Evaluate `policy` now and on every subsequent state change.
    ///
    /// A redirect is issued when the verdict changes to `Redirect`, not on
    /// every notification while it stays there.
    pub fn mount(
        store: &AuthStore,
        policy: GuardPolicy,
        routes: GuardRoutes,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let initial = evaluate(policy, &routes, &store.state());
        let last_verdict = Arc::new(Mutex::new(initial.clone()));

        let subscription = {
            let routes = routes.clone();
            let navigator = Arc::clone(&navigator);
            let last_verdict = Arc::clone(&last_verdict);
            store.subscribe(move |state| {
                let verdict = evaluate(policy, &routes, state);
                {
                    let mut last = last_verdict.lock();
                    if *last == verdict {
                        return;
                    }
                    *last = verdict.clone();
                }
                if let GuardVerdict::Redirect(path) = verdict {
                    debug!(policy = ?policy, path = %path, "Guard redirect");
                    navigator.replace(&path);
                }
            })
        };

        if let GuardVerdict::Redirect(path) = &initial {
            debug!(policy = ?policy, path = %path, "Guard redirect on mount");
            navigator.replace(path);
        }

        Self {
            store: store.clone(),
            policy,
            routes,
            _subscription: subscription,
        }
    }

    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    /// Verdict for the current state.
    pub fn verdict(&self) -> GuardVerdict {
        evaluate(self.policy, &self.routes, &self.store.state())
    }

    /// `Some(children())` when the route may render, `None` while redirecting.
    pub fn render<T>(&self, children: impl FnOnce() -> T) -> Option<T> {
        match self.verdict() {
            GuardVerdict::Render => Some(children()),
            GuardVerdict::Redirect(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AuthAction;
    use crate::types::UserProfile;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingNavigator {
        replaced: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn replace(&self, path: &str) {
            self.replaced.lock().push(path.to_string());
        }
    }

    impl RecordingNavigator {
        fn history(&self) -> Vec<String> {
            self.replaced.lock().clone()
        }
    }

    fn profile() -> UserProfile {
        UserProfile::new(json!({"id": "u1", "name": "A"}))
    }

    fn signed_in_store() -> AuthStore {
        let store = AuthStore::new();
        store.dispatch(AuthAction::Initialize {
            is_authenticated: true,
            user: Some(profile()),
        });
        store
    }

    fn signed_out_store() -> AuthStore {
        let store = AuthStore::new();
        store.dispatch(AuthAction::Initialize {
            is_authenticated: false,
            user: None,
        });
        store
    }

    #[test]
    fn test_authenticated_guard_renders_for_signed_in_user() {
        let store = signed_in_store();
        let navigator = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::mount(
            &store,
            GuardPolicy::Authenticated,
            GuardRoutes::default(),
            navigator.clone(),
        );

        assert_eq!(guard.render(|| "dashboard"), Some("dashboard"));
        assert!(navigator.history().is_empty());
    }

    #[test]
    fn test_authenticated_guard_redirects_signed_out_user() {
        let store = signed_out_store();
        let navigator = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::mount(
            &store,
            GuardPolicy::Authenticated,
            GuardRoutes::default(),
            navigator.clone(),
        );

        assert_eq!(guard.render(|| "dashboard"), None);
        assert_eq!(navigator.history(), vec!["/login".to_string()]);
    }

    #[test]
    fn test_public_route_redirects_signed_in_user() {
        let store = signed_in_store();
        let navigator = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::mount(
            &store,
            GuardPolicy::PublicRoute,
            GuardRoutes::default(),
            navigator.clone(),
        );

        assert_eq!(guard.render(|| "login form"), None);
        assert_eq!(navigator.history(), vec!["/".to_string()]);
    }

    #[test]
    fn test_public_route_renders_for_signed_out_user() {
        let store = signed_out_store();
        let navigator = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::mount(
            &store,
            GuardPolicy::PublicRoute,
            GuardRoutes::default(),
            navigator.clone(),
        );

        assert_eq!(guard.render(|| "login form"), Some("login form"));
        assert!(navigator.history().is_empty());
    }

    #[test]
    fn test_logout_while_mounted_redirects_once() {
        let store = signed_in_store();
        let navigator = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::mount(
            &store,
            GuardPolicy::Authenticated,
            GuardRoutes::default(),
            navigator.clone(),
        );

        store.dispatch(AuthAction::Logout);
        store.dispatch(AuthAction::Logout);

        assert_eq!(navigator.history(), vec!["/login".to_string()]);
        assert_eq!(guard.render(|| ()), None);

        // Signing in again and out again redirects again.
        store.dispatch(AuthAction::Login { user: profile() });
        assert_eq!(guard.render(|| "dashboard"), Some("dashboard"));
        store.dispatch(AuthAction::Logout);
        assert_eq!(navigator.history().len(), 2);
    }

    #[test]
    fn test_login_on_public_route_redirects_to_landing() {
        let store = signed_out_store();
        let navigator = Arc::new(RecordingNavigator::default());
        let _guard = RouteGuard::mount(
            &store,
            GuardPolicy::PublicRoute,
            GuardRoutes::default(),
            navigator.clone(),
        );

        store.dispatch(AuthAction::Login { user: profile() });
        assert_eq!(navigator.history(), vec!["/".to_string()]);
    }

    #[test]
    fn test_dropped_guard_stops_reacting() {
        let store = signed_in_store();
        let navigator = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::mount(
            &store,
            GuardPolicy::Authenticated,
            GuardRoutes::default(),
            navigator.clone(),
        );
        assert_eq!(store.listener_count(), 1);

        drop(guard);
        store.dispatch(AuthAction::Logout);

        assert_eq!(store.listener_count(), 0);
        assert!(navigator.history().is_empty());
    }

    #[test]
    fn test_uninitialized_state_counts_as_signed_out() {
        let store = AuthStore::new();
        let navigator = Arc::new(RecordingNavigator::default());
        let guard = RouteGuard::mount(
            &store,
            GuardPolicy::Authenticated,
            GuardRoutes::default(),
            navigator.clone(),
        );

        assert_eq!(guard.verdict(), GuardVerdict::Redirect("/login".to_string()));
        assert_eq!(navigator.history(), vec!["/login".to_string()]);
    }

    #[test]
    fn test_custom_routes_from_config() {
        let config = Config {
            login_path: "/signin".to_string(),
            landing_path: "/tasks".to_string(),
            ..Config::default()
        };
        let routes = GuardRoutes::from_config(&config);

        let store = signed_in_store();
        let navigator = Arc::new(RecordingNavigator::default());
        let _guard = RouteGuard::mount(&store, GuardPolicy::PublicRoute, routes, navigator.clone());
        store.dispatch(AuthAction::Logout);

        let _protected = RouteGuard::mount(
            &store,
            GuardPolicy::Authenticated,
            GuardRoutes::from_config(&config),
            navigator.clone(),
        );

        assert_eq!(
            navigator.history(),
            vec!["/tasks".to_string(), "/signin".to_string()]
        );
    }
}
