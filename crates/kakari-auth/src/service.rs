//! Sign-in, sign-out, and account creation on top of the session primitives.

use crate::bootstrap::{BootstrapOutcome, SessionBootstrapper};
use crate::http::RequestDefaults;
use crate::identity::{IdentityApi, IdentityClient};
use crate::session_store::SessionStore;
use crate::state::{AuthAction, AuthState, AuthStore};
use crate::types::{Registration, UserProfile};
use crate::AuthResult;
use kakari_config::{Config, Paths};
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point for the auth lifecycle of one process.
pub struct AuthService {
    session: Arc<SessionStore>,
    identity: Arc<dyn IdentityApi>,
    store: AuthStore,
    bootstrapper: SessionBootstrapper,
}

impl AuthService {
    pub fn new(session: SessionStore, identity: Arc<dyn IdentityApi>) -> Self {
        let session = Arc::new(session);
        let store = AuthStore::new();
        let bootstrapper =
            SessionBootstrapper::new(Arc::clone(&session), Arc::clone(&identity), store.clone());
        Self {
            session,
            identity,
            store,
            bootstrapper,
        }
    }

    /// File-backed session and reqwest identity client from configuration.
    pub fn from_config(config: &Config, paths: &Paths) -> AuthResult<Self> {
        let defaults = RequestDefaults::new();
        let storage = kakari_storage::create_storage(&config.session_file(paths))?;
        let session = SessionStore::new(storage, defaults.clone());
        let identity = IdentityClient::from_config(config, defaults)?;
        Ok(Self::new(session, Arc::new(identity)))
    }

    /// Resolve the initial state from the persisted session. Runs once.
    pub async fn bootstrap(&self) -> BootstrapOutcome {
        self.bootstrapper.run().await
    }

    /// Exchange credentials, persist the session, and load the profile.
    ///
    /// On failure the auth state is unchanged: a session that existed before
    /// the attempt is put back, otherwise no session is left behind.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<UserProfile> {
        let tokens = self.identity.login(username, password).await?;
        let previous = self.previous_session();
        if let Err(e) = self.session.persist(&tokens.access_token, &tokens.refresh_token) {
            self.restore_session(previous);
            return Err(e.into());
        }

        let profile = match self.load_profile(&tokens.access_token).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Login did not complete, discarding new session");
                self.restore_session(previous);
                return Err(e);
            }
        };

        info!(user_id = ?profile.user_id(), "Signed in");
        self.store.dispatch(AuthAction::Login {
            user: profile.clone(),
        });
        Ok(profile)
    }

    async fn load_profile(&self, access_token: &str) -> AuthResult<UserProfile> {
        self.session.attach_to_requests(access_token)?;
        self.identity.fetch_profile().await
    }

    /// Clear the persisted session, stop sending the bearer, then sign out.
    pub fn logout(&self) {
        self.discard_session();
        self.store.dispatch(AuthAction::Logout);
        info!("Signed out");
    }

    /// Persisted pair at the start of a login, if both halves are readable.
    fn previous_session(&self) -> Option<(String, String)> {
        let access = self.session.current_access_token().ok().flatten()?;
        let refresh = self.session.current_refresh_token().ok().flatten()?;
        Some((access, refresh))
    }

    /// Undo a failed login, putting back the pair it replaced.
    fn restore_session(&self, previous: Option<(String, String)>) {
        let Some((access, refresh)) = previous else {
            self.discard_session();
            return;
        };
        if let Err(e) = self.session.persist(&access, &refresh) {
            warn!(error = %e, "Failed to restore previous session");
        }
        if self.store.is_authenticated() {
            if let Err(e) = self.session.attach_to_requests(&access) {
                warn!(error = %e, "Failed to reattach previous bearer");
                self.session.detach_from_requests();
            }
        } else {
            self.session.detach_from_requests();
        }
    }

    fn discard_session(&self) {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
        self.session.detach_from_requests();
    }

    /// Create an account. The caller signs in separately.
    pub async fn register(&self, registration: &Registration) -> AuthResult<UserProfile> {
        let profile = self.identity.register(registration).await?;
        info!(user_id = ?profile.user_id(), "Account created");
        Ok(profile)
    }

    pub fn store(&self) -> &AuthStore {
        &self.store
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn state(&self) -> AuthState {
        self.store.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.store.state().user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeIdentity;
    use crate::guard::{GuardPolicy, GuardRoutes, Navigator, RouteGuard};
    use crate::identity::tests::{client_for, serve_once};
    use crate::state::AuthPhase;
    use crate::token::token_expiring_in;
    use crate::AuthError;
    use kakari_storage::{FileStorage, MemoryStorage};
    use parking_lot::Mutex;
    use serde_json::json;
    use tempfile::tempdir;

    fn profile() -> UserProfile {
        UserProfile::new(json!({"id": "u1", "name": "A"}))
    }

    fn service_with(identity: impl FnOnce(RequestDefaults) -> FakeIdentity) -> (AuthService, Arc<FakeIdentity>) {
        let defaults = RequestDefaults::new();
        let session = SessionStore::new(Box::new(MemoryStorage::new()), defaults.clone());
        let identity = Arc::new(identity(defaults));
        (AuthService::new(session, identity.clone()), identity)
    }

    #[tokio::test]
    async fn test_login_persists_and_authenticates() {
        let access = token_expiring_in("u1", 900);
        let (service, identity) = service_with(|d| {
            FakeIdentity::new(d)
                .with_tokens(&access, "r1")
                .with_profile(profile())
        });
        service.bootstrap().await;

        let user = service.login("a@example.com", "secret").await.unwrap();

        assert_eq!(user, profile());
        assert_eq!(service.state().phase(), AuthPhase::Authenticated);
        assert_eq!(service.current_user(), Some(profile()));
        assert_eq!(
            service.session().current_access_token().unwrap(),
            Some(access.clone())
        );
        assert_eq!(
            service.session().current_refresh_token().unwrap().as_deref(),
            Some("r1")
        );
        assert_eq!(
            identity.bearers_seen.lock().clone(),
            vec![Some(format!("Bearer {access}"))]
        );
    }

    #[tokio::test]
    async fn test_rejected_credentials_leave_state_unchanged() {
        let (service, _identity) = service_with(|d| FakeIdentity::new(d).with_profile(profile()));
        service.bootstrap().await;
        let before = service.state();

        let err = service.login("a@example.com", "wrong").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert_eq!(service.state(), before);
        assert_eq!(service.session().current_access_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_profile_failure_rolls_back_login() {
        let (service, _identity) = service_with(|d| FakeIdentity::new(d).with_tokens("a1", "r1"));
        service.bootstrap().await;

        let err = service.login("a@example.com", "secret").await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(!service.is_authenticated());
        assert_eq!(service.session().current_access_token().unwrap(), None);
        assert_eq!(service.session().request_defaults().authorization(), None);
    }

    #[tokio::test]
    async fn test_failed_relogin_keeps_existing_session() {
        let first = token_expiring_in("u1", 900);
        let (service, identity) = service_with(|d| {
            FakeIdentity::new(d)
                .with_tokens(&first, "r1")
                .with_profile(profile())
        });
        service.bootstrap().await;
        service.login("a@example.com", "secret").await.unwrap();

        // New credentials are accepted but the profile lookup fails.
        let second = token_expiring_in("u2", 900);
        *identity.tokens.lock() = Some(crate::types::TokenPair {
            access_token: second,
            refresh_token: "r2".to_string(),
        });
        *identity.profile.lock() = None;

        let err = service.login("b@example.com", "secret").await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(service.is_authenticated());
        assert_eq!(service.current_user(), Some(profile()));
        assert_eq!(
            service.session().current_access_token().unwrap(),
            Some(first.clone())
        );
        assert_eq!(
            service.session().current_refresh_token().unwrap().as_deref(),
            Some("r1")
        );
        assert_eq!(
            service.session().request_defaults().authorization(),
            Some(format!("Bearer {first}"))
        );
    }

    #[tokio::test]
    async fn test_corrupt_session_file_recovers_through_logout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let access = token_expiring_in("u1", 900);
        let defaults = RequestDefaults::new();
        let session = SessionStore::new(Box::new(FileStorage::open(&path).unwrap()), defaults.clone());
        let identity = Arc::new(
            FakeIdentity::new(defaults)
                .with_tokens(&access, "r1")
                .with_profile(profile()),
        );
        let service = AuthService::new(session, identity);

        assert_eq!(
            service.bootstrap().await,
            BootstrapOutcome::Anonymous(crate::bootstrap::AnonymousReason::StorageUnavailable)
        );

        service.logout();
        assert_eq!(service.session().current_access_token().unwrap(), None);

        service.login("a@example.com", "secret").await.unwrap();
        assert!(service.is_authenticated());
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(
            kakari_storage::KeyValueStore::get(&reopened, "accessToken").unwrap(),
            Some(access)
        );
    }

    #[tokio::test]
    async fn test_logout_clears_before_state_changes() {
        let access = token_expiring_in("u1", 900);
        let (service, _identity) = service_with(|d| {
            FakeIdentity::new(d)
                .with_tokens(&access, "r1")
                .with_profile(profile())
        });
        service.login("a@example.com", "secret").await.unwrap();

        let defaults = service.session().request_defaults().clone();
        let leaked = Arc::new(Mutex::new(None));
        let sink = leaked.clone();
        let _sub = service.store().subscribe(move |state| {
            if !state.is_authenticated {
                *sink.lock() = Some(defaults.authorization());
            }
        });

        service.logout();

        assert!(!service.is_authenticated());
        assert_eq!(service.current_user(), None);
        assert_eq!(service.session().current_access_token().unwrap(), None);
        assert_eq!(service.session().current_refresh_token().unwrap(), None);
        // No bearer was attached when listeners observed the logout.
        assert_eq!(*leaked.lock(), Some(None));
    }

    #[tokio::test]
    async fn test_logout_when_signed_out_is_harmless() {
        let (service, _identity) = service_with(FakeIdentity::new);
        service.bootstrap().await;

        service.logout();
        service.logout();

        assert_eq!(service.state().phase(), AuthPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_register_does_not_sign_in() {
        let (service, _identity) = service_with(FakeIdentity::new);
        service.bootstrap().await;

        let created = service
            .register(&Registration {
                email: "b@example.com".to_string(),
                username: "bob".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(created.username(), Some("bob"));
        assert!(!service.is_authenticated());
        assert_eq!(service.session().current_access_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_racing_logins_last_resolved_wins() {
        // Both logins return the same fake pair; the point is that nothing
        // orders them, so the state reflects whichever finished last.
        let access = token_expiring_in("u1", 900);
        let (service, identity) = service_with(|d| {
            FakeIdentity::new(d)
                .with_tokens(&access, "r1")
                .with_profile(profile())
        });

        let (a, b) = tokio::join!(
            service.login("a@example.com", "secret"),
            service.login("a@example.com", "secret")
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(identity.login_calls(), 2);
        assert!(service.is_authenticated());
    }

    #[derive(Default)]
    struct RecordingNavigator(Mutex<Vec<String>>);

    impl Navigator for RecordingNavigator {
        fn replace(&self, path: &str) {
            self.0.lock().push(path.to_string());
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle_drives_guards() {
        let access = token_expiring_in("u1", 900);
        let (service, _identity) = service_with(|d| {
            FakeIdentity::new(d)
                .with_tokens(&access, "r1")
                .with_profile(profile())
        });
        service.bootstrap().await;

        let navigator = Arc::new(RecordingNavigator::default());
        let login_page = RouteGuard::mount(
            service.store(),
            GuardPolicy::PublicRoute,
            GuardRoutes::default(),
            navigator.clone(),
        );
        let dashboard = RouteGuard::mount(
            service.store(),
            GuardPolicy::Authenticated,
            GuardRoutes::default(),
            navigator.clone(),
        );
        assert_eq!(login_page.render(|| "form"), Some("form"));

        service.login("a@example.com", "secret").await.unwrap();
        assert_eq!(dashboard.render(|| "tasks"), Some("tasks"));

        service.logout();
        assert_eq!(dashboard.render(|| "tasks"), None);

        assert_eq!(
            navigator.0.lock().clone(),
            vec!["/login".to_string(), "/".to_string(), "/login".to_string()]
        );
    }

    #[tokio::test]
    async fn test_restart_restores_file_session_over_http() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let access = token_expiring_in("u1", 900);

        let writer = SessionStore::new(
            Box::new(FileStorage::open(&path).unwrap()),
            RequestDefaults::new(),
        );
        writer.persist(&access, "r1").unwrap();

        let (base, server) = serve_once(200, r#"{"id":"u1","name":"A"}"#).await;
        let defaults = RequestDefaults::new();
        let session = SessionStore::new(Box::new(FileStorage::open(&path).unwrap()), defaults.clone());
        let service = AuthService::new(session, Arc::new(client_for(base, defaults)));

        let outcome = service.bootstrap().await;

        assert_eq!(outcome, BootstrapOutcome::Authenticated(profile()));
        let request = server.await.unwrap();
        assert_eq!(
            request.headers.get("authorization"),
            Some(&format!("Bearer {access}"))
        );
    }

    #[test]
    fn test_from_config_uses_session_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let config = Config {
            session_file: Some(dir.path().join("custom").join("session.json")),
            ..Config::default()
        };

        let service = AuthService::from_config(&config, &paths).unwrap();
        service.session().persist("a1", "r1").unwrap();

        assert!(dir.path().join("custom").join("session.json").exists());
    }

    #[test]
    fn test_from_config_rejects_bad_url() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let config = Config {
            api_url: "ftp://example.com".to_string(),
            ..Config::default()
        };

        assert!(matches!(
            AuthService::from_config(&config, &paths),
            Err(AuthError::Config(_))
        ));
    }
}
