use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::StatusCode;

use crate::core::config::Args;
use crate::core::error::Error;
use crate::core::notice::Notifier;
use crate::core::refresh::RefreshCoordinator;
use crate::routes::{Navigator, RouteClassifier, RouteRule};
use crate::token::store::{AccessToken, TokenStore};
use crate::utils::auth;
use crate::utils::encode::login_redirect;

pub(crate) const REASON_EXPIRED: &str = "expired";
pub(crate) const REASON_UNAUTHORIZED: &str = "unauthorized";

/// Everything the request and response interceptors share: stored
/// credentials, the refresh coordinator, and the host's navigation and
/// notice capabilities.
#[derive(Clone)]
pub struct Session {
    tokens: TokenStore,
    refresher: RefreshCoordinator,
    routes: Arc<RouteClassifier>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    login_path: Arc<str>,
    expiry_margin_secs: i64,
    // set by the redirecting teardown, cleared when a new credential arrives
    torn_down: Arc<Mutex<bool>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tokens", &self.tokens)
            .field("refresher", &self.refresher)
            .field("routes", &self.routes)
            .field("login_path", &self.login_path)
            .field("expiry_margin_secs", &self.expiry_margin_secs)
            .field("torn_down", &*self.torn_down())
            .finish()
    }
}

impl Session {
    pub fn new(
        config: &Args,
        http: reqwest::Client,
        tokens: TokenStore,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let refresher = RefreshCoordinator::new(
            http,
            format!("{}/auth/refresh", config.api_url),
            config.refresh_timeout(),
            tokens.clone(),
        );

        Self {
            tokens,
            refresher,
            routes: Arc::new(RouteClassifier::new(RouteRule::parse_list(
                &config.public_routes,
            ))),
            navigator,
            notifier,
            login_path: config.login_path.as_str().into(),
            expiry_margin_secs: config.expiry_margin_secs,
            torn_down: Arc::new(Mutex::new(false)),
        }
    }

    fn torn_down(&self) -> MutexGuard<'_, bool> {
        self.torn_down.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn is_public_route(&self) -> bool {
        self.routes.is_public(&self.navigator.current_path())
    }

    /// The stored access token, if it will outlive the expiry margin.
    pub(crate) fn usable_access(&self) -> Option<AccessToken> {
        self.tokens
            .read_access()
            .filter(|token| auth::is_usable(token.as_str(), self.expiry_margin_secs))
    }

    pub(crate) async fn refresh(&self) -> Option<AccessToken> {
        let token = self.refresher.refresh().await;
        if token.is_some() {
            *self.torn_down() = false;
        }
        token
    }

    /// Persists a pair issued by a login.
    pub(crate) fn establish(&self, access: &AccessToken, refresh: &str) -> Result<(), Error> {
        self.tokens.write_session(access, refresh)?;
        *self.torn_down() = false;
        Ok(())
    }

    /// Local sign-out: forget every credential, no navigation.
    pub(crate) fn sign_out(&self) -> Result<(), Error> {
        self.tokens.clear_all()?;
        Ok(())
    }

    /// Clears every credential and sends the user to the login view with the
    /// current location as the way back. Credentials are always cleared; the
    /// redirect happens once until new credentials show up in the store.
    pub(crate) fn teardown(&self, reason: &str) -> Error {
        let current = self.navigator.current_path();

        let location = match login_redirect(&self.login_path, reason, &current) {
            Ok(location) => location,
            Err(e) => {
                tracing::error!("Could not encode return path {:?}: {}", current, e);
                self.login_path.to_string()
            }
        };

        {
            let mut torn_down = self.torn_down();

            // written by anyone since the last teardown, so this is a new session
            if self.tokens.read_access().is_some() || self.tokens.read_refresh().is_some() {
                *torn_down = false;
            }

            if let Err(e) = self.tokens.clear_all() {
                tracing::error!("Could not clear stored credentials: {}", e);
            }

            if *torn_down {
                tracing::debug!("Session already torn down");
                return Error::SessionExpired { location };
            }

            *torn_down = true;
        }

        tracing::info!("Session ended ({}), leaving {}", reason, current);

        self.navigator.redirect(&location);

        Error::SessionExpired { location }
    }

    /// Generic notice for a failed call. Unauthorized responses on public
    /// views stay quiet.
    pub(crate) fn notify_failure(&self, status: Option<StatusCode>, message: &str) {
        if status == Some(StatusCode::UNAUTHORIZED) && self.is_public_route() {
            tracing::debug!("Suppressed notice on public route: {}", message);
            return;
        }

        self.notifier.error(message);
    }
}
