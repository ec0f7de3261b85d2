use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::instrument;

use crate::token::store::{AccessToken, TokenStore, extract_access_token};

type Outcome = Shared<BoxFuture<'static, Option<AccessToken>>>;

enum RefreshState {
    Idle,
    Refreshing(Outcome),
}

/// Runs the refresh-token exchange at most once at a time. Every caller that
/// arrives while an exchange is in flight gets that exchange's outcome.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    tokens: TokenStore,
    state: Mutex<RefreshState>,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("endpoint", &self.inner.endpoint)
            .field("timeout", &self.inner.timeout)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

impl RefreshCoordinator {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        timeout: Duration,
        tokens: TokenStore,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                endpoint: endpoint.into(),
                timeout,
                tokens,
                state: Mutex::new(RefreshState::Idle),
            }),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state(), RefreshState::Refreshing(_))
    }

    /// A new access token, or `None` when the session cannot be restored.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Option<AccessToken> {
        let outcome = {
            let mut state = self.inner.state();

            match &*state {
                RefreshState::Refreshing(outcome) => {
                    tracing::debug!("Joining refresh already in flight");
                    outcome.clone()
                }
                RefreshState::Idle => {
                    let inner = self.inner.clone();
                    // owned by the task from the start, so it also fires if the
                    // task is dropped before its first poll
                    let idle = ResetOnDrop(inner.clone());

                    // spawned so the exchange finishes even if every caller goes away
                    let task = tokio::spawn(async move {
                        let _idle = idle;
                        inner.exchange().await
                    });

                    let outcome = task
                        .map(|joined| {
                            joined.unwrap_or_else(|e| {
                                tracing::error!("Refresh task failed: {}", e);
                                None
                            })
                        })
                        .boxed()
                        .shared();

                    *state = RefreshState::Refreshing(outcome.clone());
                    outcome
                }
            }
        };

        outcome.await
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn exchange(&self) -> Option<AccessToken> {
        let Some(refresh_token) = self.tokens.read_refresh() else {
            tracing::debug!("No refresh token stored");
            return None;
        };

        match tokio::time::timeout(self.timeout, self.request(&refresh_token)).await {
            Ok(Ok(Some(token))) => {
                if let Err(e) = self.tokens.write_access(&token) {
                    tracing::error!("Could not store refreshed access token: {}", e);
                }
                tracing::debug!("Access token refreshed");
                Some(token)
            }
            Ok(Ok(None)) => {
                tracing::warn!("Refresh response did not contain an access token");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!("Refresh exchange failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!("Refresh exchange timed out after {:?}", self.timeout);
                None
            }
        }
    }

    async fn request(&self, refresh_token: &str) -> Result<Option<AccessToken>, reqwest::Error> {
        let body = self
            .http
            .post(&self.endpoint)
            .bearer_auth(refresh_token)
            .json(&serde_json::json!({}))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        Ok(extract_access_token(&body).map(AccessToken::new))
    }
}

/// Puts the coordinator back to idle once the exchange task ends, including
/// when it panics.
struct ResetOnDrop(Arc<Inner>);

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        *self.0.state() = RefreshState::Idle;
    }
}
