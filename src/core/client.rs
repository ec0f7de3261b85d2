use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::core::config::Args;
use crate::core::error::{ConfigError, Error};
use crate::core::notice::{self, Notifier};
use crate::core::state::{REASON_EXPIRED, REASON_UNAUTHORIZED, Session};
use crate::routes::Navigator;
use crate::token::store::{AccessToken, TokenStore};

/// The transport every page and service goes through. Credentials are
/// attached, refreshed and retried here; callers just send requests.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(
        config: &Args,
        tokens: TokenStore,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(concat!("donacore/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;

        let session = Session::new(config, client.clone(), tokens, navigator, notifier);

        Ok(Self {
            client,
            url: config.api_url.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Sends `request` with credentials handled. Non-2xx responses come back
    /// as `Error::Api`; a session that cannot be restored on a protected view
    /// comes back as `Error::SessionExpired` after the redirect.
    #[instrument(skip_all)]
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, Error> {
        let mut request = request.build()?;
        tracing::debug!("{} {}", request.method(), request.url().path());

        self.authorize(&mut request).await?;

        let mut retried = false;

        loop {
            let had_auth = request.headers().contains_key(AUTHORIZATION);
            let replay = request.try_clone();

            let response = self.execute(request).await?;

            if response.status() != StatusCode::UNAUTHORIZED || !had_auth || retried {
                return self.finish(response).await;
            }

            retried = true;

            let Some(mut replay) = replay else {
                tracing::debug!("Request body cannot be replayed, not retrying");
                return self.finish(response).await;
            };

            match self.session.refresh().await {
                Some(token) => {
                    tracing::debug!("Retrying with refreshed access token");
                    replay.headers_mut().insert(AUTHORIZATION, bearer_header(&token)?);
                    request = replay;
                }
                None if self.session.is_public_route() => return self.finish(response).await,
                None => return Err(self.session.teardown(REASON_UNAUTHORIZED)),
            }
        }
    }

    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, Error> {
        Ok(self.send(request).await?.json::<T>().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.send_json(self.get(path)).await
    }

    /// Attaches a usable access token, refreshing first when needed. With no
    /// session, public views go out anonymously and protected views end the
    /// session instead of sending.
    async fn authorize(&self, request: &mut Request) -> Result<(), Error> {
        let token = match self.session.usable_access() {
            Some(token) => token,
            None => match self.session.refresh().await {
                Some(token) => token,
                None if self.session.is_public_route() => {
                    tracing::debug!("No session on a public route, sending anonymously");
                    return Ok(());
                }
                None => return Err(self.session.teardown(REASON_EXPIRED)),
            },
        };

        // an explicit header from the caller wins
        if !request.headers().contains_key(AUTHORIZATION) {
            request.headers_mut().insert(AUTHORIZATION, bearer_header(&token)?);
        }

        Ok(())
    }

    async fn execute(&self, request: Request) -> Result<Response, Error> {
        match self.client.execute(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!("Request failed: {}", e);
                self.session
                    .notify_failure(e.status(), notice::GENERIC_ERROR_MESSAGE);
                Err(Error::HTTPClient(e))
            }
        }
    }

    async fn finish(&self, response: Response) -> Result<Response, Error> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<Value>().await.ok();
        let message = notice::error_message(body.as_ref());

        tracing::debug!("Request failed with {}: {}", status, message);
        self.session.notify_failure(Some(status), &message);

        Err(Error::Api { status, message })
    }
}

fn bearer_header(token: &AccessToken) -> Result<HeaderValue, Error> {
    let mut value = HeaderValue::from_str(&token.bearer())?;
    value.set_sensitive(true);
    Ok(value)
}
