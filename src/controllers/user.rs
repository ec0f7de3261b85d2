use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::core::client::ApiClient;
use crate::core::error::Error;
use crate::token::store::AccessToken;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
struct LoginData<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthTokens {
    access: String,
    refresh: String,
}

/// Session lifecycle on top of the authorized transport.
#[derive(Clone, Debug)]
pub struct UserController {
    client: ApiClient,
}

impl UserController {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Exchanges credentials for a token pair, stores it and loads the user.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, Error> {
        let email = email.trim().to_lowercase();

        let request = self.client.post("/auth/login").json(&LoginData {
            email: &email,
            password,
        });

        let tokens: AuthTokens = self.client.send_json(request).await?;

        self.client
            .session()
            .establish(&AccessToken::new(tokens.access), &tokens.refresh)?;

        tracing::info!("Signed in");

        self.current_user().await?.ok_or(Error::Unauthorized)
    }

    /// The signed-in user, or `None` when nothing is stored. A stored session
    /// the server no longer honours is signed out.
    #[instrument(skip_all)]
    pub async fn current_user(&self) -> Result<Option<User>, Error> {
        let tokens = self.client.session().tokens();
        if tokens.read_access().is_none() && tokens.read_refresh().is_none() {
            return Ok(None);
        }

        match self.client.get_json::<User>("/auth/me").await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_session_expired() => Err(e),
            Err(e) => {
                tracing::warn!("Could not load the current user: {}", e);
                self.logout()?;
                Err(e)
            }
        }
    }

    pub fn logout(&self) -> Result<(), Error> {
        self.client.session().sign_out()?;
        tracing::info!("Signed out");
        Ok(())
    }
}
