use serde_json::Value;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::token::storage::{KeyValueStore, Scope};

/// Keys written by older parts of the web client. Always written on a new
/// access token and always cleared on teardown, whatever the configuration.
const CANONICAL_ACCESS_KEYS: [&str; 2] = ["access_token", "access"];
const CANONICAL_REFRESH_KEY: &str = "refresh_token";

/// Where an access token may live inside a JSON envelope or a refresh
/// response, in priority order.
pub(crate) const ACCESS_TOKEN_FIELDS: [&str; 3] = ["access", "access_token", "token"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// A short-lived bearer credential. Replaced wholesale, never edited.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// keep credentials out of logs
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"<redacted>").finish()
    }
}

#[derive(Clone)]
pub struct TokenStore {
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    access_aliases: Arc<[String]>,
    refresh_aliases: Arc<[String]>,
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("access_aliases", &self.access_aliases)
            .field("refresh_aliases", &self.refresh_aliases)
            .finish()
    }
}

impl TokenStore {
    pub fn new(
        durable: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        access_aliases: Vec<String>,
        refresh_aliases: Vec<String>,
    ) -> Self {
        Self {
            durable,
            session,
            access_aliases: access_aliases.into(),
            refresh_aliases: refresh_aliases.into(),
        }
    }

    fn scope(&self, scope: Scope) -> &dyn KeyValueStore {
        match scope {
            Scope::Durable => self.durable.as_ref(),
            Scope::Session => self.session.as_ref(),
        }
    }

    fn aliases(&self, kind: TokenKind) -> &[String] {
        match kind {
            TokenKind::Access => &self.access_aliases,
            TokenKind::Refresh => &self.refresh_aliases,
        }
    }

    /// First non-empty value stored under any alias of `kind`, durable scope
    /// first. The value is returned as stored.
    pub fn read(&self, kind: TokenKind) -> Option<String> {
        [Scope::Durable, Scope::Session]
            .into_iter()
            .flat_map(|scope| {
                self.aliases(kind)
                    .iter()
                    .map(move |key| (scope, key.as_str()))
            })
            .find_map(|(scope, key)| self.scope(scope).get(key).filter(|v| !v.is_empty()))
    }

    pub fn read_access(&self) -> Option<AccessToken> {
        self.read(TokenKind::Access)
            .map(|raw| unwrap(&raw))
            .filter(|token| !token.is_empty())
            .map(AccessToken)
    }

    pub fn read_refresh(&self) -> Option<String> {
        self.read(TokenKind::Refresh)
            .map(|raw| unwrap(&raw))
            .filter(|token| !token.is_empty())
    }

    /// Stores `token` in the durable scope under every access alias.
    pub fn write_access(&self, token: &AccessToken) -> io::Result<()> {
        self.write(TokenKind::Access, token.as_str())
    }

    /// Stores a freshly issued pair after a login. The refresh token goes
    /// under every refresh alias so the configured readers find it.
    pub fn write_session(&self, access: &AccessToken, refresh: &str) -> io::Result<()> {
        self.write_access(access)?;
        self.write(TokenKind::Refresh, refresh)
    }

    fn write(&self, kind: TokenKind, value: &str) -> io::Result<()> {
        for key in self.write_keys(kind) {
            self.durable.set(key, value)?;
        }
        Ok(())
    }

    /// Removes every known key for both kinds from both scopes. Keeps going
    /// past a failing key and reports the first failure.
    pub fn clear_all(&self) -> io::Result<()> {
        let keys = self
            .access_aliases
            .iter()
            .chain(self.refresh_aliases.iter())
            .map(String::as_str)
            .chain(CANONICAL_ACCESS_KEYS)
            .chain([CANONICAL_REFRESH_KEY]);

        let mut first_error = None;

        for key in keys {
            for scope in [Scope::Durable, Scope::Session] {
                if let Err(e) = self.scope(scope).remove(key) {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write_keys(&self, kind: TokenKind) -> Vec<&str> {
        let mut keys: Vec<&str> = match kind {
            TokenKind::Access => CANONICAL_ACCESS_KEYS.to_vec(),
            TokenKind::Refresh => vec![CANONICAL_REFRESH_KEY],
        };
        for alias in self.aliases(kind) {
            if !keys.contains(&alias.as_str()) {
                keys.push(alias.as_str());
            }
        }
        keys
    }
}

/// Normalizes a stored credential: a raw token, `Bearer <token>`, or a JSON
/// envelope holding the token. Anything unrecognized comes back trimmed.
pub fn unwrap(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(token) = strip_bearer(trimmed) {
        return token.to_string();
    }

    if trimmed.starts_with('{') {
        if let Ok(envelope) = serde_json::from_str::<Value>(trimmed) {
            if let Some(token) = extract_access_token(&envelope) {
                return token.to_string();
            }
        }
    }

    trimmed.to_string()
}

pub(crate) fn extract_access_token(body: &Value) -> Option<&str> {
    ACCESS_TOKEN_FIELDS.iter().find_map(|field| {
        body.get(field)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
    })
}

fn strip_bearer(value: &str) -> Option<&str> {
    let scheme = value.get(..6)?;
    let rest = value.get(6..)?;

    if scheme.eq_ignore_ascii_case("bearer") && rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}
