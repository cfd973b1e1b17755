use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use super::account::{Account, User};
use crate::config;
use crate::error::Result;

/// A signed-in user. Created by login, register or restore; passed to every
/// call that needs the bearer token; consumed by logout.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct StoredSession {
    token: Option<String>,
}

/// Opaque auth token persisted between runs.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Self {
        let dir = config::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join("session.json"))
    }

    pub fn load(&self) -> Option<String> {
        let content = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str::<StoredSession>(&content)
            .ok()?
            .token
            .filter(|t| !t.is_empty())
    }

    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&StoredSession {
            token: Some(token.to_string()),
        })?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Session {
    pub fn new(token: String, user: User) -> Self {
        Self { token, user }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Revives the stored token. A token the backend no longer accepts is
    /// dropped and the client continues anonymously.
    pub async fn restore(account: &Account, store: &TokenStore) -> Option<Session> {
        let token = store.load()?;

        match account.me(&token).await {
            Ok(user) => {
                log::info!("restored session for {}", user.username);
                Some(Session::new(token, user))
            }
            Err(e) => {
                log::info!("stored session rejected: {e}");
                if let Err(e) = store.clear() {
                    log::warn!("could not clear stored session: {e}");
                }
                None
            }
        }
    }

    /// Nothing is persisted unless the whole exchange succeeds, so a failed
    /// attempt leaves any current session in place.
    pub async fn login(
        account: &Account,
        store: &TokenStore,
        email: &str,
        password: &str,
    ) -> Result<Session> {
        let token = account.login(email, password).await?;
        Self::establish(account, store, token).await
    }

    pub async fn register(
        account: &Account,
        store: &TokenStore,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session> {
        let token = account.register(username, email, password).await?;
        Self::establish(account, store, token).await
    }

    async fn establish(account: &Account, store: &TokenStore, token: String) -> Result<Session> {
        let user = account.me(&token).await?;
        store.save(&token)?;
        log::info!("signed in as {}", user.username);
        Ok(Session::new(token, user))
    }

    pub fn logout(self, store: &TokenStore) {
        if let Err(e) = store.clear() {
            log::warn!("could not clear stored session: {e}");
        }
        log::info!("signed out {}", self.user.username);
    }
}
