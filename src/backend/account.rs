use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::future::Future;
use tokio::task::JoinHandle;

use super::http::HttpClient;
use super::session::Session;
use crate::config::Config;
use crate::error::{ApiError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default, deserialize_with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct MangaRef<'a> {
    manga_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub manga_id: String,
    #[serde(default, deserialize_with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Last chapter a user opened for one manga.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryUpdate {
    pub manga_id: String,
    pub chapter_id: String,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub manga_id: String,
    pub chapter_id: String,
    pub page: u32,
    #[serde(default, deserialize_with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct RatingRequest<'a> {
    manga_id: &'a str,
    score: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub manga_id: String,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    Planned,
    Reading,
    Completed,
    Dropped,
    OnHold,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 5] = [
        ReadingStatus::Planned,
        ReadingStatus::Reading,
        ReadingStatus::Completed,
        ReadingStatus::Dropped,
        ReadingStatus::OnHold,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ReadingStatus::Planned => "Planned",
            ReadingStatus::Reading => "Reading",
            ReadingStatus::Completed => "Completed",
            ReadingStatus::Dropped => "Dropped",
            ReadingStatus::OnHold => "On hold",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    manga_id: &'a str,
    status: ReadingStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusEntry {
    pub id: i64,
    pub manga_id: String,
    pub status: ReadingStatus,
    #[serde(default, deserialize_with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339 timestamps and the offset-less form the backend emits.
fn timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }))
}

/// Client for the application backend: auth plus per-user bookmarks,
/// history, ratings and reading status.
#[derive(Clone)]
pub struct Account {
    http: HttpClient,
    base_url: String,
}

impl Account {
    pub fn new(http: HttpClient, config: &Config) -> Self {
        Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchanges credentials for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let url = self.url("/auth/login");
        let body = LoginRequest { email, password };

        let token: TokenResponse = self
            .http
            .json("auth/login", |c| c.post(&url).json(&body))
            .await
            .map_err(|e| match e {
                ApiError::Status { status, .. } if status == StatusCode::UNAUTHORIZED => {
                    ApiError::InvalidCredentials
                }
                other => other,
            })?;

        Ok(token.access_token)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<String> {
        let url = self.url("/auth/register");
        let body = RegisterRequest {
            username,
            email,
            password,
        };

        // creates the user, so a 5xx after commit must not be replayed
        let token: TokenResponse = self
            .http
            .json_once("auth/register", |c| c.post(&url).json(&body))
            .await?;

        Ok(token.access_token)
    }

    pub async fn me(&self, token: &str) -> Result<User> {
        let url = self.url("/auth/me");
        self.http
            .json("auth/me", |c| c.get(&url).bearer_auth(token))
            .await
    }

    pub async fn bookmarks(&self, session: &Session) -> Result<Vec<Bookmark>> {
        let url = self.url("/user/bookmarks");
        self.http
            .json("user/bookmarks", |c| c.get(&url).bearer_auth(session.token()))
            .await
    }

    /// Adding an existing bookmark is not an error.
    pub async fn add_bookmark(&self, session: &Session, manga_id: &str) -> Result<()> {
        let url = self.url("/user/bookmarks");
        let body = MangaRef { manga_id };

        match self
            .http
            .send("user/bookmarks", |c| {
                c.post(&url).bearer_auth(session.token()).json(&body)
            })
            .await
        {
            Ok(_) => Ok(()),
            Err(ApiError::Status { status, .. }) if status == StatusCode::BAD_REQUEST => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn remove_bookmark(&self, session: &Session, manga_id: &str) -> Result<()> {
        let url = self.url(&format!("/user/bookmarks/{}", urlencoding::encode(manga_id)));
        self.http
            .send("user/bookmarks", |c| c.delete(&url).bearer_auth(session.token()))
            .await?;
        Ok(())
    }

    pub async fn is_bookmarked(&self, session: &Session, manga_id: &str) -> Result<bool> {
        Ok(self
            .bookmarks(session)
            .await?
            .iter()
            .any(|b| b.manga_id == manga_id))
    }

    /// Most recently read first.
    pub async fn history(&self, session: &Session) -> Result<Vec<HistoryEntry>> {
        let url = self.url("/user/history");
        self.http
            .json("user/history", |c| c.get(&url).bearer_auth(session.token()))
            .await
    }

    pub async fn update_history(&self, session: &Session, update: &HistoryUpdate) -> Result<HistoryEntry> {
        let url = self.url("/user/history");
        self.http
            .json("user/history", |c| {
                c.post(&url).bearer_auth(session.token()).json(update)
            })
            .await
    }

    pub async fn ratings(&self, session: &Session) -> Result<Vec<Rating>> {
        let url = self.url("/user/ratings");
        self.http
            .json("user/ratings", |c| c.get(&url).bearer_auth(session.token()))
            .await
    }

    pub async fn rate(&self, session: &Session, manga_id: &str, score: u8) -> Result<Rating> {
        if !(1..=10).contains(&score) {
            return Err(ApiError::InvalidScore(score));
        }

        let url = self.url("/user/ratings");
        let body = RatingRequest { manga_id, score };
        self.http
            .json("user/ratings", |c| {
                c.post(&url).bearer_auth(session.token()).json(&body)
            })
            .await
    }

    pub async fn rating_for(&self, session: &Session, manga_id: &str) -> Result<Option<u8>> {
        Ok(self
            .ratings(session)
            .await?
            .into_iter()
            .find(|r| r.manga_id == manga_id)
            .map(|r| r.score))
    }

    pub async fn statuses(&self, session: &Session) -> Result<Vec<StatusEntry>> {
        let url = self.url("/user/status");
        self.http
            .json("user/status", |c| c.get(&url).bearer_auth(session.token()))
            .await
    }

    pub async fn set_status(
        &self,
        session: &Session,
        manga_id: &str,
        status: ReadingStatus,
    ) -> Result<StatusEntry> {
        let url = self.url("/user/status");
        let body = StatusRequest { manga_id, status };
        self.http
            .json("user/status", |c| {
                c.post(&url).bearer_auth(session.token()).json(&body)
            })
            .await
    }

    pub async fn status_for(&self, session: &Session, manga_id: &str) -> Result<Option<ReadingStatus>> {
        Ok(self
            .statuses(session)
            .await?
            .into_iter()
            .find(|s| s.manga_id == manga_id)
            .map(|s| s.status))
    }
}

/// Runs a write the viewer never waits on. The outcome goes to the log and
/// back through the handle; dropping the handle does not cancel the write.
pub fn spawn_best_effort<T, F>(what: &'static str, write: F) -> JoinHandle<Result<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = write.await;
        match &outcome {
            Ok(_) => log::debug!("{what} saved"),
            Err(e) => log::warn!("{what} failed: {e}"),
        }
        outcome
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReadingStatus::OnHold).unwrap(),
            "\"on_hold\""
        );
        let parsed: ReadingStatus = serde_json::from_str("\"planned\"").unwrap();
        assert_eq!(parsed, ReadingStatus::Planned);
    }

    #[test]
    fn test_naive_backend_timestamps_parse() {
        let json = r#"{
            "id": 3,
            "manga_id": "m-1",
            "chapter_id": "c-9",
            "page": 0,
            "updated_at": "2024-05-01T10:20:30.123456"
        }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert!(entry.updated_at.is_some());

        let json = r#"{ "id": 1, "username": "u", "email": "u@x", "created_at": "2024-05-01T10:20:30+02:00" }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(
            user.created_at.unwrap().to_rfc3339(),
            "2024-05-01T08:20:30+00:00"
        );
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_rejected_locally() {
        let config = Config {
            backend_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let account = Account::new(HttpClient::new(&config).unwrap(), &config);
        let session = Session::new("token".to_string(), User {
            id: 1,
            username: "u".to_string(),
            email: "u@x".to_string(),
            created_at: None,
        });

        assert!(matches!(
            account.rate(&session, "m-1", 0).await,
            Err(ApiError::InvalidScore(0))
        ));
        assert!(matches!(
            account.rate(&session, "m-1", 11).await,
            Err(ApiError::InvalidScore(11))
        ));
    }

    #[tokio::test]
    async fn test_best_effort_failure_is_returned_not_raised() {
        let handle = spawn_best_effort("rating", async { Err::<(), _>(ApiError::InvalidScore(0)) });
        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, Err(ApiError::InvalidScore(0))));
    }
}
