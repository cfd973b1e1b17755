mod stub;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mangadex_reader::backend::account::{Account, HistoryUpdate, ReadingStatus};
use mangadex_reader::backend::http::HttpClient;
use mangadex_reader::backend::session::{Session, TokenStore};
use mangadex_reader::config::Config;
use mangadex_reader::error::ApiError;
use serde_json::json;
use stub::{StubRequest, StubServer};

const STAMP: &str = "2024-05-01T10:00:00";

#[derive(Default)]
struct BackendState {
    users: Vec<(i64, String, String, String)>,
    bookmarks: HashMap<i64, Vec<String>>,
    ratings: HashMap<(i64, String), u8>,
    history: HashMap<(i64, String), (String, u32)>,
    statuses: HashMap<(i64, String), String>,
    writes: usize,
}

impl BackendState {
    fn user_for(&self, request: &StubRequest) -> Option<(i64, String, String)> {
        let id: i64 = request.bearer()?.strip_prefix("token-")?.parse().ok()?;
        self.users
            .iter()
            .find(|u| u.0 == id)
            .map(|u| (u.0, u.1.clone(), u.2.clone()))
    }
}

fn user_json(id: i64, username: &str, email: &str) -> String {
    json!({ "id": id, "username": username, "email": email, "created_at": STAMP }).to_string()
}

/// Minimal stand-in for the reader backend, keyed per user, last write wins.
fn handle(state: &Mutex<BackendState>, request: &StubRequest) -> (u16, String) {
    let mut state = state.lock().unwrap();
    let body = request.json();

    match (request.method.as_str(), request.path()) {
        ("POST", "/auth/register") => {
            let id = state.users.len() as i64 + 1;
            state.users.push((
                id,
                body["username"].as_str().unwrap_or_default().to_string(),
                body["email"].as_str().unwrap_or_default().to_string(),
                body["password"].as_str().unwrap_or_default().to_string(),
            ));
            (200, json!({ "access_token": format!("token-{id}"), "token_type": "bearer" }).to_string())
        }
        ("POST", "/auth/login") => {
            let found = state
                .users
                .iter()
                .find(|u| Some(u.2.as_str()) == body["email"].as_str() && Some(u.3.as_str()) == body["password"].as_str())
                .map(|u| u.0);
            match found {
                Some(id) => (200, json!({ "access_token": format!("token-{id}"), "token_type": "bearer" }).to_string()),
                None => (401, json!({ "detail": "Invalid credentials" }).to_string()),
            }
        }
        (method, path) => {
            let Some((user_id, username, email)) = state.user_for(request) else {
                return (401, json!({ "detail": "Could not validate credentials" }).to_string());
            };
            if method != "GET" {
                state.writes += 1;
            }

            match (method, path) {
                ("GET", "/auth/me") => (200, user_json(user_id, &username, &email)),
                ("GET", "/user/bookmarks") => {
                    let list: Vec<_> = state
                        .bookmarks
                        .get(&user_id)
                        .into_iter()
                        .flatten()
                        .enumerate()
                        .map(|(i, m)| json!({ "id": i + 1, "manga_id": m, "created_at": STAMP }))
                        .collect();
                    (200, json!(list).to_string())
                }
                ("POST", "/user/bookmarks") => {
                    let manga_id = body["manga_id"].as_str().unwrap_or_default().to_string();
                    let list = state.bookmarks.entry(user_id).or_default();
                    if list.contains(&manga_id) {
                        return (400, json!({ "detail": "Bookmark already exists" }).to_string());
                    }
                    list.push(manga_id.clone());
                    (200, json!({ "id": list.len(), "manga_id": manga_id, "created_at": STAMP }).to_string())
                }
                ("DELETE", p) if p.starts_with("/user/bookmarks/") => {
                    let manga_id = p.trim_start_matches("/user/bookmarks/").to_string();
                    if let Some(list) = state.bookmarks.get_mut(&user_id) {
                        list.retain(|m| *m != manga_id);
                    }
                    (200, json!({ "message": "Bookmark removed" }).to_string())
                }
                ("GET", "/user/ratings") => {
                    let list: Vec<_> = state
                        .ratings
                        .iter()
                        .filter(|((u, _), _)| *u == user_id)
                        .enumerate()
                        .map(|(i, ((_, m), s))| json!({ "id": i + 1, "manga_id": m, "score": s }))
                        .collect();
                    (200, json!(list).to_string())
                }
                ("POST", "/user/ratings") => {
                    let manga_id = body["manga_id"].as_str().unwrap_or_default().to_string();
                    let score = body["score"].as_u64().unwrap_or_default() as u8;
                    state.ratings.insert((user_id, manga_id.clone()), score);
                    (200, json!({ "id": 1, "manga_id": manga_id, "score": score }).to_string())
                }
                ("GET", "/user/history") => {
                    let list: Vec<_> = state
                        .history
                        .iter()
                        .filter(|((u, _), _)| *u == user_id)
                        .map(|((_, m), (c, p))| {
                            json!({ "id": 1, "manga_id": m, "chapter_id": c, "page": p, "updated_at": STAMP })
                        })
                        .collect();
                    (200, json!(list).to_string())
                }
                ("POST", "/user/history") => {
                    let manga_id = body["manga_id"].as_str().unwrap_or_default().to_string();
                    let chapter_id = body["chapter_id"].as_str().unwrap_or_default().to_string();
                    let page = body["page"].as_u64().unwrap_or_default() as u32;
                    state.history.insert((user_id, manga_id.clone()), (chapter_id.clone(), page));
                    (
                        200,
                        json!({ "id": 1, "manga_id": manga_id, "chapter_id": chapter_id, "page": page, "updated_at": STAMP })
                            .to_string(),
                    )
                }
                ("GET", "/user/status") => {
                    let list: Vec<_> = state
                        .statuses
                        .iter()
                        .filter(|((u, _), _)| *u == user_id)
                        .map(|((_, m), s)| json!({ "id": 1, "manga_id": m, "status": s, "updated_at": STAMP }))
                        .collect();
                    (200, json!(list).to_string())
                }
                ("POST", "/user/status") => {
                    let manga_id = body["manga_id"].as_str().unwrap_or_default().to_string();
                    let status = body["status"].as_str().unwrap_or_default().to_string();
                    state.statuses.insert((user_id, manga_id.clone()), status.clone());
                    (200, json!({ "id": 1, "manga_id": manga_id, "status": status, "updated_at": STAMP }).to_string())
                }
                _ => (404, json!({ "detail": "Not Found" }).to_string()),
            }
        }
    }
}

struct Harness {
    _server: StubServer,
    state: Arc<Mutex<BackendState>>,
    account: Account,
    store: TokenStore,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let state = Arc::new(Mutex::new(BackendState::default()));
    let shared = Arc::clone(&state);
    let server = StubServer::spawn(move |request| handle(&shared, request));

    let config = Config {
        backend_url: server.base_url.clone(),
        retry_delay_ms: 10,
        request_timeout_secs: 5,
        ..Config::default()
    };
    let account = Account::new(HttpClient::new(&config).expect("http client"), &config);

    let dir = tempfile::tempdir().expect("tempdir");
    let store = TokenStore::new(dir.path().join("session.json"));

    Harness {
        _server: server,
        state,
        account,
        store,
        _dir: dir,
    }
}

async fn signed_up(h: &Harness) -> Session {
    Session::register(&h.account, &h.store, "reader", "reader@example.com", "hunter2")
        .await
        .expect("register")
}

#[tokio::test]
async fn register_persists_token_and_restore_revives_it() {
    let h = harness();
    let session = signed_up(&h).await;
    assert_eq!(session.user().username, "reader");
    assert!(session.user().created_at.is_some());
    assert_eq!(h.store.load().as_deref(), Some(session.token()));

    let restored = Session::restore(&h.account, &h.store).await.expect("restored");
    assert_eq!(restored, session);
}

#[tokio::test]
async fn login_with_wrong_password_is_invalid_credentials() {
    let h = harness();
    let session = signed_up(&h).await;

    let err = Session::login(&h.account, &h.store, "reader@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidCredentials));
    // the earlier session stays stored
    assert_eq!(h.store.load().as_deref(), Some(session.token()));

    let again = Session::login(&h.account, &h.store, "reader@example.com", "hunter2")
        .await
        .expect("login");
    assert_eq!(again.user().id, session.user().id);
}

#[tokio::test]
async fn rejected_token_is_cleared_on_restore() {
    let h = harness();
    h.store.save("token-42").expect("save");

    assert!(Session::restore(&h.account, &h.store).await.is_none());
    assert_eq!(h.store.load(), None);
}

#[tokio::test]
async fn rating_twice_keeps_last_score() {
    let h = harness();
    let session = signed_up(&h).await;

    h.account.rate(&session, "m-1", 7).await.expect("first rating");
    h.account.rate(&session, "m-1", 9).await.expect("second rating");

    let ratings = h.account.ratings(&session).await.expect("ratings");
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0].score, 9);
    assert_eq!(h.account.rating_for(&session, "m-1").await.unwrap(), Some(9));
    assert_eq!(h.account.rating_for(&session, "m-2").await.unwrap(), None);
}

#[tokio::test]
async fn invalid_score_never_reaches_backend() {
    let h = harness();
    let session = signed_up(&h).await;

    assert!(matches!(
        h.account.rate(&session, "m-1", 11).await,
        Err(ApiError::InvalidScore(11))
    ));
    assert_eq!(h.state.lock().unwrap().writes, 0);
}

#[tokio::test]
async fn bookmark_add_is_idempotent_and_remove_works() {
    let h = harness();
    let session = signed_up(&h).await;

    h.account.add_bookmark(&session, "m-1").await.expect("add");
    h.account.add_bookmark(&session, "m-1").await.expect("duplicate add");
    assert!(h.account.is_bookmarked(&session, "m-1").await.unwrap());
    assert_eq!(h.account.bookmarks(&session).await.unwrap().len(), 1);

    h.account.remove_bookmark(&session, "m-1").await.expect("remove");
    assert!(!h.account.is_bookmarked(&session, "m-1").await.unwrap());
}

#[tokio::test]
async fn history_is_one_entry_per_manga() {
    let h = harness();
    let session = signed_up(&h).await;

    for chapter in ["c-1", "c-2"] {
        let update = HistoryUpdate {
            manga_id: "m-1".to_string(),
            chapter_id: chapter.to_string(),
            page: 0,
        };
        h.account.update_history(&session, &update).await.expect("history");
    }

    let history = h.account.history(&session).await.expect("history list");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].chapter_id, "c-2");
    assert!(history[0].updated_at.is_some());
}

#[tokio::test]
async fn status_round_trips_with_wire_names() {
    let h = harness();
    let session = signed_up(&h).await;

    let entry = h
        .account
        .set_status(&session, "m-1", ReadingStatus::OnHold)
        .await
        .expect("status");
    assert_eq!(entry.status, ReadingStatus::OnHold);
    assert_eq!(
        h.state.lock().unwrap().statuses.get(&(1, "m-1".to_string())).map(String::as_str),
        Some("on_hold")
    );
    assert_eq!(
        h.account.status_for(&session, "m-1").await.unwrap(),
        Some(ReadingStatus::OnHold)
    );
}

#[tokio::test]
async fn other_users_do_not_see_each_others_data() {
    let h = harness();
    let first = signed_up(&h).await;
    let second = Session::register(&h.account, &h.store, "other", "other@example.com", "pw")
        .await
        .expect("second user");

    h.account.add_bookmark(&first, "m-1").await.unwrap();
    assert!(!h.account.is_bookmarked(&second, "m-1").await.unwrap());
}

#[tokio::test]
async fn register_is_not_replayed_after_server_error() {
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let server = StubServer::spawn(move |_| {
        *counter.lock().unwrap() += 1;
        (503, json!({ "detail": "upstream down" }).to_string())
    });

    let config = Config {
        backend_url: server.base_url.clone(),
        retry_delay_ms: 10,
        request_timeout_secs: 5,
        ..Config::default()
    };
    let account = Account::new(HttpClient::new(&config).expect("http client"), &config);

    let err = account.register("reader", "reader@example.com", "hunter2").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { .. }));
    assert_eq!(*calls.lock().unwrap(), 1);

    // login carries no side effect and still gets its retry
    assert!(account.login("reader@example.com", "hunter2").await.is_err());
    assert_eq!(*calls.lock().unwrap(), 3);
}
