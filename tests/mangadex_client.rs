mod stub;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mangadex_reader::backend::catalog::{CatalogQuery, fetch_catalog_page, fetch_latest_page};
use mangadex_reader::backend::chapters::dedup_chapters;
use mangadex_reader::backend::http::HttpClient;
use mangadex_reader::backend::mangadex::{MangaDex, MangaSearch, PublicationStatus};
use mangadex_reader::config::Config;
use mangadex_reader::error::ApiError;
use serde_json::{Value, json};
use stub::StubServer;

fn client(base_url: &str, data_saver: bool) -> MangaDex {
    let config = Config {
        api_url: base_url.to_string(),
        uploads_url: format!("{base_url}/uploads"),
        retry_delay_ms: 10,
        request_timeout_secs: 5,
        data_saver,
        ..Config::default()
    };
    MangaDex::new(HttpClient::new(&config).expect("http client"), &config)
}

fn manga_json(id: &str, title: Value) -> Value {
    json!({
        "id": id,
        "type": "manga",
        "attributes": {
            "title": title,
            "status": "ongoing",
            "year": 2019,
            "description": { "en": "A story." },
            "tags": [
                { "id": "t-1", "attributes": { "name": { "en": "Action" }, "group": "genre" } }
            ]
        },
        "relationships": [
            { "type": "author", "attributes": { "name": "Author A" } },
            { "type": "cover_art", "attributes": { "fileName": "cover.png" } }
        ]
    })
}

fn chapter_json(id: &str, number: Option<&str>) -> Value {
    json!({
        "id": id,
        "attributes": {
            "chapter": number,
            "title": null,
            "volume": "1",
            "pages": 20,
            "publishAt": "2024-03-01T12:00:00+00:00"
        },
        "relationships": [
            { "type": "scanlation_group", "attributes": { "name": "Group G" } }
        ]
    })
}

#[tokio::test]
async fn search_sends_filters_and_parses_titles() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let log = Arc::clone(&seen);
    let server = StubServer::spawn(move |request| {
        log.lock().unwrap().push(request.url.clone());
        let body = json!({
            "result": "ok",
            "data": [
                manga_json("m-1", json!({ "ja-ro": "Romaji Title" })),
                manga_json("m-2", json!({ "en": "English Title" })),
            ],
            "limit": 24,
            "offset": 24,
            "total": 100
        });
        (200, body.to_string())
    });

    let dex = client(&server.base_url, false);
    let search = MangaSearch {
        title: Some("berserk".to_string()),
        status: Some(PublicationStatus::Completed),
        limit: 24,
        offset: 24,
        ..MangaSearch::default()
    };
    let list = dex.search(&search).await.expect("search");

    assert_eq!(list.total, 100);
    assert_eq!(list.items[0].title, "Romaji Title");
    assert_eq!(list.items[1].title, "English Title");
    assert_eq!(list.items[0].author, "Author A");
    assert_eq!(
        dex.cover_url(&list.items[0], 256).as_deref(),
        Some(format!("{}/uploads/covers/m-1/cover.png.256.jpg", server.base_url).as_str())
    );

    let url = seen.lock().unwrap()[0].clone();
    assert!(url.starts_with("/manga?"));
    assert!(url.contains("title=berserk"));
    assert!(url.contains("status%5B%5D=completed") || url.contains("status[]=completed"));
    assert!(url.contains("offset=24"));
}

#[tokio::test]
async fn feed_is_deduplicated_by_chapter_number() {
    let server = StubServer::spawn(|request| {
        if !request.path().ends_with("/feed") {
            return (404, "{}".to_string());
        }
        let body = json!({
            "data": [
                chapter_json("c-3a", Some("3")),
                chapter_json("c-3b", Some("3")),
                chapter_json("c-2", Some("2")),
                chapter_json("c-1a", Some("1")),
                chapter_json("c-1b", Some("1")),
                chapter_json("c-oneshot", None),
            ],
            "total": 6
        });
        (200, body.to_string())
    });

    let dex = client(&server.base_url, false);
    let feed = dex.get_chapter_feed("m-1").await.expect("feed");
    assert_eq!(feed.len(), 6);
    assert_eq!(feed[0].scanlation_group.as_deref(), Some("Group G"));
    assert!(feed[0].published_at.is_some());

    let ids: Vec<String> = dedup_chapters(feed).into_iter().map(|c| c.id).collect();
    assert_eq!(ids, ["c-3a", "c-2", "c-1a", "c-oneshot"]);
}

#[tokio::test]
async fn page_urls_follow_the_selected_bucket() {
    let server = StubServer::spawn(|_| {
        let body = json!({
            "result": "ok",
            "baseUrl": "https://node.example",
            "chapter": {
                "hash": "abc",
                "data": ["1.png", "2.png"],
                "dataSaver": ["1.jpg", "2.jpg"]
            }
        });
        (200, body.to_string())
    });

    let full = client(&server.base_url, false).get_chapter_pages("c-1").await.unwrap();
    assert_eq!(
        full,
        ["https://node.example/data/abc/1.png", "https://node.example/data/abc/2.png"]
    );

    let saver = client(&server.base_url, true).get_chapter_pages("c-1").await.unwrap();
    assert_eq!(saver[0], "https://node.example/data-saver/abc/1.jpg");
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let server = StubServer::spawn(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return (503, json!({ "result": "error" }).to_string());
        }
        (200, json!({ "data": manga_json("m-1", json!({ "en": "Recovered" })) }).to_string())
    });

    let manga = client(&server.base_url, false).get_manga("m-1").await.expect("manga");
    assert_eq!(manga.title, "Recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn persistent_failure_gives_up_after_one_retry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let server = StubServer::spawn(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        (503, json!({ "result": "error" }).to_string())
    });

    let err = client(&server.base_url, false).get_manga("m-1").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let server = StubServer::spawn(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        (404, json!({ "result": "error" }).to_string())
    });

    assert!(client(&server.base_url, false).get_manga("missing").await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_catalog_yields_empty_page() {
    let server = StubServer::spawn(|_| (500, "{}".to_string()));

    let page = fetch_catalog_page(&client(&server.base_url, false), &CatalogQuery::new()).await;
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(page.total_pages(), 0);
}

#[tokio::test]
async fn catalog_page_carries_ratings_when_statistics_answer() {
    let server = StubServer::spawn(|request| {
        if request.path() == "/statistics/manga" {
            let body = json!({
                "result": "ok",
                "statistics": {
                    "m-1": { "rating": { "average": 8.25, "bayesian": 8.1 } },
                    "m-2": { "rating": { "average": null } }
                }
            });
            return (200, body.to_string());
        }
        let body = json!({
            "data": [
                manga_json("m-1", json!({ "en": "One" })),
                manga_json("m-2", json!({ "en": "Two" })),
            ],
            "total": 49
        });
        (200, body.to_string())
    });

    let page = fetch_catalog_page(&client(&server.base_url, false), &CatalogQuery::new()).await;
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages(), 3);
    assert_eq!(page.ratings.get("m-1"), Some(&8.25));
    assert!(!page.ratings.contains_key("m-2"));
}

#[tokio::test]
async fn latest_pages_by_twenty_four_with_ratings() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let log = Arc::clone(&seen);
    let server = StubServer::spawn(move |request| {
        log.lock().unwrap().push(request.url.clone());
        if request.path() == "/statistics/manga" {
            let body = json!({ "statistics": { "m-1": { "rating": { "average": 7.5 } } } });
            return (200, body.to_string());
        }
        let body = json!({
            "data": [
                manga_json("m-1", json!({ "en": "One" })),
                // empty localized maps arrive as arrays
                {
                    "id": "m-2",
                    "attributes": { "title": { "en": "Two" }, "description": [] }
                }
            ],
            "total": 100
        });
        (200, body.to_string())
    });

    let page = fetch_latest_page(&client(&server.base_url, false), 3).await;
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages(), 5);
    assert_eq!(page.ratings.get("m-1"), Some(&7.5));

    let urls = seen.lock().unwrap().clone();
    let listing = urls.iter().find(|u| u.starts_with("/manga?")).expect("listing request");
    assert!(listing.contains("limit=24"));
    assert!(listing.contains("offset=48"));
    assert!(urls.iter().any(|u| u.starts_with("/statistics/manga?")));
}
