use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::mangadex::{Demographic, Manga, MangaDex, MangaList, MangaSearch, PublicationStatus};

pub const PAGE_SIZE: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Rating,
    Follows,
    LatestUpload,
    Title,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::Rating,
        SortKey::Follows,
        SortKey::LatestUpload,
        SortKey::Title,
    ];

    fn order(self) -> (&'static str, &'static str) {
        match self {
            SortKey::Rating => ("rating", "desc"),
            SortKey::Follows => ("followedCount", "desc"),
            SortKey::LatestUpload => ("latestUploadedChapter", "desc"),
            SortKey::Title => ("title", "asc"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Rating => "rating",
            SortKey::Follows => "follows",
            SortKey::LatestUpload => "latest upload",
            SortKey::Title => "title",
        }
    }
}

/// Catalog filter and pagination state. Every filter change puts the query
/// back on page 1; pages are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    title: String,
    status: Option<PublicationStatus>,
    demographic: Option<Demographic>,
    tag: Option<String>,
    sort: SortKey,
    page: u32,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self {
            title: String::new(),
            status: None,
            demographic: None,
            tag: None,
            sort: SortKey::default(),
            page: 1,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> Option<PublicationStatus> {
        self.status
    }

    pub fn demographic(&self) -> Option<Demographic> {
        self.demographic
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.page = 1;
    }

    pub fn set_status(&mut self, status: Option<PublicationStatus>) {
        self.status = status;
        self.page = 1;
    }

    pub fn set_demographic(&mut self, demographic: Option<Demographic>) {
        self.demographic = demographic;
        self.page = 1;
    }

    pub fn set_tag(&mut self, tag: Option<String>) {
        self.tag = tag;
        self.page = 1;
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.status = None;
        self.demographic = None;
        self.tag = None;
        self.page = 1;
    }

    pub fn has_filters(&self) -> bool {
        self.status.is_some() || self.demographic.is_some() || self.tag.is_some()
    }

    /// Sets the page as given. Keeping it inside `1..=total_pages` is up to
    /// the caller; see [`clamp_page`].
    pub fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(PAGE_SIZE)
    }

    pub fn to_search(&self) -> MangaSearch {
        let (key, direction) = self.sort.order();
        MangaSearch {
            title: Some(self.title.clone()).filter(|t| !t.trim().is_empty()),
            status: self.status,
            demographic: self.demographic,
            tags: self.tag.iter().cloned().collect(),
            order: (key.to_string(), direction.to_string()),
            limit: PAGE_SIZE,
            offset: self.offset(),
        }
    }
}

pub fn total_pages(total_results: u32) -> u32 {
    total_results.div_ceil(PAGE_SIZE)
}

/// Pulls a requested page into `1..=total_pages`. With no results the only
/// valid page is 1.
pub fn clamp_page(requested: i64, total_pages: u32) -> u32 {
    requested.clamp(1, i64::from(total_pages.max(1))) as u32
}

/// One page of catalog results with the community rating of each title.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub items: Vec<Manga>,
    pub total: u32,
    pub ratings: HashMap<String, f64>,
}

impl CatalogPage {
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total)
    }
}

/// Runs `query` against the catalog. Failures are logged and come back as an
/// empty page; missing ratings only drop the ratings.
pub async fn fetch_catalog_page(client: &MangaDex, query: &CatalogQuery) -> CatalogPage {
    match client.search(&query.to_search()).await {
        Ok(list) => with_ratings(client, list).await,
        Err(e) => {
            log::warn!("catalog search failed: {e}");
            CatalogPage::default()
        }
    }
}

/// Page `page` (1-based) of the recently updated listing, rated like the
/// catalog.
pub async fn fetch_latest_page(client: &MangaDex, page: u32) -> CatalogPage {
    let offset = page.saturating_sub(1) * PAGE_SIZE;
    match client.get_latest(PAGE_SIZE, offset).await {
        Ok(list) => with_ratings(client, list).await,
        Err(e) => {
            log::warn!("latest updates failed: {e}");
            CatalogPage::default()
        }
    }
}

async fn with_ratings(client: &MangaDex, list: MangaList) -> CatalogPage {
    let ids: Vec<String> = list.items.iter().map(|m| m.id.clone()).collect();
    let ratings = client.get_statistics(&ids).await.unwrap_or_else(|e| {
        log::warn!("statistics failed: {e}");
        HashMap::new()
    });

    CatalogPage {
        items: list.items,
        total: list.total,
        ratings,
    }
}

/// Debounces catalog fetches. Scheduling replaces whatever was pending or in
/// flight, and each fetch carries a generation number so the caller can drop
/// results that are no longer the latest.
pub struct SearchScheduler {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl SearchScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    /// Waits out the quiet period, runs `fetch`, and hands its output to
    /// `deliver` with the generation returned here.
    pub fn schedule<F, Fut, D>(&mut self, fetch: F, deliver: D) -> u64
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
        D: FnOnce(u64, Fut::Output) + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        let delay = self.delay;

        self.pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            let output = fetch().await;
            deliver(generation, output);
        }));

        generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Drops the pending timer or in-flight request and invalidates any result
    /// already delivered but not yet applied.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation += 1;
    }
}

impl Drop for SearchScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
