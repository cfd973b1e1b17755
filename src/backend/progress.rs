use super::account::HistoryUpdate;

/// Rows scrolled before the reader chrome hides itself.
const CONTROLS_HIDE_AFTER: u32 = 3;

/// Percentage of the document scrolled past, in `0.0..=100.0`.
/// Content that fits in the viewport reads as 0.
pub fn completion_percent(scroll_offset: f64, document_height: f64, viewport_height: f64) -> f64 {
    let scrollable = document_height - viewport_height;
    if scrollable.is_nan() || scrollable <= 0.0 {
        return 0.0;
    }

    let percent = scroll_offset / scrollable * 100.0;
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}

/// One visit to a chapter. Yields the history write at most once.
#[derive(Debug)]
pub struct ChapterVisit {
    manga_id: String,
    chapter_id: String,
    recorded: bool,
}

impl ChapterVisit {
    pub fn new(manga_id: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            manga_id: manga_id.into(),
            chapter_id: chapter_id.into(),
            recorded: false,
        }
    }

    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    /// Returns the write to issue the first time a signed-in user has at least
    /// one page loaded; `None` before that and on every later call.
    pub fn on_pages_loaded(&mut self, signed_in: bool, pages_loaded: usize) -> Option<HistoryUpdate> {
        if self.recorded || !signed_in || pages_loaded == 0 {
            return None;
        }

        self.recorded = true;
        Some(HistoryUpdate {
            manga_id: self.manga_id.clone(),
            chapter_id: self.chapter_id.clone(),
            page: 0,
        })
    }
}

/// Vertical scroll position in a reader that stacks each page in a slot one
/// viewport tall.
#[derive(Debug, Clone, Default)]
pub struct ReaderScroll {
    offset: u32,
    page_count: usize,
    viewport: u32,
}

impl ReaderScroll {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            ..Self::default()
        }
    }

    pub fn set_viewport(&mut self, rows: u32) {
        self.viewport = rows;
        self.offset = self.offset.min(self.max_offset());
    }

    pub fn viewport(&self) -> u32 {
        self.viewport
    }

    pub fn document_height(&self) -> u32 {
        self.viewport.saturating_mul(self.page_count as u32)
    }

    fn max_offset(&self) -> u32 {
        self.document_height().saturating_sub(self.viewport)
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let next = i64::from(self.offset) + i64::from(delta);
        self.offset = next.clamp(0, i64::from(self.max_offset())) as u32;
    }

    pub fn scroll_to_top(&mut self) {
        self.offset = 0;
    }

    pub fn scroll_to_page(&mut self, page: usize) {
        let target = self.viewport.saturating_mul(page as u32);
        self.offset = target.min(self.max_offset());
    }

    /// Index of the page occupying the top of the viewport.
    pub fn current_page(&self) -> usize {
        if self.viewport == 0 {
            return 0;
        }
        ((self.offset / self.viewport) as usize).min(self.page_count.saturating_sub(1))
    }

    pub fn percent(&self) -> f64 {
        completion_percent(
            f64::from(self.offset),
            f64::from(self.document_height()),
            f64::from(self.viewport),
        )
    }

    pub fn show_controls(&self) -> bool {
        self.offset <= CONTROLS_HIDE_AFTER
    }

    pub fn show_scroll_to_top(&self) -> bool {
        self.show_controls() || self.percent() > 10.0
    }
}
