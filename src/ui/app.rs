use image::DynamicImage;
use ratatui::widgets::ListState;
use ratatui_image::{picker::Picker, protocol::StatefulProtocol};
use std::collections::{HashMap, HashSet};

use mangadex_reader::backend::account::ReadingStatus;
use mangadex_reader::backend::catalog::{CatalogPage, CatalogQuery, SortKey, clamp_page};
use mangadex_reader::backend::mangadex::{Chapter, Demographic, Manga, PublicationStatus, Tag};
use mangadex_reader::backend::progress::{ChapterVisit, ReaderScroll};
use mangadex_reader::backend::session::Session;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Latest,
    Catalog,
    Library,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Latest, Tab::Catalog, Tab::Library];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Latest => "Latest",
            Tab::Catalog => "Catalog",
            Tab::Library => "Library",
        }
    }

    pub fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn prev(self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    Detail,
    Reader,
    Login,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

/// Moves a list selection by `delta`, staying inside `len` items.
pub fn step_selection(list: &mut ListState, len: usize, delta: isize) {
    if len == 0 {
        list.select(None);
        return;
    }
    let current = list.selected().unwrap_or(0) as isize;
    let next = (current + delta).clamp(0, len as isize - 1);
    list.select(Some(next as usize));
}

/// Steps through `None` followed by every option.
fn cycle<T: Copy + PartialEq>(current: Option<T>, options: &[T]) -> Option<T> {
    match current {
        None => options.first().copied(),
        Some(value) => {
            let idx = options.iter().position(|o| *o == value);
            idx.and_then(|i| options.get(i + 1).copied())
        }
    }
}

pub struct LatestState {
    pub results: CatalogPage,
    /// 1-based
    pub page: u32,
    pub list: ListState,
    pub loading: bool,
}

impl Default for LatestState {
    fn default() -> Self {
        Self {
            results: CatalogPage::default(),
            page: 1,
            list: ListState::default(),
            loading: false,
        }
    }
}

impl LatestState {
    pub fn items(&self) -> &[Manga] {
        &self.results.items
    }

    pub fn selected(&self) -> Option<&Manga> {
        self.list.selected().and_then(|i| self.results.items.get(i))
    }

    /// Moves `delta` pages within the known page count. Returns the new page
    /// when it changed.
    pub fn step_page(&mut self, delta: i64) -> Option<u32> {
        let target = clamp_page(i64::from(self.page) + delta, self.results.total_pages());
        if target == self.page {
            return None;
        }
        self.page = target;
        Some(target)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogFocus {
    #[default]
    Search,
    Results,
}

#[derive(Default)]
pub struct CatalogState {
    pub query: CatalogQuery,
    pub page: CatalogPage,
    pub genres: Vec<Tag>,
    pub list: ListState,
    pub focus: CatalogFocus,
    pub loading: bool,
}

impl CatalogState {
    pub fn cycle_status(&mut self) {
        let next = cycle(self.query.status(), &PublicationStatus::ALL);
        self.query.set_status(next);
    }

    pub fn cycle_demographic(&mut self) {
        let next = cycle(self.query.demographic(), &Demographic::ALL);
        self.query.set_demographic(next);
    }

    pub fn cycle_genre(&mut self) {
        let ids: Vec<&str> = self.genres.iter().map(|t| t.id.as_str()).collect();
        let next = cycle(self.query.tag(), &ids).map(str::to_string);
        self.query.set_tag(next);
    }

    pub fn cycle_sort(&mut self) {
        let idx = SortKey::ALL
            .iter()
            .position(|s| *s == self.query.sort())
            .unwrap_or(0);
        self.query.set_sort(SortKey::ALL[(idx + 1) % SortKey::ALL.len()]);
    }

    pub fn genre_name(&self) -> Option<&str> {
        let tag = self.query.tag()?;
        self.genres
            .iter()
            .find(|t| t.id == tag)
            .map(|t| t.name.as_str())
    }

    pub fn selected(&self) -> Option<&Manga> {
        self.list.selected().and_then(|i| self.page.items.get(i))
    }
}

pub struct DetailState {
    pub manga: Manga,
    pub chapters: Vec<Chapter>,
    pub list: ListState,
    pub loading: bool,
    pub community_rating: Option<f64>,
    pub bookmarked: bool,
    pub status: Option<ReadingStatus>,
    pub user_rating: Option<u8>,
}

impl DetailState {
    pub fn new(manga: Manga) -> Self {
        Self {
            manga,
            chapters: Vec::new(),
            list: ListState::default(),
            loading: true,
            community_rating: None,
            bookmarked: false,
            status: None,
            user_rating: None,
        }
    }

    pub fn next_status(&self) -> ReadingStatus {
        cycle(self.status, &ReadingStatus::ALL).unwrap_or(ReadingStatus::Planned)
    }
}

pub struct ReaderState {
    pub manga_id: String,
    pub chapters: Vec<Chapter>,
    pub chapter_idx: usize,
    pub visit: ChapterVisit,
    pub pages: Vec<String>,
    pub loading: bool,
    pub scroll: ReaderScroll,
    pub images: HashMap<usize, StatefulProtocol>,
    pub pending: HashSet<usize>,
}

impl ReaderState {
    pub fn new(manga_id: String, chapters: Vec<Chapter>, chapter_idx: usize) -> Self {
        let chapter_id = chapters
            .get(chapter_idx)
            .map(|c| c.id.clone())
            .unwrap_or_default();

        Self {
            visit: ChapterVisit::new(manga_id.clone(), chapter_id),
            manga_id,
            chapters,
            chapter_idx,
            pages: Vec::new(),
            loading: true,
            scroll: ReaderScroll::default(),
            images: HashMap::new(),
            pending: HashSet::new(),
        }
    }

    pub fn chapter(&self) -> Option<&Chapter> {
        self.chapters.get(self.chapter_idx)
    }

    /// Switches to another chapter of the same list and starts a new visit.
    pub fn open_chapter(&mut self, idx: usize) -> Option<String> {
        let chapter_id = self.chapters.get(idx)?.id.clone();
        self.chapter_idx = idx;
        self.visit = ChapterVisit::new(self.manga_id.clone(), chapter_id.clone());
        self.pages.clear();
        self.images.clear();
        self.pending.clear();
        self.scroll = ReaderScroll::default();
        self.loading = true;
        Some(chapter_id)
    }

    /// The feed is newest first, so the following chapter sits one slot up.
    pub fn next_chapter_idx(&self) -> Option<usize> {
        self.chapter_idx.checked_sub(1)
    }

    pub fn prev_chapter_idx(&self) -> Option<usize> {
        let idx = self.chapter_idx + 1;
        (idx < self.chapters.len()).then_some(idx)
    }

    pub fn set_pages(&mut self, pages: Vec<String>) {
        let viewport = self.scroll.viewport();
        self.scroll = ReaderScroll::new(pages.len());
        self.scroll.set_viewport(viewport);
        self.pages = pages;
        self.loading = false;
    }

    /// Current and next page indices whose images are neither shown nor on the way.
    pub fn pages_to_load(&mut self) -> Vec<(usize, String)> {
        let current = self.scroll.current_page();
        let mut wanted = Vec::new();
        for idx in [current, current + 1] {
            if idx >= self.pages.len() || self.images.contains_key(&idx) || self.pending.contains(&idx) {
                continue;
            }
            self.pending.insert(idx);
            wanted.push((idx, self.pages[idx].clone()));
        }
        wanted
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum LibrarySection {
    #[default]
    Bookmarks,
    History,
    Status,
    Ratings,
}

impl LibrarySection {
    pub const ALL: [LibrarySection; 4] = [
        LibrarySection::Bookmarks,
        LibrarySection::History,
        LibrarySection::Status,
        LibrarySection::Ratings,
    ];

    pub fn title(self) -> &'static str {
        match self {
            LibrarySection::Bookmarks => "Bookmarks",
            LibrarySection::History => "History",
            LibrarySection::Status => "Status",
            LibrarySection::Ratings => "Ratings",
        }
    }

    pub fn index(self) -> usize {
        LibrarySection::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    pub fn step(self, delta: isize) -> LibrarySection {
        let len = LibrarySection::ALL.len() as isize;
        let idx = (self.index() as isize + delta).rem_euclid(len);
        LibrarySection::ALL[idx as usize]
    }
}

#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub manga_id: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct Library {
    pub bookmarks: Vec<LibraryEntry>,
    pub history: Vec<LibraryEntry>,
    pub statuses: Vec<LibraryEntry>,
    pub ratings: Vec<LibraryEntry>,
    pub titles: HashMap<String, Manga>,
}

impl Library {
    pub fn section(&self, section: LibrarySection) -> &[LibraryEntry] {
        match section {
            LibrarySection::Bookmarks => &self.bookmarks,
            LibrarySection::History => &self.history,
            LibrarySection::Status => &self.statuses,
            LibrarySection::Ratings => &self.ratings,
        }
    }
}

#[derive(Default)]
pub struct LibraryState {
    pub library: Library,
    pub section: LibrarySection,
    pub list: ListState,
    pub loading: bool,
}

impl LibraryState {
    pub fn entries(&self) -> &[LibraryEntry] {
        self.library.section(self.section)
    }

    pub fn selected_manga(&self) -> Option<Manga> {
        let entry = self.list.selected().and_then(|i| self.entries().get(i))?;
        Some(
            self.library
                .titles
                .get(&entry.manga_id)
                .cloned()
                .unwrap_or_else(|| Manga {
                    id: entry.manga_id.clone(),
                    title: entry.manga_id.clone(),
                    ..Manga::default()
                }),
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMode {
    #[default]
    Login,
    Register,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    Username,
    #[default]
    Email,
    Password,
}

#[derive(Default)]
pub struct LoginForm {
    pub mode: LoginMode,
    pub field: LoginField,
    pub username: String,
    pub email: String,
    pub password: String,
    pub error: Option<String>,
    pub submitting: bool,
}

impl LoginForm {
    pub fn fields(&self) -> &'static [LoginField] {
        match self.mode {
            LoginMode::Login => &[LoginField::Email, LoginField::Password],
            LoginMode::Register => &[LoginField::Username, LoginField::Email, LoginField::Password],
        }
    }

    pub fn next_field(&mut self) {
        let fields = self.fields();
        let idx = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        self.field = fields[(idx + 1) % fields.len()];
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            LoginMode::Login => LoginMode::Register,
            LoginMode::Register => LoginMode::Login,
        };
        self.field = self.fields()[0];
        self.error = None;
    }

    pub fn input(&mut self) -> &mut String {
        match self.field {
            LoginField::Username => &mut self.username,
            LoginField::Email => &mut self.email,
            LoginField::Password => &mut self.password,
        }
    }
}

pub struct App {
    pub state: AppState,
    pub loading_message: String,
    pub view: View,
    pub tab: Tab,
    pub session: Option<Session>,
    pub latest: LatestState,
    pub catalog: CatalogState,
    pub detail: Option<DetailState>,
    pub reader: Option<ReaderState>,
    pub library: LibraryState,
    pub login: LoginForm,
    pub notice: Option<String>,
    pub picker: Option<Picker>,
    pub covers: HashMap<String, StatefulProtocol>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        let picker = Picker::from_query_stdio().ok();

        Self {
            state: AppState::Loading,
            loading_message: "Initializing...".to_string(),
            view: View::Home,
            tab: Tab::Latest,
            session: None,
            latest: LatestState::default(),
            catalog: CatalogState::default(),
            detail: None,
            reader: None,
            library: LibraryState::default(),
            login: LoginForm::default(),
            notice: None,
            picker,
            covers: HashMap::new(),
        }
    }

    pub fn set_loading(&mut self, message: &str) {
        self.state = AppState::Loading;
        self.loading_message = message.to_string();
    }

    pub fn set_ready(&mut self) {
        self.state = AppState::Ready;
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
    }

    pub fn add_cover_image(&mut self, manga_id: &str, image: DynamicImage) {
        if let Some(ref picker) = self.picker {
            let protocol = picker.new_resize_protocol(image);
            self.covers.insert(manga_id.to_string(), protocol);
        }
    }

    pub fn add_page_image(&mut self, chapter_id: &str, index: usize, image: DynamicImage) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        if reader.chapter().map(|c| c.id.as_str()) != Some(chapter_id) {
            return;
        }

        reader.pending.remove(&index);
        if let Some(ref picker) = self.picker {
            reader.images.insert(index, picker.new_resize_protocol(image));
        }
    }

    pub fn open_manga(&mut self, manga: Manga) {
        self.detail = Some(DetailState::new(manga));
        self.view = View::Detail;
    }

    pub fn open_reader(&mut self, chapter_idx: usize) -> Option<String> {
        let detail = self.detail.as_ref()?;
        let chapter_id = detail.chapters.get(chapter_idx)?.id.clone();
        self.reader = Some(ReaderState::new(
            detail.manga.id.clone(),
            detail.chapters.clone(),
            chapter_idx,
        ));
        self.view = View::Reader;
        Some(chapter_id)
    }

    pub fn open_login(&mut self) {
        self.login = LoginForm::default();
        self.view = View::Login;
    }

    pub fn go_back(&mut self) {
        self.view = match self.view {
            View::Reader => {
                self.reader = None;
                View::Detail
            }
            View::Detail => {
                self.detail = None;
                View::Home
            }
            View::Login | View::Home => View::Home,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_wraps_through_none() {
        let all = PublicationStatus::ALL;
        let mut current = None;
        let mut seen = Vec::new();
        for _ in 0..5 {
            current = cycle(current, &all);
            seen.push(current);
        }
        assert_eq!(seen[0], Some(PublicationStatus::Ongoing));
        assert_eq!(seen[3], Some(PublicationStatus::Cancelled));
        assert_eq!(seen[4], None);
    }

    #[test]
    fn test_catalog_cycles_reset_page() {
        let mut catalog = CatalogState::default();
        catalog.query.set_page(4);
        catalog.cycle_status();
        assert_eq!(catalog.query.page(), 1);

        catalog.query.set_page(4);
        catalog.cycle_sort();
        assert_eq!(catalog.query.page(), 1);
        assert_eq!(catalog.query.sort(), SortKey::Follows);
    }

    #[test]
    fn test_latest_paging_stays_within_results() {
        let mut latest = LatestState::default();
        assert_eq!(latest.step_page(-1), None);

        latest.results.total = 50;
        assert_eq!(latest.step_page(1), Some(2));
        assert_eq!(latest.step_page(1), Some(3));
        assert_eq!(latest.step_page(1), None);
        assert_eq!(latest.page, 3);
        assert_eq!(latest.step_page(-5), Some(1));
    }

    #[test]
    fn test_step_selection_stays_in_range() {
        let mut list = ListState::default();
        step_selection(&mut list, 3, 5);
        assert_eq!(list.selected(), Some(2));
        step_selection(&mut list, 3, -10);
        assert_eq!(list.selected(), Some(0));
        step_selection(&mut list, 0, 1);
        assert_eq!(list.selected(), None);
    }

    #[test]
    fn test_reader_chapter_navigation_follows_feed_order() {
        let chapters: Vec<Chapter> = ["3", "2", "1"]
            .iter()
            .map(|n| Chapter {
                id: format!("c{n}"),
                number: Some(n.to_string()),
                title: None,
                volume: None,
                pages: 5,
                published_at: None,
                scanlation_group: None,
            })
            .collect();

        let mut reader = ReaderState::new("m".to_string(), chapters, 1);
        assert_eq!(reader.next_chapter_idx(), Some(0));
        assert_eq!(reader.prev_chapter_idx(), Some(2));

        assert_eq!(reader.open_chapter(0).as_deref(), Some("c3"));
        assert_eq!(reader.next_chapter_idx(), None);
        assert_eq!(reader.visit.chapter_id(), "c3");
    }
}
