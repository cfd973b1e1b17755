mod ui;

use mangadex_reader::backend::{
    self,
    account::{Account, ReadingStatus, spawn_best_effort},
    catalog::{CatalogPage, SearchScheduler, clamp_page, fetch_catalog_page, fetch_latest_page},
    chapters::dedup_chapters,
    mangadex::{Chapter, Manga, MangaDex, Tag},
    session::{Session, TokenStore},
};
use mangadex_reader::config::{self, Config};
use mangadex_reader::error::ApiError;
use ui::app::{App, CatalogFocus, Library, LibraryEntry, LibrarySection, LoginMode, Tab, View, step_selection};
use ui::ui::ui;

use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use image::DynamicImage;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::collections::{HashMap, HashSet};
use std::{error::Error, io};
use tokio::sync::mpsc;

const SCROLL_STEP: i32 = 3;

enum BackgroundTask {
    LatestLoaded { page: u32, results: CatalogPage },
    GenresLoaded { genres: Vec<Tag> },
    CatalogLoaded { generation: u64, page: CatalogPage },
    DetailLoaded {
        manga_id: String,
        manga: Option<Manga>,
        chapters: Vec<Chapter>,
        rating: Option<f64>,
    },
    UserStateLoaded {
        manga_id: String,
        bookmarked: bool,
        status: Option<ReadingStatus>,
        rating: Option<u8>,
    },
    CoverLoaded { manga_id: String, image: DynamicImage },
    PageUrlsLoaded { chapter_id: String, urls: Vec<String> },
    PageImageLoaded { chapter_id: String, index: usize, image: DynamicImage },
    SignedIn { result: Result<Session, String> },
    LibraryLoaded { library: Library },
    BookmarkChanged { manga_id: String, bookmarked: bool },
    StatusChanged { manga_id: String, status: ReadingStatus },
    Rated { manga_id: String, score: u8 },
}

/// Owns the API clients and spawns every network call the UI asks for.
struct Controller {
    dex: MangaDex,
    account: Account,
    store: TokenStore,
    tx: mpsc::UnboundedSender<BackgroundTask>,
    search: SearchScheduler,
    pending_covers: HashSet<String>,
}

fn init_logging() {
    let dir = config::cache_dir();
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    let file = std::fs::create_dir_all(&dir).and_then(|_| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("mangadex-reader.log"))
    });
    match file {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        // stderr would tear the terminal UI
        Err(_) => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let config = Config::load();
    log::info!(
        "starting against {} (backend {}, language {})",
        config.api_url,
        config.backend_url,
        config.language
    );

    let (dex, account) = backend::connect(&config)?;
    let store = TokenStore::default_location();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();
    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();

    app.set_loading("Restoring session...");
    terminal.draw(|f| ui(f, &mut app))?;
    app.session = Session::restore(&account, &store).await;

    app.set_loading("Fetching recently updated manga...");
    terminal.draw(|f| ui(f, &mut app))?;
    app.latest.results = fetch_latest_page(&dex, app.latest.page).await;

    let mut ctl = Controller {
        dex,
        account,
        store,
        tx: task_tx,
        search: SearchScheduler::new(config.search_debounce()),
        pending_covers: HashSet::new(),
    };

    if let Some(first) = app.latest.items().first().cloned() {
        app.latest.list.select(Some(0));
        ctl.load_cover(&first, &app);
    }
    ctl.load_genres();

    app.set_ready();

    let res = run_app(&mut terminal, &mut app, &mut task_rx, &mut ctl).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err}");
    }
    Ok(())
}

impl Controller {
    fn load_latest(&self, app: &mut App) {
        app.latest.loading = true;
        let dex = self.dex.clone();
        let tx = self.tx.clone();
        let page = app.latest.page;
        tokio::spawn(async move {
            let results = fetch_latest_page(&dex, page).await;
            let _ = tx.send(BackgroundTask::LatestLoaded { page, results });
        });
    }

    fn load_genres(&self) {
        let dex = self.dex.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match dex.get_genres().await {
                Ok(genres) => {
                    let _ = tx.send(BackgroundTask::GenresLoaded { genres });
                }
                Err(e) => log::warn!("tag list failed: {e}"),
            }
        });
    }

    fn schedule_catalog(&mut self, app: &mut App) {
        app.catalog.loading = true;
        let dex = self.dex.clone();
        let query = app.catalog.query.clone();
        let tx = self.tx.clone();

        self.search.schedule(
            move || async move { fetch_catalog_page(&dex, &query).await },
            move |generation, page| {
                let _ = tx.send(BackgroundTask::CatalogLoaded { generation, page });
            },
        );
    }

    fn cancel_catalog(&mut self, app: &mut App) {
        self.search.cancel();
        app.catalog.loading = false;
    }

    fn load_cover(&mut self, manga: &Manga, app: &App) {
        if app.covers.contains_key(&manga.id) || self.pending_covers.contains(&manga.id) {
            return;
        }
        let Some(url) = self.dex.cover_url(manga, 256) else {
            return;
        };
        self.pending_covers.insert(manga.id.clone());

        let dex = self.dex.clone();
        let tx = self.tx.clone();
        let manga_id = manga.id.clone();
        tokio::spawn(async move {
            if let Some(image) = dex.fetch_image(&url).await {
                let _ = tx.send(BackgroundTask::CoverLoaded { manga_id, image });
            }
        });
    }

    fn load_detail(&self, manga_id: String, session: Option<Session>) {
        let dex = self.dex.clone();
        let tx = self.tx.clone();
        let id = manga_id.clone();
        tokio::spawn(async move {
            let ids = [id.clone()];
            let (manga, feed, stats) = tokio::join!(
                dex.get_manga(&id),
                dex.get_chapter_feed(&id),
                dex.get_statistics(&ids),
            );

            let manga = manga
                .inspect_err(|e| log::warn!("manga {id}: {e}"))
                .ok();
            let chapters = feed
                .map(dedup_chapters)
                .unwrap_or_else(|e| {
                    log::warn!("chapter feed {id}: {e}");
                    Vec::new()
                });
            let rating = stats.ok().and_then(|s| s.get(&id).copied());

            let _ = tx.send(BackgroundTask::DetailLoaded {
                manga_id: id,
                manga,
                chapters,
                rating,
            });
        });

        let Some(session) = session else {
            return;
        };
        let account = self.account.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let (bookmarked, status, rating) = tokio::join!(
                account.is_bookmarked(&session, &manga_id),
                account.status_for(&session, &manga_id),
                account.rating_for(&session, &manga_id),
            );
            let _ = tx.send(BackgroundTask::UserStateLoaded {
                bookmarked: bookmarked.unwrap_or_else(|e| {
                    log::warn!("bookmarks: {e}");
                    false
                }),
                status: status.unwrap_or_else(|e| {
                    log::warn!("statuses: {e}");
                    None
                }),
                rating: rating.unwrap_or_else(|e| {
                    log::warn!("ratings: {e}");
                    None
                }),
                manga_id,
            });
        });
    }

    fn load_pages(&self, chapter_id: String) {
        let dex = self.dex.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let urls = dex.get_chapter_pages(&chapter_id).await.unwrap_or_else(|e| {
                log::warn!("pages for {chapter_id}: {e}");
                Vec::new()
            });
            let _ = tx.send(BackgroundTask::PageUrlsLoaded { chapter_id, urls });
        });
    }

    fn load_visible_pages(&self, app: &mut App) {
        let Some(reader) = app.reader.as_mut() else {
            return;
        };
        let Some(chapter_id) = reader.chapter().map(|c| c.id.clone()) else {
            return;
        };

        for (index, url) in reader.pages_to_load() {
            let dex = self.dex.clone();
            let tx = self.tx.clone();
            let chapter_id = chapter_id.clone();
            tokio::spawn(async move {
                if let Some(image) = dex.fetch_image(&url).await {
                    let _ = tx.send(BackgroundTask::PageImageLoaded {
                        chapter_id,
                        index,
                        image,
                    });
                }
            });
        }
    }

    fn sign_in(&self, app: &mut App) {
        let form = &mut app.login;
        if form.submitting {
            return;
        }
        form.submitting = true;
        form.error = None;

        let account = self.account.clone();
        let store = self.store.clone();
        let tx = self.tx.clone();
        let (mode, username, email, password) = (
            form.mode,
            form.username.clone(),
            form.email.clone(),
            form.password.clone(),
        );

        tokio::spawn(async move {
            let result = match mode {
                LoginMode::Login => Session::login(&account, &store, &email, &password).await,
                LoginMode::Register => {
                    Session::register(&account, &store, &username, &email, &password).await
                }
            };
            let result = result.map_err(|e| match e {
                ApiError::InvalidCredentials => "Invalid email or password".to_string(),
                other => other.to_string(),
            });
            let _ = tx.send(BackgroundTask::SignedIn { result });
        });
    }

    fn sign_out(&self, app: &mut App) {
        if let Some(session) = app.session.take() {
            session.logout(&self.store);
        }
        app.library = Default::default();
        app.notify("Signed out");
    }

    fn load_library(&self, app: &mut App) {
        let Some(session) = app.session.clone() else {
            return;
        };
        app.library.loading = true;

        let account = self.account.clone();
        let dex = self.dex.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let (bookmarks, history, statuses, ratings) = tokio::join!(
                account.bookmarks(&session),
                account.history(&session),
                account.statuses(&session),
                account.ratings(&session),
            );

            let mut library = Library {
                bookmarks: or_empty("bookmarks", bookmarks)
                    .into_iter()
                    .map(|b| LibraryEntry {
                        detail: b
                            .created_at
                            .map(|d| format!("added {}", d.format("%Y-%m-%d")))
                            .unwrap_or_default(),
                        manga_id: b.manga_id,
                    })
                    .collect(),
                history: or_empty("history", history)
                    .into_iter()
                    .map(|h| LibraryEntry {
                        detail: match h.updated_at {
                            Some(d) => format!("read {} · page {}", d.format("%Y-%m-%d %H:%M"), h.page + 1),
                            None => format!("page {}", h.page + 1),
                        },
                        manga_id: h.manga_id,
                    })
                    .collect(),
                statuses: or_empty("statuses", statuses)
                    .into_iter()
                    .map(|s| LibraryEntry {
                        detail: s.status.label().to_string(),
                        manga_id: s.manga_id,
                    })
                    .collect(),
                ratings: or_empty("ratings", ratings)
                    .into_iter()
                    .map(|r| LibraryEntry {
                        detail: format!("★ {}/10", r.score),
                        manga_id: r.manga_id,
                    })
                    .collect(),
                titles: HashMap::new(),
            };

            let ids: HashSet<String> = LibrarySection::ALL
                .iter()
                .flat_map(|s| library.section(*s).iter().map(|e| e.manga_id.clone()))
                .collect();

            library.titles = futures::stream::iter(ids)
                .map(|id| {
                    let dex = dex.clone();
                    async move { dex.get_manga(&id).await.ok() }
                })
                .buffer_unordered(20)
                .filter_map(|manga| async move { manga })
                .map(|manga| (manga.id.clone(), manga))
                .collect()
                .await;

            let _ = tx.send(BackgroundTask::LibraryLoaded { library });
        });
    }

    fn toggle_bookmark(&self, app: &mut App) {
        let (Some(session), Some(detail)) = (app.session.clone(), app.detail.as_ref()) else {
            return;
        };
        let manga_id = detail.manga.id.clone();
        let bookmarked = !detail.bookmarked;
        let account = self.account.clone();
        let tx = self.tx.clone();

        spawn_best_effort("bookmark", async move {
            if bookmarked {
                account.add_bookmark(&session, &manga_id).await?;
            } else {
                account.remove_bookmark(&session, &manga_id).await?;
            }
            let _ = tx.send(BackgroundTask::BookmarkChanged { manga_id, bookmarked });
            Ok(())
        });
    }

    fn set_status(&self, app: &mut App) {
        let (Some(session), Some(detail)) = (app.session.clone(), app.detail.as_ref()) else {
            return;
        };
        let manga_id = detail.manga.id.clone();
        let status = detail.next_status();
        let account = self.account.clone();
        let tx = self.tx.clone();

        spawn_best_effort("reading status", async move {
            let entry = account.set_status(&session, &manga_id, status).await?;
            let _ = tx.send(BackgroundTask::StatusChanged {
                manga_id: entry.manga_id,
                status: entry.status,
            });
            Ok(())
        });
    }

    fn rate(&self, app: &mut App, score: u8) {
        let (Some(session), Some(detail)) = (app.session.clone(), app.detail.as_ref()) else {
            return;
        };
        let manga_id = detail.manga.id.clone();
        let account = self.account.clone();
        let tx = self.tx.clone();

        spawn_best_effort("rating", async move {
            let rating = account.rate(&session, &manga_id, score).await?;
            let _ = tx.send(BackgroundTask::Rated {
                manga_id: rating.manga_id,
                score: rating.score,
            });
            Ok(())
        });
    }

    /// Fires the one history write for the chapter on screen, if it is due.
    fn record_visit(&self, app: &mut App) {
        let signed_in = app.session.is_some();
        let Some(reader) = app.reader.as_mut() else {
            return;
        };
        let Some(update) = reader.visit.on_pages_loaded(signed_in, reader.pages.len()) else {
            return;
        };
        let Some(session) = app.session.clone() else {
            return;
        };

        let account = self.account.clone();
        spawn_best_effort("reading history", async move {
            account.update_history(&session, &update).await
        });
    }
}

fn or_empty<T>(what: &str, result: Result<Vec<T>, ApiError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        log::warn!("{what}: {e}");
        Vec::new()
    })
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    task_rx: &mut mpsc::UnboundedReceiver<BackgroundTask>,
    ctl: &mut Controller,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();

    loop {
        terminal.draw(|f| ui(f, app))?;

        tokio::select! {
            // Redraw tick for spinners
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {}

            Some(Ok(event)) = event_stream.next() => {
                if let Event::Key(key) = event {
                    if key.kind == KeyEventKind::Press && handle_key(app, key, ctl) {
                        return Ok(());
                    }
                }
            }

            Some(task) = task_rx.recv() => apply_task(app, task, ctl),
        }
    }
}

fn apply_task(app: &mut App, task: BackgroundTask, ctl: &mut Controller) {
    match task {
        BackgroundTask::LatestLoaded { page, results } => {
            if page != app.latest.page {
                log::debug!("dropping latest page {page}, showing {}", app.latest.page);
                return;
            }
            app.latest.loading = false;
            app.latest.results = results;
            app.latest.list.select(if app.latest.items().is_empty() { None } else { Some(0) });
            if let Some(first) = app.latest.items().first().cloned() {
                ctl.load_cover(&first, app);
            }
        }
        BackgroundTask::GenresLoaded { genres } => {
            app.catalog.genres = genres;
        }
        BackgroundTask::CatalogLoaded { generation, page } => {
            if !ctl.search.is_current(generation) {
                log::debug!("dropping stale catalog result {generation}");
                return;
            }
            app.catalog.loading = false;
            app.catalog.list.select(if page.items.is_empty() { None } else { Some(0) });
            app.catalog.page = page;
        }
        BackgroundTask::DetailLoaded {
            manga_id,
            manga,
            chapters,
            rating,
        } => {
            let Some(detail) = app.detail.as_mut().filter(|d| d.manga.id == manga_id) else {
                return;
            };
            if let Some(manga) = manga {
                detail.manga = manga;
            }
            detail.list.select(if chapters.is_empty() { None } else { Some(0) });
            detail.chapters = chapters;
            detail.community_rating = rating;
            detail.loading = false;
            let manga = detail.manga.clone();
            ctl.load_cover(&manga, app);
        }
        BackgroundTask::UserStateLoaded {
            manga_id,
            bookmarked,
            status,
            rating,
        } => {
            if let Some(detail) = app.detail.as_mut().filter(|d| d.manga.id == manga_id) {
                detail.bookmarked = bookmarked;
                detail.status = status;
                detail.user_rating = rating;
            }
        }
        BackgroundTask::CoverLoaded { manga_id, image } => {
            ctl.pending_covers.remove(&manga_id);
            app.add_cover_image(&manga_id, image);
        }
        BackgroundTask::PageUrlsLoaded { chapter_id, urls } => {
            let Some(reader) = app
                .reader
                .as_mut()
                .filter(|r| r.chapter().map(|c| c.id.as_str()) == Some(chapter_id.as_str()))
            else {
                return;
            };
            reader.set_pages(urls);
            ctl.record_visit(app);
            ctl.load_visible_pages(app);
        }
        BackgroundTask::PageImageLoaded {
            chapter_id,
            index,
            image,
        } => {
            app.add_page_image(&chapter_id, index, image);
        }
        BackgroundTask::SignedIn { result } => match result {
            Ok(session) => {
                app.notify(format!("Signed in as {}", session.user().username));
                app.session = Some(session);
                app.login = Default::default();
                app.view = View::Home;
                if app.tab == Tab::Library {
                    ctl.load_library(app);
                }
            }
            Err(message) => {
                app.login.submitting = false;
                app.login.error = Some(message);
            }
        },
        BackgroundTask::LibraryLoaded { library } => {
            app.library.loading = false;
            app.library.library = library;
            let len = app.library.entries().len();
            app.library.list.select(if len == 0 { None } else { Some(0) });
        }
        BackgroundTask::BookmarkChanged { manga_id, bookmarked } => {
            if let Some(detail) = app.detail.as_mut().filter(|d| d.manga.id == manga_id) {
                detail.bookmarked = bookmarked;
            }
            app.notify(if bookmarked { "Bookmarked" } else { "Bookmark removed" });
        }
        BackgroundTask::StatusChanged { manga_id, status } => {
            if let Some(detail) = app.detail.as_mut().filter(|d| d.manga.id == manga_id) {
                detail.status = Some(status);
            }
            app.notify(format!("Status: {}", status));
        }
        BackgroundTask::Rated { manga_id, score } => {
            if let Some(detail) = app.detail.as_mut().filter(|d| d.manga.id == manga_id) {
                detail.user_rating = Some(score);
            }
            app.notify(format!("Rated {score}/10"));
        }
    }
}

/// Returns true when the app should exit.
fn handle_key(app: &mut App, key: KeyEvent, ctl: &mut Controller) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    app.notice = None;

    match app.view {
        View::Home => return handle_home_input(app, key.code, ctl),
        View::Detail => handle_detail_input(app, key.code, ctl),
        View::Reader => handle_reader_input(app, key.code, ctl),
        View::Login => handle_login_input(app, key.code, ctl),
    }
    false
}

fn switch_tab(app: &mut App, tab: Tab, ctl: &mut Controller) {
    if app.tab == Tab::Catalog && tab != Tab::Catalog {
        ctl.cancel_catalog(app);
    }
    app.tab = tab;
    match tab {
        Tab::Latest => {
            if app.latest.items().is_empty() && !app.latest.loading {
                ctl.load_latest(app);
            }
        }
        Tab::Catalog => ctl.schedule_catalog(app),
        Tab::Library => ctl.load_library(app),
    }
}

fn open_manga(app: &mut App, manga: Manga, ctl: &mut Controller) {
    if app.tab == Tab::Catalog {
        ctl.cancel_catalog(app);
    }
    let manga_id = manga.id.clone();
    ctl.load_cover(&manga, app);
    app.open_manga(manga);
    ctl.load_detail(manga_id, app.session.clone());
}

fn toggle_account(app: &mut App, ctl: &mut Controller) {
    if app.session.is_some() {
        ctl.sign_out(app);
    } else {
        app.open_login();
    }
}

fn handle_home_input(app: &mut App, key: KeyCode, ctl: &mut Controller) -> bool {
    let typing = app.tab == Tab::Catalog && app.catalog.focus == CatalogFocus::Search;

    match key {
        KeyCode::Tab => {
            switch_tab(app, app.tab.next(), ctl);
            return false;
        }
        KeyCode::BackTab => {
            switch_tab(app, app.tab.prev(), ctl);
            return false;
        }
        KeyCode::Char('q') if !typing => return true,
        KeyCode::Char('L') if !typing => {
            toggle_account(app, ctl);
            return false;
        }
        _ => {}
    }

    match app.tab {
        Tab::Latest => handle_latest_input(app, key, ctl),
        Tab::Catalog => handle_catalog_input(app, key, ctl),
        Tab::Library => handle_library_input(app, key, ctl),
    }
    false
}

fn handle_latest_input(app: &mut App, key: KeyCode, ctl: &mut Controller) {
    let len = app.latest.items().len();
    match key {
        KeyCode::Up | KeyCode::Down => {
            let delta = if key == KeyCode::Up { -1 } else { 1 };
            step_selection(&mut app.latest.list, len, delta);
            if let Some(manga) = app.latest.selected().cloned() {
                ctl.load_cover(&manga, app);
            }
        }
        KeyCode::Left | KeyCode::Right => {
            let delta = if key == KeyCode::Left { -1 } else { 1 };
            if app.latest.step_page(delta).is_some() {
                ctl.load_latest(app);
            }
        }
        KeyCode::Char('r') => ctl.load_latest(app),
        KeyCode::Enter => {
            if let Some(manga) = app.latest.selected().cloned() {
                open_manga(app, manga, ctl);
            }
        }
        _ => {}
    }
}

fn handle_catalog_input(app: &mut App, key: KeyCode, ctl: &mut Controller) {
    let catalog = &mut app.catalog;

    if catalog.focus == CatalogFocus::Search {
        match key {
            KeyCode::Char(c) => {
                let mut title = catalog.query.title().to_string();
                title.push(c);
                catalog.query.set_title(title);
                ctl.schedule_catalog(app);
            }
            KeyCode::Backspace => {
                let mut title = catalog.query.title().to_string();
                if title.pop().is_some() {
                    catalog.query.set_title(title);
                    ctl.schedule_catalog(app);
                }
            }
            KeyCode::Down | KeyCode::Enter | KeyCode::Esc => {
                catalog.focus = CatalogFocus::Results;
            }
            _ => {}
        }
        return;
    }

    match key {
        KeyCode::Char('/') => catalog.focus = CatalogFocus::Search,
        KeyCode::Up => {
            if catalog.list.selected().unwrap_or(0) == 0 {
                catalog.focus = CatalogFocus::Search;
            } else {
                step_selection(&mut catalog.list, catalog.page.items.len(), -1);
            }
        }
        KeyCode::Down => step_selection(&mut catalog.list, catalog.page.items.len(), 1),
        KeyCode::Left | KeyCode::Right => {
            let delta = if key == KeyCode::Left { -1 } else { 1 };
            let target = clamp_page(
                i64::from(catalog.query.page()) + delta,
                catalog.page.total_pages(),
            );
            if target != catalog.query.page() {
                catalog.query.set_page(target);
                ctl.schedule_catalog(app);
            }
        }
        KeyCode::Char(c @ ('s' | 'd' | 'g' | 'o' | 'x')) => {
            match c {
                's' => catalog.cycle_status(),
                'd' => catalog.cycle_demographic(),
                'g' => catalog.cycle_genre(),
                'o' => catalog.cycle_sort(),
                _ => {
                    if !catalog.query.has_filters() {
                        return;
                    }
                    catalog.query.clear_filters();
                }
            }
            ctl.schedule_catalog(app);
        }
        KeyCode::Enter => {
            if let Some(manga) = catalog.selected().cloned() {
                open_manga(app, manga, ctl);
            }
        }
        _ => {}
    }
}

fn handle_library_input(app: &mut App, key: KeyCode, ctl: &mut Controller) {
    if app.session.is_none() {
        return;
    }
    let library = &mut app.library;

    match key {
        KeyCode::Left | KeyCode::Right => {
            let delta = if key == KeyCode::Left { -1 } else { 1 };
            library.section = library.section.step(delta);
            let len = library.entries().len();
            library.list.select(if len == 0 { None } else { Some(0) });
        }
        KeyCode::Up | KeyCode::Down => {
            let delta = if key == KeyCode::Up { -1 } else { 1 };
            let len = library.entries().len();
            step_selection(&mut library.list, len, delta);
        }
        KeyCode::Char('r') => ctl.load_library(app),
        KeyCode::Enter => {
            if let Some(manga) = library.selected_manga() {
                open_manga(app, manga, ctl);
            }
        }
        _ => {}
    }
}

fn handle_detail_input(app: &mut App, key: KeyCode, ctl: &mut Controller) {
    let signed_in = app.session.is_some();

    match key {
        KeyCode::Esc => {
            app.go_back();
            if app.view == View::Home && app.tab == Tab::Catalog {
                ctl.schedule_catalog(app);
            }
        }
        KeyCode::Up | KeyCode::Down => {
            if let Some(detail) = app.detail.as_mut() {
                let delta = if key == KeyCode::Up { -1 } else { 1 };
                step_selection(&mut detail.list, detail.chapters.len(), delta);
            }
        }
        KeyCode::Enter => {
            let selected = app.detail.as_ref().and_then(|d| d.list.selected());
            if let Some(chapter_id) = selected.and_then(|idx| app.open_reader(idx)) {
                ctl.load_pages(chapter_id);
            }
        }
        KeyCode::Char('b' | 's' | '0'..='9') if !signed_in => {
            app.notify("Sign in (L on the home screen) to keep bookmarks, status and ratings");
        }
        KeyCode::Char('b') => ctl.toggle_bookmark(app),
        KeyCode::Char('s') => ctl.set_status(app),
        KeyCode::Char(c @ '0'..='9') => {
            let score = match c.to_digit(10) {
                Some(0) => 10,
                Some(d) => d as u8,
                None => return,
            };
            ctl.rate(app, score);
        }
        _ => {}
    }
}

fn handle_reader_input(app: &mut App, key: KeyCode, ctl: &mut Controller) {
    let Some(reader) = app.reader.as_mut() else {
        return;
    };
    let viewport = reader.scroll.viewport() as i32;

    match key {
        KeyCode::Esc => {
            app.go_back();
            return;
        }
        KeyCode::Down | KeyCode::Char('j') => reader.scroll.scroll_by(SCROLL_STEP),
        KeyCode::Up | KeyCode::Char('k') => reader.scroll.scroll_by(-SCROLL_STEP),
        KeyCode::PageDown | KeyCode::Char(' ') => reader.scroll.scroll_by(viewport),
        KeyCode::PageUp => reader.scroll.scroll_by(-viewport),
        KeyCode::Home | KeyCode::Char('g') => reader.scroll.scroll_to_top(),
        KeyCode::End | KeyCode::Char('G') => {
            reader.scroll.scroll_to_page(reader.pages.len().saturating_sub(1))
        }
        KeyCode::Char('n') | KeyCode::Char('p') => {
            let target = if key == KeyCode::Char('n') {
                reader.next_chapter_idx()
            } else {
                reader.prev_chapter_idx()
            };
            if let Some(chapter_id) = target.and_then(|idx| reader.open_chapter(idx)) {
                ctl.load_pages(chapter_id);
            }
            return;
        }
        _ => return,
    }

    ctl.load_visible_pages(app);
}

fn handle_login_input(app: &mut App, key: KeyCode, ctl: &mut Controller) {
    match key {
        KeyCode::Esc => app.go_back(),
        KeyCode::Tab => app.login.next_field(),
        KeyCode::F(2) => app.login.toggle_mode(),
        KeyCode::Enter => ctl.sign_in(app),
        KeyCode::Backspace => {
            app.login.input().pop();
        }
        KeyCode::Char(c) => app.login.input().push(c),
        _ => {}
    }
}
