use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Tabs, Wrap},
};
use ratatui_image::{Resize, StatefulImage, protocol::StatefulProtocol};

use super::app::{
    App, AppState, CatalogFocus, LibrarySection, LoginField, LoginMode, Tab, View,
};
use mangadex_reader::backend::mangadex::Manga;

pub fn ui(f: &mut Frame, app: &mut App) {
    match app.state {
        AppState::Loading => draw_loading_screen(f, app),
        AppState::Ready => match app.view {
            View::Home => draw_home(f, app),
            View::Detail => draw_detail(f, app),
            View::Reader => draw_reader(f, app),
            View::Login => draw_login(f, app),
        },
    }
}

fn accent() -> Style {
    Style::default().fg(Color::Cyan)
}

fn focused() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn muted() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn draw_loading_screen(f: &mut Frame, app: &App) {
    let area = f.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Manga Reader")
        .border_style(accent());

    let inner = block.inner(area);
    f.render_widget(block, area);

    let center_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .split(inner);

    let spinner_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let spinner = spinner_frames[(millis / 100) as usize % spinner_frames.len()];

    let loading_text = Line::from(vec![
        Span::styled(
            format!(" {} ", spinner),
            accent().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Loading...",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    f.render_widget(
        Paragraph::new(loading_text).alignment(Alignment::Center),
        center_layout[1],
    );
    f.render_widget(
        Paragraph::new(app.loading_message.as_str())
            .style(muted())
            .alignment(Alignment::Center),
        center_layout[2],
    );
}

fn draw_home(f: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // tabs
            Constraint::Min(10),   // content
            Constraint::Length(3), // footer
        ])
        .split(f.area());

    draw_header(f, root[0], app);

    match app.tab {
        Tab::Latest => draw_latest(f, root[1], app),
        Tab::Catalog => draw_catalog(f, root[1], app),
        Tab::Library => draw_library(f, root[1], app),
    }

    let hints: &[(&str, &str)] = match app.tab {
        Tab::Latest => &[("Tab", "section"), ("↑/↓", "select"), ("←/→", "page"), ("Enter", "open"), ("L", "account"), ("q", "quit")],
        Tab::Catalog => match app.catalog.focus {
            CatalogFocus::Search => &[("type", "search"), ("↓/Esc", "results"), ("Tab", "section")],
            CatalogFocus::Results => &[
                ("/", "search"),
                ("←/→", "page"),
                ("s", "status"),
                ("d", "demographic"),
                ("g", "genre"),
                ("o", "sort"),
                ("x", "clear"),
                ("Enter", "open"),
            ],
        },
        Tab::Library => &[("Tab", "section"), ("←/→", "list"), ("↑/↓", "select"), ("Enter", "open"), ("L", "account")],
    };
    draw_footer(f, root[2], hints, app.notice.as_deref());
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<&str> = Tab::ALL.iter().map(|t| t.title()).collect();
    let account = match &app.session {
        Some(session) => format!(" Manga Reader · {} ", session.user().username),
        None => " Manga Reader · guest ".to_string(),
    };

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(account)
                .border_style(accent()),
        )
        .select(app.tab.index())
        .style(muted())
        .highlight_style(focused());

    f.render_widget(tabs, area);
}

fn manga_item(manga: &Manga, rating: Option<f64>) -> ListItem<'static> {
    let mut spans = vec![Span::styled(
        manga.title.clone(),
        Style::default().fg(Color::White),
    )];
    if let Some(rating) = rating {
        spans.push(Span::styled(format!("  ★ {:.2}", rating), Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::styled(format!("  {}", manga.status), muted()));
    ListItem::new(Line::from(spans))
}

fn draw_latest(f: &mut Frame, area: Rect, app: &mut App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Recently Updated")
        .border_style(accent());

    let latest = &mut app.latest;
    let block = block.title_bottom(
        Line::from(format!(" Page {} / {} ", latest.page, latest.results.total_pages().max(1)))
            .alignment(Alignment::Right),
    );

    if latest.loading {
        f.render_widget(placeholder("Loading...").block(block), columns[0]);
    } else if latest.items().is_empty() {
        f.render_widget(placeholder("Nothing to show").block(block), columns[0]);
    } else {
        let items: Vec<ListItem> = latest
            .items()
            .iter()
            .map(|m| manga_item(m, latest.results.ratings.get(&m.id).copied()))
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(focused())
            .highlight_symbol("▶ ");
        f.render_stateful_widget(list, columns[0], &mut latest.list);
    }

    let selected = app.latest.selected();
    draw_preview(f, columns[1], selected, &mut app.covers);
}

fn draw_preview(
    f: &mut Frame,
    area: Rect,
    manga: Option<&Manga>,
    covers: &mut std::collections::HashMap<String, StatefulProtocol>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(muted());
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(manga) = manga else {
        return;
    };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Min(3)])
        .split(inner);

    draw_cover(f, layout[0], covers.get_mut(&manga.id));

    let text = vec![
        Line::from(Span::styled(
            manga.title.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(manga.status.clone(), accent())),
        Line::from(""),
        Line::from(Span::styled(manga.description.clone(), muted())),
    ];
    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), layout[1]);
}

fn draw_cover(f: &mut Frame, area: Rect, image_state: Option<&mut StatefulProtocol>) {
    if let Some(state) = image_state {
        let image_widget = StatefulImage::new().resize(Resize::Scale(None));
        f.render_stateful_widget(image_widget, area, state);
    } else {
        let image_content = vec![
            Line::from(""),
            Line::from(Span::styled("📚", Style::default().fg(Color::Magenta))),
            Line::from(Span::styled("Loading...", muted())),
        ];
        f.render_widget(
            Paragraph::new(image_content).alignment(Alignment::Center),
            area,
        );
    }
}

fn draw_catalog(f: &mut Frame, area: Rect, app: &mut App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // search box
            Constraint::Length(1), // filters
            Constraint::Min(5),    // results
            Constraint::Length(1), // pagination
        ])
        .split(area);

    let catalog = &mut app.catalog;
    let search_style = if catalog.focus == CatalogFocus::Search {
        focused()
    } else {
        Style::default().fg(Color::White)
    };
    let cursor = if catalog.focus == CatalogFocus::Search { "▏" } else { "" };
    let search = Paragraph::new(format!("{}{}", catalog.query.title(), cursor)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search")
            .border_style(search_style),
    );
    f.render_widget(search, layout[0]);

    let filter = |label: &str, value: Option<String>| {
        vec![
            Span::styled(format!("{label}: "), muted()),
            Span::styled(
                value.unwrap_or_else(|| "any".to_string()),
                Style::default().fg(Color::White),
            ),
            Span::raw("   "),
        ]
    };
    let mut spans = Vec::new();
    spans.extend(filter("status", catalog.query.status().map(|s| s.to_string())));
    spans.extend(filter("demographic", catalog.query.demographic().map(|d| d.to_string())));
    spans.extend(filter("genre", catalog.genre_name().map(str::to_string)));
    spans.extend(filter("sort", Some(catalog.query.sort().label().to_string())));
    f.render_widget(Paragraph::new(Line::from(spans)), layout[1]);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Results ({})", catalog.page.total))
        .border_style(if catalog.focus == CatalogFocus::Results {
            focused()
        } else {
            accent()
        });

    if catalog.loading {
        f.render_widget(placeholder("Searching...").block(block), layout[2]);
    } else if catalog.page.items.is_empty() {
        f.render_widget(placeholder("Nothing found").block(block), layout[2]);
    } else {
        let items: Vec<ListItem> = catalog
            .page
            .items
            .iter()
            .map(|m| manga_item(m, catalog.page.ratings.get(&m.id).copied()))
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(focused())
            .highlight_symbol("▶ ");
        f.render_stateful_widget(list, layout[2], &mut catalog.list);
    }

    let total_pages = catalog.page.total_pages();
    if total_pages > 1 {
        let page = catalog.query.page();
        let left = if page > 1 { "◀ " } else { "  " };
        let right = if page < total_pages { " ▶" } else { "  " };
        f.render_widget(
            Paragraph::new(format!("{left}Page {page} / {total_pages}{right}"))
                .alignment(Alignment::Center)
                .style(accent()),
            layout[3],
        );
    }
}

fn draw_library(f: &mut Frame, area: Rect, app: &mut App) {
    if app.session.is_none() {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Library")
            .border_style(accent());
        f.render_widget(
            placeholder("Press L to sign in and keep bookmarks, history and ratings").block(block),
            area,
        );
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let library = &mut app.library;
    let titles: Vec<&str> = LibrarySection::ALL.iter().map(|s| s.title()).collect();
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).border_style(muted()))
        .select(library.section.index())
        .style(muted())
        .highlight_style(focused());
    f.render_widget(tabs, layout[0]);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(library.section.title())
        .border_style(accent());

    if library.loading {
        f.render_widget(placeholder("Loading...").block(block), layout[1]);
        return;
    }

    let items: Vec<ListItem> = library
        .entries()
        .iter()
        .map(|entry| {
            let title = library
                .library
                .titles
                .get(&entry.manga_id)
                .map(|m| m.title.clone())
                .unwrap_or_else(|| entry.manga_id.clone());
            ListItem::new(Line::from(vec![
                Span::styled(title, Style::default().fg(Color::White)),
                Span::styled(format!("  {}", entry.detail), muted()),
            ]))
        })
        .collect();

    if items.is_empty() {
        f.render_widget(placeholder("Empty").block(block), layout[1]);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(focused())
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, layout[1], &mut library.list);
}

fn draw_detail(f: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(f.area());

    let signed_in = app.session.is_some();
    let notice = app.notice.clone();
    let Some(detail) = app.detail.as_mut() else {
        return;
    };

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(root[0]);

    let info_block = Block::default()
        .borders(Borders::ALL)
        .title(detail.manga.title.clone())
        .border_style(accent());
    let info_area = info_block.inner(columns[0]);
    f.render_widget(info_block, columns[0]);

    let info_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Min(4)])
        .split(info_area);
    draw_cover(f, info_layout[0], app.covers.get_mut(&detail.manga.id));

    let manga = &detail.manga;
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Author ", muted()),
            Span::raw(if manga.author.is_empty() { "unknown".to_string() } else { manga.author.clone() }),
        ]),
        Line::from(vec![
            Span::styled("Status ", muted()),
            Span::styled(manga.status.clone(), accent()),
            Span::raw(manga.year.map(|y| format!("  {y}")).unwrap_or_default()),
        ]),
        Line::from(vec![
            Span::styled("Rating ", muted()),
            Span::styled(
                detail
                    .community_rating
                    .map(|r| format!("★ {:.2}", r))
                    .unwrap_or_else(|| "-".to_string()),
                Style::default().fg(Color::Yellow),
            ),
        ]),
    ];
    if !manga.tags.is_empty() {
        lines.push(Line::from(Span::styled(manga.tags.join(", "), muted())));
    }
    if signed_in {
        lines.push(Line::from(vec![
            Span::styled(if detail.bookmarked { "🔖 bookmarked" } else { "not bookmarked" }, accent()),
            Span::raw("  "),
            Span::styled(
                detail.status.map(|s| s.label()).unwrap_or("no status"),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled(
                detail
                    .user_rating
                    .map(|r| format!("your score {r}/10"))
                    .unwrap_or_else(|| "not rated".to_string()),
                Style::default().fg(Color::Yellow),
            ),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(manga.description.clone(), muted())));
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), info_layout[1]);

    let chapters_block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Chapters ({})", detail.chapters.len()))
        .border_style(focused());

    if detail.loading {
        f.render_widget(placeholder("Loading chapters...").block(chapters_block), columns[1]);
    } else if detail.chapters.is_empty() {
        f.render_widget(placeholder("No chapters in this language").block(chapters_block), columns[1]);
    } else {
        let items: Vec<ListItem> = detail
            .chapters
            .iter()
            .map(|c| {
                let mut spans = vec![Span::styled(c.label(), Style::default().fg(Color::White))];
                if let Some(group) = &c.scanlation_group {
                    spans.push(Span::styled(format!("  [{group}]"), muted()));
                }
                if let Some(date) = c.published_at {
                    spans.push(Span::styled(format!("  {}", date.format("%Y-%m-%d")), muted()));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        let list = List::new(items)
            .block(chapters_block)
            .highlight_style(focused())
            .highlight_symbol("▶ ");
        f.render_stateful_widget(list, columns[1], &mut detail.list);
    }

    let hints: &[(&str, &str)] = if signed_in {
        &[("↑/↓", "chapter"), ("Enter", "read"), ("b", "bookmark"), ("s", "status"), ("1-0", "rate"), ("Esc", "back")]
    } else {
        &[("↑/↓", "chapter"), ("Enter", "read"), ("Esc", "back")]
    };
    draw_footer(f, root[1], hints, notice.as_deref());
}

fn draw_reader(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let Some(reader) = app.reader.as_mut() else {
        return;
    };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);
    let page_area = layout[0];

    reader.scroll.set_viewport(u32::from(page_area.height));

    if reader.loading {
        f.render_widget(placeholder("Loading pages..."), page_area);
    } else if reader.pages.is_empty() {
        f.render_widget(placeholder("This chapter has no pages to show"), page_area);
    } else {
        let current = reader.scroll.current_page();
        draw_cover(f, page_area, reader.images.get_mut(&current));
    }

    if reader.scroll.show_controls() {
        let chapter = reader.chapter().map(|c| c.label()).unwrap_or_default();
        let bar = Line::from(vec![
            Span::styled(" ← Esc ", accent()),
            Span::styled(chapter, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
            Span::styled(format!("  {} pages ", reader.pages.len()), muted()),
        ]);
        let bar_area = Rect::new(page_area.x, page_area.y, page_area.width, 1);
        f.render_widget(Paragraph::new(bar).style(Style::default().bg(Color::Black)), bar_area);
    }

    if reader.scroll.show_scroll_to_top() && reader.scroll.offset() > 0 {
        let hint = " g ↑ top ";
        let width = hint.chars().count() as u16;
        let hint_area = Rect::new(
            page_area.x + page_area.width.saturating_sub(width + 1),
            page_area.y + page_area.height.saturating_sub(1),
            width.min(page_area.width),
            1,
        );
        f.render_widget(Paragraph::new(hint).style(focused()), hint_area);
    }

    let percent = reader.scroll.percent();
    let page_label = if reader.pages.is_empty() {
        String::new()
    } else {
        format!(
            "{}/{}  {:.0}%",
            reader.scroll.current_page() + 1,
            reader.pages.len(),
            percent
        )
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
        .ratio((percent / 100.0).clamp(0.0, 1.0))
        .label(page_label);
    f.render_widget(gauge, layout[1]);
}

fn draw_login(f: &mut Frame, app: &mut App) {
    let area = centered(f.area(), 50, 14);
    let form = &app.login;

    let title = match form.mode {
        LoginMode::Login => "Sign in",
        LoginMode::Register => "Create account",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(accent());
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines = Vec::new();
    for field in form.fields() {
        let (label, value) = match field {
            LoginField::Username => ("Username", form.username.clone()),
            LoginField::Email => ("Email", form.email.clone()),
            LoginField::Password => ("Password", "•".repeat(form.password.chars().count())),
        };
        let style = if *field == form.field { focused() } else { Style::default().fg(Color::White) };
        lines.push(Line::from(vec![
            Span::styled(format!("{label:>9}: "), muted()),
            Span::styled(value, style),
        ]));
        lines.push(Line::from(""));
    }

    if form.submitting {
        lines.push(Line::from(Span::styled("Signing in...", accent())));
    } else if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab: next field  Enter: submit  F2: switch sign in/register  Esc: back",
        muted(),
    )));

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn placeholder(text: &str) -> Paragraph<'_> {
    Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(muted())
}

fn draw_footer(f: &mut Frame, area: Rect, hints: &[(&str, &str)], notice: Option<&str>) {
    let mut spans = Vec::new();
    for (key, action) in hints {
        spans.push(Span::styled(key.to_string(), Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(format!(": {action}  ")));
    }
    if let Some(notice) = notice {
        spans.push(Span::styled(format!("│ {notice}"), accent()));
    }

    let p = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(accent()),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}
