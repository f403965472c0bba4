use super::callback::CallbackAction;
use crate::config::LatestScope;
use crate::models::news_item::{DayWindow, NewsItem, NewsScope};
use crate::telegram::{Button, Keyboard, Outgoing};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::SqliteConnection;

/// Navigation buttons under a page of news.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    First,
    Prev,
    Next,
    Last,
}

impl Nav {
    /// Target page for this button, already clamped into `[1, total_pages]`.
    pub fn apply(self, current: i64, total_pages: i64) -> i64 {
        let target = match self {
            Nav::First => 1,
            Nav::Prev => current - 1,
            Nav::Next => current + 1,
            Nav::Last => total_pages,
        };
        clamp_page(target, total_pages)
    }
}

/// Never less than one, so an empty listing is still "page 1 of 1".
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if total <= 0 || page_size <= 0 {
        return 1;
    }
    (total + page_size - 1) / page_size
}

pub fn clamp_page(page: i64, total_pages: i64) -> i64 {
    page.clamp(1, total_pages.max(1))
}

pub fn scope_for(scope: LatestScope, now: DateTime<Utc>, tz: Tz) -> NewsScope {
    match scope {
        LatestScope::Today => NewsScope::Today(DayWindow::containing(now, tz)),
        LatestScope::Unread => NewsScope::Unread,
        LatestScope::All => NewsScope::All,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub items: Vec<NewsItem>,
}

/// Counts the scope, snaps `requested` into range and loads that page.
pub fn load_page(
    conn: &mut SqliteConnection,
    user_id: i64,
    scope: NewsScope,
    requested: i64,
    page_size: i64,
) -> Result<PageView, diesel::result::Error> {
    let total = NewsItem::count_in(conn, user_id, scope)?;
    let total_pages = total_pages(total, page_size);
    let page = clamp_page(requested, total_pages);
    let items = if total == 0 {
        Vec::new()
    } else {
        NewsItem::page_in(conn, user_id, scope, page, page_size)?
    };
    Ok(PageView {
        page,
        total_pages,
        total,
        items,
    })
}

fn heading(scope: NewsScope) -> &'static str {
    match scope {
        NewsScope::Today(_) => "Today's news",
        NewsScope::Unread => "Unread news",
        NewsScope::All | NewsScope::Since(_) => "Latest news",
    }
}

fn empty_text(scope: NewsScope) -> &'static str {
    match scope {
        NewsScope::Today(_) => "🚫 No news for today from your sources yet.",
        NewsScope::Unread => "🚫 No unread news from your sources right now.",
        NewsScope::All | NewsScope::Since(_) => "🚫 No news from your sources yet.",
    }
}

/// One HTML line per item: local time and a linked title.
pub fn news_line(item: &NewsItem, tz: Tz) -> String {
    format!(
        "🕒 {} <a href=\"{}\">{}</a>",
        item.published_at().with_timezone(&tz).format("%d.%m %H:%M"),
        html_escape::encode_double_quoted_attribute(&item.link),
        html_escape::encode_text(&item.title),
    )
}

pub fn render(view: &PageView, scope: NewsScope, tz: Tz) -> Outgoing {
    if view.total == 0 {
        return Outgoing::plain(empty_text(scope));
    }

    let mut text = format!(
        "📰 <b>{}</b>\nPage {}/{}\n\n",
        heading(scope),
        view.page,
        view.total_pages
    );
    let lines: Vec<String> = view.items.iter().map(|item| news_line(item, tz)).collect();
    text.push_str(&lines.join("\n\n"));

    Outgoing::html(text).with_keyboard(nav_keyboard(view.page, view.total_pages))
}

pub fn nav_keyboard(page: i64, total_pages: i64) -> Keyboard {
    let mut row = Vec::new();
    if page > 1 {
        row.push(Button::new("⏮ First", CallbackAction::Latest(Nav::First).encode()));
        row.push(Button::new("◀️ Prev", CallbackAction::Latest(Nav::Prev).encode()));
    }
    if page < total_pages {
        row.push(Button::new("Next ▶️", CallbackAction::Latest(Nav::Next).encode()));
        row.push(Button::new("Last ⏭", CallbackAction::Latest(Nav::Last).encode()));
    }
    Keyboard::default().row(row)
}
