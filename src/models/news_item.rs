use crate::feed::NormalizedItem;
use crate::models::purged_link::PurgedLink;
use crate::schema::*;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = news, primary_key(link))]
pub struct NewsItem {
    pub link: String,
    pub title: String,
    /// Unix seconds; never null, ingestion substitutes the fetch time
    pub pub_date: i64,
    pub source_url: String,
}

impl NewsItem {
    pub fn published_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.pub_date, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = news)]
pub struct NewNewsItem<'a> {
    pub link: &'a str,
    pub title: &'a str,
    pub pub_date: i64,
    pub source_url: &'a str,
}

impl<'a> NewNewsItem<'a> {
    pub fn from_normalized(item: &'a NormalizedItem, source_url: &'a str) -> Self {
        NewNewsItem {
            link: &item.link,
            title: &item.title,
            pub_date: item.published_at.timestamp(),
            source_url,
        }
    }

    /// Inserts the item unless its link is already stored. Returns `true` when
    /// a row was created, so callers can fan out only genuinely new items.
    pub fn ingest(&self, conn: &mut SqliteConnection) -> Result<bool, diesel::result::Error> {
        match diesel::insert_or_ignore_into(news::table)
            .values(self)
            .execute(conn)
        {
            Ok(inserted) => Ok(inserted > 0),
            Err(e) => {
                log::warn!("Error inserting news item {}: {e:?}", self.link);
                Err(e)
            }
        }
    }
}

/// Half-open `[start, end)` range covering one calendar day in a timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn containing(now: DateTime<Utc>, tz: Tz) -> Self {
        let today = now.with_timezone(&tz).date_naive();
        let tomorrow = today.succ_opt().unwrap_or(today);
        DayWindow {
            start: local_midnight(today, tz),
            end: local_midnight(tomorrow, tz),
        }
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    // midnight can fall into a DST gap in a handful of zones
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Which of a user's items a listing covers. Every scope is restricted to the
/// user's current subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsScope {
    Today(DayWindow),
    Unread,
    All,
    Since(DateTime<Utc>),
}

fn scoped_query(user_id: i64, scope: NewsScope) -> news::BoxedQuery<'static, Sqlite> {
    let subscribed = subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .select(subscriptions::source_url);
    let query = news::table
        .filter(news::source_url.eq_any(subscribed))
        .into_boxed();

    match scope {
        NewsScope::Today(window) => query
            .filter(news::pub_date.ge(window.start.timestamp()))
            .filter(news::pub_date.lt(window.end.timestamp())),
        NewsScope::Unread => {
            let read = user_read_news::table
                .filter(user_read_news::user_id.eq(user_id))
                .select(user_read_news::news_id);
            query.filter(news::link.ne_all(read))
        }
        NewsScope::All => query,
        NewsScope::Since(since) => query.filter(news::pub_date.ge(since.timestamp())),
    }
}

impl NewsItem {
    pub fn count_in(
        conn: &mut SqliteConnection,
        user_id: i64,
        scope: NewsScope,
    ) -> Result<i64, diesel::result::Error> {
        scoped_query(user_id, scope).count().get_result(conn)
    }

    /// One page (1-based) of the scope, newest first; ties break on link so
    /// pages stay stable between requests.
    pub fn page_in(
        conn: &mut SqliteConnection,
        user_id: i64,
        scope: NewsScope,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<NewsItem>, diesel::result::Error> {
        let offset = (page.max(1) - 1) * page_size;
        Self::load_in(conn, user_id, scope, Some((page_size, offset)))
    }

    fn load_in(
        conn: &mut SqliteConnection,
        user_id: i64,
        scope: NewsScope,
        window: Option<(i64, i64)>,
    ) -> Result<Vec<NewsItem>, diesel::result::Error> {
        let mut query = scoped_query(user_id, scope)
            .select(NewsItem::as_select())
            .order((news::pub_date.desc(), news::link.asc()));
        if let Some((limit, offset)) = window {
            query = query.limit(limit).offset(offset);
        }
        match query.load(conn) {
            Ok(items) => Ok(items),
            Err(e) => {
                log::warn!("Error getting news for user {user_id}: {e:?}");
                Err(e)
            }
        }
    }

    pub fn unread_for(
        conn: &mut SqliteConnection,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<NewsItem>, diesel::result::Error> {
        Self::load_in(conn, user_id, NewsScope::Unread, Some((limit, 0)))
    }

    pub fn today_count_for(
        conn: &mut SqliteConnection,
        user_id: i64,
        window: DayWindow,
    ) -> Result<i64, diesel::result::Error> {
        Self::count_in(conn, user_id, NewsScope::Today(window))
    }

    pub fn today_page(
        conn: &mut SqliteConnection,
        user_id: i64,
        window: DayWindow,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<NewsItem>, diesel::result::Error> {
        Self::page_in(conn, user_id, NewsScope::Today(window), page, page_size)
    }

    pub fn recent_since(
        conn: &mut SqliteConnection,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>, diesel::result::Error> {
        Self::load_in(conn, user_id, NewsScope::Since(since), None)
    }

    pub fn get_by_link(conn: &mut SqliteConnection, link: &str) -> Option<NewsItem> {
        news::table
            .find(link)
            .select(NewsItem::as_select())
            .first(conn)
            .optional()
            .unwrap_or_else(|e| {
                log::warn!("Error getting news item: {e:?}");
                None
            })
    }

    /// Deletes items published before `cutoff`; read markers go with them.
    /// The deleted links are remembered as purged at `now`.
    pub fn purge_older_than(
        conn: &mut SqliteConnection,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, diesel::result::Error> {
        conn.transaction(|conn| {
            let links: Vec<String> = news::table
                .filter(news::pub_date.lt(cutoff.timestamp()))
                .select(news::link)
                .load(conn)?;
            PurgedLink::remember(conn, &links, now)?;
            diesel::delete(news::table.filter(news::pub_date.lt(cutoff.timestamp()))).execute(conn)
        })
    }
}
