use crate::schema::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;

/// Tombstone for a news link removed by the retention sweep. Feeds without
/// dates report every item as new on each fetch, so ingestion consults these
/// before storing a link again.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, PartialEq)]
#[diesel(table_name = purged_links)]
pub struct PurgedLink {
    pub link: String,
    pub last_seen_at: i64,
}

impl PurgedLink {
    pub fn remember(
        conn: &mut SqliteConnection,
        links: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), diesel::result::Error> {
        for link in links {
            diesel::insert_into(purged_links::table)
                .values((purged_links::link.eq(link), purged_links::last_seen_at.eq(at.timestamp())))
                .on_conflict(purged_links::link)
                .do_update()
                .set(purged_links::last_seen_at.eq(excluded(purged_links::last_seen_at)))
                .execute(conn)?;
        }
        Ok(())
    }

    /// `true` when `link` was purged before; its tombstone is kept alive.
    pub fn seen_again(
        conn: &mut SqliteConnection,
        link: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, diesel::result::Error> {
        let updated = diesel::update(purged_links::table.find(link))
            .set(purged_links::last_seen_at.eq(at.timestamp()))
            .execute(conn)?;
        Ok(updated > 0)
    }

    /// Forgets tombstones no feed has listed since `cutoff`.
    pub fn forget_unseen_since(
        conn: &mut SqliteConnection,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, diesel::result::Error> {
        diesel::delete(purged_links::table.filter(purged_links::last_seen_at.lt(cutoff.timestamp())))
            .execute(conn)
    }
}
