use crate::schema::*;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Insertable, PartialEq)]
#[diesel(table_name = sources, primary_key(url))]
pub struct Source {
    pub url: String,
    /// admin who added the source, if known
    pub owner_id: Option<i64>,
}

impl Source {
    /// Returns `true` when the source was not known before.
    pub fn upsert(
        conn: &mut SqliteConnection,
        url: &str,
        owner_id: Option<i64>,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::sources::dsl::{owner_id as owner_col, sources, url as url_col};
        match diesel::insert_or_ignore_into(sources)
            .values((url_col.eq(url), owner_col.eq(owner_id)))
            .execute(conn)
        {
            Ok(inserted) => Ok(inserted > 0),
            Err(e) => {
                log::warn!("Error inserting source {url}: {e:?}");
                Err(e)
            }
        }
    }

    /// Removes the source together with its news and subscriptions.
    /// Returns `true` when a row was deleted.
    pub fn remove(conn: &mut SqliteConnection, url: &str) -> Result<bool, diesel::result::Error> {
        use crate::schema::sources::dsl::{sources, url as url_col};
        match diesel::delete(sources.filter(url_col.eq(url))).execute(conn) {
            Ok(deleted) => Ok(deleted > 0),
            Err(e) => {
                log::warn!("Error deleting source {url}: {e:?}");
                Err(e)
            }
        }
    }

    pub fn list(conn: &mut SqliteConnection) -> Result<Vec<String>, diesel::result::Error> {
        use crate::schema::sources::dsl::{sources, url};
        sources
            .select(url)
            .order(url.asc())
            .load::<String>(conn)
            .inspect_err(|e| log::warn!("Error getting sources: {e:?}"))
    }

    pub fn exists(conn: &mut SqliteConnection, url: &str) -> Result<bool, diesel::result::Error> {
        use crate::schema::sources::dsl::{sources, url as url_col};
        diesel::select(diesel::dsl::exists(sources.filter(url_col.eq(url)))).get_result(conn)
    }

    pub fn get(conn: &mut SqliteConnection, url: &str) -> Option<Source> {
        use crate::schema::sources::dsl::sources;
        match sources.find(url).select(Source::as_select()).first(conn) {
            Ok(source) => Some(source),
            Err(e) => {
                log::info!("Requested source '{}' not found: {:?}", url, e);
                None
            }
        }
    }
}
