use crate::schema::*;
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, PartialEq)]
#[diesel(table_name = user_read_news)]
pub struct ReadMarker {
    pub user_id: i64,
    /// link of the news item
    pub news_id: String,
}

impl ReadMarker {
    /// Idempotent; returns `true` when the marker is new.
    pub fn mark_read(conn: &mut SqliteConnection, user_id: i64, link: &str) -> Result<bool, diesel::result::Error> {
        use crate::schema::user_read_news::dsl::{news_id, user_id as user_col, user_read_news};
        match diesel::insert_or_ignore_into(user_read_news)
            .values((user_col.eq(user_id), news_id.eq(link)))
            .execute(conn)
        {
            Ok(inserted) => Ok(inserted > 0),
            Err(e) => {
                log::warn!("Error marking {link} read for {user_id}: {e:?}");
                Err(e)
            }
        }
    }

    pub fn is_read(conn: &mut SqliteConnection, user_id: i64, link: &str) -> Result<bool, diesel::result::Error> {
        use crate::schema::user_read_news::dsl::{news_id, user_id as user_col, user_read_news};
        diesel::select(diesel::dsl::exists(
            user_read_news.filter(user_col.eq(user_id)).filter(news_id.eq(link)),
        ))
        .get_result(conn)
    }
}
