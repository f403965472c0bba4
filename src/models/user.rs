use super::now_ts;
use crate::schema::*;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    /// Telegram chat id
    pub id: i64,
    pub first_seen_at: i64,
}

impl User {
    /// Registers the chat on first contact. Returns `true` for a new user.
    pub fn ensure(conn: &mut SqliteConnection, user_id: i64) -> Result<bool, diesel::result::Error> {
        use crate::schema::users::dsl::{first_seen_at, id, users};
        match diesel::insert_or_ignore_into(users)
            .values((id.eq(user_id), first_seen_at.eq(now_ts())))
            .execute(conn)
        {
            Ok(inserted) => Ok(inserted > 0),
            Err(e) => {
                log::warn!("Error registering user {user_id}: {e:?}");
                Err(e)
            }
        }
    }

    pub fn get_by_id(conn: &mut SqliteConnection, user_id: i64) -> Option<User> {
        use crate::schema::users::dsl::users;
        users
            .find(user_id)
            .select(User::as_select())
            .first(conn)
            .optional()
            .unwrap_or_else(|e| {
                log::warn!("Error getting user: {e:?}");
                None
            })
    }

    pub fn get_all_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>, diesel::result::Error> {
        use crate::schema::users::dsl::{id, users};
        users.select(id).order(id.asc()).load(conn)
    }

    pub fn count(conn: &mut SqliteConnection) -> Result<i64, diesel::result::Error> {
        users::table.count().get_result(conn)
    }

    /// Users with at least one subscription.
    pub fn count_active(conn: &mut SqliteConnection) -> Result<i64, diesel::result::Error> {
        use diesel::dsl::count_distinct;
        subscriptions::table
            .select(count_distinct(subscriptions::user_id))
            .get_result(conn)
    }
}
