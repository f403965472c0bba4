use super::source::Source;
use super::user::User;
use crate::schema::*;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable, PartialEq)]
#[diesel(table_name = subscriptions)]
pub struct Subscription {
    pub user_id: i64,
    pub source_url: String,
}

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Source '{0}' not found")]
    SourceNotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl From<SubscriptionError> for crate::errors::AppError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::SourceNotFound(url) => crate::errors::AppError::source_not_found(&url),
            SubscriptionError::Database(e) => e.into(),
        }
    }
}

impl Subscription {
    /// Subscribes the user, registering them if needed. The source must exist.
    /// Returns `true` when a new subscription was created.
    pub fn subscribe(
        conn: &mut SqliteConnection,
        user_id: i64,
        source_url: &str,
    ) -> Result<bool, SubscriptionError> {
        if !Source::exists(conn, source_url)? {
            return Err(SubscriptionError::SourceNotFound(source_url.to_string()));
        }
        User::ensure(conn, user_id)?;

        let sub = Subscription {
            user_id,
            source_url: source_url.to_string(),
        };
        match diesel::insert_or_ignore_into(subscriptions::table)
            .values(&sub)
            .execute(conn)
        {
            Ok(inserted) => Ok(inserted > 0),
            Err(e) => {
                log::warn!("Error inserting subscription: {:?}", e);
                Err(e.into())
            }
        }
    }

    /// Read markers are left in place.
    pub fn unsubscribe(
        conn: &mut SqliteConnection,
        user_id: i64,
        source_url: &str,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::subscriptions::dsl::{source_url as source_col, subscriptions, user_id as user_col};
        match diesel::delete(
            subscriptions
                .filter(user_col.eq(user_id))
                .filter(source_col.eq(source_url)),
        )
        .execute(conn)
        {
            Ok(deleted) => Ok(deleted > 0),
            Err(e) => {
                log::warn!("Error deleting subscription: {:?}", e);
                Err(e)
            }
        }
    }

    /// Flips the subscription state and returns whether the user is now subscribed.
    pub fn toggle(
        conn: &mut SqliteConnection,
        user_id: i64,
        source_url: &str,
    ) -> Result<bool, SubscriptionError> {
        if Subscription::unsubscribe(conn, user_id, source_url)? {
            return Ok(false);
        }
        Subscription::subscribe(conn, user_id, source_url)?;
        Ok(true)
    }

    pub fn list_user_sources(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Vec<String>, diesel::result::Error> {
        use crate::schema::subscriptions::dsl::{source_url, subscriptions, user_id as user_col};
        match subscriptions
            .filter(user_col.eq(user_id))
            .select(source_url)
            .order(source_url.asc())
            .load::<String>(conn)
        {
            Ok(found) => Ok(found),
            Err(e) => {
                log::warn!("Error getting subscriptions: {:?}", e);
                Err(e)
            }
        }
    }

    /// Users subscribed to the source, used for delivery fan-out.
    pub fn subscribers_of(
        conn: &mut SqliteConnection,
        source_url: &str,
    ) -> Result<Vec<i64>, diesel::result::Error> {
        use crate::schema::subscriptions::dsl::{source_url as source_col, subscriptions, user_id};
        subscriptions
            .filter(source_col.eq(source_url))
            .select(user_id)
            .order(user_id.asc())
            .load::<i64>(conn)
    }

    pub fn count_for_user(conn: &mut SqliteConnection, user_id: i64) -> Result<i64, diesel::result::Error> {
        use crate::schema::subscriptions::dsl::{subscriptions, user_id as user_col};
        subscriptions.filter(user_col.eq(user_id)).count().get_result(conn)
    }
}
