use crate::schema::*;
use diesel::prelude::*;
use diesel::upsert::excluded;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const MAX_AUTOPOST_TIMES: usize = 6;

static TIME_OF_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid time regex"));

#[derive(Debug, Clone, Queryable, Selectable, Insertable, PartialEq)]
#[diesel(table_name = user_autopost)]
struct AutopostRow {
    user_id: i64,
    /// JSON array of "HH:MM"
    times: String,
}

#[derive(Error, Debug)]
pub enum AutopostError {
    #[error("'{0}' is not a valid HH:MM time")]
    InvalidTime(String),
    #[error("at most {} autopost times are allowed", MAX_AUTOPOST_TIMES)]
    TooMany,
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl From<AutopostError> for crate::errors::AppError {
    fn from(err: AutopostError) -> Self {
        use crate::errors::AppError;
        match err {
            AutopostError::InvalidTime(t) => AppError::invalid_input(
                "time",
                &format!("'{t}' is not a valid time. Use the 24-hour HH:MM format, e.g. 09:30."),
            ),
            AutopostError::TooMany => AppError::invalid_input(
                "time",
                &format!("You can choose at most {MAX_AUTOPOST_TIMES} autopost times."),
            ),
            AutopostError::Database(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadySelected,
}

pub fn is_valid_time(value: &str) -> bool {
    TIME_OF_DAY.is_match(value)
}

/// Validates a complete schedule: every entry must be a 24-hour "HH:MM",
/// duplicates collapse (first occurrence wins) and at most six remain.
pub fn normalize_times<S: AsRef<str>>(times: &[S]) -> Result<Vec<String>, AutopostError> {
    let mut normalized: Vec<String> = Vec::new();
    for time in times {
        let time = time.as_ref().trim();
        if !is_valid_time(time) {
            return Err(AutopostError::InvalidTime(time.to_string()));
        }
        if !normalized.iter().any(|t| t == time) {
            normalized.push(time.to_string());
        }
    }
    if normalized.len() > MAX_AUTOPOST_TIMES {
        return Err(AutopostError::TooMany);
    }
    Ok(normalized)
}

pub struct AutopostSchedule;

impl AutopostSchedule {
    pub fn get(conn: &mut SqliteConnection, user: i64) -> Result<Vec<String>, diesel::result::Error> {
        let row = user_autopost::table
            .find(user)
            .select(AutopostRow::as_select())
            .first(conn)
            .optional()?;
        Ok(row.map(|r| decode_times(r.user_id, &r.times)).unwrap_or_default())
    }

    /// Replaces the whole schedule; an empty list disables autopost.
    pub fn set<S: AsRef<str>>(
        conn: &mut SqliteConnection,
        user: i64,
        times: &[S],
    ) -> Result<Vec<String>, AutopostError> {
        let normalized = normalize_times(times)?;
        let row = AutopostRow {
            user_id: user,
            times: serde_json::to_string(&normalized).unwrap_or_else(|_| "[]".to_string()),
        };
        diesel::insert_into(user_autopost::table)
            .values(&row)
            .on_conflict(user_autopost::user_id)
            .do_update()
            .set(user_autopost::times.eq(excluded(user_autopost::times)))
            .execute(conn)?;
        Ok(normalized)
    }

    /// Adds one time to the schedule. Re-adding a selected time is a no-op.
    pub fn add_time(conn: &mut SqliteConnection, user: i64, time: &str) -> Result<AddOutcome, AutopostError> {
        if !is_valid_time(time) {
            return Err(AutopostError::InvalidTime(time.to_string()));
        }
        let mut times = Self::get(conn, user)?;
        if times.iter().any(|t| t == time) {
            return Ok(AddOutcome::AlreadySelected);
        }
        if times.len() >= MAX_AUTOPOST_TIMES {
            return Err(AutopostError::TooMany);
        }
        times.push(time.to_string());
        times.sort();
        Self::set(conn, user, &times)?;
        Ok(AddOutcome::Added)
    }

    pub fn disable(conn: &mut SqliteConnection, user: i64) -> Result<(), AutopostError> {
        Self::set::<&str>(conn, user, &[])?;
        Ok(())
    }

    /// Every user with a non-empty schedule.
    pub fn all(conn: &mut SqliteConnection) -> Result<Vec<(i64, Vec<String>)>, diesel::result::Error> {
        let rows = user_autopost::table
            .select(AutopostRow::as_select())
            .order(user_autopost::user_id.asc())
            .load(conn)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.user_id, decode_times(r.user_id, &r.times)))
            .filter(|(_, times)| !times.is_empty())
            .collect())
    }

    pub fn count_enabled(conn: &mut SqliteConnection) -> Result<usize, diesel::result::Error> {
        Ok(Self::all(conn)?.len())
    }
}

fn decode_times(user: i64, raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(times) => times,
        Err(e) => {
            log::warn!("Ignoring malformed autopost schedule for {user}: {e}");
            Vec::new()
        }
    }
}
