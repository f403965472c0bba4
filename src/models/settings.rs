use crate::schema::*;
use diesel::prelude::*;
use diesel::upsert::excluded;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LAST_INGEST_AT: &str = "ingest.last_cycle_at";
pub const LAST_RETENTION_SWEEP_AT: &str = "retention.last_sweep_at";

#[derive(Debug, Serialize, Deserialize, Queryable, Selectable, Insertable, Identifiable, PartialEq)]
#[diesel(table_name = settings, primary_key(key))]
pub struct Setting {
    pub key: String,
    pub value: String,
}

impl Setting {
    pub fn set(conn: &mut SqliteConnection, key: &str, value: &str) -> Result<(), diesel::result::Error> {
        diesel::insert_into(settings::table)
            .values((settings::key.eq(key), settings::value.eq(value)))
            .on_conflict(settings::key)
            .do_update()
            .set(settings::value.eq(excluded(settings::value)))
            .execute(conn)
            .map(|_| ())
            .inspect_err(|e| log::warn!("Error saving setting '{key}': {e:?}"))
    }

    pub fn get(conn: &mut SqliteConnection, key: &str) -> Result<Option<String>, diesel::result::Error> {
        settings::table
            .find(key)
            .select(settings::value)
            .first::<String>(conn)
            .optional()
    }

    pub fn all(conn: &mut SqliteConnection) -> Result<BTreeMap<String, String>, diesel::result::Error> {
        let rows = settings::table.select(Setting::as_select()).load(conn)?;
        Ok(rows.into_iter().map(|s| (s.key, s.value)).collect())
    }

    /// Reads a setting holding Unix seconds.
    pub fn get_timestamp(conn: &mut SqliteConnection, key: &str) -> Result<Option<i64>, diesel::result::Error> {
        Ok(Self::get(conn, key)?.and_then(|v| v.parse().ok()))
    }

    pub fn set_timestamp(conn: &mut SqliteConnection, key: &str, ts: i64) -> Result<(), diesel::result::Error> {
        Self::set(conn, key, &ts.to_string())
    }
}
