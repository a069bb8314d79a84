//! LanceDB connection and housekeeping helpers.
//!
//! Database open, error mapping into the crate-wide taxonomy, and a small
//! key/value `meta` table holding vector index definitions.

use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::{ArrowError, Schema};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::sync::Arc;

use bookdb_core::{Error, Result};

use crate::schema::build_meta_schema;

pub const META_TABLE: &str = "meta";

/// Map a store error: missing tables are a missing index, transport
/// failures are transient, everything else is a backend fault.
pub fn lance_err(e: lancedb::Error) -> Error {
    if let lancedb::Error::TableNotFound { .. } = e {
        return Error::IndexNotFound(e.to_string());
    }
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if ["connection", "timed out", "timeout", "broken pipe", "unavailable"].iter().any(|s| lower.contains(s)) {
        Error::Unavailable(msg)
    } else {
        Error::Backend(msg)
    }
}

pub fn arrow_err(e: ArrowError) -> Error {
    Error::Backend(format!("arrow: {e}"))
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(lance_err)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(lance_err)?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
    conn.create_table(name, Box::new(iter)).execute().await.map_err(lance_err)?;
    Ok(())
}

pub async fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    ensure_table(conn, META_TABLE, build_meta_schema()).await?;
    let t = conn.open_table(META_TABLE).execute().await.map_err(lance_err)?;
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key.to_string()])),
            Arc::new(StringArray::from(vec![value.to_string()])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ],
    )
    .map_err(arrow_err)?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    let mut mi = t.merge_insert(&["key"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    mi.execute(reader).await.map_err(lance_err)?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, META_TABLE).await? {
        return Ok(None);
    }
    let t = conn.open_table(META_TABLE).execute().await.map_err(lance_err)?;
    let mut stream = t
        .query()
        .only_if(format!("key = {}", sql_quote(key)))
        .execute()
        .await
        .map_err(lance_err)?;
    while let Some(batch) = stream.try_next().await.map_err(lance_err)? {
        if batch.num_rows() == 0 {
            continue;
        }
        let val = batch
            .column_by_name("value")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::Backend("meta.value column missing".into()))?;
        return Ok(Some(val.value(0).to_string()));
    }
    Ok(None)
}

pub async fn delete_meta(conn: &Connection, key: &str) -> Result<()> {
    if !table_exists(conn, META_TABLE).await? {
        return Ok(());
    }
    let t = conn.open_table(META_TABLE).execute().await.map_err(lance_err)?;
    t.delete(&format!("key = {}", sql_quote(key))).await.map_err(lance_err)?;
    Ok(())
}

pub fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(sql_quote("it's"), "'it''s'");
    }

    #[tokio::test]
    async fn meta_round_trips_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let conn = open_db(&tmp.path().to_string_lossy()).await.unwrap();
        assert_eq!(get_meta(&conn, "k").await.unwrap(), None);
        set_meta(&conn, "k", "v1").await.unwrap();
        set_meta(&conn, "k", "v2").await.unwrap();
        assert_eq!(get_meta(&conn, "k").await.unwrap().as_deref(), Some("v2"));
    }
}
