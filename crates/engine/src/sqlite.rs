use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use async_trait::async_trait;
use shared::protocol::{Column, ColumnKind, ColumnValues, QueryResult};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    Column as _, Executor, Pool, Row, Sqlite, TypeInfo, ValueRef,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Engine, QueryError};

/// Engine backed by an SQLite database holding already-processed trace tables.
#[derive(Clone)]
pub struct SqliteEngine {
    pool: Pool<Sqlite>,
}

impl SqliteEngine {
    pub async fn open(database_url: &str) -> Result<Self, QueryError> {
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|error| QueryError::Load(format!("invalid database url: {error}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);

        // Every connection to `sqlite::memory:` is a separate database, so keep exactly one
        // alive for the lifetime of the pool.
        let in_memory = database_url.starts_with("sqlite::memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|error| QueryError::Load(error.to_string()))?;
        Ok(Self { pool })
    }

    /// Writes a trace database payload under `trace_dir` and opens it.
    pub async fn from_trace_bytes(
        trace_dir: &Path,
        name: &str,
        bytes: &[u8],
    ) -> Result<Self, QueryError> {
        tokio::fs::create_dir_all(trace_dir).await.map_err(|error| {
            QueryError::Load(format!(
                "failed to create trace dir '{}': {error}",
                trace_dir.display()
            ))
        })?;

        let path = trace_file_path(trace_dir, name);
        tokio::fs::write(&path, bytes).await.map_err(|error| {
            QueryError::Load(format!(
                "failed to write trace '{}': {error}",
                path.display()
            ))
        })?;
        info!(path = %path.display(), size_bytes = bytes.len(), "engine: trace payload stored");

        let database_url = format!("sqlite://{}", path.to_string_lossy().replace('\\', "/"));
        let engine = Self::open(&database_url).await?;
        engine.health_check().await?;
        Ok(engine)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Fails unless the payload really is a readable database.
    pub async fn health_check(&self) -> Result<(), QueryError> {
        let sql = "SELECT count(*) FROM sqlite_master";
        let _: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| QueryError::Load(format!("trace database unreadable: {error}")))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Engine for SqliteEngine {
    async fn query(&self, sql_text: &str) -> Result<QueryResult, QueryError> {
        let rows = sqlx::query(sql_text)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| QueryError::engine(sql_text, error))?;
        debug!(rows = rows.len(), "engine: query finished");

        if rows.is_empty() {
            return self.empty_result(sql_text).await;
        }
        rows_to_result(&rows)
    }
}

impl SqliteEngine {
    async fn empty_result(&self, sql_text: &str) -> Result<QueryResult, QueryError> {
        let describe = (&self.pool)
            .describe(sql_text)
            .await
            .map_err(|error| QueryError::engine(sql_text, error))?;
        Ok(QueryResult {
            columns: describe
                .columns()
                .iter()
                .map(|column| Column {
                    name: column.name().to_string(),
                    values: ColumnValues::Int(Vec::new()),
                })
                .collect(),
            row_count: 0,
        })
    }
}

fn trace_file_path(trace_dir: &Path, name: &str) -> PathBuf {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(48)
        .collect();
    trace_dir.join(format!("{stem}-{}.db", Uuid::new_v4()))
}

fn rows_to_result(rows: &[SqliteRow]) -> Result<QueryResult, QueryError> {
    let Some(first) = rows.first() else {
        return Ok(QueryResult::default());
    };

    let mut columns = Vec::with_capacity(first.columns().len());
    for (index, column) in first.columns().iter().enumerate() {
        let name = column.name().to_string();
        let kind = column_kind(rows, index, &name)?;
        let values = match kind {
            ColumnKind::Int => ColumnValues::Int(decode_column(rows, index, &name)?),
            ColumnKind::Float => ColumnValues::Float(decode_float_column(rows, index, &name)?),
            ColumnKind::String => ColumnValues::String(decode_column(rows, index, &name)?),
        };
        columns.push(Column { name, values });
    }

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
    })
}

/// SQLite types values, not columns: scan every non-null value. Integers widen to floats
/// when a column mixes the two; any other mix is unsupported.
fn column_kind(rows: &[SqliteRow], index: usize, name: &str) -> Result<ColumnKind, QueryError> {
    let mut kind = None;
    for row in rows {
        let raw = row
            .try_get_raw(index)
            .map_err(|error| QueryError::UnsupportedType {
                column: name.to_string(),
                type_name: error.to_string(),
            })?;
        if raw.is_null() {
            continue;
        }
        let value_kind = match raw.type_info().name() {
            "INTEGER" | "BOOLEAN" => ColumnKind::Int,
            "REAL" => ColumnKind::Float,
            "TEXT" => ColumnKind::String,
            other => {
                return Err(QueryError::UnsupportedType {
                    column: name.to_string(),
                    type_name: other.to_string(),
                })
            }
        };
        kind = Some(match (kind, value_kind) {
            (None, value_kind) => value_kind,
            (Some(ColumnKind::Int), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Int) => ColumnKind::Float,
            (Some(current), value_kind) if current == value_kind => current,
            (Some(current), value_kind) => {
                return Err(QueryError::UnsupportedType {
                    column: name.to_string(),
                    type_name: format!("mixed {current:?} and {value_kind:?} values"),
                })
            }
        });
    }
    Ok(kind.unwrap_or(ColumnKind::Int))
}

/// Float columns may hold integer cells; those are read as `i64` and widened.
fn decode_float_column(
    rows: &[SqliteRow],
    index: usize,
    name: &str,
) -> Result<Vec<Option<f64>>, QueryError> {
    let unsupported = |error: sqlx::Error| QueryError::UnsupportedType {
        column: name.to_string(),
        type_name: error.to_string(),
    };
    rows.iter()
        .map(|row| {
            let raw = row.try_get_raw(index).map_err(unsupported)?;
            if raw.is_null() {
                return Ok(None);
            }
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => row
                    .try_get::<i64, _>(index)
                    .map(|value| Some(value as f64))
                    .map_err(unsupported),
                _ => row.try_get::<f64, _>(index).map(Some).map_err(unsupported),
            }
        })
        .collect()
}

fn decode_column<T>(rows: &[SqliteRow], index: usize, name: &str) -> Result<Vec<Option<T>>, QueryError>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    rows.iter()
        .map(|row| {
            row.try_get::<Option<T>, _>(index)
                .map_err(|error| QueryError::UnsupportedType {
                    column: name.to_string(),
                    type_name: error.to_string(),
                })
        })
        .collect()
}
