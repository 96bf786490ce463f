//! Typed query facade over the trace-processing engine.

use async_trait::async_trait;
use shared::{domain::TimeSpan, protocol::QueryResult};

pub mod error;
mod remote_engine;
mod sqlite;
mod worker;

pub use error::QueryError;
pub use remote_engine::RemoteEngine;
pub use sqlite::SqliteEngine;
pub use worker::{spawn_engine_worker, EngineWorker};

pub const SLICES_TABLE: &str = "slices";
pub const SCHED_TABLE: &str = "sched";

#[async_trait]
pub trait Engine: Send + Sync {
    /// Sends one SQL statement to the engine.
    ///
    /// Independent queries may be in flight together and may resolve in any order.
    async fn query(&self, sql_text: &str) -> Result<QueryResult, QueryError>;

    /// First row of the result, every column read as a number.
    async fn query_scalar(&self, sql_text: &str) -> Result<Vec<f64>, QueryError> {
        let result = self.query(sql_text).await?;
        if result.is_empty() {
            return Err(QueryError::EmptyResult {
                sql: sql_text.to_string(),
            });
        }
        Ok((0..result.columns.len())
            .map(|column| result.number(column, 0).unwrap_or(f64::NAN))
            .collect())
    }

    async fn get_number_of_cpus(&self) -> Result<i64, QueryError> {
        let sql = "select count(distinct(cpu)) as cpu_count from sched;";
        first_scalar(self.query_scalar(sql).await?, sql).map(|count| count as i64)
    }

    async fn get_number_of_processes(&self) -> Result<i64, QueryError> {
        let sql = "select count(distinct(upid)) from thread;";
        first_scalar(self.query_scalar(sql).await?, sql).map(|count| count as i64)
    }

    /// Earliest and latest event timestamps across `slices` and `sched`, in seconds.
    ///
    /// Empty tables do not contribute; if neither has rows the span is
    /// [`TimeSpan::unbounded`].
    async fn get_trace_time_bounds(&self) -> Result<TimeSpan, QueryError> {
        let counts_sql = format!(
            "select (select count(ts) from {SLICES_TABLE}), (select count(ts) from {SCHED_TABLE})"
        );
        let counts = self.query_scalar(&counts_sql).await?;
        let num_slices = counts.first().copied().unwrap_or(0.0);
        let num_sched = counts.get(1).copied().unwrap_or(0.0);

        let mut start = f64::INFINITY;
        let mut end = f64::NEG_INFINITY;
        for (table, rows) in [(SLICES_TABLE, num_slices), (SCHED_TABLE, num_sched)] {
            if rows > 0.0 {
                let first_sql = format!("select ts from {table} order by ts limit 1");
                let last_sql = format!("select ts from {table} order by ts desc limit 1");
                let first = first_scalar(self.query_scalar(&first_sql).await?, &first_sql)?;
                let last = first_scalar(self.query_scalar(&last_sql).await?, &last_sql)?;
                start = start.min(first);
                end = end.max(last);
            }
        }
        Ok(TimeSpan::from_nanos(start, end))
    }
}

fn first_scalar(row: Vec<f64>, sql: &str) -> Result<f64, QueryError> {
    row.first().copied().ok_or_else(|| QueryError::EmptyResult {
        sql: sql.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
