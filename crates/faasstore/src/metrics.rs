use crate::{Store, StoreError};
use chrono::{DateTime, Utc};
use faascore::{MetricsAggregate, MetricsSample, RuntimeKind};
use rusqlite::params;
use std::str::FromStr;

impl Store {
    /// Append one execution sample
    pub fn record_metrics(&self, sample: &MetricsSample) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO metrics
             (function_name, runtime, response_time, error, stdout, stderr,
              memory_usage, cpu_usage, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                sample.function_name,
                sample.runtime.as_str(),
                sample.response_time,
                sample.error as i64,
                sample.stdout,
                sample.stderr,
                sample.memory_usage,
                sample.cpu_usage,
                sample.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent sample for a function, if it was ever executed
    pub fn latest_metrics(&self, function_name: &str) -> Result<Option<MetricsSample>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT function_name, runtime, response_time, error, stdout, stderr,
                    memory_usage, cpu_usage, recorded_at
             FROM metrics WHERE function_name = ?1
             ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![function_name])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let runtime: String = row.get(1)?;
        let error: i64 = row.get(3)?;
        let recorded_at: String = row.get(8)?;
        Ok(Some(MetricsSample {
            function_name: row.get(0)?,
            runtime: RuntimeKind::from_str(&runtime)?,
            response_time: row.get(2)?,
            error: error != 0,
            stdout: row.get(4)?,
            stderr: row.get(5)?,
            memory_usage: row.get(6)?,
            cpu_usage: row.get(7)?,
            recorded_at: parse_timestamp(&recorded_at),
        }))
    }

    /// Averages grouped by (function, runtime) over every recorded sample
    pub fn aggregate_metrics(&self) -> Result<Vec<MetricsAggregate>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT function_name, runtime, AVG(response_time), SUM(error),
                    AVG(memory_usage), AVG(cpu_usage)
             FROM metrics
             GROUP BY function_name, runtime
             ORDER BY function_name, runtime",
        )?;
        let mut rows = stmt.query([])?;
        let mut aggregates = Vec::new();
        while let Some(row) = rows.next()? {
            let runtime: String = row.get(1)?;
            aggregates.push(MetricsAggregate {
                function_name: row.get(0)?,
                runtime: RuntimeKind::from_str(&runtime)?,
                avg_response_time: row.get(2)?,
                error_count: row.get(3)?,
                avg_memory_usage_mb: row.get(4)?,
                avg_cpu_usage_percent: row.get(5)?,
            });
        }
        Ok(aggregates)
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
