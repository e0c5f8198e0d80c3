pub mod migrations;
pub mod queries;

use crate::models::{LogReport, LoggedOperation, OperationRecord};
use crate::pipeline::cost::{calculate_cost, PricingTable, DEFAULT_TEXT_MODEL};
use anyhow::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Append-only log of completed operations.
///
/// Every call opens its own connection and drops it before returning, so no
/// connection outlives a single store operation.
#[derive(Debug, Clone)]
pub struct OperationLog {
    path: PathBuf,
}

impl OperationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the table or bring an older one up to date. Safe to call repeatedly.
    pub fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = open_db(&self.path)?;
        migrations::run(&conn)
    }

    pub fn append(&self, op: &OperationRecord) -> Result<i64> {
        let created_at = op
            .created_at
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string());
        let conn = open_db(&self.path)?;
        queries::insert_operation(&conn, op, &created_at)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = open_db(&self.path)?;
        queries::count_operations(&conn)
    }

    /// All operations, newest first, each priced with `pricing`, plus their sum.
    pub fn list_all(&self, pricing: &PricingTable) -> Result<LogReport> {
        let rows = {
            let conn = open_db(&self.path)?;
            queries::get_all_operations(&conn)?
        };

        let mut total_cost = 0.0;
        let operations = rows
            .into_iter()
            .map(|row| {
                let cost = calculate_cost(&row, pricing);
                total_cost += cost;
                LoggedOperation {
                    id: row.id,
                    created_at: row.created_at.unwrap_or_default(),
                    original_filename: row.original_filename.unwrap_or_default(),
                    result_filename: row.result_filename.unwrap_or_default(),
                    effect: row.effect.unwrap_or_default(),
                    ai_description: row.ai_description.unwrap_or_default(),
                    tokens_in: row.tokens_in.unwrap_or(0),
                    tokens_out: row.tokens_out.unwrap_or(0),
                    model: row
                        .model
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
                    cost,
                }
            })
            .collect();

        Ok(LogReport {
            operations,
            total_cost,
        })
    }
}
