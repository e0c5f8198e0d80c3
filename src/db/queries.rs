use crate::models::{OperationRecord, StoredOperation};
use anyhow::Result;
use rusqlite::{params, Connection};

// --- Operations ---
pub fn insert_operation(conn: &Connection, op: &OperationRecord, created_at: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO operations (original_filename, result_filename, effect, ai_description, tokens_in, tokens_out, created_at, model) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            op.original_filename,
            op.result_filename,
            op.effect,
            op.ai_description,
            op.tokens_in,
            op.tokens_out,
            created_at,
            op.model,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_all_operations(conn: &Connection) -> Result<Vec<StoredOperation>> {
    let mut stmt = conn.prepare(
        "SELECT id, original_filename, result_filename, effect, ai_description, tokens_in, tokens_out, created_at, model FROM operations ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(StoredOperation {
            id: row.get(0)?,
            original_filename: row.get(1)?,
            result_filename: row.get(2)?,
            effect: row.get(3)?,
            ai_description: row.get(4)?,
            tokens_in: row.get(5)?,
            tokens_out: row.get(6)?,
            created_at: row.get(7)?,
            model: row.get(8)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_operations(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM operations", [], |row| row.get(0))?;
    Ok(count as usize)
}
