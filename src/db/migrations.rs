use crate::pipeline::cost::{DEFAULT_TEXT_MODEL, IMAGE_GENERATION_EFFECT, IMAGE_MODEL};
use anyhow::Result;
use rusqlite::{params, Connection};

/// Bumped whenever a migration step is added below.
pub const SCHEMA_VERSION: i64 = 2;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS operations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original_filename TEXT,
            result_filename TEXT,
            effect TEXT,
            ai_description TEXT,
            tokens_in INTEGER,
            tokens_out INTEGER,
            created_at TEXT,
            model TEXT
        );
        ",
    )?;

    // --- v2: model column (databases created before per-model pricing) ---
    let has_model: bool = conn
        .prepare("SELECT model FROM operations LIMIT 0")
        .is_ok();
    if !has_model {
        tracing::info!("Migrating operations table: adding model column");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch("ALTER TABLE operations ADD COLUMN model TEXT;")?;
        tx.execute(
            "UPDATE operations SET model = ?1 WHERE effect = ?2",
            params![IMAGE_MODEL, IMAGE_GENERATION_EFFECT],
        )?;
        tx.execute(
            "UPDATE operations SET model = ?1 WHERE model IS NULL",
            params![DEFAULT_TEXT_MODEL],
        )?;
        tx.commit()?;
    }

    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(conn: &Connection) -> Vec<String> {
        let mut stmt = conn.prepare("PRAGMA table_info(operations)").unwrap();
        let rows = stmt.query_map([], |row| row.get::<_, String>(1)).unwrap();
        rows.filter_map(|r| r.ok()).collect()
    }

    #[test]
    fn running_twice_keeps_a_single_model_column() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        let cols = columns(&conn);
        assert_eq!(cols.iter().filter(|c| *c == "model").count(), 1);
        assert_eq!(cols.len(), 9);
    }

    #[test]
    fn records_schema_version() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn legacy_rows_are_backfilled() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE operations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                original_filename TEXT,
                result_filename TEXT,
                effect TEXT,
                ai_description TEXT,
                tokens_in INTEGER,
                tokens_out INTEGER,
                created_at TEXT
            );
            INSERT INTO operations (original_filename, result_filename, effect, ai_description, tokens_in, tokens_out, created_at)
                VALUES ('a.png', 'a_sepia_20240101000000.jpg', 'sepia', 'desc', 10, 5, '2024-01-01T00:00:00');
            INSERT INTO operations (original_filename, result_filename, effect, ai_description, tokens_in, tokens_out, created_at)
                VALUES ('a castle', 'DALL-E Cloud Image', 'dall-e-3', 'generated', 0, 0, '2024-01-01T00:00:01');",
        )
        .unwrap();

        run(&conn).unwrap();

        let models: Vec<(String, String)> = conn
            .prepare("SELECT effect, model FROM operations ORDER BY id")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(
            models,
            vec![
                ("sepia".to_string(), "gpt-4o".to_string()),
                ("dall-e-3".to_string(), "dall-e-3".to_string()),
            ]
        );
    }
}
