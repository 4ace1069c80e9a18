//! PRAGMA configuration applied to the live connection.
//!
//! temp_store=MEMORY, 64MB cache, NORMAL sync, MEMORY journal (the live
//! database is a volatile image; durability is the snapshot layer),
//! foreign_keys ON for the queue cascade, 5s busy_timeout.

use rusqlite::Connection;

use localretrieve_core::config::SqlConfig;
use localretrieve_core::errors::RetrieveResult;

use crate::map_sqlite_err;

/// Apply connection pragmas, fixed order.
pub fn apply_pragmas(conn: &Connection, config: &SqlConfig) -> RetrieveResult<()> {
    let cache_size = -(config.cache_size_kib as i64);
    let journal_mode = match config.journal_mode.as_str() {
        "wal" => "WAL",
        _ => "MEMORY",
    };
    conn.execute_batch(&format!(
        "
        PRAGMA temp_store = MEMORY;
        PRAGMA cache_size = {cache_size};
        PRAGMA synchronous = NORMAL;
        PRAGMA journal_mode = {journal_mode};
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        "
    ))
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Current image size in bytes (`page_count * page_size`).
pub fn image_size(conn: &Connection) -> RetrieveResult<u64> {
    let page_count: i64 = conn
        .pragma_query_value(None, "page_count", |row| row.get(0))
        .map_err(map_sqlite_err)?;
    let page_size: i64 = conn
        .pragma_query_value(None, "page_size", |row| row.get(0))
        .map_err(map_sqlite_err)?;
    Ok((page_count as u64) * (page_size as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pragmas_apply_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn, &SqlConfig::default()).unwrap();
        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn image_size_is_page_aligned() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t(x); INSERT INTO t VALUES (1);")
            .unwrap();
        let size = image_size(&conn).unwrap();
        assert!(size > 0);
        assert_eq!(size % 512, 0);
    }
}
