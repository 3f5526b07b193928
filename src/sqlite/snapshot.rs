use std::io::Write;
use std::os::raw::c_int;
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};

use crate::error::WebSqlError;

const PAGES_PER_STEP: c_int = 256;

/// Serialize the full database behind `conn` into the native `SQLite` file format.
///
/// Uses the online-backup API into a scratch file, so the bytes are a plain database image.
///
/// # Errors
/// Returns `WebSqlError` if the backup or the scratch file I/O fails.
pub fn export(conn: &Connection) -> Result<Vec<u8>, WebSqlError> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("export.sqlite");
    {
        let mut dst = Connection::open(&path)?;
        let backup = Backup::new(conn, &mut dst)?;
        backup.run_to_completion(PAGES_PER_STEP, Duration::ZERO, None)?;
    }
    Ok(std::fs::read(&path)?)
}

/// Replace the contents of `conn` with the database image in `bytes`.
///
/// # Errors
/// Returns `WebSqlError` if the bytes are not a database image or the scratch file I/O fails.
pub fn restore(conn: &mut Connection, bytes: &[u8]) -> Result<(), WebSqlError> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;

    let src = Connection::open_with_flags(file.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let backup = Backup::new(&src, conn)?;
    backup.run_to_completion(PAGES_PER_STEP, Duration::ZERO, None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_restore_round_trip() {
        let source = Connection::open_in_memory().expect("source");
        source
            .execute_batch(
                "CREATE TABLE t (id INTEGER PRIMARY KEY, label TEXT);
                 INSERT INTO t VALUES (1, 'a'), (2, 'b');",
            )
            .expect("seed");
        let bytes = export(&source).expect("export");
        assert!(!bytes.is_empty());

        let mut target = Connection::open_in_memory().expect("target");
        restore(&mut target, &bytes).expect("restore");
        let labels: Vec<String> = target
            .prepare("SELECT label FROM t ORDER BY id")
            .and_then(|mut stmt| {
                stmt.query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()
            })
            .expect("query restored");
        assert_eq!(labels, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn garbage_bytes_do_not_restore() {
        let mut target = Connection::open_in_memory().expect("target");
        let garbage = vec![0x42_u8; 4096];
        assert!(restore(&mut target, &garbage).is_err());
    }
}
