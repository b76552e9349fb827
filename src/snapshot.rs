//! Private, read-consistent copies of the live stores.
//!
//! The reference manager keeps its database locked while running, so every
//! read goes through a copy in the data directory. A copy is refreshed only
//! when the source is newer than it.

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::{config::StorePaths, data_dir::DataDir, error::Result};

/// Schema name the citation-key store is attached under.
pub const KEY_STORE_SCHEMA: &str = "betterbibtex";

/// Last modification time of `path`.
pub fn modified(path: &Path) -> Result<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}

/// Copy `source` to `copy` if the source is newer or the copy is absent.
///
/// The copy is written next to its destination and renamed into place, so
/// a reader never opens a half-written file. Returns the copy's path.
pub fn refresh(source: &Path, copy: &Path) -> Result<PathBuf> {
    let source_time = modified(source)?;
    let copy_time = match std::fs::metadata(copy) {
        Ok(meta) => Some(meta.modified()?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    if copy_time.is_none_or(|t| source_time > t) {
        let partial = copy.with_extension("partial");
        std::fs::copy(source, &partial)?;
        std::fs::rename(&partial, copy)?;
        debug!(
            source = %source.display(),
            copy = %copy.display(),
            "refreshed snapshot"
        );
    }

    Ok(copy.to_path_buf())
}

fn open_read_only(path: &Path) -> Result<Connection> {
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}

/// Refresh the primary store's copy and open it.
pub fn open_primary(
    data_dir: &DataDir,
    paths: &StorePaths,
) -> Result<Connection> {
    let copy = refresh(&paths.zotero, &data_dir.zotero_snapshot())?;
    open_read_only(&copy)
}

/// Refresh both copies, open the primary one and attach the key store as
/// [`KEY_STORE_SCHEMA`].
pub fn open_library(
    data_dir: &DataDir,
    paths: &StorePaths,
) -> Result<Connection> {
    let conn = open_primary(data_dir, paths)?;
    let keys = refresh(&paths.better_bibtex, &data_dir.bbt_snapshot())?;
    attach_key_store(&conn, &keys)?;
    Ok(conn)
}

pub(crate) fn attach_key_store(conn: &Connection, path: &Path) -> Result<()> {
    conn.execute(
        &format!("ATTACH DATABASE ?1 AS {KEY_STORE_SCHEMA}"),
        [path.to_string_lossy().into_owned()],
    )?;
    Ok(())
}
