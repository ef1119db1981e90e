//! Membership store discovery and access.
//!
//! Each store is one community's `db.sqlite`, opened read-only at startup
//! and queried for single rows by user id. The set of stores never changes
//! for the lifetime of the process.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{info, warn};

use crate::{domain::UserId, errors::Error, Result};

/// File name every store uses for its table.
const STORE_FILE: &str = "db.sqlite";

/// Columns fetched for one membership row.
const USER_COLUMNS: &str =
    "realname, rank, joined, left, lastActive, cooldownUntil, blacklistReason";

/// Stores keyed by name; the BTreeMap keeps lookup order deterministic.
pub type StoreMap = BTreeMap<String, Store>;

/// One row of a store's `users` table.
#[derive(Clone, Debug, PartialEq)]
pub struct MembershipRecord {
    pub realname: String,
    pub rank: i64,
    pub joined: NaiveDateTime,
    pub left: Option<NaiveDateTime>,
    pub last_active: Option<NaiveDateTime>,
    pub cooldown_until: Option<NaiveDateTime>,
    pub blacklist_reason: Option<String>,
}

impl MembershipRecord {
    /// A placeholder row exists only to be referenced by other tables and
    /// carries no real membership data: empty name and a leave time equal
    /// to the Unix epoch. The epoch comparison is exact; a null leave time
    /// does not qualify.
    pub fn is_placeholder(&self) -> bool {
        self.realname.is_empty() && self.left == Some(epoch())
    }
}

fn epoch() -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc()
}

/// Read-only handle to one community database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fetch the membership row for `id`, or `None` if this store has no
    /// row for that user.
    pub fn get_user(&self, id: UserId) -> Result<Option<MembershipRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        self.read(|conn| {
            conn.query_row(&sql, params![id.0], |row| {
                Ok(MembershipRecord {
                    realname: row.get("realname")?,
                    rank: row.get("rank")?,
                    joined: row.get("joined")?,
                    left: row.get("left")?,
                    last_active: row.get("lastActive")?,
                    cooldown_until: row.get("cooldownUntil")?,
                    blacklist_reason: row.get("blacklistReason")?,
                })
            })
            .optional()
        })
    }

    /// Run a read, retrying for as long as the database reports the
    /// transient locked condition. Any other storage error propagates.
    fn read<T>(&self, op: impl Fn(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        let mut attempt = 1u32;
        loop {
            match op(&conn) {
                Err(e) if is_locked(&e) => {
                    if attempt == 1 {
                        warn!("database read blocked by lock, retrying");
                    } else {
                        warn!("database read blocked by lock, retrying ({attempt})");
                    }
                    attempt += 1;
                }
                other => return other.map_err(Error::from),
            }
        }
    }
}

fn is_locked(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

/// Find every store under `root`: either a single table file directly in
/// `root` (registered as `default`) or one per subdirectory containing a
/// table file (named after the subdirectory).
pub fn detect_store_paths(root: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut found = BTreeMap::new();

    let single = root.join(STORE_FILE);
    if single.is_file() {
        found.insert("default".to_string(), single);
        return Ok(found);
    }

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path().join(STORE_FILE);
        if path.exists() {
            found.insert(entry.file_name().to_string_lossy().into_owned(), path);
        }
    }
    Ok(found)
}

/// Open every discovered store. Finding none is fatal for the caller: the
/// bot has no useful behavior without data.
pub fn detect_stores(root: &Path) -> Result<StoreMap> {
    let paths = detect_store_paths(root)?;
    if paths.is_empty() {
        return Err(Error::Config(format!(
            "no database(s) detected under {}",
            root.display()
        )));
    }

    info!(
        "Detected {} database{}: {}",
        paths.len(),
        if paths.len() > 1 { "s" } else { "" },
        paths.keys().cloned().collect::<Vec<_>>().join(", ")
    );

    let mut stores = BTreeMap::new();
    for (name, path) in paths {
        stores.insert(name, Store::open(&path)?);
    }
    Ok(stores)
}
