//! Persistent string-keyed storage backed by LMDB.
//!
//! Holds the session (token, cached user, source flag), the mock-mode flag and,
//! when enabled, the fallback collections serialized as JSON arrays. Values are
//! stored as UTF-8 text.

use std::fs;
use std::path::Path;

use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

const MAP_SIZE: usize = 16 * 1024 * 1024;

pub struct LocalStore {
    env: Environment,
    db: Database,
}

impl LocalStore {
    /// Opens (or creates) the store in the `path` directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;

        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(MAP_SIZE)
            .open(path)?;
        let db = env.create_db(None, DatabaseFlags::empty())?;

        info!("Local store opened at {}", path.display());
        Ok(Self { env, db })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => Some(std::str::from_utf8(bytes)?.to_owned()),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.abort();
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        debug!("Stored key {key}");
        Ok(())
    }

    /// Removes every listed key in one write transaction and returns how many existed.
    pub fn remove(&self, keys: &[&str]) -> Result<usize, StoreError> {
        let mut txn = self.env.begin_rw_txn()?;
        let mut removed = 0;
        for key in keys {
            match txn.del(self.db, key, None) {
                Ok(()) => removed += 1,
                Err(lmdb::Error::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        txn.commit()?;
        debug!("Removed {removed} of {} keys", keys.len());
        Ok(removed)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    /// Drops every key and returns how many were stored.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut txn = self.env.begin_rw_txn()?;
        let count = {
            let mut cursor = txn.open_ro_cursor(self.db)?;
            // `iter` walks with MDB_NEXT, which yields nothing on an empty database.
            cursor.iter().count()
        };
        txn.clear_db(self.db)?;
        txn.commit()?;
        info!("Cleared {count} keys from local store");
        Ok(count)
    }
}
