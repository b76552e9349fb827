use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::error::Result;

/// Document identifier -> NUL-separated collection names.
const DOCUMENTS: TableDefinition<&str, &str> = TableDefinition::new("documents");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(redb::Error::from)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(DOCUMENTS)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Document collection filters --

    pub fn set_document_collections(
        &self,
        doc: &str,
        collections: &[String],
    ) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DOCUMENTS)?;
            if collections.is_empty() {
                table.remove(doc)?;
            } else {
                table.insert(doc, collections.join("\0").as_str())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_document_collections(
        &self,
        doc: &str,
    ) -> Result<Option<Vec<String>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        Ok(table.get(doc)?.map(|v| split_names(v.value())))
    }

    pub fn list_document_collections(
        &self,
    ) -> Result<Vec<(String, Vec<String>)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), split_names(v.value())));
        }
        Ok(result)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split('\0').map(str::to_string).collect()
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}
