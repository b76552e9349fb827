//! The in-memory reference index.
//!
//! Built wholesale from a snapshot connection (primary store with the key
//! store attached as `betterbibtex`) by a fixed sequence of joins. There is
//! no incremental update: a stale index is replaced by a fresh build.

use std::collections::{BTreeMap, btree_map::Entry};

use rusqlite::{Connection, types::ValueRef};
use tracing::debug;

use crate::{
    error::Result,
    reference::{Creator, CreatorRole, ItemId, Reference},
};

/// Collection listed ahead of all others for an item.
pub const TO_READ: &str = "To Read";

const COLLECTION_NAMES_SQL: &str = "
    SELECT collectionName FROM collections";

const COLLECTION_ITEMS_SQL: &str = "
    SELECT collectionItems.itemID, collections.collectionName
    FROM collectionItems
    JOIN collections
        ON collections.collectionID = collectionItems.collectionID
    ORDER BY collections.collectionName != 'To Read',
        collections.collectionName,
        collectionItems.orderIndex,
        collectionItems.itemID";

const FIELDS_SQL: &str = "
    SELECT items.itemID, items.key, fields.fieldName, itemDataValues.value,
        ck.citationKey
    FROM items
    JOIN itemData ON itemData.itemID = items.itemID
    JOIN fields ON fields.fieldID = itemData.fieldID
    JOIN itemDataValues ON itemDataValues.valueID = itemData.valueID
    LEFT JOIN betterbibtex.citationkey AS ck ON ck.itemKey = items.key
    ORDER BY items.itemID";

const CREATORS_SQL: &str = "
    SELECT itemCreators.itemID, creatorTypes.creatorType,
        creators.lastName, creators.firstName
    FROM itemCreators
    JOIN creators ON creators.creatorID = itemCreators.creatorID
    JOIN creatorTypes
        ON creatorTypes.creatorTypeID = itemCreators.creatorTypeID
    ORDER BY itemCreators.itemID, itemCreators.orderIndex";

const TYPES_SQL: &str = "
    SELECT items.itemID, itemTypes.typeName
    FROM items
    JOIN itemTypes ON itemTypes.itemTypeID = items.itemTypeID";

const ATTACHMENTS_SQL: &str = "
    SELECT items.key, itemAttachments.parentItemID, itemAttachments.path
    FROM itemAttachments
    JOIN items ON items.itemID = itemAttachments.itemID
    ORDER BY itemAttachments.itemID";

const DELETED_SQL: &str = "SELECT itemID FROM deletedItems";

/// Every live, non-attachment item of the library, plus its collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    references: BTreeMap<ItemId, Reference>,
    collections: BTreeMap<String, Vec<ItemId>>,
}

impl ReferenceIndex {
    /// Run the full build against an open snapshot.
    pub fn build(conn: &Connection) -> Result<Self> {
        let mut index = Self::default();
        index.load_collections(conn)?;
        index.load_fields(conn)?;
        index.load_creators(conn)?;
        index.load_types(conn)?;
        index.load_attachments(conn)?;
        index.derive_years();
        index.sweep_deleted(conn)?;

        debug!(
            references = index.references.len(),
            collections = index.collections.len(),
            "built reference index"
        );
        Ok(index)
    }

    fn load_collections(&mut self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(COLLECTION_NAMES_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            self.collections.entry(row.get(0)?).or_default();
        }

        let mut stmt = conn.prepare(COLLECTION_ITEMS_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let item: ItemId = row.get(0)?;
            let name: String = row.get(1)?;
            self.collections.entry(name).or_default().push(item);
        }
        Ok(())
    }

    fn load_fields(&mut self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(FIELDS_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let item: ItemId = row.get(0)?;
            let reference = match self.references.entry(item) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let stable_key: String = row.get(1)?;
                    let citation_key: Option<String> = row.get(4)?;
                    entry.insert(Reference::new(item, stable_key, citation_key))
                }
            };

            let field: String = row.get(2)?;
            if let Some(value) = value_text(row.get_ref(3)?) {
                reference.set_field(&field, value);
            }
        }
        Ok(())
    }

    fn load_creators(&mut self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(CREATORS_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let item: ItemId = row.get(0)?;
            let Some(reference) = self.references.get_mut(&item) else {
                continue;
            };
            let role: String = row.get(1)?;
            let creator = Creator {
                last_name: row
                    .get::<_, Option<String>>(2)?
                    .unwrap_or_default(),
                first_name: row
                    .get::<_, Option<String>>(3)?
                    .unwrap_or_default(),
            };
            reference.add_creator(CreatorRole::parse(&role), creator);
        }
        Ok(())
    }

    fn load_types(&mut self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(TYPES_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let item: ItemId = row.get(0)?;
            let type_name: String = row.get(1)?;
            if type_name == "attachment" {
                self.references.remove(&item);
            } else if let Some(reference) = self.references.get_mut(&item) {
                reference.item_type = Some(type_name);
            }
        }
        Ok(())
    }

    fn load_attachments(&mut self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(ATTACHMENTS_SQL)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let key: Option<String> = row.get(0)?;
            let parent: Option<ItemId> = row.get(1)?;
            let path: Option<String> = row.get(2)?;
            let (Some(key), Some(parent), Some(path)) = (key, parent, path)
            else {
                continue;
            };
            if let Some(reference) = self.references.get_mut(&parent) {
                reference.attachments.push(format!("{key}:{path}"));
            }
        }
        Ok(())
    }

    fn derive_years(&mut self) {
        for reference in self.references.values_mut() {
            reference.derive_year();
        }
    }

    fn sweep_deleted(&mut self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(DELETED_SQL)?;
        let deleted = stmt
            .query_map([], |row| row.get::<_, ItemId>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for item in &deleted {
            self.references.remove(item);
        }
        for members in self.collections.values_mut() {
            members.retain(|item| !deleted.contains(item));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// All records in index order.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    pub fn get(&self, item: ItemId) -> Option<&Reference> {
        self.references.get(&item)
    }

    pub fn collections(&self) -> &BTreeMap<String, Vec<ItemId>> {
        &self.collections
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn collection(&self, name: &str) -> Option<&[ItemId]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    /// Names of the collections containing `item`, "To Read" first, then
    /// alphabetical.
    pub fn collections_of(&self, item: ItemId) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .collections
            .iter()
            .filter(|(_, members)| members.contains(&item))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_by_key(|name| (*name != TO_READ, *name));
        names
    }
}

fn value_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
