//! Miniature reference library for unit tests.

use std::path::PathBuf;

use rusqlite::{Connection, OptionalExtension, params};

use crate::{config::StorePaths, snapshot};

const ZOTERO_SCHEMA: &str = "
    CREATE TABLE itemTypes (
        itemTypeID INTEGER PRIMARY KEY, typeName TEXT NOT NULL UNIQUE);
    CREATE TABLE items (
        itemID INTEGER PRIMARY KEY, itemTypeID INT NOT NULL,
        key TEXT NOT NULL UNIQUE);
    CREATE TABLE fields (
        fieldID INTEGER PRIMARY KEY, fieldName TEXT NOT NULL UNIQUE);
    CREATE TABLE itemDataValues (valueID INTEGER PRIMARY KEY, value UNIQUE);
    CREATE TABLE itemData (itemID INT, fieldID INT, valueID INT);
    CREATE TABLE creators (
        creatorID INTEGER PRIMARY KEY, firstName TEXT, lastName TEXT);
    CREATE TABLE creatorTypes (
        creatorTypeID INTEGER PRIMARY KEY, creatorType TEXT NOT NULL UNIQUE);
    CREATE TABLE itemCreators (
        itemID INT, creatorID INT, creatorTypeID INT, orderIndex INT);
    CREATE TABLE collections (
        collectionID INTEGER PRIMARY KEY, collectionName TEXT NOT NULL);
    CREATE TABLE collectionItems (
        collectionID INT, itemID INT, orderIndex INT DEFAULT 0);
    CREATE TABLE itemAttachments (
        itemID INTEGER PRIMARY KEY, parentItemID INT, path TEXT);
    CREATE TABLE itemAnnotations (
        itemID INTEGER PRIMARY KEY, parentItemID INT NOT NULL, type INT,
        authorName TEXT, text TEXT, comment TEXT, pageLabel TEXT,
        sortIndex TEXT);
    CREATE TABLE itemNotes (
        itemID INTEGER PRIMARY KEY, parentItemID INT, note TEXT, title TEXT);
    CREATE TABLE deletedItems (itemID INTEGER PRIMARY KEY);
";

const BBT_SCHEMA: &str = "
    CREATE TABLE citationkey (
        itemID INT, itemKey TEXT NOT NULL, citationKey TEXT NOT NULL);
";

pub struct Library {
    pub dir: tempfile::TempDir,
    pub paths: StorePaths,
    zotero: Connection,
    bbt: Connection,
}

impl Library {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths {
            zotero: dir.path().join("zotero.sqlite"),
            better_bibtex: dir.path().join("better-bibtex.sqlite"),
        };
        let zotero = Connection::open(&paths.zotero).unwrap();
        zotero.execute_batch(ZOTERO_SCHEMA).unwrap();
        let bbt = Connection::open(&paths.better_bibtex).unwrap();
        bbt.execute_batch(BBT_SCHEMA).unwrap();
        Self {
            dir,
            paths,
            zotero,
            bbt,
        }
    }

    /// A scratch directory for snapshots and settings.
    pub fn data_path(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Open the live stores directly, key store attached.
    pub fn connect(&self) -> Connection {
        let conn = Connection::open(&self.paths.zotero).unwrap();
        snapshot::attach_key_store(&conn, &self.paths.better_bibtex).unwrap();
        conn
    }

    fn lookup_or_insert(&self, table: &str, column: &str, name: &str) -> i64 {
        let id_column = match table {
            "itemTypes" => "itemTypeID",
            "fields" => "fieldID",
            "creatorTypes" => "creatorTypeID",
            "itemDataValues" => "valueID",
            _ => panic!("unknown lookup table {table}"),
        };
        let existing: Option<i64> = self
            .zotero
            .query_row(
                &format!("SELECT {id_column} FROM {table} WHERE {column} = ?1"),
                [name],
                |row| row.get(0),
            )
            .optional()
            .unwrap();
        if let Some(id) = existing {
            return id;
        }
        self.zotero
            .execute(
                &format!("INSERT INTO {table} ({column}) VALUES (?1)"),
                [name],
            )
            .unwrap();
        self.zotero.last_insert_rowid()
    }

    pub fn add_item(&self, id: i64, key: &str, item_type: &str) {
        let type_id = self.lookup_or_insert("itemTypes", "typeName", item_type);
        self.zotero
            .execute(
                "INSERT INTO items (itemID, itemTypeID, key) VALUES (?1, ?2, ?3)",
                params![id, type_id, key],
            )
            .unwrap();
    }

    pub fn set_citation_key(&self, id: i64, key: &str, citation_key: &str) {
        self.bbt
            .execute(
                "INSERT INTO citationkey (itemID, itemKey, citationKey)
                 VALUES (?1, ?2, ?3)",
                params![id, key, citation_key],
            )
            .unwrap();
    }

    pub fn set_field(&self, id: i64, field: &str, value: &str) {
        let field_id = self.lookup_or_insert("fields", "fieldName", field);
        let value_id = self.lookup_or_insert("itemDataValues", "value", value);
        self.zotero
            .execute(
                "INSERT INTO itemData (itemID, fieldID, valueID)
                 VALUES (?1, ?2, ?3)",
                params![id, field_id, value_id],
            )
            .unwrap();
    }

    /// A regular item with a citation key and data fields.
    pub fn add_reference(
        &self,
        id: i64,
        key: &str,
        citation_key: &str,
        fields: &[(&str, &str)],
    ) {
        self.add_item(id, key, "journalArticle");
        self.set_citation_key(id, key, citation_key);
        for (field, value) in fields {
            self.set_field(id, field, value);
        }
    }

    pub fn add_creator(
        &self,
        item: i64,
        role: &str,
        last: &str,
        first: &str,
        order: i64,
    ) {
        let role_id = self.lookup_or_insert("creatorTypes", "creatorType", role);
        self.zotero
            .execute(
                "INSERT INTO creators (firstName, lastName) VALUES (?1, ?2)",
                params![first, last],
            )
            .unwrap();
        let creator_id = self.zotero.last_insert_rowid();
        self.zotero
            .execute(
                "INSERT INTO itemCreators
                 (itemID, creatorID, creatorTypeID, orderIndex)
                 VALUES (?1, ?2, ?3, ?4)",
                params![item, creator_id, role_id, order],
            )
            .unwrap();
    }

    pub fn add_collection(&self, name: &str, items: &[i64]) {
        self.zotero
            .execute(
                "INSERT INTO collections (collectionName) VALUES (?1)",
                [name],
            )
            .unwrap();
        let collection_id = self.zotero.last_insert_rowid();
        for (order, item) in items.iter().enumerate() {
            self.zotero
                .execute(
                    "INSERT INTO collectionItems
                     (collectionID, itemID, orderIndex) VALUES (?1, ?2, ?3)",
                    params![collection_id, item, order as i64],
                )
                .unwrap();
        }
    }

    pub fn add_attachment(
        &self,
        id: i64,
        key: &str,
        parent: i64,
        path: Option<&str>,
    ) {
        self.add_item(id, key, "attachment");
        self.zotero
            .execute(
                "INSERT INTO itemAttachments (itemID, parentItemID, path)
                 VALUES (?1, ?2, ?3)",
                params![id, parent, path],
            )
            .unwrap();
    }

    pub fn add_annotation(
        &self,
        id: i64,
        attachment: i64,
        text: Option<&str>,
        comment: Option<&str>,
        page_label: &str,
        sort_index: &str,
    ) {
        self.add_item(id, &format!("ANN{id:05}"), "annotation");
        self.zotero
            .execute(
                "INSERT INTO itemAnnotations
                 (itemID, parentItemID, type, text, comment, pageLabel, sortIndex)
                 VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6)",
                params![id, attachment, text, comment, page_label, sort_index],
            )
            .unwrap();
    }

    pub fn add_note(&self, id: i64, parent: i64, html: &str) {
        self.add_item(id, &format!("NOTE{id:04}"), "note");
        self.zotero
            .execute(
                "INSERT INTO itemNotes (itemID, parentItemID, note, title)
                 VALUES (?1, ?2, ?3, '')",
                params![id, parent, html],
            )
            .unwrap();
    }

    pub fn delete(&self, id: i64) {
        self.zotero
            .execute("INSERT INTO deletedItems (itemID) VALUES (?1)", [id])
            .unwrap();
    }

    /// The two references used across the matcher tests.
    pub fn sample() -> Self {
        let lib = Self::new();
        lib.add_reference(
            1,
            "LEE19AAA",
            "lee2019",
            &[("title", "Graph theory"), ("date", "2019-03-01")],
        );
        lib.add_creator(1, "author", "Lee", "A", 0);
        lib.add_reference(
            2,
            "PARK99BB",
            "xlee99",
            &[("title", "Lee's algorithm"), ("date", "1999")],
        );
        lib.add_creator(2, "author", "Park", "B", 0);
        lib
    }
}
