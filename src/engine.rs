//! The long-lived host-facing facade over the reference index.
//!
//! An [`Engine`] owns the current index and rebuilds it wholesale whenever
//! the primary store has been modified since the last build. A failed
//! rebuild is logged and the previous index keeps serving.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    annotations,
    collections::CollectionFilters,
    config::{self, StorePaths},
    config_db::ConfigDb,
    converter::{MarkupConverter, PandocConverter},
    data_dir::DataDir,
    error::Result,
    index::ReferenceIndex,
    matcher::{self, Completion},
    notes,
    reference::{ItemId, Reference},
    resolver::AttachmentLookup,
    snapshot,
};

/// Converter handle an engine can share across threads.
pub type SharedConverter = Box<dyn MarkupConverter + Send + Sync>;

/// Host-supplied overrides; anything left `None` falls back to the
/// environment, persisted settings and defaults.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub zotero_db: Option<PathBuf>,
    pub bbt_db: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub year_page_sep: Option<String>,
    pub converter: Option<String>,
}

/// A record together with the collections it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetails {
    #[serde(flatten)]
    pub reference: Reference,
    pub collections: Vec<String>,
}

/// Diagnostic snapshot of an engine's configuration and state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInfo {
    pub zotero_db: PathBuf,
    pub better_bibtex_db: PathBuf,
    pub data_dir: PathBuf,
    pub zotero_snapshot: PathBuf,
    pub better_bibtex_snapshot: PathBuf,
    pub config_db: PathBuf,
    pub year_page_sep: String,
    pub converter: String,
    pub references: usize,
    pub collections: usize,
    /// Modification time of the primary store the index was built from,
    /// in seconds since the Unix epoch.
    pub built_from: u64,
    pub documents: BTreeMap<String, Vec<String>>,
}

pub struct Engine {
    paths: StorePaths,
    data_dir: DataDir,
    config_db: ConfigDb,
    year_page_sep: String,
    converter: SharedConverter,
    index: Arc<ReferenceIndex>,
    built_from: SystemTime,
    filters: CollectionFilters,
}

impl Engine {
    /// Resolve configuration and build the first index. Any failure here
    /// is a configuration error and leaves no usable engine.
    pub fn open(options: &EngineOptions) -> Result<Self> {
        let paths = StorePaths::resolve(
            options.zotero_db.as_deref(),
            options.bbt_db.as_deref(),
        )?;
        let data_dir = DataDir::resolve(options.data_dir.as_deref())?;
        let config_db = ConfigDb::open(&data_dir.config_db())?;
        let year_page_sep = config::resolve_year_page_sep(
            options.year_page_sep.as_deref(),
            &config_db,
        )?;
        let converter = PandocConverter::new(config::resolve_converter(
            options.converter.as_deref(),
        ));
        Self::from_parts(
            paths,
            data_dir,
            config_db,
            year_page_sep,
            Box::new(converter),
        )
    }

    pub fn from_parts(
        paths: StorePaths,
        data_dir: DataDir,
        config_db: ConfigDb,
        year_page_sep: String,
        converter: SharedConverter,
    ) -> Result<Self> {
        let built_from = snapshot::modified(&paths.zotero)?;
        let index = build_index(&data_dir, &paths)?;
        let filters = CollectionFilters::from_assignments(
            config_db.list_document_collections()?,
        );
        info!(
            references = index.len(),
            collections = index.collections().len(),
            "loaded reference library"
        );

        Ok(Self {
            paths,
            data_dir,
            config_db,
            year_page_sep,
            converter,
            index: Arc::new(index),
            built_from,
            filters,
        })
    }

    /// Rebuild the index if the primary store changed since the last
    /// build. Returns whether a new index was installed.
    pub fn refresh(&mut self) -> bool {
        let modified = match snapshot::modified(&self.paths.zotero) {
            Ok(time) => time,
            Err(e) => {
                warn!(
                    path = %self.paths.zotero.display(),
                    error = %e,
                    "cannot stat reference store, keeping current index"
                );
                return false;
            }
        };
        if modified <= self.built_from {
            return false;
        }

        match build_index(&self.data_dir, &self.paths) {
            Ok(index) => {
                info!(references = index.len(), "reference index rebuilt");
                self.index = Arc::new(index);
                self.built_from = modified;
                true
            }
            Err(e) => {
                error!(
                    error = ?e,
                    "index rebuild failed, keeping previous index"
                );
                false
            }
        }
    }

    /// The current index, refreshed first.
    pub fn index(&mut self) -> Arc<ReferenceIndex> {
        self.refresh();
        Arc::clone(&self.index)
    }

    /// Restrict searches from `doc` to `names`, persisting the choice.
    ///
    /// Fails with [`crate::Error::NotFound`] on an unknown collection,
    /// leaving the previous assignment in place.
    pub fn set_collections(
        &mut self,
        doc: &str,
        names: &[String],
    ) -> Result<Vec<String>> {
        self.refresh();
        let mut filters = self.filters.clone();
        let assigned = filters.assign(doc, names, &self.index)?;
        self.config_db.set_document_collections(doc, &assigned)?;
        self.filters = filters;
        debug!(doc, collections = ?assigned, "set document collections");
        Ok(assigned)
    }

    pub fn document_collections(&self, doc: &str) -> &[String] {
        self.filters.get(doc)
    }

    /// Completion lines for `pattern`, searched within `doc`'s collections.
    pub fn matches(&mut self, pattern: &str, doc: &str) -> Vec<Completion> {
        self.refresh();
        let candidates = self.filters.candidates(doc, &self.index);
        matcher::complete(candidates, pattern)
    }

    pub fn attachments(&mut self, key: &str) -> AttachmentLookup {
        self.refresh();
        self.index.attachments(key)
    }

    pub fn record(&mut self, key: &str) -> Option<RecordDetails> {
        self.refresh();
        let reference = self.index.find(key)?;
        Some(RecordDetails {
            reference: reference.clone(),
            collections: self
                .index
                .collections_of(reference.item_id)
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn citation(&mut self, item: ItemId) -> Option<String> {
        self.refresh();
        self.index.citation_for(item)
    }

    /// Annotation lines for the record `key` names, `None` if no record
    /// does.
    pub fn annotations(
        &mut self,
        key: &str,
        page_offset: i64,
    ) -> Result<Option<Vec<String>>> {
        self.refresh();
        let Some(reference) = self.index.find(key) else {
            return Ok(None);
        };
        let conn = snapshot::open_primary(&self.data_dir, &self.paths)?;
        let found = annotations::load(&conn, &reference.stable_key)?;
        debug!(key, annotations = found.len(), "loaded annotations");
        Ok(Some(annotations::render(
            reference,
            &found,
            page_offset,
            &self.year_page_sep,
        )))
    }

    /// Markdown for the notes of the record `key` names, `None` if no
    /// record does.
    pub fn notes(&mut self, key: &str) -> Result<Option<String>> {
        self.refresh();
        let Some(reference) = self.index.find(key) else {
            return Ok(None);
        };
        let conn = snapshot::open_primary(&self.data_dir, &self.paths)?;
        let html = notes::load(&conn, &reference.stable_key)?;
        let markdown = notes::render(
            &html,
            &self.index,
            &self.year_page_sep,
            self.converter.as_ref(),
        )?;
        Ok(Some(markdown))
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            zotero_db: self.paths.zotero.clone(),
            better_bibtex_db: self.paths.better_bibtex.clone(),
            data_dir: self.data_dir.root().to_path_buf(),
            zotero_snapshot: self.data_dir.zotero_snapshot(),
            better_bibtex_snapshot: self.data_dir.bbt_snapshot(),
            config_db: self.data_dir.config_db(),
            year_page_sep: self.year_page_sep.clone(),
            converter: self.converter.describe(),
            references: self.index.len(),
            collections: self.index.collections().len(),
            built_from: self
                .built_from
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            documents: self.filters.assignments().clone(),
        }
    }
}

fn build_index(
    data_dir: &DataDir,
    paths: &StorePaths,
) -> Result<ReferenceIndex> {
    let conn = snapshot::open_library(data_dir, paths)?;
    ReferenceIndex::build(&conn)
}
