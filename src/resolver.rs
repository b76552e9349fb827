//! Single-record lookups by stable key, citation key or item id.

use std::fmt;

use serde::Serialize;

use crate::{
    index::ReferenceIndex,
    reference::{ItemId, Reference},
};

/// Text sent back when an item id is unknown.
pub const ID_NOT_FOUND: &str = "id-not-found";

/// Outcome of an attachment lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "attachments", rename_all = "kebab-case")]
pub enum AttachmentLookup {
    /// `stableKey:path` for every file attachment.
    Found(Vec<String>),
    NoAttachment,
    KeyNotFound,
}

impl AttachmentLookup {
    /// The fixed text a host prints for the two miss cases.
    pub fn sentinel(&self) -> Option<&'static str> {
        match self {
            Self::Found(_) => None,
            Self::NoAttachment => Some("no-attachment"),
            Self::KeyNotFound => Some("key-not-found"),
        }
    }
}

impl fmt::Display for AttachmentLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(paths) => f.write_str(&paths.join("\n")),
            other => f.write_str(other.sentinel().unwrap_or_default()),
        }
    }
}

impl ReferenceIndex {
    /// First record, in index order, whose stable key or citation key is
    /// `key`.
    pub fn find(&self, key: &str) -> Option<&Reference> {
        self.references().find(|r| r.matches_key(key))
    }

    pub fn attachments(&self, key: &str) -> AttachmentLookup {
        match self.find(key) {
            None => AttachmentLookup::KeyNotFound,
            Some(r) if r.attachments.is_empty() => {
                AttachmentLookup::NoAttachment
            }
            Some(r) => AttachmentLookup::Found(r.attachments.clone()),
        }
    }

    /// `@stableKey#citationKey` for an item id.
    pub fn citation_for(&self, item: ItemId) -> Option<String> {
        self.get(item).map(Reference::citation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Library;

    fn index(lib: &Library) -> ReferenceIndex {
        ReferenceIndex::build(&lib.connect()).unwrap()
    }

    #[test]
    fn finds_by_either_key() {
        let lib = Library::sample();
        let index = index(&lib);

        assert_eq!(index.find("LEE19AAA").unwrap().item_id, 1);
        assert_eq!(index.find("xlee99").unwrap().item_id, 2);
        assert!(index.find("lee").is_none());
    }

    #[test]
    fn attachment_outcomes() {
        let lib = Library::sample();
        lib.add_attachment(10, "PDF00010", 1, Some("storage:lee.pdf"));
        let index = index(&lib);

        assert_eq!(
            index.attachments("lee2019"),
            AttachmentLookup::Found(vec![
                "PDF00010:storage:lee.pdf".to_string()
            ])
        );
        assert_eq!(
            index.attachments("PARK99BB"),
            AttachmentLookup::NoAttachment
        );
        assert_eq!(index.attachments("nobody"), AttachmentLookup::KeyNotFound);
    }

    #[test]
    fn sentinels_render_as_text() {
        assert_eq!(AttachmentLookup::NoAttachment.to_string(), "no-attachment");
        assert_eq!(AttachmentLookup::KeyNotFound.to_string(), "key-not-found");
        assert_eq!(
            AttachmentLookup::Found(vec!["A:a".into(), "B:b".into()])
                .to_string(),
            "A:a\nB:b"
        );
    }

    #[test]
    fn serializes_with_status_tag() {
        let json =
            serde_json::to_value(AttachmentLookup::KeyNotFound).unwrap();
        assert_eq!(json["status"], "key-not-found");

        let json = serde_json::to_value(AttachmentLookup::Found(vec![
            "A:a".into(),
        ]))
        .unwrap();
        assert_eq!(json["status"], "found");
        assert_eq!(json["attachments"][0], "A:a");
    }

    #[test]
    fn citation_by_item_id() {
        let lib = Library::sample();
        let index = index(&lib);

        assert_eq!(index.citation_for(1).as_deref(), Some("@LEE19AAA#lee2019"));
        assert_eq!(index.citation_for(99), None);
    }
}
