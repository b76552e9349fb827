//! Rich-text notes as markdown with inline citations.
//!
//! Citation widgets are lifted out of the HTML before conversion and
//! replaced by opaque alphanumeric tokens. The converter passes such tokens
//! through untouched, so the citations are put back verbatim afterwards.

use std::{collections::BTreeMap, sync::LazyLock};

use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    converter::MarkupConverter, error::Result, index::ReferenceIndex,
};

/// Shown in place of a citation key the index cannot resolve.
pub const UNRESOLVED_KEY: &str = "NotFound";

const NOTES_SQL: &str = "
    SELECT itemNotes.note
    FROM itemNotes
    JOIN items AS parent ON parent.itemID = itemNotes.parentItemID
    WHERE parent.key = ?1
        AND itemNotes.itemID NOT IN (SELECT itemID FROM deletedItems)
    ORDER BY itemNotes.itemID";

const NOOPENER: &str = r#" rel="noopener noreferrer nofollow""#;

static DIV_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<div .*?>").expect("valid regex"));
static DIV_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</div>").expect("valid regex"));
static SECONDARY_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\(<span class="citation-item">.*?</span>\)"#)
        .expect("valid regex")
});
static CITATION_WIDGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span class="citation" data-citation=(.*?)</span>"#)
        .expect("valid regex")
});
static CITATION_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"([^"]*)""#).expect("valid regex")
});
static ITEM_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"items/([A-Za-z0-9]{8})").expect("valid regex")
});
static UNDERLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(r"\[((?:\\[\[\]]|[^\[\]])*)\]", r"\{\.underline\}"))
        .expect("valid regex")
});
static STRIKEOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\[((?:\\[\[\]]|[^\[\]])*)\]",
        r#"\{style="text-decoration: line-through"\}"#,
    ))
    .expect("valid regex")
});
static HIGHLIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\[((?:\\[\[\]]|[^\[\]])*)\]",
        r"\{\.highlight[^}]*\}",
    ))
    .expect("valid regex")
});

/// Concatenated HTML of the live notes attached to the item with
/// `stable_key`; empty when there are none.
pub fn load(conn: &Connection, stable_key: &str) -> Result<String> {
    let mut stmt = conn.prepare(NOTES_SQL)?;
    let mut rows = stmt.query([stable_key])?;
    let mut html = String::new();
    while let Some(row) = rows.next()? {
        if let Some(note) = row.get::<_, Option<String>>(0)? {
            html.push_str(&note);
        }
    }
    Ok(html)
}

/// Decoded payload of a `data-citation` attribute.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CitationData {
    #[serde(default)]
    citation_items: Vec<CitationItem>,
}

#[derive(Debug, Default, Deserialize)]
struct CitationItem {
    #[serde(default)]
    uris: Vec<String>,
    #[serde(default)]
    locator: Option<serde_json::Value>,
}

/// Citations lifted out of a note, keyed by their token number.
#[derive(Debug, Default)]
struct CitationTable {
    prefix: String,
    citations: BTreeMap<usize, String>,
}

impl CitationTable {
    /// A table whose tokens cannot collide with anything in `html`.
    fn for_note(html: &str) -> Self {
        let mut prefix = String::from("ZQCITE");
        while html.contains(&prefix) {
            prefix.push('Q');
        }
        Self {
            prefix,
            citations: BTreeMap::new(),
        }
    }

    fn insert(&mut self, citation: String) -> String {
        let n = self.citations.len();
        self.citations.insert(n, citation);
        format!("{p}{n}{p}", p = self.prefix)
    }

    fn restore(&self, markdown: &str) -> String {
        if self.citations.is_empty() {
            return markdown.to_string();
        }
        let prefix = regex::escape(&self.prefix);
        let pattern = format!("{prefix}([0-9]+){prefix}");
        let Ok(token) = Regex::new(&pattern) else {
            return markdown.to_string();
        };
        token
            .replace_all(markdown, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| self.citations.get(&n))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Render note HTML as markdown, citation widgets as
/// `[@stableKey#citationKey<sep><locator>; ...]`.
///
/// Returns an empty string for an empty note.
pub fn render(
    html: &str,
    index: &ReferenceIndex,
    year_page_sep: &str,
    converter: &dyn MarkupConverter,
) -> Result<String> {
    if html.is_empty() {
        return Ok(String::new());
    }

    let mut table = CitationTable::for_note(html);
    let cleaned = strip_wrappers(html);
    let tokenized = CITATION_WIDGET.replace_all(&cleaned, |caps: &Captures| {
        match widget_citation(&caps[1], index, year_page_sep) {
            Some(citation) => table.insert(citation),
            None => String::new(),
        }
    });

    let markdown = converter.convert(&tokenized)?;
    let mut out = table.restore(&rewrite_spans(&markdown));
    out.push('\n');
    Ok(out)
}

fn strip_wrappers(html: &str) -> String {
    let html = DIV_OPEN.replace_all(html, "");
    let html = DIV_CLOSE.replace_all(&html, "");
    let html = html.replace(NOOPENER, "");
    SECONDARY_CITATION.replace_all(&html, "").into_owned()
}

/// Rewrite the converter's span syntax: underline to `<u>`, strikeout to
/// `~~`, highlights to their bare text. A span body may hold escaped
/// brackets but never a bare one.
fn rewrite_spans(markdown: &str) -> String {
    let markdown = UNDERLINE.replace_all(markdown, "<u>$1</u>");
    let markdown = STRIKEOUT.replace_all(&markdown, "~~$1~~");
    HIGHLIGHT.replace_all(&markdown, "$1").into_owned()
}

/// The bracketed citation for one widget, `None` when it names no item.
///
/// `attribute` is everything after `data-citation=` up to the closing tag.
fn widget_citation(
    attribute: &str,
    index: &ReferenceIndex,
    year_page_sep: &str,
) -> Option<String> {
    let raw = CITATION_ATTR
        .captures(attribute)
        .and_then(|caps| caps.get(1))
        .map_or(attribute, |m| m.as_str());
    let decoded = percent_decode_str(raw).decode_utf8_lossy();

    let items: Vec<(String, Option<String>)> =
        match serde_json::from_str::<CitationData>(&decoded) {
            Ok(data) => data
                .citation_items
                .iter()
                .filter_map(|item| {
                    let key = item.uris.iter().find_map(|uri| item_key(uri))?;
                    Some((key, item.locator.as_ref().and_then(locator_text)))
                })
                .collect(),
            Err(_) => ITEM_KEY
                .captures_iter(&decoded)
                .map(|caps| (caps[1].to_string(), None))
                .collect(),
        };

    if items.is_empty() {
        return None;
    }

    let parts: Vec<String> = items
        .into_iter()
        .map(|(key, locator)| {
            let resolved = index
                .find(&key)
                .and_then(|r| r.citation_key.as_deref())
                .unwrap_or(UNRESOLVED_KEY);
            match locator {
                Some(locator) => {
                    format!("@{key}#{resolved}{year_page_sep}{locator}")
                }
                None => format!("@{key}#{resolved}"),
            }
        })
        .collect();
    Some(format!("[{}]", parts.join("; ")))
}

fn item_key(uri: &str) -> Option<String> {
    ITEM_KEY.captures(uri).map(|caps| caps[1].to_string())
}

fn locator_text(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
