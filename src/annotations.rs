//! PDF highlights and comments as citation-carrying markdown lines.

use rusqlite::Connection;

use crate::{error::Result, reference::Reference};

const ANNOTATIONS_SQL: &str = "
    SELECT itemAnnotations.text, itemAnnotations.comment,
        itemAnnotations.pageLabel
    FROM items
    JOIN itemAttachments ON itemAttachments.parentItemID = items.itemID
    JOIN itemAnnotations
        ON itemAnnotations.parentItemID = itemAttachments.itemID
    WHERE items.key = ?1
        AND itemAnnotations.itemID NOT IN (SELECT itemID FROM deletedItems)
    ORDER BY itemAttachments.itemID, itemAnnotations.sortIndex,
        itemAnnotations.itemID";

/// One annotation on one of a reference's attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Highlighted passage, if any.
    pub text: Option<String>,
    pub comment: Option<String>,
    pub page_label: String,
}

/// Annotations on every attachment of the item with `stable_key`, in
/// reading order.
pub fn load(conn: &Connection, stable_key: &str) -> Result<Vec<Annotation>> {
    let mut stmt = conn.prepare(ANNOTATIONS_SQL)?;
    let rows = stmt.query_map([stable_key], |row| {
        Ok(Annotation {
            text: row.get(0)?,
            comment: row.get(1)?,
            page_label: row
                .get::<_, Option<String>>(2)?
                .unwrap_or_default(),
        })
    })?;
    Ok(rows.collect::<std::result::Result<_, _>>()?)
}

/// Render annotations as markdown lines, blank lines between entries.
///
/// Comments become paragraphs and highlights become blockquotes; each ends
/// with `[@stableKey#citationKey<sep><page>]`. A multi-line comment gets
/// its citation on a line of its own.
pub fn render(
    reference: &Reference,
    annotations: &[Annotation],
    page_offset: i64,
    year_page_sep: &str,
) -> Vec<String> {
    let mut lines = Vec::new();
    for annotation in annotations {
        let cite = format!(
            "[{}{year_page_sep}{}]",
            reference.citation(),
            shift_page(&annotation.page_label, page_offset)
        );

        if let Some(comment) = non_empty(&annotation.comment) {
            lines.push(String::new());
            if comment.contains('\n') {
                lines.extend(comment.split('\n').map(str::to_string));
                lines.push(format!(" {cite}"));
            } else {
                lines.push(format!("{comment} {cite}"));
            }
        }

        if let Some(text) = non_empty(&annotation.text) {
            lines.push(String::new());
            lines.push(format!("> {} {cite}", escape_markdown(text)));
        }
    }
    lines
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Shift an all-digit page label by `offset`; any other label, such as a
/// roman numeral, passes through.
pub fn shift_page(label: &str, offset: i64) -> String {
    if label.is_empty() || !label.bytes().all(|b| b.is_ascii_digit()) {
        return label.to_string();
    }
    match label.parse::<i64>() {
        Ok(page) => page
            .checked_add(offset)
            .map_or_else(|| label.to_string(), |p| p.to_string()),
        Err(_) => label.to_string(),
    }
}

/// Backslash-escape the characters that would turn highlighted prose into
/// citations or emphasis.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '[' | ']' | '@' | '*' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
