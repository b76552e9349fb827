use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// Internal numeric item identifier assigned by the reference store.
pub type ItemId = i64;

/// Role a creator plays on a bibliographic item.
///
/// The named variants are the roles that can stand in for an author in the
/// author summary, in precedence order. Anything else the store reports is
/// kept as [`CreatorRole::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CreatorRole {
    Author,
    Editor,
    SeriesEditor,
    Translator,
    ReviewedAuthor,
    Artist,
    Performer,
    Composer,
    Director,
    Podcaster,
    Cartographer,
    Programmer,
    Presenter,
    Interviewee,
    Interviewer,
    Recipient,
    Sponsor,
    Inventor,
    Other(String),
}

impl CreatorRole {
    pub fn parse(name: &str) -> Self {
        match name {
            "author" => Self::Author,
            "editor" => Self::Editor,
            "seriesEditor" => Self::SeriesEditor,
            "translator" => Self::Translator,
            "reviewedAuthor" => Self::ReviewedAuthor,
            "artist" => Self::Artist,
            "performer" => Self::Performer,
            "composer" => Self::Composer,
            "director" => Self::Director,
            "podcaster" => Self::Podcaster,
            "cartographer" => Self::Cartographer,
            "programmer" => Self::Programmer,
            "presenter" => Self::Presenter,
            "interviewee" => Self::Interviewee,
            "interviewer" => Self::Interviewer,
            "recipient" => Self::Recipient,
            "sponsor" => Self::Sponsor,
            "inventor" => Self::Inventor,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Author => "author",
            Self::Editor => "editor",
            Self::SeriesEditor => "seriesEditor",
            Self::Translator => "translator",
            Self::ReviewedAuthor => "reviewedAuthor",
            Self::Artist => "artist",
            Self::Performer => "performer",
            Self::Composer => "composer",
            Self::Director => "director",
            Self::Podcaster => "podcaster",
            Self::Cartographer => "cartographer",
            Self::Programmer => "programmer",
            Self::Presenter => "presenter",
            Self::Interviewee => "interviewee",
            Self::Interviewer => "interviewer",
            Self::Recipient => "recipient",
            Self::Sponsor => "sponsor",
            Self::Inventor => "inventor",
            Self::Other(name) => name,
        }
    }

    /// Position in the author-summary precedence list, `None` for roles
    /// that never contribute to it.
    pub fn summary_rank(&self) -> Option<usize> {
        let rank = match self {
            Self::Author => 0,
            Self::Editor => 1,
            Self::SeriesEditor => 2,
            Self::Translator => 3,
            Self::ReviewedAuthor => 4,
            Self::Artist => 5,
            Self::Performer => 6,
            Self::Composer => 7,
            Self::Director => 8,
            Self::Podcaster => 9,
            Self::Cartographer => 10,
            Self::Programmer => 11,
            Self::Presenter => 12,
            Self::Interviewee => 13,
            Self::Interviewer => 14,
            Self::Recipient => 15,
            Self::Sponsor => 16,
            Self::Inventor => 17,
            Self::Other(_) => return None,
        };
        Some(rank)
    }
}

impl std::fmt::Display for CreatorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CreatorRole {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub last_name: String,
    pub first_name: String,
}

/// One denormalized bibliographic item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub item_id: ItemId,
    /// Key assigned by the reference manager, stable across renames.
    pub stable_key: String,
    /// Human-readable key from the key store; `None` when unsynced.
    pub citation_key: Option<String>,
    pub title: String,
    /// Every other data field, by field name (`date`, `publicationTitle`, ...).
    pub fields: BTreeMap<String, String>,
    pub creators: BTreeMap<CreatorRole, Vec<Creator>>,
    /// Comma-separated last names used for completion and display.
    pub author_summary: String,
    pub item_type: Option<String>,
    /// `stableKey:path` for each file attachment.
    pub attachments: Vec<String>,
    pub year: String,
}

impl Reference {
    pub fn new(
        item_id: ItemId,
        stable_key: impl Into<String>,
        citation_key: Option<String>,
    ) -> Self {
        Self {
            item_id,
            stable_key: stable_key.into(),
            citation_key,
            title: String::new(),
            fields: BTreeMap::new(),
            creators: BTreeMap::new(),
            author_summary: String::new(),
            item_type: None,
            attachments: Vec::new(),
            year: String::new(),
        }
    }

    pub fn set_field(&mut self, name: &str, value: String) {
        if name == "title" {
            self.title = value;
        } else {
            self.fields.insert(name.to_string(), value);
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        if name == "title" {
            return Some(&self.title);
        }
        self.fields.get(name).map(String::as_str)
    }

    /// Append a creator in store order and update the author summary.
    ///
    /// Authors always join the summary, repeats included. Any other ranked
    /// role joins only while no role ranked before it is on the record.
    pub fn add_creator(&mut self, role: CreatorRole, creator: Creator) {
        let joins_summary = match role.summary_rank() {
            Some(0) => true,
            Some(rank) => !self.creators.keys().any(|present| {
                present.summary_rank().is_some_and(|other| other < rank)
            }),
            None => false,
        };

        if joins_summary && !creator.last_name.is_empty() {
            if !self.author_summary.is_empty() {
                self.author_summary.push_str(", ");
            }
            self.author_summary.push_str(&creator.last_name);
        }
        self.creators.entry(role).or_default().push(creator);
    }

    /// Derive `year` from `date`, falling back to `issueDate`.
    pub fn derive_year(&mut self) {
        self.year = self
            .fields
            .get("date")
            .or_else(|| self.fields.get("issueDate"))
            .map(|date| year_from_date(date).to_string())
            .unwrap_or_default();
    }

    /// Whether `key` names this record by stable key or citation key.
    pub fn matches_key(&self, key: &str) -> bool {
        self.stable_key == key || self.citation_key.as_deref() == Some(key)
    }

    /// `@stableKey#citationKey`, the form used in documents.
    pub fn citation(&self) -> String {
        format!(
            "@{}#{}",
            self.stable_key,
            self.citation_key.as_deref().unwrap_or_default()
        )
    }
}

/// Year portion of a stored date: text before the first space, then before
/// the first hyphen.
pub fn year_from_date(date: &str) -> &str {
    let day = date.split(' ').next().unwrap_or_default();
    day.split('-').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creator(last: &str) -> Creator {
        Creator {
            last_name: last.to_string(),
            first_name: String::new(),
        }
    }

    #[test]
    fn year_from_iso_date() {
        assert_eq!(year_from_date("2021-05-01"), "2021");
        assert_eq!(year_from_date("2021-05-01 May 1, 2021"), "2021");
        assert_eq!(year_from_date("1999"), "1999");
        assert_eq!(year_from_date(""), "");
    }

    #[test]
    fn derive_year_falls_back_to_issue_date() {
        let mut r = Reference::new(1, "AAAA1111", None);
        r.set_field("issueDate", "1999".to_string());
        r.derive_year();
        assert_eq!(r.year, "1999");

        r.set_field("date", "2021-05-01".to_string());
        r.derive_year();
        assert_eq!(r.year, "2021");

        let mut empty = Reference::new(2, "BBBB2222", None);
        empty.derive_year();
        assert_eq!(empty.year, "");
    }

    #[test]
    fn authors_always_join_summary() {
        let mut r = Reference::new(1, "AAAA1111", None);
        r.add_creator(CreatorRole::Author, creator("Lee"));
        r.add_creator(CreatorRole::Author, creator("Park"));
        r.add_creator(CreatorRole::Author, creator("Lee"));
        assert_eq!(r.author_summary, "Lee, Park, Lee");
        assert_eq!(r.creators[&CreatorRole::Author].len(), 3);
    }

    #[test]
    fn editor_is_skipped_when_author_present() {
        let mut r = Reference::new(1, "AAAA1111", None);
        r.add_creator(CreatorRole::Author, creator("Lee"));
        r.add_creator(CreatorRole::Editor, creator("Ed"));
        assert_eq!(r.author_summary, "Lee");
        assert_eq!(r.creators[&CreatorRole::Editor].len(), 1);
    }

    #[test]
    fn best_available_role_stands_in_for_author() {
        let mut r = Reference::new(1, "AAAA1111", None);
        r.add_creator(CreatorRole::Editor, creator("Ed"));
        r.add_creator(CreatorRole::Editor, creator("Eve"));
        r.add_creator(CreatorRole::Translator, creator("Tran"));
        assert_eq!(r.author_summary, "Ed, Eve");
    }

    #[test]
    fn lower_ranked_role_first_still_joins() {
        // Store order decides: a translator seen before any editor joins.
        let mut r = Reference::new(1, "AAAA1111", None);
        r.add_creator(CreatorRole::Translator, creator("Tran"));
        r.add_creator(CreatorRole::Editor, creator("Ed"));
        assert_eq!(r.author_summary, "Tran, Ed");
    }

    #[test]
    fn unranked_roles_never_join() {
        let mut r = Reference::new(1, "AAAA1111", None);
        r.add_creator(CreatorRole::parse("contributor"), creator("Helper"));
        assert_eq!(r.author_summary, "");
        assert!(r.creators.contains_key(&CreatorRole::Other(
            "contributor".to_string()
        )));
    }

    #[test]
    fn empty_last_name_never_leads_summary() {
        let mut r = Reference::new(1, "AAAA1111", None);
        r.add_creator(CreatorRole::Author, creator(""));
        r.add_creator(CreatorRole::Author, creator("Lee"));
        assert_eq!(r.author_summary, "Lee");
        assert!(!r.author_summary.starts_with(", "));
    }

    #[test]
    fn role_names_round_trip() {
        for name in ["author", "seriesEditor", "inventor", "castMember"] {
            assert_eq!(CreatorRole::parse(name).as_str(), name);
        }
    }

    #[test]
    fn key_matching_and_citation() {
        let r = Reference::new(7, "ABCD1234", Some("lee2019".to_string()));
        assert!(r.matches_key("ABCD1234"));
        assert!(r.matches_key("lee2019"));
        assert!(!r.matches_key("lee"));
        assert_eq!(r.citation(), "@ABCD1234#lee2019");
    }

    #[test]
    fn serializes_roles_as_map_keys() {
        let mut r = Reference::new(1, "AAAA1111", Some("k".to_string()));
        r.add_creator(
            CreatorRole::SeriesEditor,
            Creator {
                last_name: "Ed".to_string(),
                first_name: "A".to_string(),
            },
        );
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["creators"]["seriesEditor"][0]["lastName"], "Ed");
        assert_eq!(json["stableKey"], "AAAA1111");
        assert_eq!(json["authorSummary"], "Ed");
    }
}
