use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::engine::EngineOptions;

#[derive(Debug, Parser)]
#[command(
    name = "zotindex",
    about = "Citation-key completion and note export for a Zotero library"
)]
pub struct Cli {
    /// Override the XDG data directory (snapshots and settings)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to zotero.sqlite
    #[arg(long, global = true)]
    pub zotero_db: Option<PathBuf>,

    /// Path to better-bibtex.sqlite
    #[arg(long, global = true)]
    pub bbt_db: Option<PathBuf>,

    /// Separator between citation key and page, e.g. ", p. "
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub year_page_sep: Option<String>,

    /// HTML to markdown converter program (default: pandoc)
    #[arg(long, global = true)]
    pub pandoc: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            zotero_db: self.zotero_db.clone(),
            bbt_db: self.bbt_db.clone(),
            data_dir: self.data_dir.clone(),
            year_page_sep: self.year_page_sep.clone(),
            converter: self.pandoc.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Complete a partial citation key, author or title
    Match(MatchArgs),
    /// List the file attachments of a reference
    Attachments(KeyArgs),
    /// Show the full record of a reference
    Record(KeyArgs),
    /// Print the citation string for an internal item id
    Cite(CiteArgs),
    /// Export PDF annotations as markdown
    Annotations(AnnotationsArgs),
    /// Export notes as markdown
    Notes(KeyArgs),
    /// Restrict completion to collections, per document
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },
    /// Manage the citation key / page separator
    Separator {
        #[command(subcommand)]
        action: SeparatorAction,
    },
    /// Show paths, counts and collection assignments
    Info(JsonArgs),
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Collections subcommands --

#[derive(Debug, Subcommand)]
pub enum CollectionsAction {
    /// Restrict a document to the named collections (none clears)
    Set {
        /// Document identifier, usually its path
        doc: String,
        /// Collection names
        names: Vec<String>,
    },
    /// Show the collections assigned to a document
    Show {
        /// Document identifier
        doc: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every collection in the library
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Separator subcommands --

#[derive(Debug, Subcommand)]
pub enum SeparatorAction {
    /// Show the separator currently in effect
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a separator in config.redb
    Set {
        /// Separator text
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Clear the stored separator (revert to default)
    Clear,
}

// -- Match --

#[derive(Debug, Parser)]
pub struct MatchArgs {
    /// Partial citation key, author or title
    pub pattern: String,

    /// Document whose collection filter applies
    #[arg(short, long, default_value = "")]
    pub doc: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Single-record lookups --

#[derive(Debug, Parser)]
pub struct KeyArgs {
    /// Stable key or citation key
    pub key: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct CiteArgs {
    /// Internal item id
    pub item_id: i64,
}

#[derive(Debug, Parser)]
pub struct AnnotationsArgs {
    /// Stable key or citation key
    pub key: String,

    /// Added to every numeric page label
    #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
    pub offset: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct JsonArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "zotindex",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_match_defaults() {
        let cli = Cli::parse_from(["zotindex", "match", "lee"]);
        match cli.command {
            Command::Match(args) => {
                assert_eq!(args.pattern, "lee");
                assert_eq!(args.doc, "");
                assert!(!args.json);
            }
            _ => panic!("expected match command"),
        }
    }

    #[test]
    fn parse_negative_page_offset() {
        let cli =
            Cli::parse_from(["zotindex", "annotations", "lee2019", "-o", "-3"]);
        match cli.command {
            Command::Annotations(args) => {
                assert_eq!(args.key, "lee2019");
                assert_eq!(args.offset, -3);
            }
            _ => panic!("expected annotations command"),
        }
    }

    #[test]
    fn global_options_feed_engine() {
        let cli = Cli::parse_from([
            "zotindex",
            "info",
            "--zotero-db",
            "/tmp/z.sqlite",
            "--year-page-sep",
            ": ",
            "--pandoc",
            "/opt/pandoc",
        ]);
        let options = cli.engine_options();
        assert_eq!(options.zotero_db, Some(PathBuf::from("/tmp/z.sqlite")));
        assert_eq!(options.bbt_db, None);
        assert_eq!(options.year_page_sep.as_deref(), Some(": "));
        assert_eq!(options.converter.as_deref(), Some("/opt/pandoc"));
    }

    #[test]
    fn collections_set_accepts_no_names() {
        let cli = Cli::parse_from(["zotindex", "collections", "set", "a.md"]);
        match cli.command {
            Command::Collections {
                action: CollectionsAction::Set { doc, names },
            } => {
                assert_eq!(doc, "a.md");
                assert!(names.is_empty());
            }
            _ => panic!("expected collections set"),
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
