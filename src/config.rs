use std::path::{Path, PathBuf};

use crate::{
    config_db::ConfigDb,
    error::{Error, Result},
};

pub const DEFAULT_YEAR_PAGE_SEP: &str = ", p. ";
pub const YEAR_PAGE_SEP_SETTING: &str = "year_page_sep";
pub const DEFAULT_CONVERTER: &str = "pandoc";

const ZOTERO_DB_VAR: &str = "ZOTINDEX_ZOTERO_DB";
const BBT_DB_VAR: &str = "ZOTINDEX_BBT_DB";
const YEAR_PAGE_SEP_VAR: &str = "ZOTINDEX_YEAR_PAGE_SEP";
const CONVERTER_VAR: &str = "ZOTINDEX_PANDOC";

/// Locations of the two live stores the index is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    /// The reference manager's database (`zotero.sqlite`).
    pub zotero: PathBuf,
    /// The citation-key store (`better-bibtex.sqlite`).
    pub better_bibtex: PathBuf,
}

impl StorePaths {
    /// Resolve both store paths from, in order of priority:
    /// 1. An explicit path (from --zotero-db / --bbt-db)
    /// 2. The ZOTINDEX_ZOTERO_DB / ZOTINDEX_BBT_DB environment variables
    /// 3. `~/Zotero/zotero.sqlite` and `~/Zotero/better-bibtex.sqlite`
    ///
    /// Both files must exist.
    pub fn resolve(zotero: Option<&Path>, bbt: Option<&Path>) -> Result<Self> {
        Ok(Self {
            zotero: resolve_store(
                zotero,
                std::env::var(ZOTERO_DB_VAR).ok(),
                ZOTERO_DB_VAR,
                "zotero.sqlite",
            )?,
            better_bibtex: resolve_store(
                bbt,
                std::env::var(BBT_DB_VAR).ok(),
                BBT_DB_VAR,
                "better-bibtex.sqlite",
            )?,
        })
    }
}

fn resolve_store(
    explicit: Option<&Path>,
    from_env: Option<String>,
    var: &str,
    file_name: &str,
) -> Result<PathBuf> {
    let (path, origin) = if let Some(path) = explicit {
        (expand_tilde(path), "command line")
    } else if let Some(val) = from_env {
        (expand_tilde(Path::new(&val)), var)
    } else {
        let home = home_dir().ok_or_else(|| {
            Error::Config(format!(
                "cannot locate {file_name}: no home directory, set {var}"
            ))
        })?;
        (home.join("Zotero").join(file_name), "default location")
    };

    if !path.is_file() {
        return Err(Error::Config(format!(
            "{file_name} not found at {} ({origin}); set {var} to its location",
            path.display()
        )));
    }
    Ok(path)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Resolve the separator placed between a citation key and a page locator.
///
/// Explicit value, then ZOTINDEX_YEAR_PAGE_SEP, then the persisted
/// setting, then `", p. "`.
pub fn resolve_year_page_sep(
    explicit: Option<&str>,
    config_db: &ConfigDb,
) -> Result<String> {
    if let Some(sep) = explicit {
        return Ok(sep.to_string());
    }
    if let Ok(sep) = std::env::var(YEAR_PAGE_SEP_VAR) {
        return Ok(sep);
    }
    config_db.get_setting_or(YEAR_PAGE_SEP_SETTING, DEFAULT_YEAR_PAGE_SEP)
}

/// Resolve the HTML-to-markdown converter program.
pub fn resolve_converter(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(CONVERTER_VAR).ok())
        .unwrap_or_else(|| DEFAULT_CONVERTER.to_string())
}
