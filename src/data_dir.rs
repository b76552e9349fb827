use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The ZOTINDEX_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/zotindex/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("ZOTINDEX_DATA_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("zotindex")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        let probe = root.join(".zotindex-write-probe");
        std::fs::write(&probe, b"")
            .and_then(|()| std::fs::remove_file(&probe))
            .map_err(|_| {
                Error::Config(format!(
                    "data directory is not writable: {}",
                    root.display()
                ))
            })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_db(&self) -> PathBuf {
        self.root.join("config.redb")
    }

    /// Private copy of the primary reference store.
    pub fn zotero_snapshot(&self) -> PathBuf {
        self.root.join("copy_of_zotero.sqlite")
    }

    /// Private copy of the citation-key store.
    pub fn bbt_snapshot(&self) -> PathBuf {
        self.root.join("copy_of_better_bibtex.sqlite")
    }
}
