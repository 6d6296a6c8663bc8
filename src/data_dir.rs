use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const DATA_DIR_ENV: &str = "QASEARCH_DATA_DIR";
const CONFIG_FILE: &str = "config.redb";
const SNAPSHOT_FILE: &str = "snapshot.redb";

/// Directory holding the settings database and the built snapshot.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The QASEARCH_DATA_DIR environment variable, when non-empty
    /// 3. The XDG data directory (~/.local/share/qasearch/)
    ///
    /// The directory is created if missing.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(DATA_DIR_ENV)
                .filter(|value| !value.is_empty())
            {
                Some(value) => PathBuf::from(value),
                None => xdg::BaseDirectories::with_prefix("qasearch")
                    .get_data_home()
                    .ok_or_else(|| {
                        Error::Config(
                            "could not determine XDG data home directory".into(),
                        )
                    })?,
            },
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_db(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Where `build` writes the snapshot, whether or not one exists yet.
    pub fn snapshot_db(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot_db().is_file()
    }

    /// Path of a snapshot that has already been built.
    ///
    /// A missing snapshot is an [`Error::Snapshot`] naming the command that
    /// creates one.
    pub fn existing_snapshot(&self) -> Result<PathBuf> {
        let path = self.snapshot_db();
        if path.is_file() {
            return Ok(path);
        }
        Err(Error::Snapshot(format!(
            "no snapshot in {}; run `qasearch build --corpus <FILE>` first",
            self.root.display()
        )))
    }
}
