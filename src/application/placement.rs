use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::domain::{FileInfo, PlacementOutcome};

/// Copies finished downloads into the user-visible directory.
#[derive(Debug, Clone)]
pub struct StoragePlacement {
    public_dir: PathBuf,
    file_extension: String,
}

impl StoragePlacement {
    pub fn new(public_dir: PathBuf, file_extension: String) -> Self {
        Self {
            public_dir,
            file_extension,
        }
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Copy `private_path` to `<public_dir>/<title>.<ext>`.
    ///
    /// Never fails: if the copy is refused the private file stays the result.
    pub async fn place_in_public_storage(&self, private_path: &Path, title: &str) -> PlacementOutcome {
        let public_path = self
            .public_dir
            .join(format!("{}.{}", title, self.file_extension));

        let keep_private = PlacementOutcome {
            final_path: private_path.to_path_buf(),
            is_public: false,
        };

        // Copying a file onto itself would truncate it
        if public_path == private_path {
            warn!(path = %private_path.display(), "public and private storage are the same location");
            return keep_private;
        }

        match tokio::fs::copy(private_path, &public_path).await {
            Ok(_) => {
                info!(path = %public_path.display(), "copied to public storage");
                PlacementOutcome {
                    final_path: public_path,
                    is_public: true,
                }
            }
            Err(e) => {
                warn!(
                    path = %public_path.display(),
                    error = %e,
                    "could not copy to public storage, file kept in app storage"
                );
                keep_private
            }
        }
    }
}

/// Files in `dir` whose extension matches `extension`, sorted by name.
pub async fn list_files(dir: &Path, extension: &str) -> io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if !matches {
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        files.push(FileInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            size_bytes: metadata.len(),
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
