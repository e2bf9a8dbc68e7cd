// File mutation executor: create, delete and modify inside the workspace

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::Workspace;
use crate::error::{CommandError, ExecutionResult};

impl Workspace {
    /// Create a new file, making parent directories as needed. Never overwrites.
    pub async fn create_file(&self, filepath: &str, content: &str) -> ExecutionResult {
        self.try_create(filepath, content).await.into()
    }

    /// Delete a regular file. Directories are refused.
    pub async fn delete_file(&self, filepath: &str) -> ExecutionResult {
        self.try_delete(filepath).await.into()
    }

    /// Replace a file's content, keeping a best-effort `<name>.bak` copy of the old one.
    pub async fn modify_file(&self, filepath: &str, content: &str) -> ExecutionResult {
        self.try_modify(filepath, content).await.into()
    }

    async fn try_create(&self, filepath: &str, content: &str) -> Result<String, CommandError> {
        let path = self.sandbox.resolve(filepath)?;

        if let Some(parent) = path.as_path().parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(CommandError::io("creating"))?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_path())
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(CommandError::AlreadyExists(filepath.to_string()));
            }
            Err(e) => return Err(CommandError::io("creating")(e)),
        };

        file.write_all(content.as_bytes())
            .await
            .map_err(CommandError::io("creating"))?;
        file.flush().await.map_err(CommandError::io("creating"))?;

        info!("Created file: {}", filepath);
        Ok(format!("File created: {}", filepath))
    }

    async fn try_delete(&self, filepath: &str) -> Result<String, CommandError> {
        let path = self.sandbox.resolve(filepath)?;

        if existing_metadata(path.as_path(), filepath, "deleting").await?.is_dir() {
            return Err(CommandError::DeleteDirectory(filepath.to_string()));
        }

        fs::remove_file(path.as_path())
            .await
            .map_err(CommandError::io("deleting"))?;

        info!("Deleted file: {}", filepath);
        Ok(format!("File deleted: {}", filepath))
    }

    async fn try_modify(&self, filepath: &str, content: &str) -> Result<String, CommandError> {
        let path = self.sandbox.resolve(filepath)?;

        if existing_metadata(path.as_path(), filepath, "modifying").await?.is_dir() {
            return Err(CommandError::ModifyDirectory(filepath.to_string()));
        }

        if self.backup_on_modify {
            // A failed backup never blocks the write
            if let Err(e) = write_backup(path.as_path()).await {
                warn!("Could not create backup for {}: {}", filepath, e);
            }
        }

        fs::write(path.as_path(), content)
            .await
            .map_err(CommandError::io("modifying"))?;

        info!("Modified file: {}", filepath);
        Ok(format!("File modified: {}", filepath))
    }
}

async fn existing_metadata(
    path: &Path,
    filepath: &str,
    verb: &'static str,
) -> Result<std::fs::Metadata, CommandError> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CommandError::NotFound(filepath.to_string()))
        }
        Err(e) => Err(CommandError::io(verb)(e)),
    }
}

/// `dir/a.txt` -> `dir/a.txt.bak`
pub(crate) fn backup_path(path: &Path) -> Option<PathBuf> {
    let mut name = path.file_name()?.to_os_string();
    name.push(".bak");
    Some(path.with_file_name(name))
}

async fn write_backup(path: &Path) -> std::io::Result<()> {
    let backup = backup_path(path).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    fs::copy(path, &backup).await?;
    Ok(())
}
