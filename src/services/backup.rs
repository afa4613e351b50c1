//! Backups of managed files.
//!
//! A backup is a folder named after its creation time
//! (`DD.MM.YYYY_HH.MM.SS`) holding a copy of every tracked file plus
//! `path.txt`, which lists the original absolute paths one per line. Files
//! are stored under their base name; when two tracked files share a base
//! name they are stored as `<hash>-<basename>`, where the hash is derived from
//! the original path, so the stored name can always be recomputed from the
//! manifest alone.

use crate::error::{IoError, read_file, write_file};
use crate::services::locks::WriteLocks;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const MANIFEST_FILE: &str = "path.txt";
pub const BACKUP_NAME_FORMAT: &str = "%d.%m.%Y_%H.%M.%S";

const HASH_PREFIX_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error("Backup '{0}' does not exist")]
    UnknownBackup(String),

    #[error("Backup '{0}' already exists")]
    AlreadyExists(String),

    #[error("Backup '{name}' does not contain '{path}'")]
    UnknownEntry { name: String, path: Utf8PathBuf },

    #[error("Backup '{name}' is inconsistent: {reason}")]
    Inconsistent { name: String, reason: String },

    #[error("None of the tracked files exist")]
    NothingToBackUp,

    #[error("Backup listing was cancelled")]
    Cancelled,
}

/// One file inside a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub original: Utf8PathBuf,
    pub stored_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    /// Folder name, i.e. the creation timestamp.
    pub name: String,
    #[serde(skip)]
    pub created: NaiveDateTime,
    pub entries: Vec<BackupEntry>,
}

impl BackupManifest {
    pub fn entry(&self, original: &Utf8Path) -> Option<&BackupEntry> {
        self.entries.iter().find(|e| e.original == original)
    }

    pub fn originals(&self) -> Vec<Utf8PathBuf> {
        self.entries.iter().map(|e| e.original.clone()).collect()
    }
}

/// Parse a backup folder name back into its timestamp.
pub fn parse_backup_name(name: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(name, BACKUP_NAME_FORMAT).ok()
}

/// Stored names for `originals`, in the same order.
pub fn storage_names(originals: &[Utf8PathBuf]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for original in originals {
        *counts.entry(base_name(original).to_lowercase()).or_default() += 1;
    }

    originals
        .iter()
        .map(|original| {
            let base = base_name(original);
            if counts.get(&base.to_lowercase()).copied().unwrap_or(0) > 1 {
                let digest = hex::encode(Sha256::digest(original.as_str().as_bytes()));
                format!("{}-{}", &digest[..HASH_PREFIX_LEN], base)
            } else {
                base.to_string()
            }
        })
        .collect()
}

fn base_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or("file")
}

#[derive(Debug, Clone)]
pub struct BackupService {
    root: Utf8PathBuf,
    locks: WriteLocks,
}

impl BackupService {
    pub fn new(root: impl Into<Utf8PathBuf>, locks: WriteLocks) -> Self {
        Self {
            root: root.into(),
            locks,
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Snapshot `tracked` into a new backup named after the current time.
    pub async fn create_backup(&self, tracked: &[Utf8PathBuf]) -> Result<BackupManifest, BackupError> {
        self.create_backup_at(Local::now().naive_local(), tracked).await
    }

    /// Snapshot `tracked` into a backup named after `created`.
    ///
    /// Tracked files that do not exist are skipped with a warning. If none
    /// exist no folder is created.
    pub async fn create_backup_at(
        &self,
        created: NaiveDateTime,
        tracked: &[Utf8PathBuf],
    ) -> Result<BackupManifest, BackupError> {
        let name = created.format(BACKUP_NAME_FORMAT).to_string();
        // Keep only what the folder name records
        let created = parse_backup_name(&name).unwrap_or(created);
        let folder = self.root.join(&name);
        if tokio::fs::try_exists(&folder).await.unwrap_or(false) {
            return Err(BackupError::AlreadyExists(name));
        }

        let mut contents = Vec::new();
        for original in tracked {
            let _guard = self.locks.lock(original).await;
            match read_file(original).await {
                Ok(bytes) => contents.push((original.clone(), bytes)),
                Err(e) if e.is_not_found() => {
                    tracing::warn!("Skipping missing file in backup: {}", original);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if contents.is_empty() {
            return Err(BackupError::NothingToBackUp);
        }

        let originals: Vec<Utf8PathBuf> = contents.iter().map(|(p, _)| p.clone()).collect();
        let names = storage_names(&originals);

        let written = self.write_backup(&folder, &contents, &names).await;
        if let Err(e) = written {
            tracing::error!("Backup {} failed, removing partial folder: {}", name, e);
            if let Err(cleanup) = tokio::fs::remove_dir_all(&folder).await {
                tracing::warn!("Failed to remove {}: {}", folder, cleanup);
            }
            return Err(e);
        }

        tracing::info!("Created backup {} with {} file(s)", name, contents.len());
        Ok(BackupManifest {
            name,
            created,
            entries: originals
                .into_iter()
                .zip(names)
                .map(|(original, stored_name)| BackupEntry {
                    original,
                    stored_name,
                })
                .collect(),
        })
    }

    async fn write_backup(
        &self,
        folder: &Utf8Path,
        contents: &[(Utf8PathBuf, Vec<u8>)],
        names: &[String],
    ) -> Result<(), BackupError> {
        for ((_, bytes), stored) in contents.iter().zip(names) {
            write_file(&folder.join(stored), bytes).await?;
        }

        let manifest = contents
            .iter()
            .map(|(p, _)| p.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        write_file(&folder.join(MANIFEST_FILE), manifest.as_bytes()).await?;
        Ok(())
    }

    /// All readable backups, newest first.
    ///
    /// Folders are read concurrently. Folders with an unreadable manifest or
    /// whose files do not match the manifest are skipped with a warning.
    /// Cancelling `cancel` aborts the listing without partial results.
    pub async fn list_backups(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<BackupManifest>, BackupError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IoError::new(&self.root, e).into()),
        };

        let mut tasks = JoinSet::new();
        loop {
            let entry = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BackupError::Cancelled),
                entry = dir.next_entry() => entry.map_err(|e| IoError::new(&self.root, e))?,
            };
            let Some(entry) = entry else { break };

            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(created) = parse_backup_name(&name) else {
                tracing::debug!("Ignoring non-backup entry {}", name);
                continue;
            };
            let folder = self.root.join(&name);
            tasks.spawn(async move { read_manifest(folder, name, created).await });
        }

        let mut manifests = Vec::new();
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(BackupError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            match joined {
                Ok(Ok(manifest)) => manifests.push(manifest),
                Ok(Err(e)) => tracing::warn!("Skipping backup: {}", e),
                Err(e) => tracing::error!("Backup listing task failed: {}", e),
            }
        }

        manifests.sort_by(|a, b| b.created.cmp(&a.created));
        tracing::debug!("Found {} backup(s) in {}", manifests.len(), self.root);
        Ok(manifests)
    }

    /// Copy the `selected` originals of `manifest` back over the current
    /// files, creating missing parent folders. Returns the restored paths.
    pub async fn restore(
        &self,
        manifest: &BackupManifest,
        selected: &[Utf8PathBuf],
    ) -> Result<Vec<Utf8PathBuf>, BackupError> {
        let folder = self.root.join(&manifest.name);
        let entries = selected
            .iter()
            .map(|path| {
                manifest.entry(path).ok_or_else(|| BackupError::UnknownEntry {
                    name: manifest.name.clone(),
                    path: path.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut restored = Vec::new();
        for entry in entries {
            let bytes = read_file(&folder.join(&entry.stored_name)).await?;
            let _guard = self.locks.lock(&entry.original).await;
            write_file(&entry.original, &bytes).await?;
            tracing::info!("Restored {} from backup {}", entry.original, manifest.name);
            restored.push(entry.original.clone());
        }
        Ok(restored)
    }

    pub async fn delete_backup(&self, name: &str) -> Result<(), BackupError> {
        if parse_backup_name(name).is_none() {
            return Err(BackupError::UnknownBackup(name.to_string()));
        }
        let folder = self.root.join(name);
        match tokio::fs::remove_dir_all(&folder).await {
            Ok(()) => {
                tracing::info!("Deleted backup {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BackupError::UnknownBackup(name.to_string()))
            }
            Err(e) => Err(IoError::new(&folder, e).into()),
        }
    }
}

async fn read_manifest(
    folder: Utf8PathBuf,
    name: String,
    created: NaiveDateTime,
) -> Result<BackupManifest, BackupError> {
    let inconsistent = |reason: String| BackupError::Inconsistent {
        name: name.clone(),
        reason,
    };

    let bytes = read_file(&folder.join(MANIFEST_FILE))
        .await
        .map_err(|e| inconsistent(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|_| inconsistent("manifest is not UTF-8".to_string()))?;

    let originals: Vec<Utf8PathBuf> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(Utf8PathBuf::from)
        .collect();
    if originals.is_empty() {
        return Err(inconsistent("manifest is empty".to_string()));
    }

    let names = storage_names(&originals);
    for stored in &names {
        let present = tokio::fs::try_exists(folder.join(stored)).await.unwrap_or(false);
        if !present {
            return Err(inconsistent(format!("'{}' is missing", stored)));
        }
    }

    let mut stored_files = 0;
    let mut dir = tokio::fs::read_dir(&folder)
        .await
        .map_err(|e| inconsistent(e.to_string()))?;
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| inconsistent(e.to_string()))?
    {
        if entry.file_name() != MANIFEST_FILE {
            stored_files += 1;
        }
    }
    if stored_files != originals.len() {
        return Err(inconsistent(format!(
            "manifest lists {} file(s) but the folder holds {}",
            originals.len(),
            stored_files
        )));
    }

    Ok(BackupManifest {
        name,
        created,
        entries: originals
            .into_iter()
            .zip(names)
            .map(|(original, stored_name)| BackupEntry {
                original,
                stored_name,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_names_qualify_collisions_only() {
        let originals = vec![
            Utf8PathBuf::from("/docs/Skyrim.ini"),
            Utf8PathBuf::from("/mo/profiles/Default/Skyrim.ini"),
            Utf8PathBuf::from("/docs/SkyrimPrefs.ini"),
        ];
        let names = storage_names(&originals);

        assert_eq!(names[2], "SkyrimPrefs.ini");
        assert!(names[0].ends_with("-Skyrim.ini"));
        assert!(names[1].ends_with("-Skyrim.ini"));
        assert_ne!(names[0], names[1]);
        assert_eq!(names[0].len(), HASH_PREFIX_LEN + 1 + "Skyrim.ini".len());
        assert_eq!(storage_names(&originals), names);
    }

    #[test]
    fn test_backup_name_format() {
        let created = NaiveDateTime::parse_from_str("2024-03-05 14:07:09", "%Y-%m-%d %H:%M:%S").unwrap();
        let name = created.format(BACKUP_NAME_FORMAT).to_string();
        assert_eq!(name, "05.03.2024_14.07.09");
        assert_eq!(parse_backup_name(&name), Some(created));
        assert_eq!(parse_backup_name("notes"), None);
    }
}
