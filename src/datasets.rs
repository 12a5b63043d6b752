//! Dataset discovery, loading and staging.
//!
//! Datasets arrive as CSV files exported to a directory. Files whose names
//! start with `_` are internal exports and never shown to the model.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adapters::DatasetUploader;

/// A dataset uploaded to the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedDataset {
    pub name: String,
    pub sandbox_path: String,
}

/// List CSV files in `dir`, sorted by name. A missing directory yields none.
pub async fn discover_csv_files(dir: &Path) -> Vec<String> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot read data directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name().to_string_lossy().to_string();
                if !name.ends_with(".csv") || name.starts_with('_') {
                    continue;
                }
                match entry.file_type().await {
                    Ok(file_type) if file_type.is_file() => names.push(name),
                    _ => {}
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Error while listing {}: {}", dir.display(), e);
                break;
            }
        }
    }

    names.sort();
    tracing::info!("Found {} CSV file(s) in {}", names.len(), dir.display());
    names
}

/// Read the named files from `dir`, skipping unreadable and blank ones.
pub async fn load_csv_files(dir: &Path, names: &[String]) -> Vec<(String, String)> {
    let mut loaded = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => {
                tracing::debug!("Skipping empty dataset {}", name);
            }
            Ok(content) => {
                tracing::debug!("Loaded {} ({} bytes)", name, content.len());
                loaded.push((name.clone(), content));
            }
            Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
        }
    }
    loaded
}

/// Upload every dataset, logging and skipping the ones that fail.
pub async fn stage_datasets(
    uploader: &dyn DatasetUploader,
    files: &[(String, String)],
) -> Vec<StagedDataset> {
    let mut staged = Vec::with_capacity(files.len());
    for (name, content) in files {
        match uploader.upload(name, content).await {
            Ok(sandbox_path) => {
                tracing::info!("Staged {} at {}", name, sandbox_path);
                staged.push(StagedDataset {
                    name: name.clone(),
                    sandbox_path,
                });
            }
            Err(e) => tracing::warn!("Failed to upload {}: {}", name, e),
        }
    }
    staged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FlakyUploader {
        reject: &'static str,
        uploaded: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DatasetUploader for FlakyUploader {
        async fn upload(&self, name: &str, _content: &str) -> Result<String, AdapterError> {
            if name == self.reject {
                return Err(AdapterError::Transport("connection reset".to_string()));
            }
            self.uploaded.lock().unwrap().push(name.to_string());
            Ok(format!("/home/user/{}", name))
        }
    }

    #[tokio::test]
    async fn test_discover_skips_internal_and_non_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["sleep.csv", "_schema.csv", "notes.txt", "activity.csv"] {
            std::fs::write(dir.path().join(name), "a,b\n1,2\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let names = discover_csv_files(dir.path()).await;
        assert_eq!(names, vec!["activity.csv", "sleep.csv"]);
    }

    #[tokio::test]
    async fn test_discover_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let names = discover_csv_files(&dir.path().join("absent")).await;
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_load_skips_blank_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("steps.csv"), "date,steps\n2024-05-01,9000\n").unwrap();
        std::fs::write(dir.path().join("empty.csv"), "  \n").unwrap();

        let names = vec![
            "steps.csv".to_string(),
            "empty.csv".to_string(),
            "gone.csv".to_string(),
        ];
        let loaded = load_csv_files(dir.path(), &names).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "steps.csv");
        assert!(loaded[0].1.contains("9000"));
    }

    #[tokio::test]
    async fn test_stage_skips_failed_uploads() {
        let uploader = FlakyUploader {
            reject: "broken.csv",
            uploaded: Mutex::new(Vec::new()),
        };
        let files = vec![
            ("sleep.csv".to_string(), "x".to_string()),
            ("broken.csv".to_string(), "y".to_string()),
            ("meals.csv".to_string(), "z".to_string()),
        ];

        let staged = stage_datasets(&uploader, &files).await;
        assert_eq!(
            staged,
            vec![
                StagedDataset {
                    name: "sleep.csv".to_string(),
                    sandbox_path: "/home/user/sleep.csv".to_string(),
                },
                StagedDataset {
                    name: "meals.csv".to_string(),
                    sandbox_path: "/home/user/meals.csv".to_string(),
                },
            ]
        );
        assert_eq!(uploader.uploaded.lock().unwrap().len(), 2);
    }
}
