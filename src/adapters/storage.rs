use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full_path = self.base_path.join(path);
        match fs::read(&full_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // 先寫暫存檔再 rename，讀取端不會看到寫一半的文件
        let mut temp_path = full_path.clone().into_os_string();
        temp_path.push(TEMP_SUFFIX);
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, &full_path).await?;
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let full_path = self.base_path.join(dir);
        let mut entries = match fs::read_dir(&full_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(TEMP_SUFFIX) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// 記憶體內的儲存，給測試與 dry-run 使用
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let files = self.files.lock().await;
        Ok(files.get(path).cloned())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let files = self.files.lock().await;
        let mut names: Vec<String> = files
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }
}
