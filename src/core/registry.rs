use crate::core::{CheckState, Domain, DomainRepository, Storage, SubdomainInfo};
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

const DOMAIN_DIR: &str = "domains";
const DOCUMENT_EXT: &str = ".json";

/// 以文件為單位的 registry：每個 domain 一份 JSON 文件。
///
/// 所有寫入都持有 `write_lock`，讀取-修改-寫回對單一文件是原子的；
/// 讀取不加鎖，儲存層保證不會讀到寫一半的文件。
pub struct DocumentRegistry<S: Storage> {
    storage: S,
    write_lock: Mutex<()>,
}

impl<S: Storage> DocumentRegistry<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn document_path(domain: &str) -> Result<String> {
        if domain.is_empty()
            || domain.starts_with('.')
            || domain.contains(['/', '\\', '\0'])
        {
            return Err(MonitorError::InvalidValue {
                field: "domain".to_string(),
                value: domain.to_string(),
                reason: "Not usable as a registry key".to_string(),
            });
        }
        Ok(format!("{}/{}{}", DOMAIN_DIR, domain, DOCUMENT_EXT))
    }

    fn decode(path: &str, expected: &str, bytes: &[u8]) -> Result<Domain> {
        let document: Domain = serde_json::from_slice(bytes).map_err(|e| {
            MonitorError::persistence(format!("invalid document {}: {}", path, e))
        })?;

        if document.name != expected {
            return Err(MonitorError::persistence(format!(
                "document {} holds domain '{}'",
                path, document.name
            )));
        }
        Ok(document)
    }

    async fn load(&self, domain: &str) -> Result<Option<Domain>> {
        let path = Self::document_path(domain)?;
        let raw = self
            .storage
            .read_file(&path)
            .await
            .map_err(|e| MonitorError::persistence(format!("read {}: {}", path, e)))?;

        raw.map(|bytes| Self::decode(&path, domain, &bytes))
            .transpose()
    }

    async fn load_all(&self) -> Result<Vec<Domain>> {
        let names = self
            .storage
            .list_files(DOMAIN_DIR)
            .await
            .map_err(|e| MonitorError::persistence(format!("list {}: {}", DOMAIN_DIR, e)))?;

        let mut domains = Vec::with_capacity(names.len());
        for file_name in names {
            let Some(domain) = file_name.strip_suffix(DOCUMENT_EXT) else {
                continue;
            };
            let path = Self::document_path(domain)?;
            let Some(bytes) = self
                .storage
                .read_file(&path)
                .await
                .map_err(|e| MonitorError::persistence(format!("read {}: {}", path, e)))?
            else {
                continue;
            };

            // 壞掉的文件只跳過，不影響其他 domain
            match Self::decode(&path, domain, &bytes) {
                Ok(document) => domains.push(document),
                Err(e) => tracing::warn!("⚠️ Skipping unreadable document: {}", e),
            }
        }
        Ok(domains)
    }

    async fn save(&self, document: &Domain) -> Result<()> {
        let path = Self::document_path(&document.name)?;
        let data = serde_json::to_vec_pretty(document)
            .map_err(|e| MonitorError::persistence(format!("encode {}: {}", path, e)))?;

        self.storage
            .write_file(&path, &data)
            .await
            .map_err(|e| MonitorError::persistence(format!("write {}: {}", path, e)))
    }

    /// 依 subdomain 名稱掃描全部文件，回傳第一個擁有它的 domain
    async fn find_owner(&self, subdomain: &str) -> Result<Option<Domain>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|domain| domain.contains(subdomain)))
    }
}

#[async_trait]
impl<S: Storage> DomainRepository for DocumentRegistry<S> {
    async fn get_domain(&self, name: &str) -> Result<Option<Domain>> {
        let document = self.load(name).await?;
        tracing::debug!("Lookup domain '{}': found={}", name, document.is_some());
        Ok(document)
    }

    async fn get_subdomain(&self, name: &str) -> Result<Option<SubdomainInfo>> {
        let owner = self.find_owner(name).await?;
        Ok(owner.and_then(|domain| {
            domain.subdomain(name).map(|sub| SubdomainInfo {
                subdomain: sub.name.clone(),
                domain: domain.name.clone(),
                check: sub.check,
            })
        }))
    }

    async fn list_all(&self) -> Result<Vec<Domain>> {
        self.load_all().await
    }

    async fn add_subdomain(&self, domain: &str, subdomain: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut document = self
            .load(domain)
            .await?
            .unwrap_or_else(|| Domain::new(domain));

        if !document.add_subdomain(subdomain) {
            tracing::info!(
                "subdomain '{}' already exists under domain '{}', skipped",
                subdomain,
                domain
            );
            return Ok(false);
        }

        self.save(&document).await?;
        tracing::info!("➕ Added subdomain '{}' to domain '{}'", subdomain, domain);
        Ok(true)
    }

    async fn rename_subdomain(&self, domain: &str, old_name: &str, new_name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut document = match self.load(domain).await? {
            Some(document) if document.contains(old_name) => document,
            _ => {
                return Err(MonitorError::not_found(
                    "subdomain",
                    format!("{}/{}", domain, old_name),
                ))
            }
        };

        if old_name == new_name {
            return Ok(());
        }
        if document.contains(new_name) {
            return Err(MonitorError::Duplicate {
                domain: domain.to_string(),
                name: new_name.to_string(),
            });
        }

        if let Some(entry) = document.subdomain_mut(old_name) {
            entry.name = new_name.to_string();
        }
        self.save(&document).await?;
        tracing::info!(
            "✏️ Renamed subdomain '{}' to '{}' under domain '{}'",
            old_name,
            new_name,
            domain
        );
        Ok(())
    }

    async fn remove_subdomain(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut document = self
            .find_owner(name)
            .await?
            .ok_or_else(|| MonitorError::not_found("subdomain", name))?;

        document.remove_subdomain(name);
        self.save(&document).await?;
        tracing::info!(
            "🗑️ Removed subdomain '{}' from domain '{}'",
            name,
            document.name
        );
        Ok(())
    }

    async fn set_check_state(&self, name: &str, state: CheckState) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut document = self
            .find_owner(name)
            .await?
            .ok_or_else(|| MonitorError::not_found("subdomain", name))?;

        match document.subdomain_mut(name) {
            Some(entry) if entry.check != state => entry.check = state,
            _ => {
                return Err(MonitorError::NoStateChange {
                    name: name.to_string(),
                    state: state.to_string(),
                })
            }
        }

        self.save(&document).await?;
        tracing::info!("🔧 subdomain '{}' check set to {}", name, state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use crate::utils::error::ErrorCategory;
    use std::sync::Arc;

    fn registry() -> DocumentRegistry<MemoryStorage> {
        DocumentRegistry::new(MemoryStorage::new())
    }

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        async fn read_file(&self, _path: &str) -> Result<Option<Vec<u8>>> {
            Err(MonitorError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )))
        }

        async fn write_file(&self, _path: &str, _data: &[u8]) -> Result<()> {
            Err(MonitorError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )))
        }

        async fn list_files(&self, _dir: &str) -> Result<Vec<String>> {
            Err(MonitorError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )))
        }
    }

    #[tokio::test]
    async fn test_add_creates_parent_implicitly() {
        let registry = registry();
        assert!(registry.get_domain("acme.com").await.unwrap().is_none());

        assert!(registry.add_subdomain("acme.com", "api.acme.com").await.unwrap());

        let domain = registry.get_domain("acme.com").await.unwrap().unwrap();
        assert_eq!(domain.subdomains.len(), 1);
        assert_eq!(domain.subdomains[0].check, CheckState::Enable);
    }

    #[tokio::test]
    async fn test_add_twice_keeps_one_entry_and_state() {
        let registry = registry();
        registry.add_subdomain("acme.com", "api.acme.com").await.unwrap();
        registry
            .set_check_state("api.acme.com", CheckState::Disable)
            .await
            .unwrap();

        assert!(!registry.add_subdomain("acme.com", "api.acme.com").await.unwrap());

        let domain = registry.get_domain("acme.com").await.unwrap().unwrap();
        assert_eq!(domain.subdomains.len(), 1);
        assert_eq!(domain.subdomains[0].check, CheckState::Disable);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_never_duplicate() {
        let registry = Arc::new(registry());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.add_subdomain("acme.com", "www.acme.com").await.unwrap()
            }));
        }

        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap() {
                added += 1;
            }
        }

        assert_eq!(added, 1);
        let domain = registry.get_domain("acme.com").await.unwrap().unwrap();
        assert_eq!(domain.subdomains.len(), 1);
    }

    #[tokio::test]
    async fn test_get_subdomain_scans_all_domains() {
        let registry = registry();
        registry.add_subdomain("acme.com", "api.acme.com").await.unwrap();
        registry.add_subdomain("beta.io", "shop.beta.io").await.unwrap();

        let info = registry.get_subdomain("shop.beta.io").await.unwrap().unwrap();
        assert_eq!(info.domain, "beta.io");
        assert_eq!(info.check, CheckState::Enable);
        assert!(registry.get_subdomain("nope.beta.io").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_preserves_check_state() {
        let registry = registry();
        registry.add_subdomain("acme.com", "old.acme.com").await.unwrap();
        registry
            .set_check_state("old.acme.com", CheckState::Disable)
            .await
            .unwrap();

        registry
            .rename_subdomain("acme.com", "old.acme.com", "new.acme.com")
            .await
            .unwrap();

        let domain = registry.get_domain("acme.com").await.unwrap().unwrap();
        assert!(!domain.contains("old.acme.com"));
        assert_eq!(
            domain.subdomain("new.acme.com").unwrap().check,
            CheckState::Disable
        );
    }

    #[tokio::test]
    async fn test_rename_unknown_or_onto_existing_fails() {
        let registry = registry();
        registry.add_subdomain("acme.com", "a.acme.com").await.unwrap();
        registry.add_subdomain("acme.com", "b.acme.com").await.unwrap();

        let err = registry
            .rename_subdomain("acme.com", "missing.acme.com", "c.acme.com")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let err = registry
            .rename_subdomain("other.com", "a.acme.com", "c.acme.com")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let err = registry
            .rename_subdomain("acme.com", "a.acme.com", "b.acme.com")
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_remove_keeps_empty_parent() {
        let registry = registry();
        registry.add_subdomain("acme.com", "api.acme.com").await.unwrap();

        registry.remove_subdomain("api.acme.com").await.unwrap();

        let domain = registry.get_domain("acme.com").await.unwrap().unwrap();
        assert!(domain.subdomains.is_empty());

        let err = registry.remove_subdomain("api.acme.com").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn test_same_state_transition_fails() {
        let registry = registry();
        registry.add_subdomain("acme.com", "x.acme.com").await.unwrap();

        registry
            .set_check_state("x.acme.com", CheckState::Disable)
            .await
            .unwrap();
        let err = registry
            .set_check_state("x.acme.com", CheckState::Disable)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::NoStateChange { .. }));

        let err = registry
            .set_check_state("ghost.acme.com", CheckState::Enable)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_storage_failure_is_persistence_error() {
        let registry = DocumentRegistry::new(BrokenStorage);

        let err = registry.list_all().await.unwrap_err();
        assert!(matches!(err, MonitorError::PersistenceError { .. }));

        let err = registry
            .add_subdomain("acme.com", "api.acme.com")
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::PersistenceError { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_persistence_error() {
        let storage = MemoryStorage::new();
        storage
            .write_file("domains/acme.com.json", b"{\"domain\":\"acme.com\",\"subdomains\":7}")
            .await
            .unwrap();
        let registry = DocumentRegistry::new(storage);

        let err = registry.get_domain("acme.com").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Persistence);

        // 不覆寫壞掉的文件
        let err = registry
            .add_subdomain("acme.com", "api.acme.com")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Persistence);
    }

    #[tokio::test]
    async fn test_corrupt_document_does_not_hide_other_domains() {
        let storage = MemoryStorage::new();
        storage
            .write_file("domains/broken.com.json", b"{ not json")
            .await
            .unwrap();
        let registry = DocumentRegistry::new(storage);
        registry.add_subdomain("acme.com", "soon.acme.com").await.unwrap();

        let all = registry.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "acme.com");

        let info = registry.get_subdomain("soon.acme.com").await.unwrap().unwrap();
        assert_eq!(info.domain, "acme.com");

        registry
            .set_check_state("soon.acme.com", CheckState::Disable)
            .await
            .unwrap();
        registry.remove_subdomain("soon.acme.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_path_like_domain_is_rejected() {
        let registry = registry();
        let err = registry
            .add_subdomain("../escape", "a.example")
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidValue { .. }));
    }
}
