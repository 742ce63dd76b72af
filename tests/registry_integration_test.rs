use async_trait::async_trait;
use ssl_monitor::core::{CertificateInfo, CertificateProber, CheckState, DomainRepository, Notifier};
use ssl_monitor::utils::error::ErrorCategory;
use ssl_monitor::{
    CommandDispatcher, DocumentRegistry, ExpirySweeper, LocalStorage, MonitorError,
    RegistryService, Result,
};
use std::sync::Arc;
use tempfile::TempDir;

/// 只有 `.ok.test` 結尾的主機可以連線
struct SuffixProber;

#[async_trait]
impl CertificateProber for SuffixProber {
    async fn check(&self, host: &str) -> Result<()> {
        if host.ends_with(".ok.test") {
            Ok(())
        } else {
            Err(MonitorError::probe(host, "connection refused"))
        }
    }

    async fn certificate(&self, host: &str) -> Result<CertificateInfo> {
        self.check(host).await?;
        Ok(CertificateInfo {
            subject: format!("CN={}", host),
            issuer: "CN=Test CA".to_string(),
            issued_to: host.to_string(),
            issued_by: "Test CA".to_string(),
            not_before: "Jan  1 00:00:00 2024 GMT".to_string(),
            not_after: "Jan  1 00:00:00 2099 GMT".to_string(),
        })
    }
}

struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _destination: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

fn registry(dir: &TempDir) -> Arc<DocumentRegistry<LocalStorage>> {
    Arc::new(DocumentRegistry::new(LocalStorage::new(dir.path())))
}

fn dispatcher(repo: Arc<DocumentRegistry<LocalStorage>>) -> CommandDispatcher {
    let prober = Arc::new(SuffixProber);
    let service = RegistryService::new(repo.clone(), prober.clone());
    let sweeper = ExpirySweeper::new(repo, prober, Arc::new(NullNotifier), "ops");
    CommandDispatcher::new(Arc::new(service), Arc::new(sweeper))
}

#[tokio::test]
async fn test_documents_persist_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let service = RegistryService::new(registry(&temp_dir), Arc::new(SuffixProber));

    service.add_subdomain("acme.com", "www.ok.test").await.unwrap();
    service.add_subdomain("acme.com", "api.ok.test").await.unwrap();
    service.disable_subdomain("api.ok.test").await.unwrap();

    let path = temp_dir.path().join("domains").join("acme.com.json");
    let document: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(
        document,
        serde_json::json!({
            "domain": "acme.com",
            "subdomains": [
                {"name": "www.ok.test", "check": "enable"},
                {"name": "api.ok.test", "check": "disable"}
            ]
        })
    );

    // 重新開啟同一個目錄
    let reopened = registry(&temp_dir);
    let info = reopened.get_subdomain("api.ok.test").await.unwrap().unwrap();
    assert_eq!(info.domain, "acme.com");
    assert_eq!(info.check, CheckState::Disable);
}

#[tokio::test]
async fn test_concurrent_adds_to_one_domain_are_not_lost() {
    let temp_dir = TempDir::new().unwrap();
    let repo = registry(&temp_dir);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.add_subdomain("acme.com", &format!("host{}.acme.com", i))
                    .await
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    let domain = repo.get_domain("acme.com").await.unwrap().unwrap();
    assert_eq!(domain.subdomains.len(), 16);
}

#[tokio::test]
async fn test_chat_session_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = dispatcher(registry(&temp_dir));

    let reply = dispatcher
        .handle_text("/bulk_add acme.com a.ok.test b.ok.test")
        .await;
    assert_eq!(reply, "domain acme.com 下的 subdomain 批量新增成功。");

    let reply = dispatcher
        .handle_text("/update acme.com b.ok.test c.ok.test")
        .await;
    assert!(reply.contains("c.ok.test"));

    let reply = dispatcher.handle_text("/update acme.com c.ok.test a.ok.test").await;
    assert!(reply.contains("已存在"));

    let reply = dispatcher.handle_text("/del a.ok.test").await;
    assert_eq!(reply, "subdomain a.ok.test 刪除成功。");

    let reply = dispatcher.handle_text("/del a.ok.test").await;
    assert!(reply.starts_with("未找到"));

    let reply = dispatcher.handle_text("/get_subdomain c.ok.test").await;
    assert!(reply.contains("domain: acme.com"));
    assert!(reply.contains("check: enable"));

    let reply = dispatcher.handle_text("/enable c.ok.test").await;
    assert!(reply.starts_with("未找到指定的 subdomain"));

    let reply = dispatcher.handle_text("/update acme.com").await;
    assert!(reply.contains("/update <domain> <old_subdomain> <new_subdomain>"));
}

#[derive(Default)]
struct RecordingNotifier {
    sent: tokio::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, _destination: &str, message: &str) -> Result<()> {
        self.sent.lock().await.push(message.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_corrupt_document_does_not_stop_the_sweep() {
    let temp_dir = TempDir::new().unwrap();
    let domains = temp_dir.path().join("domains");
    std::fs::create_dir_all(&domains).unwrap();
    std::fs::write(domains.join("broken.com.json"), b"{ not json").unwrap();

    let repo = registry(&temp_dir);
    let service = RegistryService::new(repo.clone(), Arc::new(SuffixProber));
    service.add_subdomain("acme.com", "www.ok.test").await.unwrap();

    let listed = service.list_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "acme.com");
    assert!(service.get_subdomain_info("www.ok.test").await.is_ok());

    // 指名讀取壞掉的文件仍回報儲存錯誤
    let err = service.get_domain_info("broken.com").await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Persistence);
    assert_eq!(err.user_friendly_message(), "資料存取失敗，請稍後再試。");

    let notifier = Arc::new(RecordingNotifier::default());
    let sweeper = ExpirySweeper::new(repo, Arc::new(SuffixProber), notifier.clone(), "ops");
    let report = sweeper.run_and_report().await.unwrap();
    assert_eq!(report.checked, 1);

    let sent = notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("所有 domain 的 SSL 到期時間檢查完成。"));
}
