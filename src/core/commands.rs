use crate::core::service::RegistryService;
use crate::core::sweep::ExpirySweeper;
use crate::utils::error::{MonitorError, Result};
use serde::Serialize;
use std::sync::Arc;

pub const HELP_TEXT: &str = "以下是可用的命令列表及其用途：

/cert_info <domain> - 取得指定 domain 的 SSL 證書資訊。
/get_all - 取得所有 domain 及其 subdomain 的資訊。
/get_domain <domain> - 取得指定 domain 下所有 subdomain 的資訊。
/get_subdomain <subdomain> - 取得指定 subdomain 所屬的 domain 與檢查狀態。
/add_subdomain <domain> <subdomain> - 新增一個 subdomain（需通過 TLS 檢查）。
/bulk_add <domain> <subdomain1> <subdomain2> ... - 批量新增多個 subdomain。
/update <domain> <old_subdomain> <new_subdomain> - 更新 subdomain 名稱。
/del <subdomain> - 刪除指定的 subdomain。
/disable <subdomain> - 停用 subdomain 的到期檢查。
/enable <subdomain> - 啟用 subdomain 的到期檢查。
/add_cloudflare - 從 Cloudflare 匯入所有 A / CNAME 記錄。
/check - 立即檢查所有 domain 的 SSL 到期時間並通知。
/help - 顯示此說明。";

/// 聊天室命令：名稱 + 位置參數
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetDomain { domain: String },
    GetSubdomain { subdomain: String },
    GetAll,
    AddSubdomain { domain: String, subdomain: String },
    BulkAdd { domain: String, subdomains: Vec<String> },
    Update { domain: String, old_name: String, new_name: String },
    Delete { subdomain: String },
    CertInfo { domain: String },
    Check,
    Disable { subdomain: String },
    Enable { subdomain: String },
    AddCloudflare,
    Help,
}

impl Command {
    /// 解析 `/name arg1 arg2`；`/name@bot_name` 的後綴會被忽略
    pub fn parse(text: &str) -> Result<Command> {
        let mut parts = text.split_whitespace();
        let head = parts.next().ok_or_else(|| MonitorError::usage("/help"))?;
        let name = head.trim_start_matches('/');
        let name = name.split('@').next().unwrap_or(name);
        let args: Vec<&str> = parts.collect();
        Self::from_parts(name, &args)
    }

    pub fn from_parts(name: &str, args: &[&str]) -> Result<Command> {
        let owned = |i: usize| args[i].to_string();
        let arity = |expected: usize| -> Result<()> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(MonitorError::usage(Self::usage(name)))
            }
        };

        let command = match name {
            "get_domain" => {
                arity(1)?;
                Command::GetDomain { domain: owned(0) }
            }
            "get_subdomain" => {
                arity(1)?;
                Command::GetSubdomain { subdomain: owned(0) }
            }
            "get_all" => Command::GetAll,
            "add_subdomain" => {
                arity(2)?;
                Command::AddSubdomain {
                    domain: owned(0),
                    subdomain: owned(1),
                }
            }
            "bulk_add" => {
                if args.len() < 2 {
                    return Err(MonitorError::usage(Self::usage(name)));
                }
                Command::BulkAdd {
                    domain: owned(0),
                    subdomains: args[1..].iter().map(|s| s.to_string()).collect(),
                }
            }
            "update" => {
                arity(3)?;
                Command::Update {
                    domain: owned(0),
                    old_name: owned(1),
                    new_name: owned(2),
                }
            }
            "del" => {
                arity(1)?;
                Command::Delete { subdomain: owned(0) }
            }
            "cert_info" => {
                arity(1)?;
                Command::CertInfo { domain: owned(0) }
            }
            "check" => Command::Check,
            "disable" => {
                arity(1)?;
                Command::Disable { subdomain: owned(0) }
            }
            "enable" => {
                arity(1)?;
                Command::Enable { subdomain: owned(0) }
            }
            "add_cloudflare" => Command::AddCloudflare,
            "help" | "start" => Command::Help,
            _ => return Err(MonitorError::usage(Self::usage(name))),
        };
        Ok(command)
    }

    pub fn usage(name: &str) -> &'static str {
        match name {
            "get_domain" => "/get_domain <domain>",
            "get_subdomain" => "/get_subdomain <subdomain>",
            "add_subdomain" => "/add_subdomain <domain> <subdomain>",
            "bulk_add" => "/bulk_add <domain> <subdomain1> <subdomain2> ...",
            "update" => "/update <domain> <old_subdomain> <new_subdomain>",
            "del" => "/del <subdomain>",
            "cert_info" => "/cert_info <domain>",
            "disable" => "/disable <subdomain>",
            "enable" => "/enable <subdomain>",
            _ => "/help",
        }
    }
}

/// 把命令交給 service / sweeper，並產生回覆文字
pub struct CommandDispatcher {
    service: Arc<RegistryService>,
    sweeper: Arc<ExpirySweeper>,
}

impl CommandDispatcher {
    pub fn new(service: Arc<RegistryService>, sweeper: Arc<ExpirySweeper>) -> Self {
        Self { service, sweeper }
    }

    /// 永遠產生回覆：錯誤轉成使用者看得懂的訊息
    pub async fn handle_text(&self, text: &str) -> String {
        let result = match Command::parse(text) {
            Ok(command) => self.execute(command).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    "Command '{}' failed: {} (Category: {:?})",
                    text.trim(),
                    e,
                    e.category()
                );
                e.user_friendly_message()
            }
        }
    }

    pub async fn execute(&self, command: Command) -> Result<String> {
        tracing::debug!("Executing command: {:?}", command);

        match command {
            Command::GetDomain { domain } => to_yaml(&self.service.get_domain_info(&domain).await?),
            Command::GetSubdomain { subdomain } => {
                to_yaml(&self.service.get_subdomain_info(&subdomain).await?)
            }
            Command::GetAll => {
                let domains = self.service.list_all().await?;
                if domains.is_empty() {
                    Ok("目前沒有任何 domain。".to_string())
                } else {
                    to_yaml(&domains)
                }
            }
            Command::AddSubdomain { domain, subdomain } => {
                if self.service.add_subdomain(&domain, &subdomain).await? {
                    Ok(format!(
                        "subdomain {} 已成功新增至 domain {}。",
                        subdomain, domain
                    ))
                } else {
                    Ok(format!(
                        "subdomain {} 已存在於 domain {} 下，不進行新增。",
                        subdomain, domain
                    ))
                }
            }
            Command::BulkAdd { domain, subdomains } => {
                self.service.bulk_add_subdomains(&domain, &subdomains).await?;
                Ok(format!("domain {} 下的 subdomain 批量新增成功。", domain))
            }
            Command::Update {
                domain,
                old_name,
                new_name,
            } => {
                self.service
                    .update_subdomain(&domain, &old_name, &new_name)
                    .await?;
                Ok(format!(
                    "domain {} 的 subdomain {} 已更新為 {}。",
                    domain, old_name, new_name
                ))
            }
            Command::Delete { subdomain } => {
                self.service.delete_subdomain(&subdomain).await?;
                Ok(format!("subdomain {} 刪除成功。", subdomain))
            }
            Command::CertInfo { domain } => {
                Ok(self.service.get_certificate_report(&domain).await?.to_string())
            }
            Command::Check => Ok(self.sweeper.sweep().await?.summary()),
            Command::Disable { subdomain } => {
                self.service.disable_subdomain(&subdomain).await?;
                Ok(format!("subdomain {} 停用成功。", subdomain))
            }
            Command::Enable { subdomain } => {
                self.service.enable_subdomain(&subdomain).await?;
                Ok(format!("subdomain {} 啟用成功。", subdomain))
            }
            Command::AddCloudflare => {
                let domains = self.service.import_from_external_source().await?;
                Ok(format!("{}新增成功", to_yaml(&domains)?))
            }
            Command::Help => Ok(HELP_TEXT.to_string()),
        }
    }
}

fn to_yaml<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}
