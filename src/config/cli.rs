use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "ssl-monitor")]
#[command(about = "TLS certificate expiry monitor with a chat-driven domain registry")]
pub struct CliConfig {
    #[arg(long, short, env = "SSL_MONITOR_CONFIG", default_value = "config.toml")]
    pub config: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// 啟動排程與 Telegram bot（預設）
    Serve,
    /// 立即掃描一次並送出通知
    Check,
    /// 執行一個聊天室命令，例如 `run get_domain acme.com`
    Run {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        command: Vec<String>,
    },
}

impl CliConfig {
    pub fn command(&self) -> CliCommand {
        self.command.clone().unwrap_or(CliCommand::Serve)
    }
}
