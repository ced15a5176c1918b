//! # Mural Proxy 主程序

use chrono::Duration;
use clap::{Parser, Subcommand};
use mural_proxy::{
    ProxyError, Result,
    config::{AppConfig, load_config},
    database::{init_database, run_migrations},
    linfo,
    logging::{self, LogComponent, LogStage},
    management::{AppState, ManagementServer, middleware::JwtManager},
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "mural-proxy", version, about = "Multi-tenant proxy for the Mural Pay API")]
struct Cli {
    /// 配置文件路径，默认 `config/config.{RUST_ENV}.toml`
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve,
    /// 只执行数据库迁移
    Migrate,
    /// 签发管理接口访问令牌
    IssueToken {
        #[arg(long)]
        subject: String,
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    logging::init_logging(Some(&config.logging.level));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let db = init_database(&config.database).await?;
            run_migrations(&db).await?;
            Ok(())
        }
        Command::IssueToken { subject, ttl_hours } => {
            if !config.auth.enabled {
                return Err(ProxyError::config("认证未启用，无需签发令牌"));
            }
            let token = JwtManager::new(&config.auth)
                .issue_token(&subject, Duration::hours(ttl_hours))?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        &format!("服务启动: version={}", env!("CARGO_PKG_VERSION"))
    );

    let db = init_database(&config.database).await?;
    run_migrations(&db).await?;

    let state = AppState::new(config, Arc::new(db));
    ManagementServer::new(state).serve().await?;

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}
