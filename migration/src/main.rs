use sea_orm_migration::prelude::*;
use std::env;

/// 与 `config/config.dev.toml` 中的默认数据库保持一致
const DEFAULT_DATABASE: &str = "data/mural_proxy.db";

#[tokio::main]
async fn main() {
    if env::var("DATABASE_URL").is_err() {
        let from_migration_dir = env::current_dir()
            .map(|dir| dir.ends_with("migration"))
            .unwrap_or(false);
        let db_path = if from_migration_dir {
            format!("../{DEFAULT_DATABASE}")
        } else {
            DEFAULT_DATABASE.to_string()
        };
        // 仅在启动时、尚未创建任何线程前设置
        unsafe {
            env::set_var("DATABASE_URL", format!("sqlite://{db_path}?mode=rwc"));
        }
    }
    cli::run_cli(migration::Migrator).await;
}
