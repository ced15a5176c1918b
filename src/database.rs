//! # 数据库模块
//!
//! 数据库连接和迁移管理

use crate::config::DatabaseConfig;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lerror, linfo, lwarn};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::path::Path;

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.url.as_str();
    linfo!(
        "system",
        LogStage::Db,
        LogComponent::Database,
        "connect",
        &format!(
            "正在连接数据库: {}",
            database_url.chars().take(50).collect::<String>()
        )
    );

    if config.is_sqlite() && !config.is_memory_database() {
        ensure_sqlite_file(database_url)?;
    }

    let mut options = ConnectOptions::new(database_url);
    // 内存数据库每个连接都是独立的库，只能使用单连接
    let max_connections = if config.is_memory_database() {
        1
    } else {
        config.max_connections
    };
    options
        .max_connections(max_connections)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;

    linfo!("system", LogStage::Db, LogComponent::Database, "connect", "数据库连接成功");
    Ok(db)
}

/// 确保 SQLite 数据库文件及其目录存在
fn ensure_sqlite_file(database_url: &str) -> Result<(), DbErr> {
    let db_path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let db_file_path = Path::new(db_path);

    if let Some(parent_dir) = db_file_path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            std::fs::create_dir_all(parent_dir).map_err(|e| {
                DbErr::Custom(format!("无法创建数据库目录 {}: {e}", parent_dir.display()))
            })?;
            ldebug!(
                "system",
                LogStage::Db,
                LogComponent::Database,
                "create_db_dir",
                &format!("数据库目录创建成功: {}", parent_dir.display())
            );
        }
    }

    if !db_file_path.exists() {
        std::fs::File::create(db_file_path).map_err(|e| {
            DbErr::Custom(format!("无法创建数据库文件 {}: {e}", db_file_path.display()))
        })?;
        linfo!(
            "system",
            LogStage::Db,
            LogComponent::Database,
            "create_db_file",
            &format!("数据库文件创建成功: {}", db_file_path.display())
        );
    }

    Ok(())
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    linfo!("system", LogStage::Db, LogComponent::Database, "migrate", "开始运行数据库迁移...");

    match ::migration::Migrator::up(db, None).await {
        Ok(()) => {
            linfo!("system", LogStage::Db, LogComponent::Database, "migrate", "数据库迁移完成");
            Ok(())
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Error,
                LogComponent::Database,
                "migrate",
                &format!("数据库迁移失败: {e}")
            );
            Err(e)
        }
    }
}

/// 检查数据库状态
pub async fn check_database_status(db: &DatabaseConnection) -> Result<(), DbErr> {
    let pending = ::migration::Migrator::get_pending_migrations(db).await?;

    if pending.is_empty() {
        ldebug!("system", LogStage::Db, LogComponent::Database, "status", "所有迁移都已应用");
    } else {
        lwarn!(
            "system",
            LogStage::Db,
            LogComponent::Database,
            "status",
            &format!("有 {} 个待应用的迁移", pending.len())
        );
    }

    Ok(())
}
