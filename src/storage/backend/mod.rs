//! SeaORM storage backend
//!
//! SQLite, MySQL/MariaDB and PostgreSQL behind one `DatabaseConnection`.

mod connection;
mod dimensions;
mod facts;
mod privacy;
pub mod retry;

use sea_orm::DatabaseConnection;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::{AnalyticsError, Result};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use dimensions::value_hash;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<&'static str> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
    {
        Ok("sqlite")
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql")
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(AnalyticsError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: &'static str,
    retry_config: retry::RetryConfig,
}

impl SeaOrmStorage {
    /// 按配置连接数据库并执行迁移
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let database_url = config.database_url.as_str();
        if database_url.is_empty() {
            return Err(AnalyticsError::database_config("database_url 未设置"));
        }

        let backend_name = infer_backend_from_url(database_url)?;
        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(database_url, backend_name, config).await?
        };

        run_migrations(&db).await?;

        info!("{} storage initialized", backend_name.to_uppercase());
        Ok(Self::from_connection(db, backend_name, config.into()))
    }

    /// 包装一个已迁移的连接
    pub fn from_connection(
        db: DatabaseConnection,
        backend_name: &'static str,
        retry_config: retry::RetryConfig,
    ) -> Self {
        Self {
            db,
            backend_name,
            retry_config,
        }
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// 健康检查用
    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await.map_err(|e| {
            AnalyticsError::database_connection(format!("database ping failed: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(infer_backend_from_url("analytics.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("sqlite://data/a.db?mode=rwc").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("mariadb://u:p@h/db").unwrap(), "mysql");
        assert_eq!(infer_backend_from_url("postgresql://u@h/db").unwrap(), "postgres");
        assert!(matches!(
            infer_backend_from_url("redis://localhost"),
            Err(AnalyticsError::DatabaseConfig(_))
        ));
    }
}
