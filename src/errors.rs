use std::fmt;

#[derive(Debug, Clone)]
pub enum AnalyticsError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    /// 维度在 create-or-fetch 之后仍然找不到
    DimensionUnresolved(String),
    Validation(String),
    Serialization(String),
    FileOperation(String),
}

impl AnalyticsError {
    /// 稳定的错误编号（E001 ...）
    pub fn code(&self) -> &'static str {
        match self {
            AnalyticsError::DatabaseConfig(_) => "E001",
            AnalyticsError::DatabaseConnection(_) => "E002",
            AnalyticsError::DatabaseOperation(_) => "E003",
            AnalyticsError::DimensionUnresolved(_) => "E004",
            AnalyticsError::Validation(_) => "E005",
            AnalyticsError::Serialization(_) => "E006",
            AnalyticsError::FileOperation(_) => "E007",
        }
    }

    /// 面向人的错误分类名
    pub fn error_type(&self) -> &'static str {
        match self {
            AnalyticsError::DatabaseConfig(_) => "Database Configuration Error",
            AnalyticsError::DatabaseConnection(_) => "Database Connection Error",
            AnalyticsError::DatabaseOperation(_) => "Database Operation Error",
            AnalyticsError::DimensionUnresolved(_) => "Dimension Unresolved",
            AnalyticsError::Validation(_) => "Validation Error",
            AnalyticsError::Serialization(_) => "Serialization Error",
            AnalyticsError::FileOperation(_) => "File Operation Error",
        }
    }

    /// 错误附带的原始信息
    pub fn message(&self) -> &str {
        match self {
            AnalyticsError::DatabaseConfig(msg)
            | AnalyticsError::DatabaseConnection(msg)
            | AnalyticsError::DatabaseOperation(msg)
            | AnalyticsError::DimensionUnresolved(msg)
            | AnalyticsError::Validation(msg)
            | AnalyticsError::Serialization(msg)
            | AnalyticsError::FileOperation(msg) => msg,
        }
    }

    /// 格式化为彩色输出（用于启动失败时打印到终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for AnalyticsError {}

// 构造辅助
impl AnalyticsError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        AnalyticsError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        AnalyticsError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        AnalyticsError::DatabaseOperation(msg.into())
    }

    pub fn dimension_unresolved<T: Into<String>>(msg: T) -> Self {
        AnalyticsError::DimensionUnresolved(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        AnalyticsError::Validation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        AnalyticsError::Serialization(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        AnalyticsError::FileOperation(msg.into())
    }
}

impl From<sea_orm::DbErr> for AnalyticsError {
    fn from(err: sea_orm::DbErr) -> Self {
        AnalyticsError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for AnalyticsError {
    fn from(err: std::io::Error) -> Self {
        AnalyticsError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AnalyticsError::database_config("x").code(), "E001");
        assert_eq!(AnalyticsError::dimension_unresolved("x").code(), "E004");
        assert_eq!(AnalyticsError::file_operation("x").code(), "E007");
    }

    #[test]
    fn test_display_uses_simple_format() {
        let err = AnalyticsError::validation("name is required");
        assert_eq!(err.to_string(), "Validation Error: name is required");
    }

    #[test]
    fn test_from_serde_json() {
        let err: AnalyticsError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AnalyticsError::Serialization(_)));
    }
}
