use serde::{Deserialize, Serialize};

/// 采集服务的启动期配置（TOML + WA__ 环境变量）
///
/// - server: 监听地址、端口、worker 数量
/// - database: 数据库连接与重试
/// - logging: 日志输出
/// - tracking: 请求采集规则
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl StaticConfig {
    /// 依次合并配置文件与 WA__ 前缀的环境变量
    ///
    /// 优先级：ENV > TOML 文件 > 默认值
    /// ENV 前缀：WA，分隔符：__
    /// 示例：WA__SERVER__PORT=9000
    pub fn load(path: Option<&str>) -> Self {
        use config::{Config, Environment, File};

        let path = path.unwrap_or("config.toml");

        let builder = Config::builder()
            // 配置文件不存在时只使用默认值和环境变量
            .add_source(File::with_name(path).required(false))
            // WA__ 前缀的环境变量覆盖文件中的值
            .add_source(
                Environment::with_prefix("WA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("tracking.static_suffixes")
                    .with_list_parse_key("tracking.recorded_headers")
                    .with_list_parse_key("tracking.internal_networks")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 以 TOML 形式输出全部默认值，供 config-gen 使用
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// HTTP 监听参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 事实表与维度表所在的数据库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// tracing 输出设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 请求采集配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// 关闭后 TrackingMiddleware 直接透传
    #[serde(default = "default_tracking_enabled")]
    pub enabled: bool,
    /// 以这些后缀结尾的路径视为静态脚本，不采集
    #[serde(default = "default_static_suffixes")]
    pub static_suffixes: Vec<String>,
    /// 路径中出现该段（如 /api/...）时不采集
    #[serde(default = "default_api_segment")]
    pub api_segment: String,
    #[serde(default = "default_honor_dnt")]
    pub honor_dnt: bool,
    #[serde(default = "default_dimension_cache_capacity")]
    pub dimension_cache_capacity: u64,
    /// 需要落库的请求头（小写）
    #[serde(default = "default_recorded_headers")]
    pub recorded_headers: Vec<String>,
    /// 命中这些 CIDR 的客户端标记为 is_internal
    #[serde(default)]
    pub internal_networks: Vec<String>,
    #[serde(default = "default_max_batch_entries")]
    pub max_batch_entries: usize,
    /// 部署在反向代理之后时开启：scheme / host 取自 Forwarded、X-Forwarded-Proto、X-Forwarded-Host
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

// ============================================================
// serde defaults
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "analytics.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_tracking_enabled() -> bool {
    true
}

fn default_static_suffixes() -> Vec<String> {
    vec![".js".to_string()]
}

fn default_api_segment() -> String {
    "api".to_string()
}

fn default_honor_dnt() -> bool {
    true
}

fn default_dimension_cache_capacity() -> u64 {
    10_000
}

fn default_recorded_headers() -> Vec<String> {
    vec!["accept-language".to_string()]
}

fn default_max_batch_entries() -> usize {
    500
}

// ============================================================
// Default impls
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: default_tracking_enabled(),
            static_suffixes: default_static_suffixes(),
            api_segment: default_api_segment(),
            honor_dnt: default_honor_dnt(),
            dimension_cache_capacity: default_dimension_cache_capacity(),
            recorded_headers: default_recorded_headers(),
            internal_networks: Vec::new(),
            max_batch_entries: default_max_batch_entries(),
            trust_forwarded_headers: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_defaults() {
        let config = StaticConfig::default();
        assert!(config.tracking.enabled);
        assert!(config.tracking.honor_dnt);
        assert_eq!(config.tracking.static_suffixes, vec![".js"]);
        assert_eq!(config.tracking.api_segment, "api");
        assert_eq!(config.tracking.recorded_headers, vec!["accept-language"]);
        assert!(config.tracking.internal_networks.is_empty());
        assert!(!config.tracking.trust_forwarded_headers);
    }

    #[test]
    fn test_sample_config_round_trips_through_toml() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[tracking]"));
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.database.database_url, "analytics.db");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[tracking]\nhonor_dnt = false\nstatic_suffixes = [\".js\", \".css\"]\n",
        )
        .unwrap();

        let config = StaticConfig::load(path.to_str());
        assert_eq!(config.server.port, 9100);
        assert!(!config.tracking.honor_dnt);
        assert_eq!(config.tracking.static_suffixes, vec![".js", ".css"]);
        // 未出现的段落保持默认值
        assert_eq!(config.tracking.api_segment, "api");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let parsed: StaticConfig = toml::from_str("[tracking]\nenabled = false\n").unwrap();
        assert!(!parsed.tracking.enabled);
        assert_eq!(parsed.tracking.max_batch_entries, 500);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("env.toml");
        std::fs::write(&path, "[tracking]\ntrust_forwarded_headers = false\n").unwrap();

        // 其它测试不读取该字段
        unsafe { std::env::set_var("WA__TRACKING__TRUST_FORWARDED_HEADERS", "true") };
        let config = StaticConfig::load(path.to_str());
        unsafe { std::env::remove_var("WA__TRACKING__TRUST_FORWARDED_HEADERS") };

        assert!(config.tracking.trust_forwarded_headers);
    }
}
