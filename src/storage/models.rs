//! 存储层领域类型
//!
//! 维度自然键、创建默认值、事实行，以及隐私设置。

use chrono::{DateTime, Utc};
use strum::{EnumIter, IntoStaticStr};

/// 以 name 为自然键的查找表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LookupKind {
    DeviceType,
    Manufacturer,
    IpAddressType,
    ReferrerType,
    RequestMethod,
    RequestType,
    PerformanceEntryType,
    RequestHeader,
}

/// 维度的自然键
///
/// 同时作为解析缓存的 key，因此引用其它维度时使用已解析出的代理 id。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DimensionKey {
    Lookup {
        kind: LookupKind,
        name: String,
    },
    Browser {
        name: String,
        version: String,
    },
    OperatingSystem {
        manufacturer_id: i64,
        name: String,
        version: String,
    },
    Device {
        device_type_id: i64,
        manufacturer_id: i64,
        name: String,
    },
    IpAddress {
        ip_address_type_id: i64,
        value: String,
    },
    Referrer {
        referrer_type_id: i64,
        value: String,
    },
    Url(String),
    UserAgent(String),
    RequestHeaderValue {
        header_id: i64,
        value: String,
    },
}

impl DimensionKey {
    pub fn lookup(kind: LookupKind, name: impl Into<String>) -> Self {
        DimensionKey::Lookup {
            kind,
            name: name.into(),
        }
    }

    /// 日志用的维度名称
    pub fn kind_name(&self) -> &'static str {
        match self {
            DimensionKey::Lookup { kind, .. } => (*kind).into(),
            DimensionKey::Browser { .. } => "browser",
            DimensionKey::OperatingSystem { .. } => "operating_system",
            DimensionKey::Device { .. } => "device",
            DimensionKey::IpAddress { .. } => "ip_address",
            DimensionKey::Referrer { .. } => "referrer",
            DimensionKey::Url(_) => "url",
            DimensionKey::UserAgent(_) => "user_agent",
            DimensionKey::RequestHeaderValue { .. } => "request_header_value",
        }
    }
}

/// 版本号拆分结果：主 / 次 / build / revision，缺失的分量为 None
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionParts {
    pub major: Option<i64>,
    pub minor: Option<i64>,
    pub build: Option<i64>,
    pub revision: Option<i64>,
}

impl VersionParts {
    /// 从任意版本串中解析最多 4 个数字分量
    ///
    /// 从第一个数字开始，按 `.` 或 `_` 切分，每段取前导数字，
    /// 遇到不以数字开头的段即停止。
    pub fn parse(raw: &str) -> Self {
        let mut parts = [None; 4];
        let Some(start) = raw.find(|c: char| c.is_ascii_digit()) else {
            return Self::default();
        };

        for (slot, segment) in parts.iter_mut().zip(raw[start..].split(['.', '_'])) {
            let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
            match digits.parse::<i64>() {
                Ok(value) => *slot = Some(value),
                Err(_) => break,
            }
            // "3b2" 这种段只取前导数字，之后不再继续
            if digits.len() != segment.len() {
                break;
            }
        }

        let [major, minor, build, revision] = parts;
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// 已解析分量用 `.` 拼接；一个都没有时为空串
    pub fn version_string(&self) -> String {
        self.components()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    fn components(&self) -> impl Iterator<Item = i64> {
        [self.major, self.minor, self.build, self.revision]
            .into_iter()
            .map_while(|v| v)
    }
}

/// 新建维度行时使用的非键字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationDefaults {
    pub description: String,
    pub version: VersionParts,
    pub is_internal: bool,
}

impl CreationDefaults {
    pub fn with_version(version: VersionParts) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }
}

/// 一行 Request 事实（内存中组装完成后一次性写入）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFact {
    pub request_type_id: i64,
    pub user_id: Option<i64>,
    pub referrer_id: Option<i64>,
    pub method_id: i64,
    pub ip_address_id: i64,
    pub device_id: Option<i64>,
    pub browser_id: Option<i64>,
    pub operating_system_id: Option<i64>,
    pub url_id: i64,
    pub user_agent_id: i64,
    pub is_ajax: bool,
    pub is_internal: bool,
    pub requested_at: DateTime<Utc>,
}

/// 待批量写入的性能条目
#[derive(Debug, Clone, PartialEq)]
pub struct NewPerformanceEntry {
    pub entry_type_id: i64,
    pub name: String,
    pub start_time: Option<f64>,
    pub duration: f64,
    pub data: serde_json::Value,
}

/// 用户隐私设置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrivacySettings {
    pub opt_out_tracking: bool,
    pub opt_out_event_tracking: bool,
    pub is_private: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_component_version() {
        let parts = VersionParts::parse("90.1");
        assert_eq!(parts.major, Some(90));
        assert_eq!(parts.minor, Some(1));
        assert_eq!(parts.build, None);
        assert_eq!(parts.revision, None);
        assert_eq!(parts.version_string(), "90.1");
    }

    #[test]
    fn test_four_components_and_extra_ignored() {
        let parts = VersionParts::parse("120.0.6099.129.7");
        assert_eq!(
            parts,
            VersionParts {
                major: Some(120),
                minor: Some(0),
                build: Some(6099),
                revision: Some(129),
            }
        );
        assert_eq!(parts.version_string(), "120.0.6099.129");
    }

    #[test]
    fn test_underscore_separated() {
        let parts = VersionParts::parse("17_2_1");
        assert_eq!(parts.version_string(), "17.2.1");
        assert_eq!(parts.revision, None);
    }

    #[test]
    fn test_prefix_and_suffix_noise() {
        let parts = VersionParts::parse("NT 10.0");
        assert_eq!(parts.major, Some(10));
        assert_eq!(parts.minor, Some(0));

        let parts = VersionParts::parse("3.6b2.1");
        assert_eq!(parts.major, Some(3));
        assert_eq!(parts.minor, Some(6));
        assert_eq!(parts.build, None);
    }

    #[test]
    fn test_no_digits() {
        let parts = VersionParts::parse("UNKNOWN");
        assert_eq!(parts, VersionParts::default());
        assert_eq!(parts.version_string(), "");
    }

    #[test]
    fn test_lookup_kind_names() {
        let name: &str = LookupKind::PerformanceEntryType.into();
        assert_eq!(name, "performance_entry_type");
        assert_eq!(
            DimensionKey::lookup(LookupKind::RequestHeader, "accept-language").kind_name(),
            "request_header"
        );
    }
}
