//! User-Agent 分类
//!
//! 基于 woothee 解析 UA 字符串，再结合 Client Hints 请求头，
//! 得到浏览器 / 操作系统 / 设备三组事实以及唯一的设备类型。

use woothee::parser::Parser;

use crate::storage::VersionParts;

/// woothee 无法识别时的取值
const WOOTHEE_UNKNOWN: &str = "UNKNOWN";
/// 无法识别的家族名称
pub const OTHER_FAMILY: &str = "Other";
/// 无法推断厂商时使用的哨兵值（保证唯一约束可以仲裁）
pub const UNKNOWN_MANUFACTURER: &str = "Unknown";

/// 设备类型，按 Mobile > Tablet > PC > Bot > Unknown 取第一个命中的
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Mobile,
    Tablet,
    Pc,
    Bot,
    Unknown,
}

impl DeviceType {
    pub const ALL: [DeviceType; 5] = [
        DeviceType::Mobile,
        DeviceType::Tablet,
        DeviceType::Pc,
        DeviceType::Bot,
        DeviceType::Unknown,
    ];

    pub fn lookup_name(self) -> &'static str {
        match self {
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
            DeviceType::Pc => "PC",
            DeviceType::Bot => "Bot",
            DeviceType::Unknown => "Unknown",
        }
    }
}

/// 请求携带的能力提示（Sec-CH-UA-Mobile / Sec-CH-UA-Platform）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityHints {
    pub mobile: Option<bool>,
    pub platform: Option<String>,
}

impl CapabilityHints {
    /// 从原始头部值解析；结构化字段格式为 `?1` 与 `"Windows"`
    pub fn from_headers(mobile: Option<&str>, platform: Option<&str>) -> Self {
        let mobile = mobile.and_then(|v| match v.trim() {
            "?1" => Some(true),
            "?0" => Some(false),
            _ => None,
        });
        let platform = platform
            .map(|v| v.trim().trim_matches('"').trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self { mobile, platform }
    }
}

/// 浏览器或操作系统的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentFacts {
    pub family: String,
    /// 由已解析的版本分量重新拼接，没有分量时为空串
    pub version_string: String,
    pub version: VersionParts,
}

impl AgentFacts {
    fn new(family: String, raw_version: &str) -> Self {
        let version = VersionParts::parse(raw_version);
        Self {
            family,
            version_string: version.version_string(),
            version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFacts {
    pub family: String,
    pub manufacturer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub browser: AgentFacts,
    pub os: AgentFacts,
    pub device: DeviceFacts,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_pc: bool,
    pub is_bot: bool,
}

impl Classification {
    pub fn device_type(&self) -> DeviceType {
        if self.is_mobile {
            DeviceType::Mobile
        } else if self.is_tablet {
            DeviceType::Tablet
        } else if self.is_pc {
            DeviceType::Pc
        } else if self.is_bot {
            DeviceType::Bot
        } else {
            DeviceType::Unknown
        }
    }
}

fn known(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && value != WOOTHEE_UNKNOWN).then_some(value)
}

/// 由操作系统家族推断厂商
pub fn manufacturer_for_os(os_family: &str) -> &'static str {
    let os = os_family.to_ascii_lowercase();
    if os.starts_with("windows") || os == "xbox" {
        "Microsoft"
    } else if os.starts_with("mac")
        || os.starts_with("ios")
        || matches!(os.as_str(), "iphone" | "ipad" | "ipod")
    {
        "Apple"
    } else if os.starts_with("android") || os.starts_with("chrome") {
        "Google"
    } else if os.starts_with("blackberry") {
        "BlackBerry"
    } else {
        UNKNOWN_MANUFACTURER
    }
}

/// UA 分类器
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAgentClassifier;

impl UserAgentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, user_agent: &str, hints: &CapabilityHints) -> Classification {
        let parser = Parser::new();
        let result = parser.parse(user_agent).unwrap_or_default();

        let category = result.category.to_string();
        let browser_name = result.name.to_string();
        let os_name = result.os.to_string();

        let browser = AgentFacts::new(
            known(&browser_name).unwrap_or(OTHER_FAMILY).to_string(),
            &result.version.to_string(),
        );

        let os_family = known(&os_name)
            .map(str::to_string)
            .or_else(|| hints.platform.clone())
            .unwrap_or_else(|| OTHER_FAMILY.to_string());
        let os = AgentFacts::new(os_family, &result.os_version.to_string());

        let is_bot = category == "crawler";
        let is_tablet = !is_bot
            && (os.family == "iPad" || (os.family == "Android" && !user_agent.contains("Mobile")));
        let is_mobile = !is_bot
            && !is_tablet
            && (matches!(category.as_str(), "smartphone" | "mobilephone")
                || hints.mobile == Some(true));
        let is_pc = !is_bot && !is_tablet && !is_mobile && category == "pc";

        let family = match os.family.as_str() {
            "iPhone" | "iPad" | "iPod" => os.family.clone(),
            _ if is_bot => "Spider".to_string(),
            _ if is_mobile => "Generic Smartphone".to_string(),
            _ if is_tablet => "Generic Tablet".to_string(),
            _ => OTHER_FAMILY.to_string(),
        };
        let device = DeviceFacts {
            family,
            manufacturer: manufacturer_for_os(&os.family).to_string(),
        };

        Classification {
            browser,
            os,
            device,
            is_mobile,
            is_tablet,
            is_pc,
            is_bot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

    fn classify(ua: &str) -> Classification {
        UserAgentClassifier::new().classify(ua, &CapabilityHints::default())
    }

    #[test]
    fn test_chrome_on_windows() {
        let c = classify(CHROME_WINDOWS);
        assert_eq!(c.browser.family, "Chrome");
        assert_eq!(c.browser.version.major, Some(120));
        assert_eq!(c.browser.version_string, "120.0.0.0");
        assert_eq!(c.os.family, "Windows 10");
        assert_eq!(c.device.manufacturer, "Microsoft");
        assert_eq!(c.device.family, "Other");
        assert!(c.is_pc);
        assert_eq!(c.device_type(), DeviceType::Pc);
    }

    #[test]
    fn test_safari_on_iphone() {
        let c = classify(SAFARI_IPHONE);
        assert_eq!(c.browser.family, "Safari");
        assert_eq!(c.os.family, "iPhone");
        assert_eq!(c.device.family, "iPhone");
        assert_eq!(c.device.manufacturer, "Apple");
        assert_eq!(c.device_type(), DeviceType::Mobile);
    }

    #[test]
    fn test_ipad_is_tablet() {
        let c = classify(SAFARI_IPAD);
        assert_eq!(c.os.family, "iPad");
        assert!(c.is_tablet);
        assert!(!c.is_mobile);
        assert_eq!(c.device_type(), DeviceType::Tablet);
    }

    #[test]
    fn test_android_without_mobile_token_is_tablet() {
        let c = classify(ANDROID_TABLET);
        assert_eq!(c.device_type(), DeviceType::Tablet);
        assert_eq!(c.device.family, "Generic Tablet");
        assert_eq!(c.device.manufacturer, "Google");
    }

    #[test]
    fn test_googlebot() {
        let c = classify(GOOGLEBOT);
        assert!(c.is_bot);
        assert_eq!(c.device.family, "Spider");
        assert_eq!(c.device_type(), DeviceType::Bot);
    }

    #[test]
    fn test_empty_user_agent() {
        let c = classify("");
        assert_eq!(c.browser.family, "Other");
        assert_eq!(c.browser.version_string, "");
        assert_eq!(c.browser.version, VersionParts::default());
        assert_eq!(c.os.family, "Other");
        assert_eq!(c.device.manufacturer, UNKNOWN_MANUFACTURER);
        assert_eq!(c.device_type(), DeviceType::Unknown);
    }

    #[test]
    fn test_hints_fill_gaps() {
        let hints = CapabilityHints::from_headers(Some("?1"), Some("\"Android\""));
        assert_eq!(hints.mobile, Some(true));
        assert_eq!(hints.platform.as_deref(), Some("Android"));

        let c = UserAgentClassifier::new().classify("Unrecognised/1.0", &hints);
        assert_eq!(c.os.family, "Android");
        assert!(c.is_mobile);
        assert_eq!(c.device_type(), DeviceType::Mobile);
    }

    #[test]
    fn test_malformed_hints_are_ignored() {
        let hints = CapabilityHints::from_headers(Some("yes"), Some("\"\""));
        assert_eq!(hints, CapabilityHints::default());
    }

    #[test]
    fn test_device_type_precedence() {
        let mut c = classify(CHROME_WINDOWS);
        c.is_mobile = true;
        c.is_tablet = true;
        c.is_bot = true;
        assert_eq!(c.device_type(), DeviceType::Mobile);
        c.is_mobile = false;
        assert_eq!(c.device_type(), DeviceType::Tablet);
        c.is_tablet = false;
        assert_eq!(c.device_type(), DeviceType::Pc);
        c.is_pc = false;
        assert_eq!(c.device_type(), DeviceType::Bot);
        c.is_bot = false;
        assert_eq!(c.device_type(), DeviceType::Unknown);
    }

    #[test]
    fn test_manufacturer_for_os() {
        assert_eq!(manufacturer_for_os("Windows 10"), "Microsoft");
        assert_eq!(manufacturer_for_os("Mac OSX"), "Apple");
        assert_eq!(manufacturer_for_os("iPhone"), "Apple");
        assert_eq!(manufacturer_for_os("ChromeOS"), "Google");
        assert_eq!(manufacturer_for_os("Linux"), UNKNOWN_MANUFACTURER);
    }
}
