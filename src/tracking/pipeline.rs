//! 单请求采集流水线
//!
//! 资格检查 → 维度解析 → 组装事实行 → 单次写入 → 关联请求头。
//! 任何失败都只记日志，不影响被包裹的响应。

use std::sync::Arc;

use actix_web::{HttpMessage, HttpRequest};
use chrono::{DateTime, Utc};
use tracing::{Instrument, debug, info_span, warn};

use crate::config::TrackingConfig;
use crate::errors::Result;
use crate::storage::{CreationDefaults, DimensionKey, FactSink, LookupKind, RequestFact};
use crate::tracking::classifier::{CapabilityHints, Classification, UserAgentClassifier};
use crate::tracking::privacy::PrivacyService;
use crate::tracking::resolver::DimensionResolver;
use crate::utils::ip::{classify_ip, client_ip, is_internal_address};

/// 宿主认证层放入 request extensions 的用户标识
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

/// 采集所需的请求属性，与 actix 类型解耦
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    /// scheme://host/path，不含 query
    pub url: String,
    pub is_secure: bool,
    pub client_ip: String,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub do_not_track: Option<String>,
    pub is_ajax: bool,
    pub hints: CapabilityHints,
    /// (小写头名, 值)，只包含配置中需要记录且实际出现的头
    pub recorded_headers: Vec<(String, String)>,
    pub user_id: Option<i64>,
    pub requested_at: DateTime<Utc>,
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// 实际连接的 scheme 与 host
///
/// 默认只认 TLS 监听和 Host 头；`trust_forwarded` 打开时才采用 actix
/// `ConnectionInfo` 对转发头的解析。
fn scheme_and_host(req: &HttpRequest, trust_forwarded: bool) -> (String, String) {
    if trust_forwarded {
        let info = req.connection_info();
        return (info.scheme().to_string(), info.host().to_string());
    }

    let scheme = if req.app_config().secure() {
        "https"
    } else {
        "http"
    };
    let host = header_value(req, "host")
        .or_else(|| req.uri().authority().map(|a| a.to_string()))
        .unwrap_or_else(|| req.app_config().host().to_string());
    (scheme.to_string(), host)
}

impl RequestSnapshot {
    pub fn from_http_request(req: &HttpRequest, config: &TrackingConfig) -> Self {
        let (scheme, host) = scheme_and_host(req, config.trust_forwarded_headers);
        let path = req.path().to_string();

        let forwarded_for = header_value(req, "x-forwarded-for");
        let peer = req.peer_addr().map(|addr| addr.ip().to_string());

        let recorded_headers = config
            .recorded_headers
            .iter()
            .filter_map(|name| {
                let name = name.to_ascii_lowercase();
                header_value(req, &name).map(|value| (name, value))
            })
            .collect();

        let hints = CapabilityHints::from_headers(
            header_value(req, "sec-ch-ua-mobile").as_deref(),
            header_value(req, "sec-ch-ua-platform").as_deref(),
        );

        Self {
            method: req.method().as_str().to_string(),
            url: format!("{}://{}{}", scheme, host, path),
            path,
            is_secure: scheme.eq_ignore_ascii_case("https"),
            client_ip: client_ip(forwarded_for.as_deref(), peer.as_deref()),
            user_agent: header_value(req, "user-agent").unwrap_or_default(),
            referrer: header_value(req, "referer"),
            do_not_track: header_value(req, "dnt"),
            is_ajax: header_value(req, "x-requested-with")
                .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest")),
            hints,
            recorded_headers,
            user_id: req.extensions().get::<AuthenticatedUser>().map(|u| u.0),
            requested_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    StaticAsset,
    ApiPath,
    DoNotTrack,
    UserOptedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// 新写入的 Request 行 id
    Tracked(i64),
    Skipped(SkipReason),
    /// 采集失败，已记录 warning
    Dropped(String),
}

pub struct TrackingPipeline {
    resolver: Arc<DimensionResolver>,
    facts: Arc<dyn FactSink>,
    privacy: PrivacyService,
    classifier: UserAgentClassifier,
    config: TrackingConfig,
}

impl TrackingPipeline {
    pub fn new(
        resolver: Arc<DimensionResolver>,
        facts: Arc<dyn FactSink>,
        privacy: PrivacyService,
        config: TrackingConfig,
    ) -> Self {
        Self {
            resolver,
            facts,
            privacy,
            classifier: UserAgentClassifier::new(),
            config,
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// 不访问存储的资格检查：静态脚本、API 路径、DNT 头
    pub fn check_rules(&self, snapshot: &RequestSnapshot) -> Option<SkipReason> {
        let path = snapshot.path.as_str();
        if self
            .config
            .static_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && path.ends_with(suffix.as_str()))
        {
            return Some(SkipReason::StaticAsset);
        }

        let api = self.config.api_segment.as_str();
        if !api.is_empty() && path.split('/').any(|segment| segment == api) {
            return Some(SkipReason::ApiPath);
        }

        if self.config.honor_dnt
            && snapshot
                .do_not_track
                .as_deref()
                .is_some_and(|v| !v.trim().is_empty())
        {
            return Some(SkipReason::DoNotTrack);
        }

        None
    }

    /// 处理一次请求
    pub async fn track(&self, snapshot: &RequestSnapshot) -> TrackOutcome {
        let span = info_span!("track", method = %snapshot.method, path = %snapshot.path);
        async {
            if let Some(reason) = self.check_rules(snapshot) {
                debug!("Skipped: {:?}", reason);
                return TrackOutcome::Skipped(reason);
            }

            if let Some(user_id) = snapshot.user_id {
                match self.privacy.opted_out_of_tracking(user_id).await {
                    Ok(true) => return TrackOutcome::Skipped(SkipReason::UserOptedOut),
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Privacy lookup failed for user {}: {}", user_id, e);
                        return TrackOutcome::Dropped(e.to_string());
                    }
                }
            }

            match self.record(snapshot).await {
                Ok(id) => {
                    debug!("Recorded request {}", id);
                    TrackOutcome::Tracked(id)
                }
                Err(e) => {
                    warn!("Request tracking dropped: {}", e);
                    TrackOutcome::Dropped(e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn record(&self, snapshot: &RequestSnapshot) -> Result<i64> {
        let resolver = &self.resolver;

        let method_id = resolver
            .resolve_expected(LookupKind::RequestMethod, &snapshot.method)
            .await?;

        let ip_kind = classify_ip(&snapshot.client_ip);
        let ip_address_type_id = resolver
            .resolve_expected(LookupKind::IpAddressType, ip_kind.lookup_name())
            .await?;
        let ip_address_id = resolver
            .resolve(
                DimensionKey::IpAddress {
                    ip_address_type_id,
                    value: snapshot.client_ip.clone(),
                },
                CreationDefaults::default(),
            )
            .await?;

        let user_agent_id = resolver
            .resolve(
                DimensionKey::UserAgent(snapshot.user_agent.clone()),
                CreationDefaults::default(),
            )
            .await?;

        let classification = self.classifier.classify(&snapshot.user_agent, &snapshot.hints);
        let (device_id, browser_id, operating_system_id) =
            self.resolve_agent(&classification).await;

        let url_id = resolver
            .resolve(
                DimensionKey::Url(snapshot.url.clone()),
                CreationDefaults::default(),
            )
            .await?;

        let referrer_id = match snapshot.referrer.as_deref() {
            Some(referrer) => optional(
                "referrer",
                self.resolve_referrer(referrer).await,
            ),
            None => None,
        };

        let request_type = if snapshot.is_secure { "HTTPS" } else { "HTTP" };
        let request_type_id = resolver
            .resolve_expected(LookupKind::RequestType, request_type)
            .await?;

        let header_value_ids = self.resolve_headers(&snapshot.recorded_headers).await;

        let fact = RequestFact {
            request_type_id,
            user_id: snapshot.user_id,
            referrer_id,
            method_id,
            ip_address_id,
            device_id,
            browser_id,
            operating_system_id,
            url_id,
            user_agent_id,
            is_ajax: snapshot.is_ajax,
            is_internal: is_internal_address(&snapshot.client_ip, &self.config.internal_networks),
            requested_at: snapshot.requested_at,
        };
        let request_id = self.facts.insert_request(fact).await?;

        if !header_value_ids.is_empty()
            && let Err(e) = self
                .facts
                .link_request_headers(request_id, &header_value_ids)
                .await
        {
            warn!("Failed to link headers to request {}: {}", request_id, e);
        }

        Ok(request_id)
    }

    /// 设备 / 浏览器 / 操作系统，失败时各自降级为 None
    ///
    /// 设备和操作系统的自然键包含 manufacturer_id，厂商解析失败时两者一并留空。
    async fn resolve_agent(
        &self,
        classification: &Classification,
    ) -> (Option<i64>, Option<i64>, Option<i64>) {
        let resolver = &self.resolver;

        let browser = &classification.browser;
        let browser_id = optional(
            "browser",
            resolver
                .resolve(
                    DimensionKey::Browser {
                        name: browser.family.clone(),
                        version: browser.version_string.clone(),
                    },
                    CreationDefaults::with_version(browser.version),
                )
                .await,
        );

        let manufacturer_id = match resolver
            .resolve_lookup(LookupKind::Manufacturer, &classification.device.manufacturer)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    "Manufacturer unresolved, device and operating system left empty: {}",
                    e
                );
                return (None, browser_id, None);
            }
        };

        let device_id = match resolver
            .resolve_expected(
                LookupKind::DeviceType,
                classification.device_type().lookup_name(),
            )
            .await
        {
            Ok(device_type_id) => optional(
                "device",
                resolver
                    .resolve(
                        DimensionKey::Device {
                            device_type_id,
                            manufacturer_id,
                            name: classification.device.family.clone(),
                        },
                        CreationDefaults::default(),
                    )
                    .await,
            ),
            Err(e) => {
                warn!("Device type unresolved, device left empty: {}", e);
                None
            }
        };

        let os = &classification.os;
        let operating_system_id = optional(
            "operating_system",
            resolver
                .resolve(
                    DimensionKey::OperatingSystem {
                        manufacturer_id,
                        name: os.family.clone(),
                        version: os.version_string.clone(),
                    },
                    CreationDefaults::with_version(os.version),
                )
                .await,
        );

        (device_id, browser_id, operating_system_id)
    }

    async fn resolve_referrer(&self, referrer: &str) -> Result<i64> {
        let referrer_type = if referrer.to_ascii_lowercase().contains("https") {
            "HTTPS"
        } else {
            "HTTP"
        };
        let referrer_type_id = self
            .resolver
            .resolve_expected(LookupKind::ReferrerType, referrer_type)
            .await?;
        self.resolver
            .resolve(
                DimensionKey::Referrer {
                    referrer_type_id,
                    value: referrer.to_string(),
                },
                CreationDefaults::default(),
            )
            .await
    }

    async fn resolve_headers(&self, headers: &[(String, String)]) -> Vec<i64> {
        let mut ids = Vec::with_capacity(headers.len());
        for (name, value) in headers {
            let resolved = async {
                let header_id = self
                    .resolver
                    .resolve_lookup(LookupKind::RequestHeader, name)
                    .await?;
                self.resolver
                    .resolve(
                        DimensionKey::RequestHeaderValue {
                            header_id,
                            value: value.clone(),
                        },
                        CreationDefaults::default(),
                    )
                    .await
            }
            .await;
            if let Some(id) = optional("request_header_value", resolved) {
                ids.push(id);
            }
        }
        ids
    }
}

fn optional(dimension: &str, resolved: Result<i64>) -> Option<i64> {
    match resolved {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("{} unresolved, stored as null: {}", dimension, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn snapshot(path: &str) -> RequestSnapshot {
        RequestSnapshot {
            method: "GET".to_string(),
            path: path.to_string(),
            url: format!("http://localhost{}", path),
            is_secure: false,
            client_ip: "127.0.0.1".to_string(),
            user_agent: String::new(),
            referrer: None,
            do_not_track: None,
            is_ajax: false,
            hints: CapabilityHints::default(),
            recorded_headers: Vec::new(),
            user_id: None,
            requested_at: Utc::now(),
        }
    }

    /// 规则检查不触碰存储，这里用只会报错的存储构造流水线
    fn pipeline(config: TrackingConfig) -> TrackingPipeline {
        use crate::errors::AnalyticsError;
        use crate::storage::{
            DimensionStore, NewPerformanceEntry, PrivacySettings, PrivacyStore,
        };

        struct Offline;

        #[async_trait::async_trait]
        impl DimensionStore for Offline {
            async fn find_dimension(&self, _: &DimensionKey) -> Result<Option<i64>> {
                Err(AnalyticsError::database_connection("offline"))
            }
            async fn create_dimension(
                &self,
                _: &DimensionKey,
                _: &CreationDefaults,
            ) -> Result<Option<i64>> {
                Err(AnalyticsError::database_connection("offline"))
            }
            async fn lookup_entries(&self, _: LookupKind) -> Result<Vec<(String, i64)>> {
                Err(AnalyticsError::database_connection("offline"))
            }
        }

        #[async_trait::async_trait]
        impl FactSink for Offline {
            async fn insert_request(&self, _: RequestFact) -> Result<i64> {
                Err(AnalyticsError::database_connection("offline"))
            }
            async fn link_request_headers(&self, _: i64, _: &[i64]) -> Result<()> {
                Err(AnalyticsError::database_connection("offline"))
            }
            async fn insert_performance_entries(&self, _: Vec<NewPerformanceEntry>) -> Result<usize> {
                Err(AnalyticsError::database_connection("offline"))
            }
        }

        #[async_trait::async_trait]
        impl PrivacyStore for Offline {
            async fn ensure_privacy_record(&self, _: i64) -> Result<bool> {
                Err(AnalyticsError::database_connection("offline"))
            }
            async fn privacy_settings(&self, _: i64) -> Result<Option<PrivacySettings>> {
                Err(AnalyticsError::database_connection("offline"))
            }
        }

        let store = Arc::new(Offline);
        TrackingPipeline::new(
            Arc::new(DimensionResolver::new(store.clone(), 16)),
            store.clone(),
            PrivacyService::new(store),
            config,
        )
    }

    // =========================================================================
    // check_rules
    // =========================================================================

    #[test]
    fn test_static_script_is_skipped() {
        let p = pipeline(TrackingConfig::default());
        assert_eq!(
            p.check_rules(&snapshot("/static/app.js")),
            Some(SkipReason::StaticAsset)
        );
        assert_eq!(p.check_rules(&snapshot("/static/app.css")), None);
    }

    #[test]
    fn test_api_segment_is_skipped() {
        let p = pipeline(TrackingConfig::default());
        assert_eq!(
            p.check_rules(&snapshot("/api/anything")),
            Some(SkipReason::ApiPath)
        );
        assert_eq!(
            p.check_rules(&snapshot("/v1/api")),
            Some(SkipReason::ApiPath)
        );
        // 只匹配完整路径段
        assert_eq!(p.check_rules(&snapshot("/rapid/apiary")), None);
    }

    #[test]
    fn test_do_not_track_header() {
        let p = pipeline(TrackingConfig::default());
        let mut s = snapshot("/products");
        s.do_not_track = Some("1".to_string());
        assert_eq!(p.check_rules(&s), Some(SkipReason::DoNotTrack));

        s.do_not_track = Some("".to_string());
        assert_eq!(p.check_rules(&s), None);

        let p = pipeline(TrackingConfig {
            honor_dnt: false,
            ..Default::default()
        });
        s.do_not_track = Some("1".to_string());
        assert_eq!(p.check_rules(&s), None);
    }

    #[tokio::test]
    async fn test_skip_happens_before_storage() {
        let p = pipeline(TrackingConfig::default());
        let outcome = p.track(&snapshot("/api/performance/")).await;
        assert_eq!(outcome, TrackOutcome::Skipped(SkipReason::ApiPath));
    }

    #[tokio::test]
    async fn test_storage_failure_is_dropped_not_raised() {
        let p = pipeline(TrackingConfig::default());
        let outcome = p.track(&snapshot("/products")).await;
        assert!(matches!(outcome, TrackOutcome::Dropped(_)));

        let mut s = snapshot("/products");
        s.user_id = Some(7);
        assert!(matches!(p.track(&s).await, TrackOutcome::Dropped(_)));
    }

    // =========================================================================
    // RequestSnapshot
    // =========================================================================

    #[test]
    fn test_snapshot_from_request() {
        let req = TestRequest::get()
            .uri("/products/42?ref=mail")
            .insert_header(("host", "shop.example.com"))
            .insert_header(("user-agent", "Mozilla/5.0"))
            .insert_header(("x-forwarded-for", "203.0.113.7, 10.0.0.1"))
            .insert_header(("referer", "https://search.example.org/"))
            .insert_header(("x-requested-with", "XMLHttpRequest"))
            .insert_header(("accept-language", "en-GB"))
            .insert_header(("sec-ch-ua-mobile", "?1"))
            .peer_addr("127.0.0.1:5555".parse().unwrap())
            .to_http_request();
        req.extensions_mut().insert(AuthenticatedUser(9));

        let config = TrackingConfig {
            recorded_headers: vec!["Accept-Language".to_string(), "x-missing".to_string()],
            ..Default::default()
        };
        let s = RequestSnapshot::from_http_request(&req, &config);
        assert_eq!(s.method, "GET");
        assert_eq!(s.path, "/products/42");
        assert_eq!(s.url, "http://shop.example.com/products/42");
        assert!(!s.is_secure);
        assert_eq!(s.client_ip, "203.0.113.7");
        assert_eq!(s.referrer.as_deref(), Some("https://search.example.org/"));
        assert!(s.is_ajax);
        assert_eq!(s.hints.mobile, Some(true));
        assert_eq!(
            s.recorded_headers,
            vec![("accept-language".to_string(), "en-GB".to_string())]
        );
        assert_eq!(s.user_id, Some(9));
        assert_eq!(s.do_not_track, None);
    }

    #[test]
    fn test_snapshot_peer_fallback() {
        let req = TestRequest::get()
            .uri("/")
            .peer_addr("[2001:db8::1]:443".parse().unwrap())
            .to_http_request();
        let config = TrackingConfig {
            recorded_headers: Vec::new(),
            ..Default::default()
        };
        let s = RequestSnapshot::from_http_request(&req, &config);
        assert_eq!(s.client_ip, "2001:db8::1");
        assert_eq!(s.user_agent, "");
        assert!(!s.is_ajax);
        assert_eq!(s.user_id, None);
    }

    #[test]
    fn test_forwarded_headers_ignored_by_default() {
        let req = TestRequest::get()
            .uri("/products")
            .insert_header(("host", "shop.example.com"))
            .insert_header(("x-forwarded-proto", "https"))
            .insert_header(("x-forwarded-host", "evil.example.net"))
            .insert_header(("forwarded", "proto=https;host=evil.example.net"))
            .to_http_request();

        let s = RequestSnapshot::from_http_request(&req, &TrackingConfig::default());
        assert!(!s.is_secure);
        assert_eq!(s.url, "http://shop.example.com/products");
    }

    #[test]
    fn test_forwarded_headers_when_trusted() {
        let req = TestRequest::get()
            .uri("/products")
            .insert_header(("host", "10.0.0.5:8080"))
            .insert_header(("x-forwarded-proto", "https"))
            .insert_header(("x-forwarded-host", "shop.example.com"))
            .to_http_request();

        let config = TrackingConfig {
            trust_forwarded_headers: true,
            ..Default::default()
        };
        let s = RequestSnapshot::from_http_request(&req, &config);
        assert!(s.is_secure);
        assert_eq!(s.url, "https://shop.example.com/products");
    }
}
