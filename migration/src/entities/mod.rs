mod lookup;

pub mod browser;
pub mod device;
pub mod ip_address;
pub mod operating_system;
pub mod performance_entry;
pub mod privacy;
pub mod referrer;
pub mod request;
pub mod request_header_link;
pub mod request_header_value;
pub mod url;
pub mod user_agent;

pub use lookup::{
    device_type, ip_address_type, manufacturer, performance_entry_type, referrer_type,
    request_header, request_method, request_type,
};

pub use browser::Entity as BrowserEntity;
pub use device::Entity as DeviceEntity;
pub use ip_address::Entity as IpAddressEntity;
pub use operating_system::Entity as OperatingSystemEntity;
pub use performance_entry::Entity as PerformanceEntryEntity;
pub use privacy::Entity as PrivacyEntity;
pub use referrer::Entity as ReferrerEntity;
pub use request::Entity as RequestEntity;
pub use url::Entity as UrlEntity;
pub use user_agent::Entity as UserAgentEntity;
