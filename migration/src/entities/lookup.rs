//! Name-keyed lookup entities
//!
//! Every lookup table has the same shape: a surrogate id, a unique `name`,
//! a free-form description and the shared bookkeeping columns.

macro_rules! lookup_entity {
    ($(#[$meta:meta])* $module:ident => $table:tt) => {
        $(#[$meta])*
        pub mod $module {
            use sea_orm::entity::prelude::*;

            #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
            #[sea_orm(table_name = $table)]
            pub struct Model {
                #[sea_orm(primary_key)]
                pub id: i64,
                #[sea_orm(unique)]
                pub name: String,
                #[sea_orm(column_type = "Text")]
                pub description: String,
                pub is_internal: bool,
                pub created_at: DateTimeUtc,
                pub last_modified_at: Option<DateTimeUtc>,
                pub deleted_at: Option<DateTimeUtc>,
            }

            #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
            pub enum Relation {}

            impl ActiveModelBehavior for ActiveModel {}
        }
    };
}

lookup_entity!(
    /// Mobile / Tablet / PC / Bot / Unknown
    device_type => "device_types"
);
lookup_entity!(manufacturer => "manufacturers");
lookup_entity!(
    /// IPv4 / IPv6 / Invalid
    ip_address_type => "ip_address_types"
);
lookup_entity!(
    /// HTTP / HTTPS
    referrer_type => "referrer_types"
);
lookup_entity!(request_method => "request_methods");
lookup_entity!(
    /// HTTP / HTTPS
    request_type => "request_types"
);
lookup_entity!(performance_entry_type => "performance_entry_types");
lookup_entity!(
    /// Recorded request header names
    request_header => "request_headers"
);
