//! 事实表迁移：requests、请求头关联、performance_entries、privacy

use sea_orm_migration::prelude::*;

use crate::m20260301_000001_lookup_tables::{bookkeeping_columns, id_column};

fn reference(column: &str, nullable: bool) -> ColumnDef {
    let mut def = ColumnDef::new(Alias::new(column.to_string()));
    def.big_integer();
    if nullable {
        def.null();
    } else {
        def.not_null();
    }
    def.to_owned()
}

fn fk_to(from_table: &str, column: &str, to_table: &str) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(format!("fk_{from_table}_{column}"))
        .from(Alias::new(from_table.to_string()), Alias::new(column.to_string()))
        .to(Alias::new(to_table.to_string()), Alias::new("id"))
        .on_delete(ForeignKeyAction::Restrict)
        .to_owned()
}

/// (列名, 目标表, 是否可空)
const REQUEST_REFERENCES: &[(&str, &str, bool)] = &[
    ("request_type_id", "request_types", false),
    ("referrer_id", "referrers", true),
    ("method_id", "request_methods", false),
    ("ip_address_id", "ip_addresses", false),
    ("device_id", "devices", true),
    ("browser_id", "browsers", true),
    ("operating_system_id", "operating_systems", true),
    ("url_id", "urls", false),
    ("user_agent_id", "user_agents", false),
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. requests
        let mut requests = Table::create();
        requests
            .table(Requests::Table)
            .if_not_exists()
            .col(id_column())
            .col(ColumnDef::new(Requests::UserId).big_integer().null());
        for (name, target, nullable) in REQUEST_REFERENCES {
            requests
                .col(reference(name, *nullable))
                .foreign_key(&mut fk_to("requests", name, target));
        }
        requests
            .col(
                ColumnDef::new(Requests::IsAjax)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(
                ColumnDef::new(Requests::RequestedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            );
        bookkeeping_columns(&mut requests);
        manager.create_table(requests.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_requests_requested_at")
                    .table(Requests::Table)
                    .col(Requests::RequestedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_requests_user_id")
                    .table(Requests::Table)
                    .col(Requests::UserId)
                    .to_owned(),
            )
            .await?;

        // 2. request_header_values（请求 ↔ 头部值 关联表）
        let mut links = Table::create();
        links
            .table(RequestHeaderValues::Table)
            .if_not_exists()
            .col(id_column())
            .col(
                ColumnDef::new(RequestHeaderValues::RequestId)
                    .big_integer()
                    .not_null(),
            )
            .col(
                ColumnDef::new(RequestHeaderValues::HeaderValueId)
                    .big_integer()
                    .not_null(),
            )
            .foreign_key(&mut fk_to("request_header_values", "request_id", "requests"))
            .foreign_key(&mut fk_to(
                "request_header_values",
                "header_value_id",
                "request_header_value_options",
            ));
        bookkeeping_columns(&mut links);
        manager.create_table(links.to_owned()).await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("uq_request_header_values_request_id_header_value_id")
                    .table(RequestHeaderValues::Table)
                    .col(RequestHeaderValues::RequestId)
                    .col(RequestHeaderValues::HeaderValueId)
                    .to_owned(),
            )
            .await?;

        // 3. performance_entries
        manager
            .create_table(
                Table::create()
                    .table(PerformanceEntries::Table)
                    .if_not_exists()
                    .col(id_column())
                    .col(
                        ColumnDef::new(PerformanceEntries::EntryTypeId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PerformanceEntries::Name)
                            .string_len(500)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PerformanceEntries::StartTime).double().null())
                    .col(
                        ColumnDef::new(PerformanceEntries::Duration)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(PerformanceEntries::Data).json().not_null())
                    .col(
                        ColumnDef::new(PerformanceEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(&mut fk_to(
                        "performance_entries",
                        "entry_type_id",
                        "performance_entry_types",
                    ))
                    .to_owned(),
            )
            .await?;

        // 4. privacy（user_id 即主键）
        let mut privacy = Table::create();
        privacy
            .table(Privacy::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Privacy::UserId)
                    .big_integer()
                    .not_null()
                    .primary_key(),
            )
            .col(
                ColumnDef::new(Privacy::OptOutTracking)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(
                ColumnDef::new(Privacy::OptOutEventTracking)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(
                ColumnDef::new(Privacy::IsPrivate)
                    .boolean()
                    .not_null()
                    .default(false),
            );
        bookkeeping_columns(&mut privacy);
        manager.create_table(privacy.to_owned()).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Privacy::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(PerformanceEntries::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(RequestHeaderValues::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Requests::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Requests {
    #[sea_orm(iden = "requests")]
    Table,
    UserId,
    IsAjax,
    RequestedAt,
}

#[derive(DeriveIden)]
enum RequestHeaderValues {
    #[sea_orm(iden = "request_header_values")]
    Table,
    RequestId,
    HeaderValueId,
}

#[derive(DeriveIden)]
enum PerformanceEntries {
    #[sea_orm(iden = "performance_entries")]
    Table,
    EntryTypeId,
    Name,
    StartTime,
    Duration,
    Data,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Privacy {
    #[sea_orm(iden = "privacy")]
    Table,
    UserId,
    OptOutTracking,
    OptOutEventTracking,
    IsPrivate,
}
