//! 查找表迁移
//!
//! 所有查找表结构相同：自增 id、唯一 name、description 和通用记账列。

use sea_orm_migration::prelude::*;

pub(crate) const LOOKUP_TABLES: &[&str] = &[
    "device_types",
    "manufacturers",
    "ip_address_types",
    "referrer_types",
    "request_methods",
    "request_types",
    "performance_entry_types",
    "request_headers",
];

/// is_internal / created_at / last_modified_at / deleted_at
pub(crate) fn bookkeeping_columns(table: &mut TableCreateStatement) -> &mut TableCreateStatement {
    table
        .col(
            ColumnDef::new(Bookkeeping::IsInternal)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(
            ColumnDef::new(Bookkeeping::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(Bookkeeping::LastModifiedAt)
                .timestamp_with_time_zone()
                .null(),
        )
        .col(
            ColumnDef::new(Bookkeeping::DeletedAt)
                .timestamp_with_time_zone()
                .null(),
        )
}

pub(crate) fn id_column() -> ColumnDef {
    ColumnDef::new(Alias::new("id"))
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn lookup_table(name: &str) -> TableCreateStatement {
    let mut table = Table::create();
    table
        .table(Alias::new(ToString::to_string(&name)))
        .if_not_exists()
        .col(id_column())
        .col(
            ColumnDef::new(Alias::new("name"))
                .string_len(50)
                .not_null()
                .unique_key(),
        )
        .col(
            ColumnDef::new(Alias::new("description"))
                .text()
                .not_null()
                .default(""),
        );
    bookkeeping_columns(&mut table);
    table.to_owned()
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in LOOKUP_TABLES {
            manager.create_table(lookup_table(name)).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in LOOKUP_TABLES.iter().rev() {
            manager
                .drop_table(Table::drop().table(Alias::new(ToString::to_string(&name))).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Bookkeeping {
    IsInternal,
    CreatedAt,
    LastModifiedAt,
    DeletedAt,
}
