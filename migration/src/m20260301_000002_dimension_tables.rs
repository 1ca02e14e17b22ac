//! 维度表迁移
//!
//! browsers / operating_systems / devices 以自然键唯一；
//! 值型维度（IP、referrer、URL、UA、header 值）以 xxHash64 摘要列
//! 承担唯一约束，原始值保存在 TEXT 列中。

use sea_orm_migration::prelude::*;

use crate::m20260301_000001_lookup_tables::{bookkeeping_columns, id_column};

fn version_columns(table: &mut TableCreateStatement) -> &mut TableCreateStatement {
    table
        .col(
            ColumnDef::new(Versioned::Version)
                .string_len(50)
                .not_null()
                .default(""),
        )
        .col(ColumnDef::new(Versioned::MajorVersion).big_integer().null())
        .col(ColumnDef::new(Versioned::MinorVersion).big_integer().null())
        .col(
            ColumnDef::new(Versioned::BuildMaintenanceVersion)
                .big_integer()
                .null(),
        )
        .col(
            ColumnDef::new(Versioned::RevisionBuildVersion)
                .big_integer()
                .null(),
        )
}

fn fk(name: &str, from_table: &str, from_col: &str, to_table: &str) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(Alias::new(from_table.to_string()), Alias::new(from_col.to_string()))
        .to(Alias::new(to_table.to_string()), Alias::new("id"))
        .on_delete(ForeignKeyAction::Restrict)
        .to_owned()
}

/// 值型维度：可选的类型外键 + value + value_hash
fn value_table(table: &str, type_column: Option<(&str, &str)>) -> TableCreateStatement {
    let mut stmt = Table::create();
    stmt.table(Alias::new(ToString::to_string(&table))).if_not_exists().col(id_column());
    if let Some((column, target)) = type_column {
        stmt.col(ColumnDef::new(Alias::new(ToString::to_string(&column))).big_integer().not_null())
            .foreign_key(&mut fk(
                &format!("fk_{table}_{column}"),
                table,
                column,
                target,
            ));
    }
    stmt.col(ColumnDef::new(Alias::new("value")).text().not_null())
        .col(
            ColumnDef::new(Alias::new("value_hash"))
                .char_len(16) // xxHash64 hex 表示
                .not_null(),
        );
    bookkeeping_columns(&mut stmt);
    stmt.to_owned()
}

fn unique_index(table: &str, columns: &[&str]) -> IndexCreateStatement {
    let mut index = Index::create();
    index
        .if_not_exists()
        .unique()
        .name(format!("uq_{}_{}", table, columns.join("_")))
        .table(Alias::new(ToString::to_string(&table)));
    for column in columns {
        index.col(Alias::new(ToString::to_string(&column)));
    }
    index.to_owned()
}

const VALUE_TABLES: &[(&str, Option<(&str, &str)>)] = &[
    ("ip_addresses", Some(("ip_address_type_id", "ip_address_types"))),
    ("referrers", Some(("referrer_type_id", "referrer_types"))),
    ("urls", None),
    ("user_agents", None),
    (
        "request_header_value_options",
        Some(("header_id", "request_headers")),
    ),
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. browsers
        let mut browsers = Table::create();
        browsers
            .table(Browsers::Table)
            .if_not_exists()
            .col(id_column())
            .col(ColumnDef::new(Browsers::Name).string_len(255).not_null());
        version_columns(&mut browsers);
        bookkeeping_columns(&mut browsers);
        manager.create_table(browsers.to_owned()).await?;
        manager
            .create_index(unique_index("browsers", &["name", "version"]))
            .await?;

        // 2. operating_systems：版本参与自然键
        let mut systems = Table::create();
        systems
            .table(OperatingSystems::Table)
            .if_not_exists()
            .col(id_column())
            .col(
                ColumnDef::new(OperatingSystems::ManufacturerId)
                    .big_integer()
                    .not_null(),
            )
            .col(
                ColumnDef::new(OperatingSystems::Name)
                    .string_len(255)
                    .not_null(),
            )
            .foreign_key(&mut fk(
                "fk_operating_systems_manufacturer_id",
                "operating_systems",
                "manufacturer_id",
                "manufacturers",
            ));
        version_columns(&mut systems);
        bookkeeping_columns(&mut systems);
        manager.create_table(systems.to_owned()).await?;
        manager
            .create_index(unique_index(
                "operating_systems",
                &["manufacturer_id", "name", "version"],
            ))
            .await?;

        // 3. devices
        let mut devices = Table::create();
        devices
            .table(Devices::Table)
            .if_not_exists()
            .col(id_column())
            .col(ColumnDef::new(Devices::DeviceTypeId).big_integer().not_null())
            .col(
                ColumnDef::new(Devices::ManufacturerId)
                    .big_integer()
                    .not_null(),
            )
            .col(ColumnDef::new(Devices::Name).string_len(255).not_null())
            .foreign_key(&mut fk(
                "fk_devices_device_type_id",
                "devices",
                "device_type_id",
                "device_types",
            ))
            .foreign_key(&mut fk(
                "fk_devices_manufacturer_id",
                "devices",
                "manufacturer_id",
                "manufacturers",
            ));
        bookkeeping_columns(&mut devices);
        manager.create_table(devices.to_owned()).await?;
        manager
            .create_index(unique_index(
                "devices",
                &["device_type_id", "manufacturer_id", "name"],
            ))
            .await?;

        // 4. 值型维度
        for (table, type_column) in VALUE_TABLES {
            manager
                .create_table(value_table(table, *type_column))
                .await?;
            let key: Vec<&str> = match type_column {
                Some((column, _)) => vec![*column, "value_hash"],
                None => vec!["value_hash"],
            };
            manager.create_index(unique_index(table, &key)).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, _) in VALUE_TABLES.iter().rev() {
            manager
                .drop_table(Table::drop().table(Alias::new(ToString::to_string(&table))).if_exists().to_owned())
                .await?;
        }
        manager
            .drop_table(Table::drop().table(Devices::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(OperatingSystems::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Browsers::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Versioned {
    Version,
    MajorVersion,
    MinorVersion,
    BuildMaintenanceVersion,
    RevisionBuildVersion,
}

#[derive(DeriveIden)]
enum Browsers {
    #[sea_orm(iden = "browsers")]
    Table,
    Name,
}

#[derive(DeriveIden)]
enum OperatingSystems {
    #[sea_orm(iden = "operating_systems")]
    Table,
    ManufacturerId,
    Name,
}

#[derive(DeriveIden)]
enum Devices {
    #[sea_orm(iden = "devices")]
    Table,
    DeviceTypeId,
    ManufacturerId,
    Name,
}
