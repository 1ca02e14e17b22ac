//! 一次性维护命令：迁移、生成配置、开通隐私记录

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;

use crate::cli::Commands;
use crate::config::StaticConfig;
use crate::runtime::lifetime::startup::build_context;
use crate::storage::SeaOrmStorage;
use crate::tracking::PrivacyService;

/// 执行非 serve 子命令
pub async fn run_command(command: Commands, config: &StaticConfig) -> Result<()> {
    match command {
        Commands::Serve => super::run_server(config).await,
        Commands::Migrate => {
            // connect 会执行迁移，bootstrap 写入标准查找值
            let storage = SeaOrmStorage::connect(&config.database)
                .await
                .context("Failed to connect to database")?;
            let context = build_context(Arc::new(storage), &config.tracking).await?;
            println!(
                "{} migrations applied on {}",
                "✓".green().bold(),
                context.storage.backend_name()
            );
            Ok(())
        }
        Commands::ConfigGen { output } => {
            let sample = StaticConfig::generate_sample_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, sample)
                        .with_context(|| format!("Failed to write {}", path))?;
                    println!("{} sample configuration written to {}", "✓".green().bold(), path);
                }
                None => print!("{}", sample),
            }
            Ok(())
        }
        Commands::EnsurePrivacy { user_id } => {
            let storage = SeaOrmStorage::connect(&config.database)
                .await
                .context("Failed to connect to database")?;
            let privacy = PrivacyService::new(Arc::new(storage));
            if privacy.ensure_privacy_record(user_id).await? {
                println!("{} privacy record created for user {}", "✓".green().bold(), user_id);
            } else {
                println!("{} user {} already has a privacy record", "•".yellow(), user_id);
            }
            Ok(())
        }
    }
}
