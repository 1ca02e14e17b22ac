//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// webanalytics - request tracking and performance collection service
#[derive(Parser, Debug)]
#[command(name = "webanalytics")]
#[command(version)]
#[command(about = "Request tracking and browser performance collection", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Run database migrations and seed the lookup tables, then exit
    Migrate,

    /// Generate an example configuration file
    ConfigGen {
        /// Output path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<String>,
    },

    /// Create the default privacy record for a newly provisioned user
    EnsurePrivacy {
        /// User id
        user_id: i64,
    },
}

impl Cli {
    /// 未指定子命令时默认启动服务
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["webanalytics"]).unwrap();
        assert_eq!(cli.command(), Commands::Serve);
        assert_eq!(cli.config, None);
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["webanalytics", "migrate", "-c", "prod.toml"]).unwrap();
        assert_eq!(cli.command(), Commands::Migrate);
        assert_eq!(cli.config.as_deref(), Some("prod.toml"));
    }

    #[test]
    fn test_ensure_privacy_requires_user_id() {
        assert!(Cli::try_parse_from(["webanalytics", "ensure-privacy"]).is_err());
        let cli = Cli::try_parse_from(["webanalytics", "ensure-privacy", "42"]).unwrap();
        assert_eq!(cli.command(), Commands::EnsurePrivacy { user_id: 42 });
    }

    #[test]
    fn test_config_gen_output() {
        let cli =
            Cli::try_parse_from(["webanalytics", "config-gen", "--output", "sample.toml"]).unwrap();
        assert_eq!(
            cli.command(),
            Commands::ConfigGen {
                output: Some("sample.toml".to_string())
            }
        );
    }
}
