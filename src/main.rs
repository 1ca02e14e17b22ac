use clap::Parser;

use webanalytics::cli::{Cli, Commands};
use webanalytics::config::{get_config, init_config_from};
use webanalytics::errors::AnalyticsError;
use webanalytics::runtime::{run_command, run_server};
use webanalytics::system::init_logging;

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_config_from(cli.config.as_deref());
    let config = get_config();

    // guard 必须活到进程结束，否则文件日志会丢失
    let _log_guard = match init_logging(&config.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            None
        }
    };

    let result = match cli.command() {
        Commands::Serve => run_server(&config).await,
        command => run_command(command, &config).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<AnalyticsError>() {
            Some(err) => eprintln!("{}", err.format_colored()),
            None => eprintln!("{:#}", e),
        }
        std::process::exit(1);
    }
}
