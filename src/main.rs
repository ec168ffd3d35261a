use campus_finder::domain::ports::ConfigProvider;
use campus_finder::utils::{logger, validation::Validate};
use campus_finder::{CliConfig, HttpProviderClient, Orchestrator};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 驗證並合併配置；日誌尚未初始化，錯誤直接輸出
    let config = match cli.validate().and_then(|_| cli.resolve()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if cli.json_logs || config.json_logs() {
        logger::init_json_logger(if cli.verbose { Some("debug") } else { config.log_level() });
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting campus-finder");
    tracing::debug!(
        "Providers: sparql={}, overpass={}, query timeout={}s, request timeout={:?}",
        config.graph_endpoint(),
        config.filter_endpoint(),
        config.query_timeout_seconds(),
        config.request_timeout()
    );

    let client = HttpProviderClient::from_config(&config)?;
    let mut orchestrator = Orchestrator::new(client, config.query_timeout_seconds());

    let exit_code = match orchestrator.resolve_entity(&cli.entity_request()).await {
        Ok(report) => {
            for (provider, e) in report.failures() {
                eprintln!("❌ {}: {}", provider, e.user_friendly_message());
                eprintln!("💡 建議: {}", e.recovery_suggestion());
            }
            if report.is_complete() {
                tracing::info!("✅ Lookup completed");
                0
            } else {
                2
            }
        }
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            1
        }
    };

    println!("{}", serde_json::to_string_pretty(orchestrator.state())?);

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
