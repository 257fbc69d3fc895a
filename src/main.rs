use anyhow::Result;
use clap::{Arg, Command};
use contract_rpc::{config::Config, server::ContractRpcServer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = Command::new("contract-rpc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Typed Ethereum contract calls, transactions and event filters over JSON-RPC, served as MCP tools")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NETWORK")
                .help("Default network to use (ethereum, sepolia, polygon, arbitrum, local)"),
        )
        .arg(
            Arg::new("rpc-url")
                .short('r')
                .long("rpc-url")
                .value_name("URL")
                .help("RPC endpoint URL for the default network"),
        )
        .arg(
            Arg::new("allow-writes")
                .long("allow-writes")
                .help("Allow send_transaction through node-managed accounts")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let config_path = match matches.get_one::<String>("config") {
        Some(path) => Some(path.into()),
        None => Config::default_config_path().ok().filter(|p| p.exists()),
    };
    let mut config = Config::load_or_default(config_path.as_ref()).await;

    let rpc_url = matches.get_one::<String>("rpc-url").map(String::as_str);
    let network = matches
        .get_one::<String>("network")
        .cloned()
        .unwrap_or_else(|| config.default_network.clone());
    config.select_network(&network, rpc_url)?;

    if matches.get_flag("allow-writes") {
        config.security.allow_write_operations = true;
    }

    info!("Default network: {}", config.default_network);
    info!(
        "Write operations allowed: {}",
        config.security.allow_write_operations
    );

    let server = ContractRpcServer::new(config)?;

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
