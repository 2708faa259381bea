use clap::{Parser, Subcommand};
use std::path::PathBuf;

use protocol_adapter::config::{load_config, ClientConfig, Protocol};
use protocol_adapter::{Method, PeerClient, RequestEnvelope, ResponseEnvelope};

#[derive(Parser)]
#[command(name = "adapter-cli")]
#[command(about = "Call a protocol adapter peer over WebSocket RPC or HTTP", long_about = None)]
struct Cli {
    /// Peer address, host:port. Defaults to 127.0.0.1:8080.
    #[arg(short, long)]
    address: Option<String>,

    /// RPC path on the peer. Defaults to /rpc.
    #[arg(long)]
    rpc_path: Option<String>,

    /// rpc or http. Defaults to rpc.
    #[arg(long)]
    protocol: Option<Protocol>,

    /// Client settings from a TOML config file. Flags given on the command
    /// line override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue one call
    Call {
        /// GET, QUERY, POST, PUT, PATCH, DELETE or OPTIONS
        method: Method,
        path: String,
        /// Query parameter, key=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_pair)]
        params: Vec<(String, String)>,
        /// Header, key=value (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_pair)]
        headers: Vec<(String, String)>,
        /// JSON body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Call GET /health on the peer
    Health,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?.client,
            None => ClientConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(rpc_path) = &self.rpc_path {
            config.rpc_path = rpc_path.clone();
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = cli.client_config()?;
    let client = PeerClient::from_config(&config);

    let request = match cli.command {
        Commands::Call {
            method,
            path,
            params,
            headers,
            body,
        } => {
            let mut request = RequestEnvelope::new(method, path);
            request.params.extend(params);
            request.headers.extend(headers);
            request.content = body;
            request
        }
        Commands::Health => RequestEnvelope::new(Method::Get, "/health"),
    };

    let response: ResponseEnvelope = client.invoke(&request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}
