//! sidecar-server binary
//!
//! Serves the sidecar client over HTTP. Agent turns are answered by the
//! in-process loopback transport, which echoes prompts and runs the demo
//! `lookup_inventory` tool for `/tool lookup_inventory {"sku": "..."}`.

use anyhow::{anyhow, Context};
use clap::Parser;
use serde_json::{Map, Value};
use sidecar_client::{
    Client, ClientConfig, LoopbackTransport, ParameterType, ProviderType, ToolDefinition,
    ToolParameter,
};
use sidecar_server::{shutdown_signal, ServerConfig, SidecarServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Command line arguments for the sidecar server.
#[derive(Parser, Debug)]
#[command(name = "sidecar-server")]
#[command(about = "HTTP server relaying prompts to a sidecar LLM agent")]
#[command(version)]
struct Args {
    /// Server bind address
    #[arg(short, long, env = "SIDECAR_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    /// Enable CORS
    #[arg(long, env = "SIDECAR_CORS", default_value_t = true, action = clap::ArgAction::Set)]
    cors: bool,

    /// CORS allowed origins (comma-separated)
    #[arg(long, env = "SIDECAR_CORS_ORIGINS")]
    cors_origins: Option<String>,

    /// Maximum request body size in bytes
    #[arg(long, env = "SIDECAR_MAX_BODY_SIZE", default_value = "1048576")] // 1MB
    max_body_size: usize,

    /// Enable request logging
    #[arg(long, env = "SIDECAR_LOGGING", default_value_t = true, action = clap::ArgAction::Set)]
    logging: bool,

    /// SSE keep-alive interval in seconds
    #[arg(long, env = "SIDECAR_KEEPALIVE", default_value = "30")]
    keepalive: u64,

    /// Log level
    #[arg(long, env = "SIDECAR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Address of the sidecar agent process
    #[arg(long, env = "SIDECAR_CLI_URL", default_value = "localhost:4321")]
    cli_url: String,

    /// Model used for new and resumed sessions
    #[arg(long, env = "SIDECAR_MODEL", default_value = "gpt-4o")]
    model: String,

    /// Ask the agent for incremental deltas
    #[arg(long, env = "SIDECAR_STREAMING", default_value_t = true, action = clap::ArgAction::Set)]
    streaming: bool,

    /// Timeout of each connection attempt in seconds
    #[arg(long, env = "SIDECAR_CONN_TIMEOUT", default_value = "10")]
    conn_timeout: u64,

    /// Number of connection attempts
    #[arg(long, env = "SIDECAR_RETRY_ATTEMPTS", default_value = "5")]
    retry_attempts: u32,

    /// Delay before the second connection attempt, in milliseconds
    #[arg(long, env = "SIDECAR_RETRY_DELAY_MS", default_value = "500")]
    retry_delay_ms: u64,

    /// System message appended to every session
    #[arg(long, env = "SIDECAR_SYSTEM_MESSAGE")]
    system_message: Option<String>,

    /// BYOK provider type (openai, azure, anthropic); enables BYOK auth
    #[arg(long, env = "SIDECAR_PROVIDER")]
    provider: Option<ProviderType>,

    /// BYOK provider base URL
    #[arg(long, env = "SIDECAR_PROVIDER_BASE_URL", default_value = "")]
    provider_base_url: String,

    /// BYOK provider API key
    #[arg(long, env = "SIDECAR_PROVIDER_API_KEY", default_value = "", hide_env_values = true)]
    provider_api_key: String,

    /// Azure API version, only used with the azure provider
    #[arg(long, env = "SIDECAR_AZURE_API_VERSION")]
    azure_api_version: Option<String>,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new()
            .with_cli_url(&self.cli_url)
            .with_log_level(&self.log_level)
            .with_model(&self.model)
            .with_streaming(self.streaming)
            .with_conn_timeout(Duration::from_secs(self.conn_timeout))
            .with_retry_attempts(self.retry_attempts)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_tool(inventory_tool());

        if let Some(message) = &self.system_message {
            config = config.with_system_message(message);
        }
        if let Some(provider) = self.provider {
            config = config.with_byok(
                provider,
                &self.provider_base_url,
                &self.provider_api_key,
            );
        }
        if let Some(version) = &self.azure_api_version {
            config = config.with_azure_api_version(version);
        }
        config
    }

    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let bind_addr: SocketAddr = self
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.bind))?;

        let mut config = ServerConfig::new()
            .with_bind_addr(bind_addr)
            .with_cors(self.cors)
            .with_max_body_size(self.max_body_size)
            .with_logging(self.logging)
            .with_sse_keepalive(Duration::from_secs(self.keepalive));

        if let Some(origins) = &self.cors_origins {
            config =
                config.with_cors_origins(origins.split(',').map(|s| s.trim().to_string()).collect());
        }
        Ok(config)
    }
}

/// Demo tool answering stock-level questions.
fn inventory_tool() -> ToolDefinition {
    ToolDefinition::new(
        "lookup_inventory",
        "Look up the stock level of a product by SKU",
        |args: Map<String, Value>| -> anyhow::Result<String> {
            let sku = args
                .get("sku")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("sku is required"))?;
            Ok(format!("SKU {} has 42 units in stock", sku))
        },
    )
    .with_parameter(ToolParameter::new("sku", ParameterType::String, "Product SKU").required())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let client_config = args.client_config();
    let server_config = args.server_config()?;
    let transport_options = client_config.transport_options();

    log::info!("Starting sidecar server...");
    log::info!("Configuration:");
    log::info!("  Bind address: {}", server_config.bind_addr);
    log::info!("  CORS enabled: {}", server_config.enable_cors);
    log::info!("  Max body size: {} bytes", server_config.max_body_size);
    log::info!("  Logging enabled: {}", server_config.enable_logging);
    log::info!("  SSE keep-alive: {:?}", server_config.sse_keepalive_interval);
    log::info!(
        "  Sidecar: {} (loopback, log level {})",
        transport_options.cli_url,
        transport_options.log_level
    );
    log::info!("  Model: {}", client_config.model);

    let transport = LoopbackTransport::with_options(transport_options);
    let client = Client::new(client_config, Arc::new(transport))?;
    client.start(&CancellationToken::new()).await?;

    let server = SidecarServer::with_config(client.clone(), server_config);
    let served = server.serve_with_shutdown(shutdown_signal()).await;

    if let Err(e) = client.stop().await {
        log::warn!("Failed to disconnect from sidecar: {}", e);
    }

    served?;
    Ok(())
}
