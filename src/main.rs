//! Main entry point for the toolbox MCP server
//!
//! This file sets up logging, parses command line arguments, and starts the
//! transports. Stdio is on by default; `--http-addr` adds the authenticated
//! streaming endpoint and OAuth routes.

use std::net::SocketAddr;

use clap::Parser;
use tracing::info;

use toolbox_mcp::{AuthConfig, ServerConfig, ToolboxServer};

/// Command line arguments for the toolbox MCP server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen on HTTP (streaming transport + OAuth endpoints)
    #[arg(long, env = "TOOLBOX_HTTP_ADDR")]
    http_addr: Option<SocketAddr>,

    /// Disable the stdio transport (use HTTP only)
    #[arg(long, env = "TOOLBOX_NO_STDIO", default_value_t = false)]
    no_stdio: bool,

    /// The single OAuth client allowed to authorize
    #[arg(long, env = "TOOLBOX_OAUTH_CLIENT_ID", default_value = toolbox_mcp::config::DEFAULT_CLIENT_ID)]
    client_id: String,

    /// Redirect URI registered for that client
    #[arg(long, env = "TOOLBOX_OAUTH_REDIRECT_URI", default_value = toolbox_mcp::config::DEFAULT_REDIRECT_URI)]
    redirect_uri: String,

    /// Server name reported to clients
    #[arg(long, env = "TOOLBOX_SERVER_NAME", default_value = "toolbox-mcp")]
    server_name: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Set up logging based on command line flags
    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("toolbox_mcp={}", log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // stdout carries the protocol
        .init();

    if args.no_stdio && args.http_addr.is_none() {
        return Err("--no-stdio requires --http-addr".into());
    }

    let config = ServerConfig {
        name: args.server_name,
        auth: AuthConfig {
            client_id: args.client_id,
            redirect_uri: args.redirect_uri,
            ..AuthConfig::default()
        },
        ..ServerConfig::default()
    };

    let registry = ToolboxServer::default_registry(&config)?;
    let server = ToolboxServer::new(config, registry);
    info!("Starting {} with {} tools", server.config().name, server.registry().len());

    match (args.http_addr, args.no_stdio) {
        (Some(addr), true) => server.serve_http(addr).await?,
        (Some(addr), false) => {
            tokio::try_join!(server.serve_http(addr), server.run_stdio())?;
        }
        (None, _) => server.run_stdio().await?,
    }

    info!("MCP server shutdown complete");
    Ok(())
}
