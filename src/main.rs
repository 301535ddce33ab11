use clap::Parser;
use tracing::{error, info};

use hexagondb::config::Config;
use hexagondb::reactor::Reactor;

/// HexagonDB - single-threaded, in-memory RESP key-value server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "hexagondb.toml")]
    config: String,

    /// Override bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override port
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Warning: failed to load config file: {e}");
        eprintln!("Using default configuration");
        Config::default()
    });

    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .init();

    info!("starting HexagonDB server");
    info!("configuration loaded from: {}", args.config);
    info!("listening on {}", config.server_address());

    let addr = config.server_address().parse().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("invalid bind address: {e}"))
    })?;

    let mut reactor = match Reactor::bind(addr, config.server.default_idle_ms, config.server.max_clients) {
        Ok(reactor) => reactor,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            return Err(e);
        }
    };

    reactor.run()
}
