use clap::Parser;
use gatehouse::cli::{
    Args, build_config, handle_generate_keys, init_logging, load_keys, open_database,
};
use gatehouse::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    if let Some(dir) = &args.generate_keys {
        let ok = handle_generate_keys(dir);
        std::process::exit(if ok { 0 } else { 1 });
    }

    // Keys are checked before anything else so a misconfigured server never
    // binds its port.
    let Some(keys) = load_keys(&args) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => info!(address = %addr, error = %e, "Listening"),
    }

    let config = build_config(&args, db, keys);
    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
