use std::sync::Arc;
use std::thread;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use mailsink::{Config, MailStore, SmtpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .init();

    let config = Config::from_env().context("reading configuration")?;
    let store = Arc::new(MailStore::new());

    // SMTP runs on its own thread pool (one thread per connection); the
    // query API runs on the tokio runtime
    let smtp = SmtpServer::new(&config.smtp_hostname, config.limits(), Arc::clone(&store));
    let smtp_addr = config.smtp_addr.clone();
    thread::spawn(move || {
        if let Err(e) = smtp.start(&smtp_addr) {
            error!("SMTP server failed: {e}");
            std::process::exit(1);
        }
    });

    let app = mailsink::http::router(store);
    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.http_addr))?;
    info!(addr = %config.http_addr, "HTTP query API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install shutdown handler: {e}");
    }
    info!("shutting down");
}
