#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;

    use music_flow::{AppConfig, AppContext, http_api};
    use tracing_subscriber::EnvFilter;

    let config = AppConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr: SocketAddr = config.http.addr.parse()?;
    let today = chrono::Local::now().date_naive();
    let context = AppContext::bootstrap(&config, today)?;

    println!("music-flow HTTP API listening on http://{addr}");
    http_api::serve(addr, context).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
