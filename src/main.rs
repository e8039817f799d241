mod api;
mod cli;
mod complex;
mod config;
mod error;
mod hashing;
mod ingest;
mod matcher;
mod orchestrator;
mod peaks;
mod pipeline;
mod spectral;
mod store;
mod waveform;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("musica=info".parse().unwrap()))
        .init();

    let code = cli::run().await;
    std::process::exit(code);
}
