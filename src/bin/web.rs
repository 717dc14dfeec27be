use stock_ledger::{Config, app};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    println!(
        "Starting web server for {} ({:?} backend, {} writes)",
        config.range, config.backend, config.write_mode
    );
    app::run(config).await
}
