#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up STORE_BASE_URL, secrets, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    if let Err(e) = sitework_api::app::serve(None).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
