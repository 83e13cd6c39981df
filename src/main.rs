//! Q-Variance - Windowed Volatility Dataset Builder and Scaling-Law Scorer

use anyhow::Result;

use qvariance::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (QVAR__* overrides can live there)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
