//! Trading212 client binary.
//!
//! Prints an account summary for the configured environment.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trading212-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `T212_API_KEY`: API key
//!
//! ## Optional
//! - `T212_ENV`: demo | live (default: demo)
//! - `T212_TIMEOUT_SECS`: request timeout (default: 30)
//! - `LOG_LEVEL` / `RUST_LOG`: log filter (default: info)
//! - `CONTAINER_ENV`: quiet HTTP library logs (default: false)
//! - `LOG_FILE_PATH`: also write logs to this file

use tracing::Level;
use trading212_client::observability::{CorrelationExt, Fields, LoggingConfig, init_logging, timed};
use trading212_client::{BrokerClient, log_with_context};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present (ignored when missing)
    let _ = dotenvy::dotenv();

    init_logging(&LoggingConfig::from_env())?;

    let client = BrokerClient::from_env()?;
    tracing::info!(
        environment = %client.environment(),
        base_url = %client.base_url(),
        "Starting Trading212 client"
    );

    let summary = timed("account_summary", async {
        let info = client.account_info().await?;
        let cash = client.cash().await?;
        let positions = client.portfolio().await?;
        Ok::<_, trading212_client::BrokerError>((info, cash, positions))
    })
    .in_new_correlation()
    .await;

    match summary {
        Ok((info, cash, positions)) => {
            let position_count = positions.as_array().map_or(0, Vec::len);
            let fields = Fields::new()
                .with("currency", info["currencyCode"].as_str().unwrap_or("unknown"))
                .with_display("free_cash", &cash["free"])
                .with("positions", position_count);
            log_with_context!(client, Level::INFO, "Account summary", fields);
            Ok(())
        }
        Err(e) => {
            log_with_context!(
                client,
                Level::ERROR,
                "Account summary failed",
                Fields::new(),
                error = &e
            );
            Err(e.into())
        }
    }
}
