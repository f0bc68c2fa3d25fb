// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::items_after_statements
    )
)]

//! Trading212 client library.
//!
//! Authenticated access to the Trading212 equity REST API plus the structured
//! logging used to trace calls made through it.
//!
//! # Modules
//!
//! - `client`: `BrokerClient` and all account, order and history operations
//! - `config`: environment selection, API key, timeouts
//! - `transport`: the HTTP port and its reqwest implementation
//! - `endpoint`: static endpoint table
//! - `orders`: order requests, validation and wire bodies
//! - `pagination`: `{items, nextPagePath}` pages and history queries
//! - `observability`: correlation ids, `key=value` formatting, logging setup
//!
//! # Example
//!
//! ```no_run
//! use trading212_client::observability::CorrelationExt;
//! use trading212_client::{BrokerClient, ClientConfig, Environment};
//!
//! # async fn run() -> Result<(), trading212_client::BrokerError> {
//! let client = BrokerClient::new(&ClientConfig::new("api-key", Environment::Demo))?;
//! let cash = client.cash().with_correlation("rebalance-1").await?;
//! println!("{cash}");
//! # Ok(())
//! # }
//! ```

/// Broker client and its operations.
pub mod client;

/// Client configuration.
pub mod config;

/// Endpoint descriptors.
pub mod endpoint;

/// Error types.
pub mod error;

/// Structured logging and correlation ids.
pub mod observability;

/// Order requests.
pub mod orders;

/// Paginated responses.
pub mod pagination;

/// HTTP transport port.
pub mod transport;

#[doc(hidden)]
pub use tracing as __tracing;

pub use client::{BrokerClient, decode};
pub use config::{ApiKey, ClientConfig, Environment};
pub use endpoint::{API_VERSION, Endpoint};
pub use error::BrokerError;
pub use orders::{OrderBody, OrderRequest, TimeValidity};
pub use pagination::{DEFAULT_PAGE_LIMIT, HistoryQuery, Page, PageCollector};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
