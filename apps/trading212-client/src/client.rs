//! Authenticated Trading212 REST client.
//!
//! Every operation builds one or more requests against the configured host,
//! hands them to the [`HttpTransport`] and turns the response into JSON or a
//! typed [`BrokerError`]. Paginated history endpoints are followed until the
//! last page and returned as a single list.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Level;

use crate::config::{ApiKey, ClientConfig, Environment};
use crate::endpoint::Endpoint;
use crate::error::BrokerError;
use crate::log_with_context;
use crate::observability::{Fields, LogsWithContext};
use crate::orders::{OrderRequest, TimeValidity};
use crate::pagination::{HistoryQuery, Page, PageCollector};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Trading212 API client.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct BrokerClient {
    transport: Arc<dyn HttpTransport>,
    api_key: ApiKey,
    environment: Environment,
    base_url: String,
}

impl fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerClient")
            .field("api_key", &self.api_key)
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BrokerClient {
    /// Create a client backed by reqwest.
    pub fn new(config: &ClientConfig) -> Result<Self, BrokerError> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client on top of any transport.
    #[must_use]
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            api_key: config.api_key.clone(),
            environment: config.environment,
            base_url: config.base_url(),
        }
    }

    /// Create a client from `T212_*` environment variables.
    pub fn from_env() -> Result<Self, BrokerError> {
        Self::new(&ClientConfig::from_env()?)
    }

    /// Environment the client talks to.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Host every request is built against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Request primitives
    // =========================================================================

    fn api_url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}/api/{}/{}",
            self.base_url,
            api_version,
            path.trim_start_matches('/')
        )
    }

    fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url).with_header("Authorization", self.api_key.expose())
    }

    async fn send(&self, request: HttpRequest) -> Result<Value, BrokerError> {
        tracing::debug!(method = %request.method, url = %request.url, "Sending request");
        let url = request.url.clone();
        let response = self.transport.execute(request).await?;
        process_response(&url, response)
    }

    /// `GET {base}/api/{version}/{path}` with query parameters.
    pub async fn get(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        api_version: &str,
    ) -> Result<Value, BrokerError> {
        let request = self
            .request(HttpMethod::Get, self.api_url(path, api_version))
            .with_query(query);
        self.send(request).await
    }

    /// `POST {base}/api/{version}/{path}` with a JSON body.
    pub async fn post<B>(
        &self,
        path: &str,
        body: &B,
        api_version: &str,
    ) -> Result<Value, BrokerError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(HttpMethod::Post, self.api_url(path, api_version));
        self.send(with_json(request, body)?).await
    }

    /// `GET {base}/{path}`; used to follow `nextPagePath`.
    pub async fn get_url(&self, path: &str) -> Result<Value, BrokerError> {
        let request = self.request(HttpMethod::Get, self.absolute_url(path));
        self.send(request).await
    }

    /// `DELETE {base}/{path}`.
    pub async fn delete_url(&self, path: &str) -> Result<Value, BrokerError> {
        let request = self.request(HttpMethod::Delete, self.absolute_url(path));
        self.send(request).await
    }

    /// Follow `nextPagePath` from `first` until the last page.
    async fn collect_pages(&self, first: Value) -> Result<Vec<Value>, BrokerError> {
        let mut collector = PageCollector::new();
        let mut next = collector.push(Page::from_value(first)?);
        while let Some(path) = next {
            let page = Page::from_value(self.get_url(&path).await?)?;
            next = collector.push(page);
        }
        tracing::debug!(pages = collector.pages(), "Pagination complete");
        Ok(collector.into_items())
    }

    /// Send `endpoint` with the method from the endpoint table.
    async fn call(
        &self,
        endpoint: Endpoint,
        param: Option<&str>,
        query: Vec<(String, String)>,
    ) -> Result<Value, BrokerError> {
        let url = self.absolute_url(&endpoint.versioned_path(param));
        let request = self.request(endpoint.method(), url).with_query(query);
        self.send(request).await
    }

    async fn get_endpoint(
        &self,
        endpoint: Endpoint,
        param: Option<&str>,
    ) -> Result<Value, BrokerError> {
        self.call(endpoint, param, Vec::new()).await
    }

    // =========================================================================
    // Account and metadata
    // =========================================================================

    /// Tradable instruments.
    pub async fn instruments(&self) -> Result<Value, BrokerError> {
        self.get_endpoint(Endpoint::Instruments, None).await
    }

    /// Exchanges and their working schedules.
    pub async fn exchanges(&self) -> Result<Value, BrokerError> {
        self.get_endpoint(Endpoint::Exchanges, None).await
    }

    /// Cash balance.
    pub async fn cash(&self) -> Result<Value, BrokerError> {
        self.get_endpoint(Endpoint::Cash, None).await
    }

    /// Account metadata.
    pub async fn account_info(&self) -> Result<Value, BrokerError> {
        self.get_endpoint(Endpoint::AccountInfo, None).await
    }

    /// All open positions.
    pub async fn portfolio(&self) -> Result<Value, BrokerError> {
        self.get_endpoint(Endpoint::Portfolio, None).await
    }

    /// Open position for `ticker`.
    pub async fn position(&self, ticker: &str) -> Result<Value, BrokerError> {
        self.get_endpoint(Endpoint::Position, Some(ticker)).await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Active equity orders.
    pub async fn equity_orders(&self) -> Result<Value, BrokerError> {
        self.get_endpoint(Endpoint::Orders, None).await
    }

    /// One equity order by id.
    pub async fn equity_order(&self, id: i64) -> Result<Value, BrokerError> {
        self.get_endpoint(Endpoint::Order, Some(&id.to_string())).await
    }

    /// Cancel a pending equity order.
    pub async fn cancel_equity_order(&self, id: i64) -> Result<Value, BrokerError> {
        let fields = Fields::new().with("order_id", id);
        log_with_context!(self, Level::INFO, "Cancelling order", fields);
        self.call(Endpoint::CancelOrder, Some(&id.to_string()), Vec::new())
            .await
    }

    /// Validate and submit an order.
    ///
    /// Invalid orders fail with [`BrokerError::Validation`] before any request
    /// is sent.
    pub async fn place_order(&self, order: &OrderRequest) -> Result<Value, BrokerError> {
        order.validate()?;

        let mut fields = Fields::new()
            .with("order_type", order.kind())
            .with("ticker", order.ticker())
            .with("quantity", order.quantity());
        if let Some(validity) = order.time_validity() {
            fields.insert("time_validity", validity.as_str());
        }
        log_with_context!(self, Level::INFO, "Placing order", fields);

        let endpoint = order.endpoint();
        let url = self.absolute_url(&endpoint.versioned_path(None));
        let request = with_json(self.request(endpoint.method(), url), &order.body())?;
        self.send(request).await
    }

    /// Place a market order.
    pub async fn place_market_order(
        &self,
        ticker: &str,
        quantity: u64,
    ) -> Result<Value, BrokerError> {
        self.place_order(&OrderRequest::market(ticker, quantity)).await
    }

    /// Place a limit order. `time_validity` must be `GTC` or `DAY`.
    pub async fn place_limit_order(
        &self,
        ticker: &str,
        quantity: u64,
        limit_price: Decimal,
        time_validity: &str,
    ) -> Result<Value, BrokerError> {
        let time_validity: TimeValidity = time_validity.parse()?;
        self.place_order(&OrderRequest::limit(ticker, quantity, limit_price, time_validity))
            .await
    }

    /// Place a stop order. `time_validity` must be `GTC` or `DAY`.
    pub async fn place_stop_order(
        &self,
        ticker: &str,
        quantity: u64,
        stop_price: Decimal,
        time_validity: &str,
    ) -> Result<Value, BrokerError> {
        let time_validity: TimeValidity = time_validity.parse()?;
        self.place_order(&OrderRequest::stop(ticker, quantity, stop_price, time_validity))
            .await
    }

    /// Place a stop-limit order. `time_validity` must be `GTC` or `DAY`.
    pub async fn place_stop_limit_order(
        &self,
        ticker: &str,
        quantity: u64,
        stop_price: Decimal,
        limit_price: Decimal,
        time_validity: &str,
    ) -> Result<Value, BrokerError> {
        let time_validity: TimeValidity = time_validity.parse()?;
        let order =
            OrderRequest::stop_limit(ticker, quantity, stop_price, limit_price, time_validity);
        self.place_order(&order).await
    }

    // =========================================================================
    // History (paginated)
    // =========================================================================

    /// Historical orders across all pages.
    pub async fn order_history(&self, query: &HistoryQuery) -> Result<Vec<Value>, BrokerError> {
        let first = self.call(Endpoint::OrderHistory, None, query.params()).await?;
        self.collect_pages(first).await
    }

    /// Paid dividends across all pages.
    pub async fn dividend_history(&self, query: &HistoryQuery) -> Result<Vec<Value>, BrokerError> {
        let first = self.call(Endpoint::DividendHistory, None, query.params()).await?;
        self.collect_pages(first).await
    }

    /// Deposits, withdrawals and fees across all pages. The ticker filter is
    /// not supported by this endpoint and is ignored.
    pub async fn transaction_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<Value>, BrokerError> {
        let first = self
            .call(Endpoint::TransactionHistory, None, query.params_without_ticker())
            .await?;
        self.collect_pages(first).await
    }
}

impl LogsWithContext for BrokerClient {
    fn log_context(&self) -> Fields {
        Fields::new()
            .with("component", "broker_client")
            .with("environment", self.environment.as_str())
    }
}

/// Attach `body` serialized as JSON.
fn with_json<B>(request: HttpRequest, body: &B) -> Result<HttpRequest, BrokerError>
where
    B: Serialize + ?Sized,
{
    let payload = serde_json::to_string(body)?;
    Ok(request
        .with_header("Content-Type", "application/json")
        .with_body(payload))
}

/// Turn a raw response into JSON, or into [`BrokerError::Http`] for non-2xx.
fn process_response(url: &str, response: HttpResponse) -> Result<Value, BrokerError> {
    if !response.is_success() {
        tracing::error!(status = response.status, url = %url, "{}", response.body);
        return Err(BrokerError::Http {
            status: response.status,
            body: response.body,
        });
    }

    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&response.body)?)
}

/// Decode a JSON response into a typed value.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, BrokerError> {
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::API_VERSION;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<HttpRequest>>,
        response: Mutex<Option<HttpResponse>>,
    }

    #[async_trait]
    impl HttpTransport for Recorder {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, BrokerError> {
            self.requests.lock().unwrap().push(request);
            Ok(self
                .response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| HttpResponse::ok_json("{}")))
        }
    }

    fn client_with(recorder: &Arc<Recorder>) -> BrokerClient {
        let config = ClientConfig::new("secret-key-9876", Environment::Demo);
        BrokerClient::with_transport(&config, recorder.clone())
    }

    #[test]
    fn urls_are_built_against_base() {
        let client = client_with(&Arc::new(Recorder::default()));
        assert_eq!(
            client.api_url("equity/account/cash", API_VERSION),
            "https://demo.trading212.com/api/v0/equity/account/cash"
        );
        assert_eq!(
            client.absolute_url("/api/v0/history/dividends?cursor=7"),
            "https://demo.trading212.com/api/v0/history/dividends?cursor=7"
        );
        assert_eq!(
            client.absolute_url("https://other.example/api/v0/x"),
            "https://other.example/api/v0/x"
        );
    }

    #[test]
    fn debug_output_redacts_key() {
        let client = client_with(&Arc::new(Recorder::default()));
        let debug = format!("{client:?}");
        assert!(debug.contains("****9876"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn log_context_names_component_and_environment() {
        let client = client_with(&Arc::new(Recorder::default()));
        assert_eq!(
            client.log_context().render(),
            "component=\"broker_client\" environment=\"demo\""
        );
    }

    #[test]
    fn process_response_maps_status_and_body() {
        let err = process_response("u", HttpResponse::new(503, "down")).unwrap_err();
        assert!(matches!(err, BrokerError::Http { status: 503, ref body } if body == "down"));
        assert_eq!(
            process_response("u", HttpResponse::ok_json("")).unwrap(),
            Value::Null
        );
        assert!(matches!(
            process_response("u", HttpResponse::ok_json("<html>")),
            Err(BrokerError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn every_request_is_authorized() {
        let recorder = Arc::new(Recorder::default());
        let client = client_with(&recorder);
        client.cash().await.unwrap();
        client.position("AAPL_US_EQ").await.unwrap();

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(
            requests
                .iter()
                .all(|r| r.header("authorization") == Some("secret-key-9876"))
        );
        assert_eq!(
            requests[1].url,
            "https://demo.trading212.com/api/v0/equity/portfolio/AAPL_US_EQ"
        );
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let recorder = Arc::new(Recorder::default());
        let client = client_with(&recorder);
        client
            .post("equity/orders/market", &json!({"quantity": 1}), API_VERSION)
            .await
            .unwrap();

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].header("content-type"), Some("application/json"));
        assert_eq!(requests[0].body.as_deref(), Some(r#"{"quantity":1}"#));
    }

    #[tokio::test]
    async fn operations_use_the_endpoint_method() {
        let recorder = Arc::new(Recorder::default());
        let client = client_with(&recorder);
        client.cancel_equity_order(42).await.unwrap();
        client.equity_order(42).await.unwrap();

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests[0].method, HttpMethod::Delete);
        assert_eq!(requests[1].method, HttpMethod::Get);
        assert!(requests.iter().all(|r| r.url.ends_with("/api/v0/equity/orders/42")));
        assert!(requests[0].body.is_none());
    }

    #[tokio::test]
    async fn delete_url_returns_null_for_empty_body() {
        let recorder = Arc::new(Recorder::default());
        *recorder.response.lock().unwrap() = Some(HttpResponse::ok_json(""));
        let client = client_with(&recorder);

        let value = client.delete_url("/api/v0/equity/orders/7").await.unwrap();

        assert_eq!(value, Value::Null);
        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests[0].method, HttpMethod::Delete);
        assert_eq!(
            requests[0].url,
            "https://demo.trading212.com/api/v0/equity/orders/7"
        );
    }

    #[test]
    fn decode_into_typed_value() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Cash {
            free: f64,
        }
        let cash: Cash = decode(json!({"free": 12.5})).unwrap();
        assert_eq!(cash, Cash { free: 12.5 });
    }
}
