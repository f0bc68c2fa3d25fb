//! Static endpoint table for the Trading212 equity API.

use crate::transport::HttpMethod;

/// API version every endpoint is currently served under.
pub const API_VERSION: &str = "v0";

/// Trading212 REST endpoints used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Historical orders (paginated).
    OrderHistory,
    /// Dividend history (paginated).
    DividendHistory,
    /// Transaction history (paginated).
    TransactionHistory,
    /// Instrument metadata.
    Instruments,
    /// Cash balance.
    Cash,
    /// All open positions.
    Portfolio,
    /// One open position, templated by ticker.
    Position,
    /// Exchange metadata.
    Exchanges,
    /// Account information.
    AccountInfo,
    /// Active equity orders.
    Orders,
    /// One equity order, templated by id.
    Order,
    /// Cancel an equity order, templated by id.
    CancelOrder,
    /// Place a limit order.
    PlaceLimitOrder,
    /// Place a market order.
    PlaceMarketOrder,
    /// Place a stop order.
    PlaceStopOrder,
    /// Place a stop-limit order.
    PlaceStopLimitOrder,
}

impl Endpoint {
    /// Path template relative to `/api/{version}/`.
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::OrderHistory => "equity/history/orders",
            Self::DividendHistory => "history/dividends",
            Self::TransactionHistory => "history/transactions",
            Self::Instruments => "equity/metadata/instruments",
            Self::Cash => "equity/account/cash",
            Self::Portfolio => "equity/portfolio",
            Self::Position => "equity/portfolio/{ticker}",
            Self::Exchanges => "equity/metadata/exchanges",
            Self::AccountInfo => "equity/account/info",
            Self::Orders => "equity/orders",
            Self::Order | Self::CancelOrder => "equity/orders/{id}",
            Self::PlaceLimitOrder => "equity/orders/limit",
            Self::PlaceMarketOrder => "equity/orders/market",
            Self::PlaceStopOrder => "equity/orders/stop",
            Self::PlaceStopLimitOrder => "equity/orders/stop_limit",
        }
    }

    /// HTTP method for the endpoint.
    #[must_use]
    pub const fn method(self) -> HttpMethod {
        match self {
            Self::CancelOrder => HttpMethod::Delete,
            Self::PlaceLimitOrder
            | Self::PlaceMarketOrder
            | Self::PlaceStopOrder
            | Self::PlaceStopLimitOrder => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }

    /// API version segment.
    #[must_use]
    pub const fn api_version(self) -> &'static str {
        API_VERSION
    }

    /// Path with no template parameters.
    #[must_use]
    pub const fn path(self) -> &'static str {
        self.template()
    }

    /// Path with its single `{..}` parameter substituted.
    #[must_use]
    pub fn path_with(self, param: &str) -> String {
        let template = self.template();
        match (template.find('{'), template.find('}')) {
            (Some(start), Some(end)) if start < end => {
                format!("{}{}{}", &template[..start], param, &template[end + 1..])
            }
            _ => template.to_string(),
        }
    }

    /// Path relative to the host, e.g. `api/v0/equity/orders/42`.
    #[must_use]
    pub fn versioned_path(self, param: Option<&str>) -> String {
        let path = param.map_or_else(|| self.path().to_string(), |p| self.path_with(p));
        format!("api/{}/{}", self.api_version(), path)
    }
}
