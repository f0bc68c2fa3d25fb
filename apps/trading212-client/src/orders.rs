//! Order requests and their wire representation.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::error::BrokerError;

/// How long a pending order stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeValidity {
    /// Good till cancelled.
    Gtc,
    /// Expires at the end of the trading day.
    Day,
}

impl TimeValidity {
    /// Wire token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gtc => "GTC",
            Self::Day => "DAY",
        }
    }
}

impl fmt::Display for TimeValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeValidity {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GTC" => Ok(Self::Gtc),
            "DAY" => Ok(Self::Day),
            other => Err(BrokerError::Validation(format!(
                "time_validity must be one of GTC or DAY, got '{other}'"
            ))),
        }
    }
}

/// An order to place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRequest {
    /// Executes immediately at the market price.
    Market {
        /// Instrument ticker.
        ticker: String,
        /// Number of shares.
        quantity: u64,
    },
    /// Executes at `limit_price` or better.
    Limit {
        /// Instrument ticker.
        ticker: String,
        /// Number of shares.
        quantity: u64,
        /// Limit price.
        limit_price: Decimal,
        /// Order lifetime.
        time_validity: TimeValidity,
    },
    /// Becomes a market order once `stop_price` trades.
    Stop {
        /// Instrument ticker.
        ticker: String,
        /// Number of shares.
        quantity: u64,
        /// Trigger price.
        stop_price: Decimal,
        /// Order lifetime.
        time_validity: TimeValidity,
    },
    /// Becomes a limit order once `stop_price` trades.
    StopLimit {
        /// Instrument ticker.
        ticker: String,
        /// Number of shares.
        quantity: u64,
        /// Trigger price.
        stop_price: Decimal,
        /// Limit price after triggering.
        limit_price: Decimal,
        /// Order lifetime.
        time_validity: TimeValidity,
    },
}

impl OrderRequest {
    /// Create a market order.
    pub fn market(ticker: impl Into<String>, quantity: u64) -> Self {
        Self::Market {
            ticker: ticker.into(),
            quantity,
        }
    }

    /// Create a limit order.
    pub fn limit(
        ticker: impl Into<String>,
        quantity: u64,
        limit_price: Decimal,
        time_validity: TimeValidity,
    ) -> Self {
        Self::Limit {
            ticker: ticker.into(),
            quantity,
            limit_price,
            time_validity,
        }
    }

    /// Create a stop order.
    pub fn stop(
        ticker: impl Into<String>,
        quantity: u64,
        stop_price: Decimal,
        time_validity: TimeValidity,
    ) -> Self {
        Self::Stop {
            ticker: ticker.into(),
            quantity,
            stop_price,
            time_validity,
        }
    }

    /// Create a stop-limit order.
    pub fn stop_limit(
        ticker: impl Into<String>,
        quantity: u64,
        stop_price: Decimal,
        limit_price: Decimal,
        time_validity: TimeValidity,
    ) -> Self {
        Self::StopLimit {
            ticker: ticker.into(),
            quantity,
            stop_price,
            limit_price,
            time_validity,
        }
    }

    /// Endpoint the order is posted to.
    #[must_use]
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Self::Market { .. } => Endpoint::PlaceMarketOrder,
            Self::Limit { .. } => Endpoint::PlaceLimitOrder,
            Self::Stop { .. } => Endpoint::PlaceStopOrder,
            Self::StopLimit { .. } => Endpoint::PlaceStopLimitOrder,
        }
    }

    /// Short name of the order type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Market { .. } => "market",
            Self::Limit { .. } => "limit",
            Self::Stop { .. } => "stop",
            Self::StopLimit { .. } => "stop_limit",
        }
    }

    /// Instrument ticker.
    #[must_use]
    pub fn ticker(&self) -> &str {
        match self {
            Self::Market { ticker, .. }
            | Self::Limit { ticker, .. }
            | Self::Stop { ticker, .. }
            | Self::StopLimit { ticker, .. } => ticker,
        }
    }

    /// Number of shares.
    #[must_use]
    pub const fn quantity(&self) -> u64 {
        match self {
            Self::Market { quantity, .. }
            | Self::Limit { quantity, .. }
            | Self::Stop { quantity, .. }
            | Self::StopLimit { quantity, .. } => *quantity,
        }
    }

    /// Time validity; market orders have none.
    #[must_use]
    pub const fn time_validity(&self) -> Option<TimeValidity> {
        match self {
            Self::Market { .. } => None,
            Self::Limit { time_validity, .. }
            | Self::Stop { time_validity, .. }
            | Self::StopLimit { time_validity, .. } => Some(*time_validity),
        }
    }

    /// Check the order before it is sent.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.ticker().trim().is_empty() {
            return Err(BrokerError::Validation("ticker must not be empty".to_string()));
        }
        if self.quantity() == 0 {
            return Err(BrokerError::Validation(
                "quantity must be a positive integer".to_string(),
            ));
        }
        let body = self.body();
        let prices = [("stop_price", body.stop_price), ("limit_price", body.limit_price)];
        for (name, price) in prices {
            if let Some(price) = price
                && price <= Decimal::ZERO
            {
                return Err(BrokerError::Validation(format!(
                    "{name} must be positive, got {price}"
                )));
            }
        }
        Ok(())
    }

    /// JSON body posted to the order endpoint.
    #[must_use]
    pub fn body(&self) -> OrderBody<'_> {
        let (stop_price, limit_price) = match self {
            Self::Market { .. } => (None, None),
            Self::Limit { limit_price, .. } => (None, Some(*limit_price)),
            Self::Stop { stop_price, .. } => (Some(*stop_price), None),
            Self::StopLimit {
                stop_price,
                limit_price,
                ..
            } => (Some(*stop_price), Some(*limit_price)),
        };
        OrderBody {
            quantity: self.quantity(),
            stop_price,
            limit_price,
            ticker: self.ticker(),
            time_validity: self.time_validity(),
        }
    }
}

/// Order body in Trading212's wire format. Prices are JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBody<'a> {
    /// Number of shares.
    pub quantity: u64,
    /// Trigger price.
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub stop_price: Option<Decimal>,
    /// Limit price.
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub limit_price: Option<Decimal>,
    /// Instrument ticker.
    pub ticker: &'a str,
    /// Order lifetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_validity: Option<TimeValidity>,
}
