//! Cursor-paginated history listings.

use serde::Deserialize;
use serde_json::Value;

use crate::error::BrokerError;

/// Default page size requested from history endpoints.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// One page of a history listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Items on this page.
    pub items: Vec<Value>,
    /// Host-relative path of the next page; absent on the last page.
    #[serde(default)]
    pub next_page_path: Option<String>,
}

impl Page {
    /// Decode a page from a response body. A missing `items` field is an error.
    pub fn from_value(value: Value) -> Result<Self, BrokerError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Starting parameters for a history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Cursor offset of the first page.
    pub cursor: i64,
    /// Restrict to one instrument.
    pub ticker: Option<String>,
    /// Page size.
    pub limit: u32,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            cursor: 0,
            ticker: None,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl HistoryQuery {
    /// Query starting at `cursor`.
    #[must_use]
    pub fn from_cursor(cursor: i64) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    /// Restrict to one ticker.
    #[must_use]
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Query parameters for the first request. `ticker` is omitted when unset.
    #[must_use]
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("cursor".to_string(), self.cursor.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(ticker) = self.ticker.as_deref().filter(|t| !t.is_empty()) {
            params.push(("ticker".to_string(), ticker.to_string()));
        }
        params
    }

    /// Parameters without the ticker filter, for endpoints that do not accept it.
    #[must_use]
    pub fn params_without_ticker(&self) -> Vec<(String, String)> {
        self.params()
            .into_iter()
            .filter(|(key, _)| key != "ticker")
            .collect()
    }
}

/// Accumulates items across pages in page order.
#[derive(Debug, Default)]
pub struct PageCollector {
    items: Vec<Value>,
    pages: usize,
}

impl PageCollector {
    /// Create an empty collector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            pages: 0,
        }
    }

    /// Append a page's items and return the continuation, if any.
    pub fn push(&mut self, page: Page) -> Option<String> {
        self.pages += 1;
        self.items.extend(page.items);
        page.next_page_path.filter(|path| !path.is_empty())
    }

    /// Pages consumed so far.
    #[must_use]
    pub const fn pages(&self) -> usize {
        self.pages
    }

    /// Collected items.
    #[must_use]
    pub fn into_items(self) -> Vec<Value> {
        self.items
    }
}
