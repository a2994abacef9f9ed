//! Kalshi REST market catalog.
//!
//! Categories live on series, not markets, so a full refresh pages the
//! series index first and joins it onto the market pages. Markets whose
//! `series_ticker` is absent fall back to the ticker prefix before the
//! first dash.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::FALLBACK_CATEGORY;
use crate::error::Result;
use crate::port::catalog::{InstrumentMeta, MarketCatalog};

const SERIES_PAGE_LIMIT: u32 = 1_000;
const MARKETS_PAGE_LIMIT: u32 = 100;

/// REST client for the venue's series and markets endpoints.
pub struct KalshiCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl KalshiCatalog {
    /// Build a catalog client against `base_url`
    /// (e.g. `https://api.elections.kalshi.com/trade-api/v2`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Page the series index into a ticker -> category map.
    async fn fetch_series_categories(&self) -> Result<HashMap<String, String>> {
        let url = format!("{}/series", self.base_url);
        let mut categories = HashMap::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("limit", SERIES_PAGE_LIMIT.to_string())]);
            if let Some(c) = &cursor {
                request = request.query(&[("cursor", c)]);
            }

            let page: SeriesPage = request.send().await?.error_for_status()?.json().await?;
            for series in page.series {
                let category = series
                    .category
                    .filter(|c| !c.is_empty())
                    .map(|c| c.to_lowercase())
                    .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());
                categories.insert(series.ticker, category);
            }

            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        info!(series = categories.len(), "Loaded series categories");
        Ok(categories)
    }
}

#[async_trait]
impl MarketCatalog for KalshiCatalog {
    async fn fetch_all(&self) -> Result<Vec<InstrumentMeta>> {
        let categories = self.fetch_series_categories().await?;

        let url = format!("{}/markets", self.base_url);
        let mut instruments = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[
                ("limit", MARKETS_PAGE_LIMIT.to_string()),
                ("status", "open".to_string()),
            ]);
            if let Some(c) = &cursor {
                request = request.query(&[("cursor", c)]);
            }

            let page: MarketsPage = request.send().await?.error_for_status()?.json().await?;
            debug!(markets = page.markets.len(), "Fetched market page");

            for market in page.markets {
                let category = resolve_category(
                    &categories,
                    market.series_ticker.as_deref(),
                    &market.ticker,
                );
                instruments.push(InstrumentMeta {
                    instrument_id: market.ticker,
                    category,
                    open_interest: market.open_interest.unwrap_or(0),
                    volume_24h: market.volume_24h.unwrap_or(0),
                });
            }

            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        info!(instruments = instruments.len(), "Catalog refresh fetched");
        Ok(instruments)
    }
}

/// Category for a market via its series, lowercased, with the
/// ticker-prefix fallback when `series_ticker` is missing.
fn resolve_category(
    categories: &HashMap<String, String>,
    series_ticker: Option<&str>,
    market_ticker: &str,
) -> String {
    let series = series_ticker
        .filter(|s| !s.is_empty())
        .or_else(|| market_ticker.split_once('-').map(|(prefix, _)| prefix));

    series
        .and_then(|s| categories.get(s))
        .cloned()
        .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
}

#[derive(Debug, Deserialize)]
struct SeriesPage {
    series: Vec<SeriesDto>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesDto {
    ticker: String,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketsPage {
    markets: Vec<MarketDto>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketDto {
    ticker: String,
    series_ticker: Option<String>,
    open_interest: Option<i64>,
    volume_24h: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> HashMap<String, String> {
        HashMap::from([
            ("PRES".to_string(), "politics".to_string()),
            ("NBA".to_string(), "sports".to_string()),
        ])
    }

    #[test]
    fn resolves_via_explicit_series_ticker() {
        let cat = resolve_category(&categories(), Some("PRES"), "PRES-2028-DEM");
        assert_eq!(cat, "politics");
    }

    #[test]
    fn falls_back_to_ticker_prefix() {
        let cat = resolve_category(&categories(), None, "NBA-FINALS-LAL");
        assert_eq!(cat, "sports");
    }

    #[test]
    fn unknown_series_maps_to_fallback() {
        let cat = resolve_category(&categories(), Some("WEATHER"), "WEATHER-NYC");
        assert_eq!(cat, FALLBACK_CATEGORY);
    }

    #[test]
    fn ticker_without_dash_maps_to_fallback() {
        let cat = resolve_category(&categories(), None, "STANDALONE");
        assert_eq!(cat, FALLBACK_CATEGORY);
    }

    #[test]
    fn markets_page_parses_with_missing_fields() {
        let json = r#"{
            "markets": [
                {"ticker": "PRES-2028-DEM", "series_ticker": "PRES",
                 "open_interest": 1000, "volume_24h": 2000},
                {"ticker": "NBA-FINALS-LAL"}
            ],
            "cursor": ""
        }"#;
        let page: MarketsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.markets.len(), 2);
        assert_eq!(page.markets[1].open_interest, None);
    }

    #[test]
    fn series_page_parses() {
        let json = r#"{
            "series": [{"ticker": "PRES", "category": "Politics"}],
            "cursor": "abc"
        }"#;
        let page: SeriesPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.series[0].category.as_deref(), Some("Politics"));
        assert_eq!(page.cursor.as_deref(), Some("abc"));
    }
}
