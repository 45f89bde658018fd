//! Live HTTP adapter.

use crate::{
    adapter::{ListingAdapter, ListingQuery},
    error::{Result, ScrapeError},
    extract::{
        confidence_score, detect_brand, extract_currency, extract_price, is_official_match,
        parse_availability,
    },
    listing::{Availability, Listing},
    parser::{ListingParser, ParsedItem},
    url_builder::build_search_url,
};
use async_trait::async_trait;
use cotiza_core::ScrapingConfig;
use cotiza_sources::SourceDescriptor;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE};
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches a source's search page over HTTP and reads it with the
/// descriptor's selector profile.
///
/// A profile's `wait_ms` paces the source: the adapter sleeps that long
/// before sending the request.
#[derive(Debug, Clone)]
pub struct HttpListingAdapter {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpListingAdapter {
    /// Build the adapter from scraping settings.
    ///
    /// # Errors
    /// Returns error if the HTTP client can't be constructed.
    pub fn new(config: &ScrapingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn headers(source: &SourceDescriptor) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("es-PE,es;q=0.9,en;q=0.8"),
        );

        for (name, value) in &source.scraper.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(source_id = %source.id, header = %name, "ignoring invalid header"),
            }
        }

        headers
    }

    async fn fetch_page(&self, source: &SourceDescriptor, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .headers(Self::headers(source))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScrapeError::Timeout {
                        source_id: source.id.clone(),
                        seconds: self.timeout_secs,
                    }
                } else {
                    ScrapeError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::UnexpectedStatus {
                source_id: source.id.clone(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    fn to_listing(source: &SourceDescriptor, query: &ListingQuery, item: ParsedItem) -> Listing {
        let country = source.country.as_str();
        let brand = item
            .brand
            .or_else(|| detect_brand(&item.product_name).map(str::to_string));

        let mut listing = Listing::new(
            source.id.clone(),
            source.name.clone(),
            item.product_name,
            extract_price(&item.price_text),
            extract_currency(&item.price_text, country),
            item.url,
        );
        listing.is_official_source = is_official_match(source, &listing.product_name, brand.as_deref());
        listing.confidence_score = confidence_score(
            &query.product,
            &listing.product_name,
            listing.is_official_source,
            brand.as_deref(),
        );
        listing.availability = item
            .availability_text
            .as_deref()
            .map_or(Availability::Unknown, parse_availability);
        listing.brand = brand;
        listing.image_url = item.image_url;
        listing.sku = item.sku;
        listing
    }
}

#[async_trait]
impl ListingAdapter for HttpListingAdapter {
    async fn fetch(&self, source: &SourceDescriptor, query: &ListingQuery) -> Result<Vec<Listing>> {
        let url = build_search_url(source, &query.product);

        if let Some(wait_ms) = source.scraper.wait_ms {
            debug!(source_id = %source.id, wait_ms, "pacing request");
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }

        debug!(source_id = %source.id, url = %url, "requesting search page");
        let body = self.fetch_page(source, &url).await?;

        let items = ListingParser::new(source).parse(&body)?;

        let listings: Vec<Listing> = items
            .into_iter()
            .map(|item| Self::to_listing(source, query, item))
            // "Consultar precio" and similar parse to 0 and must not use up the cap
            .filter(|listing| listing.price > 0.0)
            .filter(|listing| !query.official_only || listing.is_official_source)
            .take(query.max_results)
            .collect();

        Ok(listings)
    }

    fn adapter_id(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::descriptor;
    use cotiza_sources::SourceType;

    #[test]
    fn test_to_listing_normalizes_fields() {
        let mut source = descriptor("mercadolibre-mx", "MX", SourceType::Marketplace);
        source.is_official = true;
        source.official_brands = vec!["DeWalt".to_string()];

        let item = ParsedItem {
            product_name: "Rotomartillo DeWalt DCD778 20V".to_string(),
            price_text: "$ 2,499.00".to_string(),
            url: "https://articulo.example.mx/MLM-1".to_string(),
            brand: None,
            image_url: None,
            availability_text: Some("Últimas unidades".to_string()),
            sku: Some("DCD778".to_string()),
        };

        let listing =
            HttpListingAdapter::to_listing(&source, &ListingQuery::new("rotomartillo dewalt", 10), item);
        assert!((listing.price - 2499.0).abs() < 1e-9);
        assert_eq!(listing.currency, "MXN");
        assert_eq!(listing.brand.as_deref(), Some("DeWalt"));
        assert!(listing.is_official_source);
        assert!((listing.confidence_score - 100.0).abs() < 1e-9);
        assert_eq!(listing.availability, Availability::Limited);
        assert!(!listing.synthetic);
    }

    #[test]
    fn test_invalid_custom_headers_are_skipped() {
        let mut source = descriptor("grainger-us", "US", SourceType::B2bSpecialized);
        source
            .scraper
            .headers
            .insert("X-Region".to_string(), "us-east".to_string());
        source
            .scraper
            .headers
            .insert("bad header".to_string(), "x".to_string());

        let headers = HttpListingAdapter::headers(&source);
        assert_eq!(headers.get("x-region").map(HeaderValue::as_bytes), Some(&b"us-east"[..]));
        assert_eq!(headers.len(), 2);
    }
}
