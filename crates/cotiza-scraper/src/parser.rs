//! HTML result-page parsing driven by a source's selector profile.

use crate::error::{Result, ScrapeError};
use cotiza_sources::{Selectors, SourceDescriptor};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

const DEFAULT_LINK_SELECTOR: &str = "a[href]";

/// Raw fields of one result element, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    /// Product title
    pub product_name: String,
    /// Unparsed price text, currency symbol included
    pub price_text: String,
    /// Absolute product URL
    pub url: String,
    /// Brand text
    pub brand: Option<String>,
    /// Absolute image URL
    pub image_url: Option<String>,
    /// Stock text
    pub availability_text: Option<String>,
    /// Vendor SKU
    pub sku: Option<String>,
}

struct CompiledSelectors {
    item: Selector,
    product_name: Option<Selector>,
    price: Selector,
    link: Selector,
    brand: Option<Selector>,
    image: Option<Selector>,
    availability: Option<Selector>,
    sku: Option<Selector>,
}

/// Parser for one source's search result pages.
pub struct ListingParser<'a> {
    source: &'a SourceDescriptor,
    base: Option<Url>,
}

impl<'a> ListingParser<'a> {
    /// Create a parser for `source`; relative links resolve against its base URL.
    #[must_use]
    pub fn new(source: &'a SourceDescriptor) -> Self {
        Self {
            source,
            base: Url::parse(&source.base_url).ok(),
        }
    }

    /// Parse every result element of `html`.
    ///
    /// Elements missing a name, price or link are logged and skipped.
    ///
    /// # Errors
    /// Returns error if the profile has no item or price selector, or a
    /// configured selector does not parse.
    pub fn parse(&self, html: &str) -> Result<Vec<ParsedItem>> {
        let selectors = self.compile(&self.source.scraper.selectors)?;
        let document = Html::parse_document(html);

        let mut items = Vec::new();
        let mut skipped = 0_usize;

        for element in document.select(&selectors.item) {
            match self.parse_item(&selectors, element) {
                Ok(item) => items.push(item),
                Err(e) => {
                    skipped += 1;
                    warn!(source_id = %self.source.id, error = %e, "skipping result element");
                }
            }
        }

        debug!(
            source_id = %self.source.id,
            parsed = items.len(),
            skipped,
            "parsed result page"
        );

        Ok(items)
    }

    fn parse_item(&self, selectors: &CompiledSelectors, element: ElementRef<'_>) -> Result<ParsedItem> {
        let product_name = match &selectors.product_name {
            Some(selector) => select_text(element, selector),
            None => Some(element_text(element)).filter(|t| !t.is_empty()),
        }
        .ok_or_else(|| self.extraction("missing product name"))?;

        let price_text = select_text(element, &selectors.price)
            .ok_or_else(|| self.extraction("missing price"))?;

        let href = if element.value().name() == "a" {
            element.value().attr("href")
        } else {
            element
                .select(&selectors.link)
                .next()
                .and_then(|el| el.value().attr("href"))
        };
        let url = href
            .and_then(|h| self.resolve(h))
            .ok_or_else(|| self.extraction("missing product link"))?;

        let image_url = selectors.image.as_ref().and_then(|selector| {
            element
                .select(selector)
                .next()
                .and_then(|el| el.value().attr("src").or_else(|| el.value().attr("data-src")))
                .and_then(|src| self.resolve(src))
        });

        Ok(ParsedItem {
            product_name,
            price_text,
            url,
            brand: selectors.brand.as_ref().and_then(|s| select_text(element, s)),
            image_url,
            availability_text: selectors
                .availability
                .as_ref()
                .and_then(|s| select_text(element, s)),
            sku: selectors.sku.as_ref().and_then(|s| select_text(element, s)),
        })
    }

    fn compile(&self, selectors: &Selectors) -> Result<CompiledSelectors> {
        let required = |value: &Option<String>, field: &str| -> Result<Selector> {
            let text = value.as_deref().ok_or_else(|| ScrapeError::SourceUnavailable {
                source_id: self.source.id.clone(),
                reason: format!("no '{field}' selector configured"),
            })?;
            self.compile_one(text)
        };
        let optional = |value: &Option<String>| -> Result<Option<Selector>> {
            value.as_deref().map(|text| self.compile_one(text)).transpose()
        };

        Ok(CompiledSelectors {
            item: required(&selectors.item, "item")?,
            product_name: optional(&selectors.product_name)?,
            price: required(&selectors.price, "price")?,
            link: self.compile_one(selectors.link.as_deref().unwrap_or(DEFAULT_LINK_SELECTOR))?,
            brand: optional(&selectors.brand)?,
            image: optional(&selectors.image)?,
            availability: optional(&selectors.availability)?,
            sku: optional(&selectors.sku)?,
        })
    }

    fn compile_one(&self, text: &str) -> Result<Selector> {
        Selector::parse(text).map_err(|_| ScrapeError::InvalidSelector {
            source_id: self.source.id.clone(),
            selector: text.to_string(),
        })
    }

    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        match Url::parse(href) {
            Ok(url) => Some(url.to_string()),
            Err(_) => self
                .base
                .as_ref()
                .and_then(|base| base.join(href).ok())
                .map(|url| url.to_string()),
        }
    }

    fn extraction(&self, reason: &str) -> ScrapeError {
        ScrapeError::Extraction {
            source_id: self.source.id.clone(),
            reason: reason.to_string(),
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}
