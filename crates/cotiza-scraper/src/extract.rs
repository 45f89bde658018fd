//! Text extraction helpers shared by the live and synthetic adapters.

use crate::listing::{clamp_confidence, Availability};
use cotiza_sources::SourceDescriptor;

/// Brands the adapters recognize in free text.
pub const KNOWN_BRANDS: [&str; 8] = [
    "Stanley",
    "Bosch",
    "Makita",
    "DeWalt",
    "Milwaukee",
    "3M",
    "Fluke",
    "Klein Tools",
];

/// Country code to local currency.
const COUNTRY_CURRENCIES: &[(&str, &str)] = &[
    ("PE", "PEN"),
    ("US", "USD"),
    ("MX", "MXN"),
    ("AR", "ARS"),
    ("CL", "CLP"),
    ("BR", "BRL"),
    ("CO", "COP"),
    ("DE", "EUR"),
    ("ES", "EUR"),
    ("FR", "EUR"),
    ("UK", "GBP"),
];

/// Countries whose local currency is written with `$`.
const DOLLAR_COUNTRIES: &[&str] = &["US", "MX", "AR", "CL", "CO"];

/// Parse a price out of display text.
///
/// Everything except digits, `.` and `,` is dropped. A comma is the decimal
/// separator only when the text has no `.`; otherwise commas are thousands
/// separators. Unparseable text yields 0.
#[must_use]
pub fn extract_price(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let normalized = if cleaned.contains('.') {
        cleaned.replace(',', "")
    } else if cleaned.matches(',').count() == 1 {
        cleaned.replace(',', ".")
    } else {
        cleaned.replace(',', "")
    };

    match normalized.parse::<f64>() {
        Ok(price) if price.is_finite() => price,
        _ => 0.0,
    }
}

/// Local currency of a country, `USD` when unknown.
#[must_use]
pub fn currency_for_country(country: &str) -> &'static str {
    COUNTRY_CURRENCIES
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(country))
        .map_or("USD", |(_, currency)| currency)
}

/// Infer the currency of a price text shown by a source in `country`.
#[must_use]
pub fn extract_currency(text: &str, country: &str) -> String {
    let country = country.trim().to_ascii_uppercase();

    let currency = if text.contains("S/") {
        "PEN"
    } else if text.contains("R$") {
        "BRL"
    } else if text.contains('$') {
        if DOLLAR_COUNTRIES.contains(&country.as_str()) {
            currency_for_country(&country)
        } else {
            "USD"
        }
    } else if text.contains('€') {
        "EUR"
    } else if text.contains('£') {
        "GBP"
    } else {
        currency_for_country(&country)
    };

    currency.to_string()
}

/// Whether a listing counts as official: the source is official and one of
/// its official brands appears in the product name or brand text.
#[must_use]
pub fn is_official_match(source: &SourceDescriptor, product_name: &str, brand: Option<&str>) -> bool {
    if !source.is_official {
        return false;
    }

    let name = product_name.to_lowercase();
    let brand = brand.unwrap_or_default().to_lowercase();

    source
        .official_brands
        .iter()
        .map(|b| b.trim().to_lowercase())
        .filter(|b| !b.is_empty())
        .any(|b| name.contains(&b) || brand.contains(&b))
}

/// Query words that take part in matching (longer than two characters).
#[must_use]
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Heuristic match confidence on a 0-100 scale.
///
/// `ratio * 70 + 20 (official) + 10 (brand known)`, where `ratio` is the
/// share of query terms found in the product name.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn confidence_score(
    query: &str,
    product_name: &str,
    is_official: bool,
    brand: Option<&str>,
) -> f64 {
    let terms = query_terms(query);
    let name = product_name.to_lowercase();

    let ratio = if terms.is_empty() {
        0.0
    } else {
        terms.iter().filter(|t| name.contains(t.as_str())).count() as f64 / terms.len() as f64
    };

    let mut score = ratio * 70.0;
    if is_official {
        score += 20.0;
    }
    if brand.is_some_and(|b| !b.trim().is_empty()) {
        score += 10.0;
    }

    clamp_confidence(score)
}

/// Map free stock text ("agotado", "in stock", "últimas unidades") to an
/// [`Availability`].
#[must_use]
pub fn parse_availability(text: &str) -> Availability {
    let text = text.trim().to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if text.is_empty() {
        Availability::Unknown
    } else if has(&[
        "agotado",
        "sin stock",
        "no disponible",
        "out of stock",
        "unavailable",
        "nicht verfügbar",
    ]) {
        Availability::OutOfStock
    } else if has(&[
        "últimas",
        "ultimas",
        "última unidad",
        "pocas unidades",
        "limited",
        "few left",
        "only ",
    ]) {
        Availability::Limited
    } else if has(&[
        "disponible",
        "en stock",
        "in stock",
        "available",
        "auf lager",
        "lieferbar",
    ]) {
        Availability::InStock
    } else {
        Availability::Unknown
    }
}

/// First known brand mentioned in `text` (case-insensitive).
#[must_use]
pub fn detect_brand(text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    KNOWN_BRANDS
        .iter()
        .copied()
        .find(|b| text.contains(&b.to_lowercase()))
}

/// URL slug: lowercase ASCII alphanumerics joined by `-`, at most 50 chars.
#[must_use]
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let words: Vec<String> = lowered
        .split_whitespace()
        .map(|w| w.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();

    let mut slug = words.join("-");
    slug.truncate(50);
    slug.trim_end_matches('-').to_string()
}

/// Round to two decimals.
#[must_use]
pub fn round_price(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
