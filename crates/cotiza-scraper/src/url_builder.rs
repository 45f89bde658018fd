//! Search URL construction.
//!
//! Templates use `{base}` for the descriptor's base URL (without trailing
//! slash) and `{q}` for the percent-encoded product query. Resolution order:
//! the descriptor's own `scraper.search_template`, the id table, the type
//! table, then `{base}/search?q={q}`.

use cotiza_sources::{SourceDescriptor, SourceType};

const DEFAULT_TEMPLATE: &str = "{base}/search?q={q}";

const ID_TEMPLATES: &[(&str, &str)] = &[
    ("mercadolibre-pe", "{base}/{q}"),
    ("mercadolibre-mx", "{base}/{q}"),
    ("mercadolibre-ar", "{base}/{q}"),
    ("mercadolibre-cl", "{base}/{q}"),
    ("amazon-business-us", "{base}/s?k={q}&ref=nb_sb_noss"),
    ("amazon-business-de", "{base}/s?k={q}&ref=nb_sb_noss"),
    ("grainger-us", "{base}/search?searchQuery={q}"),
    ("grainger-mx", "{base}/buscar?q={q}"),
    ("rs-components-uk", "{base}/search?searchTerm={q}"),
    ("rs-components-de", "{base}/search?searchTerm={q}"),
    ("wurth-de", "{base}/search?query={q}"),
    ("fastenal-us", "{base}/products?term={q}"),
    ("mcmaster-carr-us", "{base}/search/results.html?Ntt={q}"),
    ("conrad-de", "{base}/de/search.html?search={q}"),
    ("farnell-uk", "{base}/search?st={q}"),
    ("misumi-us", "{base}/vona2/result/?Keyword={q}"),
    ("misumi-jp", "{base}/vona2/result/?Keyword={q}"),
    ("rexel-fr", "{base}/recherche?q={q}"),
    ("hoffmann-group-de", "{base}/search?query={q}"),
];

fn type_template(source_type: SourceType) -> Option<&'static str> {
    match source_type {
        SourceType::Distributor => Some("{base}/search?query={q}"),
        SourceType::BrandDirect => Some("{base}/search?text={q}"),
        SourceType::Marketplace | SourceType::B2bSpecialized | SourceType::RetailSpecialized => {
            None
        }
    }
}

/// Template that applies to `source`.
#[must_use]
pub fn search_template(source: &SourceDescriptor) -> &str {
    if let Some(template) = source.scraper.search_template.as_deref() {
        return template;
    }

    ID_TEMPLATES
        .iter()
        .find(|(id, _)| *id == source.id.as_str())
        .map(|(_, template)| *template)
        .or_else(|| type_template(source.source_type))
        .unwrap_or(DEFAULT_TEMPLATE)
}

/// Build the search URL for `product` on `source`.
#[must_use]
pub fn build_search_url(source: &SourceDescriptor, product: &str) -> String {
    let base = source.base_url.trim_end_matches('/');
    let query = urlencoding::encode(product.trim());

    search_template(source)
        .replace("{base}", base)
        .replace("{q}", &query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::descriptor;

    #[test]
    fn test_build_url_from_id_table() {
        let source = descriptor("mercadolibre-pe", "PE", SourceType::Marketplace);
        assert_eq!(
            build_search_url(&source, "taladro bosch"),
            "https://mercadolibre-pe.example.com/taladro%20bosch"
        );

        let source = descriptor("amazon-business-us", "US", SourceType::Marketplace);
        assert_eq!(
            build_search_url(&source, "multimeter"),
            "https://amazon-business-us.example.com/s?k=multimeter&ref=nb_sb_noss"
        );

        let source = descriptor("grainger-us", "US", SourceType::B2bSpecialized);
        assert_eq!(
            build_search_url(&source, "nivel"),
            "https://grainger-us.example.com/search?searchQuery=nivel"
        );
    }

    #[test]
    fn test_build_url_from_type_table() {
        let source = descriptor("some-distributor-us", "US", SourceType::Distributor);
        assert_eq!(
            build_search_url(&source, "perno"),
            "https://some-distributor-us.example.com/search?query=perno"
        );

        let source = descriptor("makita-store-pe", "PE", SourceType::BrandDirect);
        assert!(build_search_url(&source, "rotomartillo").ends_with("/search?text=rotomartillo"));
    }

    #[test]
    fn test_build_url_default_and_encoding() {
        let mut source = descriptor("unknown-shop-pe", "PE", SourceType::Marketplace);
        source.base_url = "https://shop.example.pe/".to_string();
        assert_eq!(
            build_search_url(&source, "llave 3/4\" & dado"),
            "https://shop.example.pe/search?q=llave%203%2F4%22%20%26%20dado"
        );
    }

    #[test]
    fn test_descriptor_template_overrides_tables() {
        let mut source = descriptor("mercadolibre-pe", "PE", SourceType::Marketplace);
        source.scraper.search_template = Some("{base}/listado?busqueda={q}".to_string());
        assert_eq!(
            build_search_url(&source, "casco"),
            "https://mercadolibre-pe.example.com/listado?busqueda=casco"
        );
    }
}
