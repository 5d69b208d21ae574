//! Crawler-facing documents and per-product page metadata.

use std::fmt::Write as _;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::error::ApiError;
use crate::services::catalog::{self, Product, SitemapEntry};
use crate::state::AppState;

pub const META_DESCRIPTION_MAX_CHARS: usize = 160;

const DISALLOWED_PATHS: [&str; 4] = ["/api/", "/admin", "/cart", "/checkout"];
const STATIC_PAGES: [&str; 2] = ["/", "/products"];

/// Escape the five XML special characters.
#[must_use]
pub fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Collapse whitespace and cut to at most `max_chars` characters, ending in
/// an ellipsis when shortened.
#[must_use]
pub fn truncate_description(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut = collapsed.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}

#[must_use]
pub fn robots_body(public_base_url: &str) -> String {
    let mut out = String::from("User-agent: *\nAllow: /\n");
    for path in DISALLOWED_PATHS {
        let _ = writeln!(out, "Disallow: {path}");
    }
    let _ = write!(out, "\nSitemap: {public_base_url}/sitemap.xml\n");
    out
}

#[must_use]
pub fn sitemap_body(public_base_url: &str, products: &[SitemapEntry]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for page in STATIC_PAGES {
        let loc = xml_escape(&format!("{public_base_url}{page}"));
        let _ = writeln!(out, "  <url><loc>{loc}</loc></url>");
    }
    for entry in products {
        let loc = xml_escape(&format!("{public_base_url}/products/{}", entry.slug));
        let lastmod = xml_escape(&entry.lastmod);
        let _ = writeln!(out, "  <url><loc>{loc}</loc><lastmod>{lastmod}</lastmod></url>");
    }
    out.push_str("</urlset>\n");
    out
}

#[derive(Debug, Serialize)]
pub struct ProductMeta {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    pub image: Option<String>,
}

impl ProductMeta {
    #[must_use]
    pub fn for_product(product: &Product, public_base_url: &str) -> Self {
        let source = if product.description.trim().is_empty() {
            format!("{} in {}", product.name, product.category)
        } else {
            product.description.clone()
        };
        Self {
            title: product.name.clone(),
            description: truncate_description(&source, META_DESCRIPTION_MAX_CHARS),
            canonical_url: format!("{public_base_url}/products/{}", product.slug),
            image: product.primary_image().map(|img| img.url.clone()),
        }
    }
}

/// `GET /robots.txt`
pub async fn robots_txt(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], robots_body(&state.config.public_base_url))
}

/// `GET /sitemap.xml`
pub async fn sitemap_xml(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let entries = catalog::sitemap_entries(&state.pool).await?;
    Ok(([(CONTENT_TYPE, "application/xml; charset=utf-8")], sitemap_body(&state.config.public_base_url, &entries)))
}

/// `GET /api/products/{slug}/meta`
pub async fn product_meta(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<ProductMeta>, ApiError> {
    let product = catalog::get_by_slug(&state.pool, &slug).await?;
    Ok(Json(ProductMeta::for_product(&product, &state.config.public_base_url)))
}

#[cfg(test)]
#[path = "seo_test.rs"]
mod tests;
