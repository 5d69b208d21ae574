use super::*;
use crate::routes::test_helpers::{body_text, get, send};
use crate::services::catalog::{ProductImage, StockMap};
use crate::state::test_helpers::test_app_state;
use axum::http::StatusCode;

const BASE: &str = "https://shop.example.com";

fn product(description: &str) -> Product {
    Product {
        id: uuid::Uuid::nil(),
        slug: "linen-shirt".into(),
        name: "Linen Shirt".into(),
        description: description.into(),
        category: "Shirts".into(),
        price: 249_900,
        compare_at_price: None,
        images: vec![ProductImage { url: "https://cdn.example.com/a.webp".into(), public_id: "p/a".into() }],
        is_active: true,
        featured: false,
        stock: StockMap::new(),
        in_stock: false,
        created_at: "2026-01-01T00:00:00Z".into(),
        updated_at: "2026-01-02T00:00:00Z".into(),
    }
}

// =============================================================================
// xml_escape / truncate_description
// =============================================================================

#[test]
fn xml_escape_handles_all_specials() {
    assert_eq!(xml_escape(r#"a&b<c>"d"'e"#), "a&amp;b&lt;c&gt;&quot;d&quot;&apos;e");
    assert_eq!(xml_escape("plain"), "plain");
}

#[test]
fn short_description_is_kept() {
    assert_eq!(truncate_description("  Soft   linen\nshirt ", 160), "Soft linen shirt");
}

#[test]
fn long_description_is_cut_to_limit() {
    let text = "word ".repeat(100);
    let out = truncate_description(&text, 160);
    assert!(out.chars().count() <= 160);
    assert!(out.ends_with('…'));
    assert!(!out.contains("  "));
}

#[test]
fn truncation_respects_multibyte_chars() {
    let text = "é".repeat(200);
    let out = truncate_description(&text, 160);
    assert_eq!(out.chars().count(), 160);
    assert!(out.starts_with("éé"));
}

#[test]
fn exact_limit_is_not_cut() {
    let text = "x".repeat(160);
    assert_eq!(truncate_description(&text, 160), text);
}

// =============================================================================
// documents
// =============================================================================

#[test]
fn robots_blocks_private_paths_and_links_sitemap() {
    let body = robots_body(BASE);
    for path in ["/api/", "/admin", "/cart", "/checkout"] {
        assert!(body.contains(&format!("Disallow: {path}\n")), "{path}");
    }
    assert!(body.contains("Sitemap: https://shop.example.com/sitemap.xml"));
    assert!(body.starts_with("User-agent: *"));
}

#[test]
fn sitemap_lists_static_pages_and_products() {
    let entries = vec![
        SitemapEntry { slug: "linen-shirt".into(), lastmod: "2026-01-02".into() },
        SitemapEntry { slug: "a&b".into(), lastmod: "2026-01-03".into() },
    ];
    let xml = sitemap_body(BASE, &entries);
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<loc>https://shop.example.com/</loc>"));
    assert!(xml.contains("<loc>https://shop.example.com/products</loc>"));
    assert!(xml.contains(
        "<loc>https://shop.example.com/products/linen-shirt</loc><lastmod>2026-01-02</lastmod>"
    ));
    assert!(xml.contains("/products/a&amp;b</loc>"));
    assert!(xml.trim_end().ends_with("</urlset>"));
}

#[test]
fn meta_uses_description_and_primary_image() {
    let meta = ProductMeta::for_product(&product("Breathable linen."), BASE);
    assert_eq!(meta.title, "Linen Shirt");
    assert_eq!(meta.description, "Breathable linen.");
    assert_eq!(meta.canonical_url, "https://shop.example.com/products/linen-shirt");
    assert_eq!(meta.image.as_deref(), Some("https://cdn.example.com/a.webp"));
}

#[test]
fn meta_falls_back_when_description_blank() {
    let mut p = product("   ");
    p.images.clear();
    let meta = ProductMeta::for_product(&p, BASE);
    assert_eq!(meta.description, "Linen Shirt in Shirts");
    assert!(meta.image.is_none());
}

#[tokio::test]
async fn robots_route_serves_plain_text() {
    let resp = send(test_app_state(), get("/robots.txt")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/plain"))
    );
    assert!(body_text(resp).await.contains("Disallow: /api/"));
}
