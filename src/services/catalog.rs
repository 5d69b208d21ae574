//! Catalog service — products, per-size stock maps, listing and search.
//!
//! DESIGN
//! ======
//! A product's stock is a size → quantity map stored as rows in
//! `product_stock`. Readers always receive the whole map alongside the
//! product. Writers replace the map wholesale inside a transaction; per-order
//! decrements go through `services::inventory` instead.
//!
//! Products are never hard-deleted. Archiving flips `is_active` so order
//! history keeps valid references.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

pub const MAX_SIZE_LABEL_LEN: usize = 16;
pub const MAX_NAME_LEN: usize = 200;
pub const DEFAULT_PER_PAGE: i64 = 24;
pub const MAX_PER_PAGE: i64 = 60;

pub(crate) const PRODUCT_COLUMNS: &str = r#"id, slug, name, description, category, price, compare_at_price,
    images, is_active, featured,
    to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at"#;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("product not found: {0}")]
    NotFound(String),
    #[error("invalid size label: {0:?}")]
    InvalidSize(String),
    #[error("duplicate size label after normalization: {0}")]
    DuplicateSize(String),
    #[error("negative stock for size {0}")]
    NegativeStock(String),
    #[error("invalid product: {0}")]
    InvalidProduct(String),
    #[error("image index {0} out of range")]
    ImageNotFound(usize),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::error::ErrorCode for CatalogError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PRODUCT_NOT_FOUND",
            Self::InvalidSize(_) => "E_INVALID_SIZE",
            Self::DuplicateSize(_) => "E_DUPLICATE_SIZE",
            Self::NegativeStock(_) => "E_NEGATIVE_STOCK",
            Self::InvalidProduct(_) => "E_INVALID_PRODUCT",
            Self::ImageNotFound(_) => "E_IMAGE_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Image stored on the external host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    pub public_id: String,
}

/// Size label → quantity on hand.
pub type StockMap = BTreeMap<String, i32>;

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Price in minor units.
    pub price: i64,
    pub compare_at_price: Option<i64>,
    pub images: Vec<ProductImage>,
    pub is_active: bool,
    pub featured: bool,
    pub stock: StockMap,
    pub in_stock: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Product {
    /// Quantity on hand for a size, 0 when the size is unknown.
    #[must_use]
    pub fn available(&self, size: &str) -> i32 {
        self.stock.get(size).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn primary_image(&self) -> Option<&ProductImage> {
        self.images.first()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl SortOrder {
    fn order_clause(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY created_at DESC, id ASC",
            Self::PriceAsc => " ORDER BY price ASC, created_at DESC, id ASC",
            Self::PriceDesc => " ORDER BY price DESC, created_at DESC, id ASC",
            Self::Name => " ORDER BY lower(name) ASC, id ASC",
        }
    }
}

/// Query-string filters for product listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub sort: SortOrder,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ListQuery {
    #[must_use]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    fn search_term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    fn category_filter(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: i64,
    pub compare_at_price: Option<i64>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub stock: StockMap,
}

/// Partial update. `compare_at_price: null` clears the field; omission keeps it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub compare_at_price: Option<Option<i64>>,
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LowStockEntry {
    pub product_id: Uuid,
    pub slug: String,
    pub name: String,
    pub size: String,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub slug: String,
    pub lastmod: String,
}

// =============================================================================
// PURE HELPERS
// =============================================================================

/// Lowercase ASCII alphanumerics with single `-` separators.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() { "product".to_owned() } else { slug }
}

/// First of `base`, `base-2`, `base-3`, ... not present in `taken`.
#[must_use]
pub fn next_available_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_owned();
    }
    (2_u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{base}-{}", Uuid::new_v4().simple()))
}

/// Trim and uppercase a size label.
///
/// # Errors
///
/// Returns `InvalidSize` for empty or overlong labels.
pub fn normalize_size(label: &str) -> Result<String, CatalogError> {
    let normalized = label.trim().to_uppercase();
    if normalized.is_empty() || normalized.chars().count() > MAX_SIZE_LABEL_LEN {
        return Err(CatalogError::InvalidSize(label.to_owned()));
    }
    Ok(normalized)
}

/// Normalize every label and reject negatives or collisions.
///
/// # Errors
///
/// Returns the first invalid label, collision, or negative quantity.
pub fn validate_stock_map(map: &StockMap) -> Result<StockMap, CatalogError> {
    let mut out = StockMap::new();
    for (label, qty) in map {
        let size = normalize_size(label)?;
        if *qty < 0 {
            return Err(CatalogError::NegativeStock(size));
        }
        if out.insert(size.clone(), *qty).is_some() {
            return Err(CatalogError::DuplicateSize(size));
        }
    }
    Ok(out)
}

/// `%term%` with LIKE metacharacters escaped.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn validate_fields(name: &str, category: &str, price: i64, compare_at_price: Option<i64>) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::InvalidProduct("name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CatalogError::InvalidProduct(format!("name exceeds {MAX_NAME_LEN} characters")));
    }
    if category.trim().is_empty() {
        return Err(CatalogError::InvalidProduct("category is required".into()));
    }
    if price < 0 {
        return Err(CatalogError::InvalidProduct("price must not be negative".into()));
    }
    if let Some(compare) = compare_at_price {
        if compare < price {
            return Err(CatalogError::InvalidProduct("compare_at_price must not be below price".into()));
        }
    }
    Ok(())
}

// =============================================================================
// ROW MAPPING
// =============================================================================

fn product_from_row(row: &sqlx::postgres::PgRow, stock: StockMap) -> Product {
    let Json(images): Json<Vec<ProductImage>> = row.get("images");
    let in_stock = stock.values().any(|q| *q > 0);
    Product {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        description: row.get("description"),
        category: row.get("category"),
        price: row.get("price"),
        compare_at_price: row.get("compare_at_price"),
        images,
        is_active: row.get("is_active"),
        featured: row.get("featured"),
        stock,
        in_stock,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn load_stock_maps<'e, E>(executor: E, ids: &[Uuid]) -> Result<HashMap<Uuid, StockMap>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, (Uuid, String, i32)>(
        "SELECT product_id, size, quantity FROM product_stock WHERE product_id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(executor)
    .await?;

    let mut out: HashMap<Uuid, StockMap> = HashMap::new();
    for (product_id, size, quantity) in rows {
        out.entry(product_id).or_default().insert(size, quantity);
    }
    Ok(out)
}

async fn hydrate(pool: &PgPool, rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Product>, sqlx::Error> {
    let ids = rows.iter().map(|r| r.get::<Uuid, _>("id")).collect::<Vec<_>>();
    let mut stock = load_stock_maps(pool, &ids).await?;
    Ok(rows
        .iter()
        .map(|row| {
            let id: Uuid = row.get("id");
            product_from_row(row, stock.remove(&id).unwrap_or_default())
        })
        .collect())
}

// =============================================================================
// READS
// =============================================================================

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ListQuery, include_inactive: bool) {
    builder.push(" WHERE TRUE");
    if !include_inactive {
        builder.push(" AND is_active");
    }
    if let Some(category) = query.category_filter() {
        builder.push(" AND lower(category) = lower(");
        builder.push_bind(category.to_owned());
        builder.push(")");
    }
    if let Some(term) = query.search_term() {
        let pattern = like_pattern(term);
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(min) = query.min_price {
        builder.push(" AND price >= ");
        builder.push_bind(min);
    }
    if let Some(max) = query.max_price {
        builder.push(" AND price <= ");
        builder.push_bind(max);
    }
    if let Some(featured) = query.featured {
        builder.push(" AND featured = ");
        builder.push_bind(featured);
    }
}

/// List products matching `query`. Storefront callers pass
/// `include_inactive = false`; the admin panel sees archived products too.
///
/// # Errors
///
/// Returns a database error if either query fails.
pub async fn list_products(pool: &PgPool, query: &ListQuery, include_inactive: bool) -> Result<Page<Product>, CatalogError> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products");
    push_filters(&mut count, query, include_inactive);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
    push_filters(&mut select, query, include_inactive);
    select.push(query.sort.order_clause());
    select.push(" LIMIT ");
    select.push_bind(query.per_page());
    select.push(" OFFSET ");
    select.push_bind(query.offset());
    let rows = select.build().fetch_all(pool).await?;

    Ok(Page { items: hydrate(pool, rows).await?, page: query.page(), per_page: query.per_page(), total })
}

/// Fetch an active product by slug.
///
/// # Errors
///
/// Returns `NotFound` if no active product has the slug.
pub async fn get_by_slug(pool: &PgPool, slug: &str) -> Result<Product, CatalogError> {
    let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1 AND is_active"))
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(slug.to_owned()))?;
    hydrate(pool, vec![row])
        .await?
        .pop()
        .ok_or_else(|| CatalogError::NotFound(slug.to_owned()))
}

/// Fetch any product (including archived) by id.
///
/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn get_by_id(pool: &PgPool, product_id: Uuid) -> Result<Product, CatalogError> {
    let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
        .bind(product_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))?;
    hydrate(pool, vec![row])
        .await?
        .pop()
        .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))
}

/// Active product counts per category, alphabetically.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryCount>, CatalogError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT category, COUNT(*) FROM products WHERE is_active GROUP BY category ORDER BY category",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect())
}

/// Sizes of active products at or below `threshold`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn low_stock(pool: &PgPool, threshold: i32) -> Result<Vec<LowStockEntry>, CatalogError> {
    let rows = sqlx::query(
        r"SELECT p.id, p.slug, p.name, s.size, s.quantity
          FROM product_stock s
          JOIN products p ON p.id = s.product_id
          WHERE p.is_active AND s.quantity <= $1
          ORDER BY s.quantity ASC, p.name ASC, s.size ASC",
    )
    .bind(threshold)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|r| LowStockEntry {
            product_id: r.get("id"),
            slug: r.get("slug"),
            name: r.get("name"),
            size: r.get("size"),
            quantity: r.get("quantity"),
        })
        .collect())
}

/// Slugs and last-modified dates of every active product.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn sitemap_entries(pool: &PgPool) -> Result<Vec<SitemapEntry>, CatalogError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r"SELECT slug, to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD')
          FROM products WHERE is_active ORDER BY updated_at DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(slug, lastmod)| SitemapEntry { slug, lastmod })
        .collect())
}

// =============================================================================
// WRITES
// =============================================================================

async fn unique_slug(pool: &PgPool, base: &str, exclude: Option<Uuid>) -> Result<String, sqlx::Error> {
    let taken = sqlx::query_scalar::<_, String>(
        "SELECT slug FROM products WHERE (slug = $1 OR slug LIKE $2) AND ($3::uuid IS NULL OR id <> $3)",
    )
    .bind(base)
    .bind(format!("{}-%", base.replace('_', "\\_").replace('%', "\\%")))
    .bind(exclude)
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect::<HashSet<_>>();
    Ok(next_available_slug(base, &taken))
}

async fn replace_stock(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    product_id: Uuid,
    stock: &StockMap,
) -> Result<(), sqlx::Error> {
    let sizes = stock.keys().cloned().collect::<Vec<_>>();
    sqlx::query("DELETE FROM product_stock WHERE product_id = $1 AND NOT (size = ANY($2))")
        .bind(product_id)
        .bind(&sizes)
        .execute(tx.as_mut())
        .await?;
    for (size, quantity) in stock {
        sqlx::query(
            r"INSERT INTO product_stock (product_id, size, quantity) VALUES ($1, $2, $3)
              ON CONFLICT (product_id, size) DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(product_id)
        .bind(size)
        .bind(quantity)
        .execute(tx.as_mut())
        .await?;
    }
    Ok(())
}

/// Create a product and its initial stock map.
///
/// # Errors
///
/// Returns a validation error or a database error.
pub async fn create_product(pool: &PgPool, input: &NewProduct) -> Result<Product, CatalogError> {
    validate_fields(&input.name, &input.category, input.price, input.compare_at_price)?;
    let stock = validate_stock_map(&input.stock)?;
    let base = slugify(input.slug.as_deref().unwrap_or(&input.name));
    let slug = unique_slug(pool, &base, None).await?;

    let id = Uuid::new_v4();
    let mut tx = pool.begin().await?;
    sqlx::query(
        r"INSERT INTO products (id, slug, name, description, category, price, compare_at_price, featured)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(id)
    .bind(&slug)
    .bind(input.name.trim())
    .bind(input.description.trim())
    .bind(input.category.trim())
    .bind(input.price)
    .bind(input.compare_at_price)
    .bind(input.featured)
    .execute(tx.as_mut())
    .await?;
    replace_stock(&mut tx, id, &stock).await?;
    tx.commit().await?;

    tracing::info!(product_id = %id, %slug, "product created");
    get_by_id(pool, id).await
}

/// Apply a partial update.
///
/// # Errors
///
/// Returns `NotFound`, a validation error, or a database error.
pub async fn update_product(pool: &PgPool, product_id: Uuid, patch: &ProductPatch) -> Result<Product, CatalogError> {
    let current = get_by_id(pool, product_id).await?;

    let name = patch.name.as_deref().map_or(current.name.as_str(), str::trim);
    let category = patch.category.as_deref().map_or(current.category.as_str(), str::trim);
    let description = patch
        .description
        .as_deref()
        .map_or(current.description.as_str(), str::trim);
    let price = patch.price.unwrap_or(current.price);
    let compare_at_price = patch.compare_at_price.unwrap_or(current.compare_at_price);
    validate_fields(name, category, price, compare_at_price)?;

    let slug = match patch.slug.as_deref() {
        Some(raw) => unique_slug(pool, &slugify(raw), Some(product_id)).await?,
        None => current.slug.clone(),
    };

    sqlx::query(
        r"UPDATE products
          SET slug = $2, name = $3, description = $4, category = $5, price = $6,
              compare_at_price = $7, is_active = $8, featured = $9, updated_at = now()
          WHERE id = $1",
    )
    .bind(product_id)
    .bind(&slug)
    .bind(name)
    .bind(description)
    .bind(category)
    .bind(price)
    .bind(compare_at_price)
    .bind(patch.is_active.unwrap_or(current.is_active))
    .bind(patch.featured.unwrap_or(current.featured))
    .execute(pool)
    .await?;

    get_by_id(pool, product_id).await
}

/// Soft-delete a product.
///
/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn archive_product(pool: &PgPool, product_id: Uuid) -> Result<(), CatalogError> {
    let result = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(product_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CatalogError::NotFound(product_id.to_string()));
    }
    tracing::info!(product_id = %product_id, "product archived");
    Ok(())
}

/// Replace a product's entire stock map. Sizes missing from `stock` are removed.
///
/// # Errors
///
/// Returns `NotFound`, a validation error, or a database error.
pub async fn set_stock(pool: &PgPool, product_id: Uuid, stock: &StockMap) -> Result<StockMap, CatalogError> {
    let stock = validate_stock_map(stock)?;
    let mut tx = pool.begin().await?;
    let exists = sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(tx.as_mut())
        .await?;
    if exists.is_none() {
        return Err(CatalogError::NotFound(product_id.to_string()));
    }
    replace_stock(&mut tx, product_id, &stock).await?;
    sqlx::query("UPDATE products SET updated_at = now() WHERE id = $1")
        .bind(product_id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    tracing::info!(product_id = %product_id, sizes = stock.len(), "stock map replaced");
    Ok(stock)
}

/// Append an uploaded image to the product gallery.
///
/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn add_image(pool: &PgPool, product_id: Uuid, image: ProductImage) -> Result<Vec<ProductImage>, CatalogError> {
    let row = sqlx::query(
        r"UPDATE products SET images = images || $2::jsonb, updated_at = now()
          WHERE id = $1
          RETURNING images",
    )
    .bind(product_id)
    .bind(Json(vec![image]))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))?;
    let Json(images): Json<Vec<ProductImage>> = row.get("images");
    Ok(images)
}

/// Remove the image at `index`, returning it so the caller can delete it
/// from the host.
///
/// # Errors
///
/// Returns `NotFound` or `ImageNotFound`.
pub async fn remove_image(pool: &PgPool, product_id: Uuid, index: usize) -> Result<ProductImage, CatalogError> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query("SELECT images FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))?;
    let Json(mut images): Json<Vec<ProductImage>> = row.get("images");
    if index >= images.len() {
        return Err(CatalogError::ImageNotFound(index));
    }
    let removed = images.remove(index);
    sqlx::query("UPDATE products SET images = $2, updated_at = now() WHERE id = $1")
        .bind(product_id)
        .bind(Json(&images))
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;
    Ok(removed)
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
