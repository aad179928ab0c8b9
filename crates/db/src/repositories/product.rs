use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use uuid::Uuid;

use offerdesk_core::domain::product::{Product, ProductId, ProductSuggestion};
use offerdesk_core::domain::user::UserId;
use offerdesk_core::errors::StoreError;
use offerdesk_core::ports::ProductCatalog;

use super::codec::{format_timestamp, parse_optional_decimal, parse_timestamp};
use super::{RepositoryError, SqlPricingStore};

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.unit, p.created_at, p.last_used";

impl SqlPricingStore {
    async fn load_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ?"))
            .bind(&id.0)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn load_product_by_identity(
        &self,
        name: &str,
        unit: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let (name_key, unit_key) = Product::identity_key(name, unit);
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.name_key = ? AND p.unit_key = ?"
        ))
        .bind(name_key)
        .bind(unit_key)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn store_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let (name_key, unit_key) = Product::identity_key(&product.name, &product.unit);
        sqlx::query(
            "INSERT INTO products (id, name, unit, name_key, unit_key, created_at, last_used)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                unit = excluded.unit,
                name_key = excluded.name_key,
                unit_key = excluded.unit_key,
                last_used = excluded.last_used",
        )
        .bind(&product.id.0)
        .bind(product.name.trim())
        .bind(product.unit.trim())
        .bind(name_key)
        .bind(unit_key)
        .bind(format_timestamp(product.created_at))
        .bind(format_timestamp(product.last_used))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn load_suggestions(
        &self,
        user: &UserId,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ProductSuggestion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS},
                (SELECT pp.price FROM product_prices pp
                 WHERE pp.product_id = p.id AND pp.user_id = ?
                 ORDER BY pp.recorded_at DESC, pp.id DESC
                 LIMIT 1) AS last_price
             FROM products p
             WHERE instr(p.name_key, ?) > 0
             ORDER BY p.last_used DESC, p.name ASC
             LIMIT ?"
        ))
        .bind(&user.0)
        .bind(query.trim().to_lowercase())
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<ProductSuggestion, RepositoryError> {
                Ok(ProductSuggestion {
                    product: product_from_row(row)?,
                    last_price: parse_optional_decimal("last_price", row.try_get("last_price")?)?,
                })
            })
            .collect()
    }
}

/// Resolve the product for a quote line inside an open transaction, creating
/// it when no (name, unit) match exists and refreshing `last_used` otherwise.
pub(crate) async fn find_or_create_product(
    conn: &mut SqliteConnection,
    name: &str,
    unit: &str,
    now: DateTime<Utc>,
) -> Result<ProductId, RepositoryError> {
    let (name_key, unit_key) = Product::identity_key(name, unit);
    let existing: Option<String> =
        sqlx::query_scalar("SELECT id FROM products WHERE name_key = ? AND unit_key = ?")
            .bind(&name_key)
            .bind(&unit_key)
            .fetch_optional(&mut *conn)
            .await?;

    let timestamp = format_timestamp(now);
    if let Some(id) = existing {
        sqlx::query("UPDATE products SET last_used = ? WHERE id = ?")
            .bind(&timestamp)
            .bind(&id)
            .execute(&mut *conn)
            .await?;
        return Ok(ProductId(id));
    }

    let id = format!("P-{}", Uuid::new_v4().simple());
    sqlx::query(
        "INSERT INTO products (id, name, unit, name_key, unit_key, created_at, last_used)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name.trim())
    .bind(unit.trim())
    .bind(name_key)
    .bind(unit_key)
    .bind(&timestamp)
    .bind(&timestamp)
    .execute(&mut *conn)
    .await?;

    Ok(ProductId(id))
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        unit: row.try_get("unit")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        last_used: parse_timestamp("last_used", row.try_get("last_used")?)?,
    })
}

#[async_trait]
impl ProductCatalog for SqlPricingStore {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.load_product(id).await?)
    }

    async fn find_product_by_identity(
        &self,
        name: &str,
        unit: &str,
    ) -> Result<Option<Product>, StoreError> {
        Ok(self.load_product_by_identity(name, unit).await?)
    }

    async fn save_product(&self, product: Product) -> Result<(), StoreError> {
        Ok(self.store_product(&product).await?)
    }

    async fn search_products(
        &self,
        user: &UserId,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ProductSuggestion>, StoreError> {
        Ok(self.load_suggestions(user, query, limit).await?)
    }
}
