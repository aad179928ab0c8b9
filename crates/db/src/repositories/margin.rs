use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use offerdesk_core::domain::product::{PriceHistoryEntry, ProductId, ProductMargin};
use offerdesk_core::domain::user::UserId;
use offerdesk_core::errors::StoreError;
use offerdesk_core::ports::MarginStore;

use super::codec::{format_timestamp, parse_decimal, parse_optional_decimal, parse_timestamp};
use super::{RepositoryError, SqlPricingStore};

impl SqlPricingStore {
    async fn load_margin(
        &self,
        product_id: &ProductId,
        user: &UserId,
    ) -> Result<Option<ProductMargin>, RepositoryError> {
        let row = sqlx::query(
            "SELECT product_id, user_id, cost_price, margin_percent, min_margin_percent,
                    max_discount_percent, updated_at
             FROM product_margins
             WHERE product_id = ? AND user_id = ?",
        )
        .bind(&product_id.0)
        .bind(&user.0)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(margin_from_row).transpose()
    }

    async fn write_margin(
        &self,
        margin: &ProductMargin,
        history: &PriceHistoryEntry,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO product_margins (
                product_id, user_id, cost_price, margin_percent, min_margin_percent,
                max_discount_percent, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(product_id, user_id) DO UPDATE SET
                cost_price = excluded.cost_price,
                margin_percent = excluded.margin_percent,
                min_margin_percent = excluded.min_margin_percent,
                max_discount_percent = excluded.max_discount_percent,
                updated_at = excluded.updated_at",
        )
        .bind(&margin.product_id.0)
        .bind(&margin.user_id.0)
        .bind(margin.cost_price.to_string())
        .bind(margin.margin_percent.to_string())
        .bind(margin.min_margin_percent.to_string())
        .bind(margin.max_discount_percent.to_string())
        .bind(format_timestamp(margin.updated_at))
        .execute(&mut *tx)
        .await?;

        append_price_history(&mut tx, history).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_price_history(
        &self,
        product_id: &ProductId,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id, user_id, price, cost_price, margin_percent, source, recorded_at
             FROM product_prices
             WHERE product_id = ? AND user_id = ?
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?",
        )
        .bind(&product_id.0)
        .bind(&user.0)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(history_from_row).collect()
    }
}

pub(crate) async fn append_price_history(
    conn: &mut SqliteConnection,
    entry: &PriceHistoryEntry,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO product_prices (
            product_id, user_id, price, cost_price, margin_percent, source, recorded_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.product_id.0)
    .bind(&entry.user_id.0)
    .bind(entry.price.to_string())
    .bind(entry.cost_price.map(|value| value.to_string()))
    .bind(entry.margin_percent.map(|value| value.to_string()))
    .bind(entry.source.as_str())
    .bind(format_timestamp(entry.recorded_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn margin_from_row(row: &SqliteRow) -> Result<ProductMargin, RepositoryError> {
    Ok(ProductMargin {
        product_id: ProductId(row.try_get("product_id")?),
        user_id: UserId(row.try_get("user_id")?),
        cost_price: parse_decimal("cost_price", row.try_get("cost_price")?)?,
        margin_percent: parse_decimal("margin_percent", row.try_get("margin_percent")?)?,
        min_margin_percent: parse_decimal("min_margin_percent", row.try_get("min_margin_percent")?)?,
        max_discount_percent: parse_decimal(
            "max_discount_percent",
            row.try_get("max_discount_percent")?,
        )?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn history_from_row(row: &SqliteRow) -> Result<PriceHistoryEntry, RepositoryError> {
    let source: String = row.try_get("source")?;
    Ok(PriceHistoryEntry {
        product_id: ProductId(row.try_get("product_id")?),
        user_id: UserId(row.try_get("user_id")?),
        price: parse_decimal("price", row.try_get("price")?)?,
        cost_price: parse_optional_decimal("cost_price", row.try_get("cost_price")?)?,
        margin_percent: parse_optional_decimal("margin_percent", row.try_get("margin_percent")?)?,
        source: source.parse().map_err(RepositoryError::Decode)?,
        recorded_at: parse_timestamp("recorded_at", row.try_get("recorded_at")?)?,
    })
}

#[async_trait]
impl MarginStore for SqlPricingStore {
    async fn get_margin(
        &self,
        product_id: &ProductId,
        user: &UserId,
    ) -> Result<Option<ProductMargin>, StoreError> {
        Ok(self.load_margin(product_id, user).await?)
    }

    async fn upsert_margin(
        &self,
        margin: ProductMargin,
        history: PriceHistoryEntry,
    ) -> Result<(), StoreError> {
        self.write_margin(&margin, &history).await.map_err(|error| {
            RepositoryError::rolled_back(
                &format!("margin upsert for product {}", margin.product_id.0),
                error,
            )
            .into()
        })
    }

    async fn price_history(
        &self,
        product_id: &ProductId,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryEntry>, StoreError> {
        Ok(self.load_price_history(product_id, user, limit).await?)
    }
}
