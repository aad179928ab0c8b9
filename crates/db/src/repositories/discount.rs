use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, Row};

use offerdesk_core::domain::client::{ClientDiscount, ClientId};
use offerdesk_core::domain::product::ProductId;
use offerdesk_core::errors::StoreError;
use offerdesk_core::ports::DiscountStore;

use super::codec::{format_date, format_timestamp, parse_decimal, parse_optional_date, parse_timestamp};
use super::{RepositoryError, SqlPricingStore};

impl SqlPricingStore {
    async fn load_effective_discount(
        &self,
        client_id: &ClientId,
        product_id: &ProductId,
        on: NaiveDate,
    ) -> Result<Option<ClientDiscount>, RepositoryError> {
        let day = format_date(on);
        let row = sqlx::query(
            "SELECT client_id, product_id, discount_percent, valid_from, valid_until, updated_at
             FROM client_discounts
             WHERE client_id = ? AND product_id = ?
               AND (valid_from IS NULL OR valid_from <= ?)
               AND (valid_until IS NULL OR valid_until >= ?)",
        )
        .bind(&client_id.0)
        .bind(&product_id.0)
        .bind(&day)
        .bind(&day)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(discount_from_row).transpose()
    }

    async fn store_discount(&self, discount: &ClientDiscount) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO client_discounts (
                client_id, product_id, discount_percent, valid_from, valid_until, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(client_id, product_id) DO UPDATE SET
                discount_percent = excluded.discount_percent,
                valid_from = excluded.valid_from,
                valid_until = excluded.valid_until,
                updated_at = excluded.updated_at",
        )
        .bind(&discount.client_id.0)
        .bind(&discount.product_id.0)
        .bind(discount.discount_percent.to_string())
        .bind(discount.valid_from.map(format_date))
        .bind(discount.valid_until.map(format_date))
        .bind(format_timestamp(discount.updated_at))
        .execute(self.pool())
        .await?;

        Ok(())
    }
}

fn discount_from_row(row: &SqliteRow) -> Result<ClientDiscount, RepositoryError> {
    Ok(ClientDiscount {
        client_id: ClientId(row.try_get("client_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        discount_percent: parse_decimal("discount_percent", row.try_get("discount_percent")?)?,
        valid_from: parse_optional_date("valid_from", row.try_get("valid_from")?)?,
        valid_until: parse_optional_date("valid_until", row.try_get("valid_until")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[async_trait]
impl DiscountStore for SqlPricingStore {
    async fn get_client_discount(
        &self,
        client_id: &ClientId,
        product_id: &ProductId,
        on: NaiveDate,
    ) -> Result<Option<ClientDiscount>, StoreError> {
        Ok(self.load_effective_discount(client_id, product_id, on).await?)
    }

    async fn save_client_discount(&self, discount: ClientDiscount) -> Result<(), StoreError> {
        Ok(self.store_discount(&discount).await?)
    }
}
