use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use offerdesk_core::cpq::aggregate::QuoteTotals;
use offerdesk_core::cpq::line::LineAmounts;
use offerdesk_core::domain::client::{ClientId, ClientSnapshot};
use offerdesk_core::domain::product::{PriceHistoryEntry, PriceSource};
use offerdesk_core::domain::quote::{Quote, QuoteId, QuoteLine, QuoteStatus};
use offerdesk_core::domain::user::UserId;
use offerdesk_core::errors::StoreError;
use offerdesk_core::ports::QuoteStore;

use super::codec::{
    format_timestamp, parse_decimal, parse_optional_decimal, parse_timestamp, parse_u32,
};
use super::margin::append_price_history;
use super::product::find_or_create_product;
use super::{RepositoryError, SqlPricingStore};

impl SqlPricingStore {
    async fn write_quote(&self, quote: &Quote) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO offers (
                id, user_id, client_id, client_name, client_email, client_phone,
                delivery_days, valid_days, additional_costs, additional_costs_description,
                status, total_net, total_vat, total_gross, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quote.id.0)
        .bind(&quote.owner.0)
        .bind(quote.client_id.as_ref().map(|client_id| client_id.0.as_str()))
        .bind(&quote.client.name)
        .bind(quote.client.email.as_deref())
        .bind(quote.client.phone.as_deref())
        .bind(i64::from(quote.delivery_days))
        .bind(i64::from(quote.valid_days))
        .bind(quote.additional_costs.to_string())
        .bind(quote.additional_costs_description.as_deref())
        .bind(quote.status.as_str())
        .bind(quote.totals.total_net.to_string())
        .bind(quote.totals.total_vat.to_string())
        .bind(quote.totals.total_gross.to_string())
        .bind(format_timestamp(quote.created_at))
        .bind(format_timestamp(quote.updated_at))
        .execute(&mut *tx)
        .await?;

        for line in &quote.lines {
            let product_id =
                find_or_create_product(&mut tx, &line.product_name, &line.unit, quote.created_at)
                    .await?;

            append_price_history(
                &mut tx,
                &PriceHistoryEntry {
                    product_id: product_id.clone(),
                    user_id: quote.owner.clone(),
                    price: line.unit_price,
                    cost_price: line.cost_price,
                    margin_percent: line.margin_percent,
                    source: PriceSource::QuoteLine,
                    recorded_at: quote.created_at,
                },
            )
            .await?;

            if line.cost_price.is_some() && line.margin_percent.is_some() {
                sqlx::query(
                    "UPDATE product_margins SET updated_at = ? WHERE product_id = ? AND user_id = ?",
                )
                .bind(format_timestamp(quote.created_at))
                .bind(&product_id.0)
                .bind(&quote.owner.0)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query(
                "INSERT INTO offer_items (
                    offer_id, position, product_id, product_name, unit, quantity, unit_price,
                    vat_rate, net_amount, vat_amount, gross_amount, cost_price, margin_percent,
                    discount_percent, original_price
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&quote.id.0)
            .bind(i64::from(line.position))
            .bind(&product_id.0)
            .bind(&line.product_name)
            .bind(&line.unit)
            .bind(line.quantity.to_string())
            .bind(line.unit_price.to_string())
            .bind(line.vat_rate.to_string())
            .bind(line.amounts.net.to_string())
            .bind(line.amounts.vat.to_string())
            .bind(line.amounts.gross.to_string())
            .bind(line.cost_price.map(|value| value.to_string()))
            .bind(line.margin_percent.map(|value| value.to_string()))
            .bind(line.discount_percent.map(|value| value.to_string()))
            .bind(line.original_price.map(|value| value.to_string()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_quote(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let Some(header) = sqlx::query(
            "SELECT id, user_id, client_id, client_name, client_email, client_phone,
                    delivery_days, valid_days, additional_costs, additional_costs_description,
                    status, total_net, total_vat, total_gross, created_at, updated_at
             FROM offers
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(self.pool())
        .await?
        else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT position, product_name, unit, quantity, unit_price, vat_rate, net_amount,
                    vat_amount, gross_amount, cost_price, margin_percent, discount_percent,
                    original_price
             FROM offer_items
             WHERE offer_id = ?
             ORDER BY position ASC",
        )
        .bind(&id.0)
        .fetch_all(self.pool())
        .await?;

        let lines = rows.iter().map(line_from_row).collect::<Result<Vec<_>, _>>()?;
        quote_from_row(&header, lines).map(Some)
    }

    async fn write_status(
        &self,
        id: &QuoteId,
        from: QuoteStatus,
        to: QuoteStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE offers SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(to.as_str())
                .bind(format_timestamp(updated_at))
                .bind(&id.0)
                .bind(from.as_str())
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_quote(&self, id: &QuoteId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM offers WHERE id = ?")
            .bind(&id.0)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn quote_from_row(row: &SqliteRow, lines: Vec<QuoteLine>) -> Result<Quote, RepositoryError> {
    let status: String = row.try_get("status")?;
    let client_id: Option<String> = row.try_get("client_id")?;

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        owner: UserId(row.try_get("user_id")?),
        client_id: client_id.map(ClientId),
        client: ClientSnapshot {
            name: row.try_get("client_name")?,
            email: row.try_get("client_email")?,
            phone: row.try_get("client_phone")?,
        },
        delivery_days: parse_u32("delivery_days", row.try_get("delivery_days")?)?,
        valid_days: parse_u32("valid_days", row.try_get("valid_days")?)?,
        additional_costs: parse_decimal("additional_costs", row.try_get("additional_costs")?)?,
        additional_costs_description: row.try_get("additional_costs_description")?,
        status: status
            .parse::<QuoteStatus>()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        totals: QuoteTotals {
            total_net: parse_decimal("total_net", row.try_get("total_net")?)?,
            total_vat: parse_decimal("total_vat", row.try_get("total_vat")?)?,
            total_gross: parse_decimal("total_gross", row.try_get("total_gross")?)?,
        },
        lines,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn line_from_row(row: &SqliteRow) -> Result<QuoteLine, RepositoryError> {
    Ok(QuoteLine {
        position: parse_u32("position", row.try_get("position")?)?,
        product_name: row.try_get("product_name")?,
        unit: row.try_get("unit")?,
        quantity: parse_decimal("quantity", row.try_get("quantity")?)?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        vat_rate: parse_decimal("vat_rate", row.try_get("vat_rate")?)?,
        amounts: LineAmounts {
            net: parse_decimal("net_amount", row.try_get("net_amount")?)?,
            vat: parse_decimal("vat_amount", row.try_get("vat_amount")?)?,
            gross: parse_decimal("gross_amount", row.try_get("gross_amount")?)?,
        },
        cost_price: parse_optional_decimal("cost_price", row.try_get("cost_price")?)?,
        margin_percent: parse_optional_decimal("margin_percent", row.try_get("margin_percent")?)?,
        discount_percent: parse_optional_decimal(
            "discount_percent",
            row.try_get("discount_percent")?,
        )?,
        original_price: parse_optional_decimal("original_price", row.try_get("original_price")?)?,
    })
}

#[async_trait]
impl QuoteStore for SqlPricingStore {
    async fn save_quote(&self, quote: &Quote) -> Result<(), StoreError> {
        self.write_quote(quote).await.map_err(|error| {
            RepositoryError::rolled_back(&format!("saving quote {}", quote.id.0), error).into()
        })
    }

    async fn find_quote(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError> {
        Ok(self.load_quote(id).await?)
    }

    async fn update_status(
        &self,
        id: &QuoteId,
        from: QuoteStatus,
        to: QuoteStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.write_status(id, from, to, updated_at).await?)
    }

    async fn delete_quote(&self, id: &QuoteId) -> Result<bool, StoreError> {
        Ok(self.remove_quote(id).await?)
    }
}
