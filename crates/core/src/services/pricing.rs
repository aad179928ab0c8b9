use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cpq::margin::{base_price, MarginPolicy, MarginResolver, PriceResolution};
use crate::domain::client::{ClientDiscount, ClientId};
use crate::domain::product::{
    PriceHistoryEntry, PriceSource, Product, ProductId, ProductMargin, ProductSuggestion,
};
use crate::domain::user::UserId;
use crate::errors::{ApplicationError, ValidationError};
use crate::money::{ensure_at_most, MAX_AMOUNT, MAX_MARGIN_PERCENT};
use crate::ports::PricingStore;

const MAX_SUGGESTIONS: u32 = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfigRequest {
    pub product_id: ProductId,
    pub cost_price: Decimal,
    pub margin_percent: Decimal,
    #[serde(default)]
    pub min_margin_percent: Option<Decimal>,
    #[serde(default)]
    pub max_discount_percent: Option<Decimal>,
}

impl PricingConfigRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("cost_price", self.cost_price)?;
        ensure_at_most("cost_price", self.cost_price, MAX_AMOUNT)?;
        non_negative("margin_percent", self.margin_percent)?;
        ensure_at_most("margin_percent", self.margin_percent, MAX_MARGIN_PERCENT)?;
        if let Some(min_margin) = self.min_margin_percent {
            non_negative("min_margin_percent", min_margin)?;
            ensure_at_most("min_margin_percent", min_margin, MAX_MARGIN_PERCENT)?;
        }
        if let Some(max_discount) = self.max_discount_percent {
            percentage("max_discount_percent", max_discount)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfigResponse {
    pub base_price: Decimal,
    pub margin: ProductMargin,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRequest {
    pub client_id: ClientId,
    pub product_id: ProductId,
    pub discount_percent: Decimal,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

impl DiscountRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.client_id.0.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "client_id".to_string() });
        }
        percentage("discount_percent", self.discount_percent)?;
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if from > until {
                return Err(ValidationError::InvertedWindow {
                    field: "discount".to_string(),
                    from: from.to_string(),
                    until: until.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Pricing lookup, pricing configuration, discount configuration and product
/// autosuggest for one acting user.
pub struct PricingService<S> {
    store: Arc<S>,
    resolver: MarginResolver,
}

impl<S> Clone for PricingService<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), resolver: self.resolver }
    }
}

impl<S> PricingService<S>
where
    S: PricingStore,
{
    pub fn new(store: Arc<S>, policy: MarginPolicy) -> Self {
        Self { store, resolver: MarginResolver::new(policy) }
    }

    pub fn resolver(&self) -> &MarginResolver {
        &self.resolver
    }

    async fn require_product(&self, product_id: &ProductId) -> Result<Product, ApplicationError> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound { entity: "product", id: product_id.0.clone() })
    }

    /// Suggested price for a product, optionally for a client, as of `today`.
    /// Missing margin or discount rows fall back to defaults.
    pub async fn lookup(
        &self,
        user: &UserId,
        product_id: &ProductId,
        client_id: Option<&ClientId>,
        today: NaiveDate,
    ) -> Result<PriceResolution, ApplicationError> {
        self.require_product(product_id).await?;
        let margin = self.store.get_margin(product_id, user).await?;

        let discount = match client_id {
            Some(client_id) => self
                .store
                .get_client_discount(client_id, product_id, today)
                .await?
                .map(|discount| discount.discount_percent),
            None => None,
        };

        let resolution = self.resolver.resolve(margin.as_ref(), discount);
        if resolution.below_margin_floor() {
            warn!(
                event_name = "pricing.margin_floor_breached",
                product_id = %product_id.0,
                user_id = %user.0,
                final_margin = %resolution.final_margin,
                min_margin = %resolution.min_margin,
                "realized margin is below the configured floor"
            );
        }
        if !resolution.discount_within_ceiling {
            warn!(
                event_name = "pricing.stored_discount_above_ceiling",
                product_id = %product_id.0,
                client_discount = %resolution.client_discount,
                max_discount = %resolution.max_discount,
                "stored client discount exceeds the current ceiling"
            );
        }
        Ok(resolution)
    }

    /// Upsert the user's margin row and append a price-history entry, even when
    /// nothing changed. Omitted limits keep the stored value or the default.
    pub async fn configure(
        &self,
        user: &UserId,
        request: PricingConfigRequest,
    ) -> Result<PricingConfigResponse, ApplicationError> {
        request.validate()?;
        self.require_product(&request.product_id).await?;

        let existing = self.store.get_margin(&request.product_id, user).await?;
        let fallback = self.resolver.effective(existing.as_ref());
        let now = Utc::now();

        let margin = ProductMargin {
            product_id: request.product_id.clone(),
            user_id: user.clone(),
            cost_price: request.cost_price,
            margin_percent: request.margin_percent,
            min_margin_percent: request.min_margin_percent.unwrap_or(fallback.min_margin_percent),
            max_discount_percent: request
                .max_discount_percent
                .unwrap_or(fallback.max_discount_percent),
            updated_at: now,
        };
        let base = base_price(Some(margin.cost_price), margin.margin_percent);

        let history = PriceHistoryEntry {
            product_id: margin.product_id.clone(),
            user_id: user.clone(),
            price: base,
            cost_price: Some(margin.cost_price),
            margin_percent: Some(margin.margin_percent),
            source: PriceSource::Configuration,
            recorded_at: now,
        };

        self.store.upsert_margin(margin.clone(), history).await?;
        info!(
            event_name = "pricing.margin_configured",
            product_id = %margin.product_id.0,
            user_id = %user.0,
            base_price = %base,
            "product margin configured"
        );

        Ok(PricingConfigResponse { base_price: base, margin })
    }

    /// Validate a client discount against the user's ceiling (default 15%) and
    /// store it. A rejected discount is never persisted.
    pub async fn configure_discount(
        &self,
        user: &UserId,
        request: DiscountRequest,
    ) -> Result<ClientDiscount, ApplicationError> {
        request.validate()?;
        self.require_product(&request.product_id).await?;

        let margin = self.store.get_margin(&request.product_id, user).await?;
        if let Err(error) = self.resolver.check_discount(margin.as_ref(), request.discount_percent)
        {
            warn!(
                event_name = "pricing.discount_rejected",
                product_id = %request.product_id.0,
                client_id = %request.client_id.0,
                requested = %request.discount_percent,
                "client discount rejected"
            );
            return Err(error.into());
        }

        let discount = ClientDiscount {
            client_id: request.client_id,
            product_id: request.product_id,
            discount_percent: request.discount_percent,
            valid_from: request.valid_from,
            valid_until: request.valid_until,
            updated_at: Utc::now(),
        };
        self.store.save_client_discount(discount.clone()).await?;
        info!(
            event_name = "pricing.discount_configured",
            product_id = %discount.product_id.0,
            client_id = %discount.client_id.0,
            discount = %discount.discount_percent,
            "client discount stored"
        );
        Ok(discount)
    }

    pub async fn suggest_products(
        &self,
        user: &UserId,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ProductSuggestion>, ApplicationError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.search_products(user, query, limit.clamp(1, MAX_SUGGESTIONS)).await?)
    }

    pub async fn price_history(
        &self,
        user: &UserId,
        product_id: &ProductId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryEntry>, ApplicationError> {
        self.require_product(product_id).await?;
        Ok(self.store.price_history(product_id, user, limit.max(1)).await?)
    }
}

fn non_negative(field: &str, value: Decimal) -> Result<(), ValidationError> {
    if value < Decimal::ZERO {
        return Err(ValidationError::Negative { field: field.to_string(), value });
    }
    Ok(())
}

fn percentage(field: &str, value: Decimal) -> Result<(), ValidationError> {
    non_negative(field, value)?;
    ensure_at_most(field, value, Decimal::ONE_HUNDRED)
}
