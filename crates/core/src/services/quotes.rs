use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cpq::line::LineInput;
use crate::cpq::margin::{MarginPolicy, MarginResolver};
use crate::cpq::report::{margin_report, QuoteMarginReport};
use crate::cpq::{DeterministicPricingEngine, PricingEngine};
use crate::domain::client::{ClientId, ClientSnapshot};
use crate::domain::quote::{Quote, QuoteId, QuoteLine, QuoteStatus};
use crate::domain::user::UserId;
use crate::errors::{ApplicationError, DomainError, ValidationError};
use crate::money::{ensure_at_most, MAX_AMOUNT};
use crate::ports::PricingStore;

/// Quote-creation input as collected by the UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuote {
    #[serde(default)]
    pub client_id: Option<ClientId>,
    pub client: ClientSnapshot,
    pub lines: Vec<LineInput>,
    #[serde(default)]
    pub additional_costs: Decimal,
    #[serde(default)]
    pub additional_costs_description: Option<String>,
    pub delivery_days: u32,
    pub valid_days: u32,
}

impl NewQuote {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.client.name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "client.name".to_string() });
        }
        if self.valid_days == 0 {
            return Err(ValidationError::NotPositive {
                field: "valid_days".to_string(),
                value: Decimal::ZERO,
            });
        }
        ensure_at_most("additional_costs", self.additional_costs, MAX_AMOUNT)?;
        Ok(())
    }
}

pub struct QuoteService<S, E = DeterministicPricingEngine> {
    store: Arc<S>,
    engine: E,
    resolver: MarginResolver,
}

impl<S, E: Clone> Clone for QuoteService<S, E> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), engine: self.engine.clone(), resolver: self.resolver }
    }
}

impl<S> QuoteService<S>
where
    S: PricingStore,
{
    pub fn new(store: Arc<S>, policy: MarginPolicy) -> Self {
        Self::with_engine(store, DeterministicPricingEngine, policy)
    }
}

impl<S, E> QuoteService<S, E>
where
    S: PricingStore,
    E: PricingEngine,
{
    pub fn with_engine(store: Arc<S>, engine: E, policy: MarginPolicy) -> Self {
        Self { store, engine, resolver: MarginResolver::new(policy) }
    }

    /// Price and persist a new draft quote. Lines carrying a discount are
    /// checked against the owner's ceiling for that product; one rejected line
    /// blocks the whole quote.
    pub async fn create(&self, owner: &UserId, request: NewQuote) -> Result<Quote, ApplicationError> {
        request.validate()?;
        let priced = self.engine.price(&request.lines, request.additional_costs)?;

        for line in &priced.lines {
            let Some(discount) = line.input.discount_percent else {
                continue;
            };
            let product = self
                .store
                .find_product_by_identity(&line.input.product_name, &line.input.unit)
                .await?;
            let margin = match &product {
                Some(product) => self.store.get_margin(&product.id, owner).await?,
                None => None,
            };
            self.resolver.check_discount(margin.as_ref(), discount).map_err(|error| {
                warn!(
                    event_name = "quote.line_discount_rejected",
                    position = line.position,
                    product_name = %line.input.product_name,
                    requested = %discount,
                    "line discount exceeds ceiling"
                );
                error
            })?;
        }

        let now = Utc::now();
        let lines = priced
            .lines
            .into_iter()
            .map(|line| QuoteLine {
                position: line.position,
                product_name: line.input.product_name.trim().to_string(),
                unit: line.input.unit.trim().to_string(),
                quantity: line.input.quantity,
                unit_price: line.input.unit_price,
                vat_rate: line.input.vat_rate,
                amounts: line.amounts,
                cost_price: line.input.cost_price,
                margin_percent: line.input.margin_percent,
                discount_percent: line.input.discount_percent,
                original_price: line.input.original_price,
            })
            .collect();

        let quote = Quote {
            id: QuoteId(format!("Q-{}", Uuid::new_v4().simple())),
            owner: owner.clone(),
            client_id: request.client_id,
            client: request.client,
            delivery_days: request.delivery_days,
            valid_days: request.valid_days,
            additional_costs: priced.additional_costs,
            additional_costs_description: request
                .additional_costs_description
                .filter(|description| !description.trim().is_empty()),
            status: QuoteStatus::Draft,
            totals: priced.totals,
            lines,
            created_at: now,
            updated_at: now,
        };

        self.store.save_quote(&quote).await?;
        info!(
            event_name = "quote.created",
            quote_id = %quote.id.0,
            user_id = %owner.0,
            line_count = quote.lines.len(),
            total_gross = %quote.totals.total_gross,
            "quote created"
        );
        Ok(quote)
    }

    pub async fn find(&self, id: &QuoteId) -> Result<Quote, ApplicationError> {
        self.store
            .find_quote(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound { entity: "quote", id: id.0.clone() })
    }

    /// Apply a raw status value. Unrecognized values and disallowed transitions
    /// are rejected before anything is written.
    pub async fn update_status(&self, id: &QuoteId, raw_status: &str) -> Result<Quote, ApplicationError> {
        let mut quote = self.find(id).await?;
        let from = quote.status;

        if let Err(error) = quote.apply_status(raw_status) {
            warn!(
                event_name = "quote.status_rejected",
                quote_id = %id.0,
                from = %from,
                requested = raw_status,
                error = %error,
                "quote status update rejected"
            );
            return Err(error.into());
        }

        if !self.store.update_status(id, from, quote.status, quote.updated_at).await? {
            let Some(current) = self.store.find_quote(id).await? else {
                return Err(ApplicationError::NotFound { entity: "quote", id: id.0.clone() });
            };
            warn!(
                event_name = "quote.status_conflict",
                quote_id = %id.0,
                expected = %from,
                current = %current.status,
                requested = %quote.status,
                "quote status changed concurrently"
            );
            return Err(DomainError::InvalidQuoteTransition { from: current.status, to: quote.status }
                .into());
        }
        info!(
            event_name = "quote.status_changed",
            quote_id = %id.0,
            from = %from,
            to = %quote.status,
            "quote status changed"
        );
        Ok(quote)
    }

    pub async fn delete(&self, id: &QuoteId) -> Result<(), ApplicationError> {
        if !self.store.delete_quote(id).await? {
            return Err(ApplicationError::NotFound { entity: "quote", id: id.0.clone() });
        }
        info!(event_name = "quote.deleted", quote_id = %id.0, "quote deleted");
        Ok(())
    }

    pub async fn margin_report(&self, id: &QuoteId) -> Result<QuoteMarginReport, ApplicationError> {
        let quote = self.find(id).await?;
        let report = margin_report(&quote, self.resolver.policy().default_min_margin_percent);
        if report.lines_below_floor > 0 {
            warn!(
                event_name = "quote.margin_floor_breached",
                quote_id = %id.0,
                lines_below_floor = report.lines_below_floor,
                "quote has lines below the margin floor"
            );
        }
        Ok(report)
    }

    /// Stored totals must equal totals recomputed from the stored lines.
    pub async fn verify_totals(&self, id: &QuoteId) -> Result<(), ApplicationError> {
        let quote = self.find(id).await?;
        if quote.recomputed_totals() != quote.totals {
            return Err(DomainError::InvariantViolation(format!(
                "quote {} totals do not match its lines",
                id.0
            ))
            .into());
        }
        Ok(())
    }
}
