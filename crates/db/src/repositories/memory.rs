use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use offerdesk_core::domain::client::{ClientDiscount, ClientId};
use offerdesk_core::domain::product::{
    PriceHistoryEntry, PriceSource, Product, ProductId, ProductMargin, ProductSuggestion,
};
use offerdesk_core::domain::quote::{Quote, QuoteId, QuoteStatus};
use offerdesk_core::domain::user::UserId;
use offerdesk_core::errors::StoreError;
use offerdesk_core::ports::{DiscountStore, MarginStore, ProductCatalog, QuoteStore};

#[derive(Default)]
struct MemoryState {
    products: HashMap<String, Product>,
    margins: HashMap<(String, String), ProductMargin>,
    history: Vec<PriceHistoryEntry>,
    discounts: HashMap<(String, String), ClientDiscount>,
    quotes: HashMap<String, Quote>,
}

impl MemoryState {
    fn product_by_identity(&self, name: &str, unit: &str) -> Option<&Product> {
        self.products.values().find(|product| product.matches(name, unit))
    }

    fn history_for(&self, product_id: &ProductId, user: &UserId) -> Vec<&PriceHistoryEntry> {
        let mut entries: Vec<&PriceHistoryEntry> = self
            .history
            .iter()
            .rev()
            .filter(|entry| entry.product_id == *product_id && entry.user_id == *user)
            .collect();
        entries.sort_by(|left, right| right.recorded_at.cmp(&left.recorded_at));
        entries
    }

    fn touch_or_create(&mut self, name: &str, unit: &str, now: DateTime<Utc>) -> ProductId {
        if let Some(existing) = self.products.values_mut().find(|product| product.matches(name, unit))
        {
            existing.last_used = now;
            return existing.id.clone();
        }

        let id = ProductId(format!("P-{}", Uuid::new_v4().simple()));
        self.products.insert(
            id.0.clone(),
            Product {
                id: id.clone(),
                name: name.trim().to_string(),
                unit: unit.trim().to_string(),
                created_at: now,
                last_used: now,
            },
        );
        id
    }
}

/// Process-local store with the same unit-of-work semantics as the SQLite
/// adapter: each write validates first and then applies under one guard.
#[derive(Default)]
pub struct InMemoryPricingStore {
    state: RwLock<MemoryState>,
}

impl InMemoryPricingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryPricingStore {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().await;
        Ok(state.products.get(&id.0).cloned())
    }

    async fn find_product_by_identity(
        &self,
        name: &str,
        unit: &str,
    ) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().await;
        Ok(state.product_by_identity(name, unit).cloned())
    }

    async fn save_product(&self, product: Product) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(other) = state.product_by_identity(&product.name, &product.unit) {
            if other.id != product.id {
                return Err(StoreError::Consistency(format!(
                    "product `{}` ({}) already exists as {}",
                    product.name, product.unit, other.id.0
                )));
            }
        }
        state.products.insert(product.id.0.clone(), product);
        Ok(())
    }

    async fn search_products(
        &self,
        user: &UserId,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ProductSuggestion>, StoreError> {
        let state = self.state.read().await;
        let needle = query.trim().to_lowercase();

        let mut matches: Vec<&Product> = state
            .products
            .values()
            .filter(|product| product.name.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|left, right| {
            right.last_used.cmp(&left.last_used).then_with(|| left.name.cmp(&right.name))
        });

        Ok(matches
            .into_iter()
            .take(limit as usize)
            .map(|product| ProductSuggestion {
                product: product.clone(),
                last_price: state
                    .history_for(&product.id, user)
                    .first()
                    .map(|entry| entry.price),
            })
            .collect())
    }
}

#[async_trait]
impl MarginStore for InMemoryPricingStore {
    async fn get_margin(
        &self,
        product_id: &ProductId,
        user: &UserId,
    ) -> Result<Option<ProductMargin>, StoreError> {
        let state = self.state.read().await;
        Ok(state.margins.get(&(product_id.0.clone(), user.0.clone())).cloned())
    }

    async fn upsert_margin(
        &self,
        margin: ProductMargin,
        history: PriceHistoryEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&margin.product_id.0) {
            return Err(StoreError::Consistency(format!(
                "margin upsert for product {}: product does not exist",
                margin.product_id.0
            )));
        }

        state.margins.insert((margin.product_id.0.clone(), margin.user_id.0.clone()), margin);
        state.history.push(history);
        Ok(())
    }

    async fn price_history(
        &self,
        product_id: &ProductId,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryEntry>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .history_for(product_id, user)
            .into_iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DiscountStore for InMemoryPricingStore {
    async fn get_client_discount(
        &self,
        client_id: &ClientId,
        product_id: &ProductId,
        on: NaiveDate,
    ) -> Result<Option<ClientDiscount>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .discounts
            .get(&(client_id.0.clone(), product_id.0.clone()))
            .filter(|discount| discount.is_effective_on(on))
            .cloned())
    }

    async fn save_client_discount(&self, discount: ClientDiscount) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .discounts
            .insert((discount.client_id.0.clone(), discount.product_id.0.clone()), discount);
        Ok(())
    }
}

#[async_trait]
impl QuoteStore for InMemoryPricingStore {
    async fn save_quote(&self, quote: &Quote) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        if state.quotes.contains_key(&quote.id.0) {
            return Err(StoreError::Consistency(format!(
                "saving quote {}: id already exists",
                quote.id.0
            )));
        }
        let mut positions = HashSet::with_capacity(quote.lines.len());
        if !quote.lines.iter().all(|line| positions.insert(line.position)) {
            return Err(StoreError::Consistency(format!(
                "saving quote {}: duplicate line position",
                quote.id.0
            )));
        }

        for line in &quote.lines {
            let product_id = state.touch_or_create(&line.product_name, &line.unit, quote.created_at);
            if line.cost_price.is_some() && line.margin_percent.is_some() {
                if let Some(margin) =
                    state.margins.get_mut(&(product_id.0.clone(), quote.owner.0.clone()))
                {
                    margin.updated_at = quote.created_at;
                }
            }
            state.history.push(PriceHistoryEntry {
                product_id,
                user_id: quote.owner.clone(),
                price: line.unit_price,
                cost_price: line.cost_price,
                margin_percent: line.margin_percent,
                source: PriceSource::QuoteLine,
                recorded_at: quote.created_at,
            });
        }

        let mut stored = quote.clone();
        stored.lines.sort_by_key(|line| line.position);
        state.quotes.insert(stored.id.0.clone(), stored);
        Ok(())
    }

    async fn find_quote(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError> {
        let state = self.state.read().await;
        Ok(state.quotes.get(&id.0).cloned())
    }

    async fn update_status(
        &self,
        id: &QuoteId,
        from: QuoteStatus,
        to: QuoteStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(quote) = state.quotes.get_mut(&id.0).filter(|quote| quote.status == from) else {
            return Ok(false);
        };
        quote.status = to;
        quote.updated_at = updated_at;
        Ok(true)
    }

    async fn delete_quote(&self, id: &QuoteId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.quotes.remove(&id.0).is_some())
    }
}
