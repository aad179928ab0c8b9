//! Persistence seams for the pricing services.
//!
//! Implementations live in `offerdesk-db`. Every method that writes more than
//! one row is a single unit of work: on error nothing it wrote may remain
//! visible.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::client::{ClientDiscount, ClientId};
use crate::domain::product::{
    PriceHistoryEntry, Product, ProductId, ProductMargin, ProductSuggestion,
};
use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
use crate::domain::user::UserId;
use crate::errors::StoreError;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// Case-insensitive (name, unit) match.
    async fn find_product_by_identity(
        &self,
        name: &str,
        unit: &str,
    ) -> Result<Option<Product>, StoreError>;

    async fn save_product(&self, product: Product) -> Result<(), StoreError>;

    /// Name contains `query`, most recently used first, with the user's last price.
    async fn search_products(
        &self,
        user: &UserId,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ProductSuggestion>, StoreError>;
}

#[async_trait]
pub trait MarginStore: Send + Sync {
    async fn get_margin(
        &self,
        product_id: &ProductId,
        user: &UserId,
    ) -> Result<Option<ProductMargin>, StoreError>;

    /// Insert-or-update the (product, user) row and append `history` in the same
    /// unit of work. Last write wins.
    async fn upsert_margin(
        &self,
        margin: ProductMargin,
        history: PriceHistoryEntry,
    ) -> Result<(), StoreError>;

    /// Newest first.
    async fn price_history(
        &self,
        product_id: &ProductId,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<PriceHistoryEntry>, StoreError>;
}

#[async_trait]
pub trait DiscountStore: Send + Sync {
    /// The discount for the pair if its validity window contains `on`.
    async fn get_client_discount(
        &self,
        client_id: &ClientId,
        product_id: &ProductId,
        on: NaiveDate,
    ) -> Result<Option<ClientDiscount>, StoreError>;

    /// Overwrites any existing row for the (client, product) pair.
    async fn save_client_discount(&self, discount: ClientDiscount) -> Result<(), StoreError>;
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Persist header and lines. For each line the product is found or created
    /// by (name, unit), its `last_used` refreshed and a price-history entry
    /// appended. Lines carrying cost and margin also refresh the owner's
    /// existing margin row `updated_at`. All in one unit of work.
    async fn save_quote(&self, quote: &Quote) -> Result<(), StoreError>;

    async fn find_quote(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError>;

    /// Moves the quote from `from` to `to` only if it is still in `from`.
    /// Returns `false` when no quote has the id or its status already changed.
    async fn update_status(
        &self,
        id: &QuoteId,
        from: QuoteStatus,
        to: QuoteStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Deletes the quote and its lines. Returns `false` when nothing was deleted.
    async fn delete_quote(&self, id: &QuoteId) -> Result<bool, StoreError>;
}

pub trait PricingStore: ProductCatalog + MarginStore + DiscountStore + QuoteStore {}

impl<T> PricingStore for T where T: ProductCatalog + MarginStore + DiscountStore + QuoteStore {}
