pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod money;
pub mod ports;
pub mod services;

pub use cpq::aggregate::{aggregate, QuoteTotals, ADDITIONAL_COSTS_VAT_RATE};
pub use cpq::line::{compute_line, LineAmounts, LineInput};
pub use cpq::margin::{
    base_price, final_price, realized_margin, resolve_discount, DiscountResolution,
    MarginFloorStatus, MarginPolicy, MarginResolver, PriceResolution,
};
pub use cpq::report::{margin_report, QuoteMarginReport};
pub use domain::client::{ClientDiscount, ClientId, ClientSnapshot};
pub use domain::product::{PriceHistoryEntry, PriceSource, Product, ProductId, ProductMargin};
pub use domain::quote::{Quote, QuoteId, QuoteLine, QuoteStatus};
pub use domain::user::UserId;
pub use errors::{ApplicationError, DomainError, InterfaceError, StoreError, ValidationError};
pub use money::round2;
pub use ports::PricingStore;
pub use services::{NewQuote, PricingService, QuoteService};
