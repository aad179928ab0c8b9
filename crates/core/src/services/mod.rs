pub mod pricing;
pub mod quotes;

pub use pricing::{DiscountRequest, PricingConfigRequest, PricingConfigResponse, PricingService};
pub use quotes::{NewQuote, QuoteService};
