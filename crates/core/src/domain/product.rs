use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl Product {
    /// Normalized lookup key; product identity ignores case and surrounding whitespace.
    pub fn identity_key(name: &str, unit: &str) -> (String, String) {
        (name.trim().to_lowercase(), unit.trim().to_lowercase())
    }

    pub fn matches(&self, name: &str, unit: &str) -> bool {
        Self::identity_key(&self.name, &self.unit) == Self::identity_key(name, unit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMargin {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub cost_price: Decimal,
    pub margin_percent: Decimal,
    pub min_margin_percent: Decimal,
    pub max_discount_percent: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Configuration,
    QuoteLine,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::QuoteLine => "quote_line",
        }
    }
}

impl std::str::FromStr for PriceSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "configuration" => Ok(Self::Configuration),
            "quote_line" => Ok(Self::QuoteLine),
            other => Err(format!("unknown price source `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub margin_percent: Option<Decimal>,
    pub source: PriceSource,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSuggestion {
    pub product: Product,
    pub last_price: Option<Decimal>,
}
