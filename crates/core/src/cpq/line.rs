use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::money::{ensure_at_most, percent_of, round2, MAX_AMOUNT, MAX_MARGIN_PERCENT};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    pub net: Decimal,
    pub vat: Decimal,
    pub gross: Decimal,
}

/// Callers validate inputs first (see [`LineInput::validate`]).
pub fn compute_line(quantity: Decimal, unit_price: Decimal, vat_rate: Decimal) -> LineAmounts {
    let net = round2(quantity * unit_price);
    let vat = round2(percent_of(net, vat_rate));
    let gross = round2(net + vat);
    LineAmounts { net, vat, gross }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
    #[serde(default)]
    pub cost_price: Option<Decimal>,
    #[serde(default)]
    pub margin_percent: Option<Decimal>,
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    pub original_price: Option<Decimal>,
}

impl LineInput {
    pub fn validate(&self, position: usize) -> Result<(), ValidationError> {
        let field = |name: &str| format!("lines[{position}].{name}");

        if self.product_name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: field("product_name") });
        }
        if self.unit.trim().is_empty() {
            return Err(ValidationError::MissingField { field: field("unit") });
        }
        if self.quantity <= Decimal::ZERO {
            return Err(ValidationError::NotPositive {
                field: field("quantity"),
                value: self.quantity,
            });
        }
        ensure_at_most(&field("quantity"), self.quantity, MAX_AMOUNT)?;
        if self.unit_price < Decimal::ZERO {
            return Err(ValidationError::Negative {
                field: field("unit_price"),
                value: self.unit_price,
            });
        }
        ensure_at_most(&field("unit_price"), self.unit_price, MAX_AMOUNT)?;
        if self.vat_rate < Decimal::ZERO {
            return Err(ValidationError::Negative {
                field: field("vat_rate"),
                value: self.vat_rate,
            });
        }
        ensure_at_most(&field("vat_rate"), self.vat_rate, Decimal::ONE_HUNDRED)?;
        if let Some(cost_price) = self.cost_price {
            if cost_price < Decimal::ZERO {
                return Err(ValidationError::Negative {
                    field: field("cost_price"),
                    value: cost_price,
                });
            }
            ensure_at_most(&field("cost_price"), cost_price, MAX_AMOUNT)?;
        }
        if let Some(margin_percent) = self.margin_percent {
            ensure_at_most(&field("margin_percent"), margin_percent, MAX_MARGIN_PERCENT)?;
        }
        if let Some(original_price) = self.original_price {
            ensure_at_most(&field("original_price"), original_price, MAX_AMOUNT)?;
        }
        Ok(())
    }

    pub fn amounts(&self) -> LineAmounts {
        compute_line(self.quantity, self.unit_price, self.vat_rate)
    }
}
