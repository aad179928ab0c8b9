//! Margin and discount resolution.
//!
//! Turns a product's cost and margin configuration plus a client discount into
//! a sale price and realized margin. The discount ceiling is enforced; the
//! margin floor is only reported.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductMargin;
use crate::errors::ValidationError;
use crate::money::{percent_of, ratio_percent, round2};

pub const DEFAULT_MARGIN_PERCENT: Decimal = Decimal::from_parts(25, 0, 0, false, 0);
pub const DEFAULT_MIN_MARGIN_PERCENT: Decimal = Decimal::from_parts(10, 0, 0, false, 0);
pub const DEFAULT_MAX_DISCOUNT_PERCENT: Decimal = Decimal::from_parts(15, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginPolicy {
    pub default_margin_percent: Decimal,
    pub default_min_margin_percent: Decimal,
    pub default_max_discount_percent: Decimal,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self {
            default_margin_percent: DEFAULT_MARGIN_PERCENT,
            default_min_margin_percent: DEFAULT_MIN_MARGIN_PERCENT,
            default_max_discount_percent: DEFAULT_MAX_DISCOUNT_PERCENT,
        }
    }
}

pub fn base_price(cost_price: Option<Decimal>, margin_percent: Decimal) -> Decimal {
    match cost_price {
        Some(cost) if !cost.is_zero() => round2(cost + percent_of(cost, margin_percent)),
        _ => Decimal::ZERO,
    }
}

pub fn final_price(base_price: Decimal, discount_percent: Decimal) -> Decimal {
    round2(base_price - percent_of(base_price, discount_percent))
}

pub fn realized_margin(sale_price: Decimal, cost_price: Decimal) -> Decimal {
    ratio_percent(sale_price - cost_price, cost_price)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountResolution {
    pub accepted: bool,
    pub requested_discount: Decimal,
    pub max_discount: Decimal,
    pub effective_discount: Decimal,
}

impl DiscountResolution {
    pub fn into_result(self) -> Result<Decimal, ValidationError> {
        if self.accepted {
            Ok(self.effective_discount)
        } else {
            Err(ValidationError::DiscountAboveCeiling {
                requested: self.requested_discount.normalize(),
                max: self.max_discount.normalize(),
            })
        }
    }
}

pub fn resolve_discount(requested: Decimal, max_discount: Decimal) -> DiscountResolution {
    let accepted = requested <= max_discount;
    DiscountResolution {
        accepted,
        requested_discount: requested,
        max_discount,
        effective_discount: if accepted { requested } else { Decimal::ZERO },
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginFloorStatus {
    Ok,
    BelowFloor,
    Unknown,
}

pub fn check_margin_floor(
    realized: Decimal,
    min_margin_percent: Decimal,
    has_cost: bool,
) -> MarginFloorStatus {
    if !has_cost {
        MarginFloorStatus::Unknown
    } else if realized < min_margin_percent {
        MarginFloorStatus::BelowFloor
    } else {
        MarginFloorStatus::Ok
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResolution {
    pub cost_price: Decimal,
    pub margin_percent: Decimal,
    pub base_price: Decimal,
    pub final_price: Decimal,
    pub client_discount: Decimal,
    pub final_margin: Decimal,
    pub min_margin: Decimal,
    pub max_discount: Decimal,
    pub margin_floor: MarginFloorStatus,
    pub discount_within_ceiling: bool,
    pub configured: bool,
}

impl PriceResolution {
    pub fn below_margin_floor(&self) -> bool {
        self.margin_floor == MarginFloorStatus::BelowFloor
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectiveMargin {
    pub cost_price: Option<Decimal>,
    pub margin_percent: Decimal,
    pub min_margin_percent: Decimal,
    pub max_discount_percent: Decimal,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MarginResolver {
    policy: MarginPolicy,
}

impl MarginResolver {
    pub fn new(policy: MarginPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MarginPolicy {
        &self.policy
    }

    pub fn effective(&self, margin: Option<&ProductMargin>) -> EffectiveMargin {
        match margin {
            Some(margin) => EffectiveMargin {
                cost_price: Some(margin.cost_price),
                margin_percent: margin.margin_percent,
                min_margin_percent: margin.min_margin_percent,
                max_discount_percent: margin.max_discount_percent,
            },
            None => EffectiveMargin {
                cost_price: None,
                margin_percent: self.policy.default_margin_percent,
                min_margin_percent: self.policy.default_min_margin_percent,
                max_discount_percent: self.policy.default_max_discount_percent,
            },
        }
    }

    pub fn check_discount(
        &self,
        margin: Option<&ProductMargin>,
        requested: Decimal,
    ) -> Result<Decimal, ValidationError> {
        if requested < Decimal::ZERO {
            return Err(ValidationError::Negative {
                field: "discount_percent".to_string(),
                value: requested,
            });
        }
        resolve_discount(requested, self.effective(margin).max_discount_percent).into_result()
    }

    /// Price a product for display. A stored discount that now exceeds the
    /// ceiling is still applied but reported via `discount_within_ceiling`.
    pub fn resolve(
        &self,
        margin: Option<&ProductMargin>,
        client_discount: Option<Decimal>,
    ) -> PriceResolution {
        let effective = self.effective(margin);
        let cost_price = effective.cost_price.unwrap_or(Decimal::ZERO);
        let discount = client_discount.unwrap_or(Decimal::ZERO);

        let base = base_price(effective.cost_price, effective.margin_percent);
        let sale = final_price(base, discount);
        let has_cost = !cost_price.is_zero();
        let final_margin = if has_cost { realized_margin(sale, cost_price) } else { Decimal::ZERO };

        PriceResolution {
            cost_price,
            margin_percent: effective.margin_percent,
            base_price: base,
            final_price: sale,
            client_discount: discount,
            final_margin,
            min_margin: effective.min_margin_percent,
            max_discount: effective.max_discount_percent,
            margin_floor: check_margin_floor(final_margin, effective.min_margin_percent, has_cost),
            discount_within_ceiling: resolve_discount(discount, effective.max_discount_percent)
                .accepted,
            configured: margin.is_some(),
        }
    }
}
