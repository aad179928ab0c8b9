pub mod aggregate;
pub mod line;
pub mod margin;
pub mod report;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use self::{
    aggregate::{additional_costs_vat, aggregate, QuoteTotals, ADDITIONAL_COSTS_VAT_RATE},
    line::{LineAmounts, LineInput},
};
use crate::errors::ValidationError;
use crate::money::{ensure_at_most, MAX_AMOUNT};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub position: u32,
    pub input: LineInput,
    pub amounts: LineAmounts,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub lines: Vec<PricedLine>,
    pub additional_costs: Decimal,
    pub additional_costs_vat: Decimal,
    pub totals: QuoteTotals,
    pub trace: Vec<PricingTraceStep>,
}

pub trait PricingEngine: Send + Sync {
    fn price(
        &self,
        lines: &[LineInput],
        additional_costs: Decimal,
    ) -> Result<PricingResult, ValidationError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(
        &self,
        lines: &[LineInput],
        additional_costs: Decimal,
    ) -> Result<PricingResult, ValidationError> {
        price_lines(lines, additional_costs)
    }
}

/// Empty line lists are rejected here; [`aggregate`] itself accepts them.
pub fn price_lines(
    lines: &[LineInput],
    additional_costs: Decimal,
) -> Result<PricingResult, ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::EmptyQuote);
    }
    if additional_costs < Decimal::ZERO {
        return Err(ValidationError::Negative {
            field: "additional_costs".to_string(),
            value: additional_costs,
        });
    }
    ensure_at_most("additional_costs", additional_costs, MAX_AMOUNT)?;

    let mut priced = Vec::with_capacity(lines.len());
    let mut trace = Vec::with_capacity(lines.len() + 2);
    for (position, input) in lines.iter().enumerate() {
        input.validate(position)?;
        let amounts = input.amounts();
        trace.push(PricingTraceStep {
            stage: format!("line[{position}]"),
            detail: format!(
                "{} x {} @ {}% VAT -> net {} vat {}",
                input.quantity, input.unit_price, input.vat_rate, amounts.net, amounts.vat
            ),
            amount: amounts.gross,
        });
        priced.push(PricedLine { position: position as u32, input: input.clone(), amounts });
    }

    let extra_vat = additional_costs_vat(additional_costs);
    trace.push(PricingTraceStep {
        stage: "additional_costs".to_string(),
        detail: format!("{additional_costs} @ {ADDITIONAL_COSTS_VAT_RATE}% VAT -> vat {extra_vat}"),
        amount: additional_costs + extra_vat,
    });

    let amounts: Vec<LineAmounts> = priced.iter().map(|line| line.amounts).collect();
    let totals = aggregate(&amounts, additional_costs);
    trace.push(PricingTraceStep {
        stage: "total".to_string(),
        detail: format!("net {} + vat {}", totals.total_net, totals.total_vat),
        amount: totals.total_gross,
    });

    Ok(PricingResult {
        lines: priced,
        additional_costs,
        additional_costs_vat: extra_vat,
        totals,
        trace,
    })
}
