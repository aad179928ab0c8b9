use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::{Quote, QuoteId};
use crate::money::{ratio_percent, round2};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMargin {
    pub position: u32,
    pub product_name: String,
    pub net: Decimal,
    pub cost_total: Option<Decimal>,
    pub profit: Option<Decimal>,
    pub realized_margin: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub below_floor: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteMarginReport {
    pub quote_id: QuoteId,
    pub min_margin: Decimal,
    pub lines: Vec<LineMargin>,
    pub cost_total: Decimal,
    pub net_total: Decimal,
    pub profit: Decimal,
    pub realized_margin: Decimal,
    pub lines_below_floor: usize,
    pub lines_without_cost: usize,
}

/// Realized margin per line and for the costed part of the quote.
/// Additional costs are pass-through and excluded.
pub fn margin_report(quote: &Quote, min_margin: Decimal) -> QuoteMarginReport {
    let mut lines = Vec::with_capacity(quote.lines.len());
    let mut cost_total = Decimal::ZERO;
    let mut net_total = Decimal::ZERO;

    for line in &quote.lines {
        let costed = line.cost_price.filter(|cost| !cost.is_zero()).map(|cost| {
            let line_cost = round2(cost * line.quantity);
            let profit = round2(line.amounts.net - line_cost);
            (line_cost, profit, ratio_percent(profit, line_cost))
        });

        if let Some((line_cost, _, _)) = costed {
            cost_total += line_cost;
            net_total += line.amounts.net;
        }

        lines.push(LineMargin {
            position: line.position,
            product_name: line.product_name.clone(),
            net: line.amounts.net,
            cost_total: costed.map(|(line_cost, _, _)| line_cost),
            profit: costed.map(|(_, profit, _)| profit),
            realized_margin: costed.map(|(_, _, realized)| realized),
            discount_percent: line.discount_percent,
            below_floor: costed.is_some_and(|(_, _, realized)| realized < min_margin),
        });
    }

    let profit = round2(net_total - cost_total);
    QuoteMarginReport {
        quote_id: quote.id.clone(),
        min_margin,
        lines_below_floor: lines.iter().filter(|line| line.below_floor).count(),
        lines_without_cost: lines.iter().filter(|line| line.cost_total.is_none()).count(),
        lines,
        cost_total: round2(cost_total),
        net_total: round2(net_total),
        profit,
        realized_margin: ratio_percent(profit, cost_total),
    }
}
