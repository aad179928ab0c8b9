use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::line::LineAmounts;
use crate::money::{percent_of, round2, sum_rounded};

/// VAT applied to the additional-costs amount, independent of line rates.
pub const ADDITIONAL_COSTS_VAT_RATE: Decimal = Decimal::from_parts(23, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub total_net: Decimal,
    pub total_vat: Decimal,
    pub total_gross: Decimal,
}

pub fn additional_costs_vat(additional_costs_net: Decimal) -> Decimal {
    round2(percent_of(additional_costs_net, ADDITIONAL_COSTS_VAT_RATE))
}

pub fn aggregate(lines: &[LineAmounts], additional_costs_net: Decimal) -> QuoteTotals {
    let lines_net = sum_rounded(lines.iter().map(|line| line.net));
    let lines_vat = sum_rounded(lines.iter().map(|line| line.vat));

    let total_net = round2(lines_net + additional_costs_net);
    let total_vat = round2(lines_vat + additional_costs_vat(additional_costs_net));
    let total_gross = round2(total_net + total_vat);

    QuoteTotals { total_net, total_vat, total_gross }
}
