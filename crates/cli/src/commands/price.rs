//! Offline pricing of a quote draft. Nothing is read from or written to the
//! database; the output is exactly what quote creation would store as amounts.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use offerdesk_core::cpq::price_lines;
use offerdesk_core::services::NewQuote;

use crate::commands::CommandResult;

pub fn run(path: &Path) -> CommandResult {
    let draft = match load_draft(path) {
        Ok(draft) => draft,
        Err(error) => {
            return CommandResult::failure("price", "input_read", format!("{error:#}"), 7);
        }
    };

    if let Err(error) = draft.validate() {
        return CommandResult::failure("price", "quote_validation", error.to_string(), 8);
    }

    let priced = match price_lines(&draft.lines, draft.additional_costs) {
        Ok(priced) => priced,
        Err(error) => {
            return CommandResult::failure("price", "quote_validation", error.to_string(), 8);
        }
    };

    let message = format!(
        "{} line(s) for {}: net {} vat {} gross {}",
        priced.lines.len(),
        draft.client.name,
        priced.totals.total_net,
        priced.totals.total_vat,
        priced.totals.total_gross
    );
    match serde_json::to_value(&priced) {
        Ok(data) => CommandResult::success_with_data("price", message, Some(data)),
        Err(error) => CommandResult::failure("price", "serialization", error.to_string(), 9),
    }
}

fn load_draft(path: &Path) -> Result<NewQuote> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read quote draft `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse quote draft `{}`", path.display()))
}
