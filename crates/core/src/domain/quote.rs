use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::aggregate::{aggregate, QuoteTotals};
use crate::cpq::line::LineAmounts;
use crate::domain::client::{ClientId, ClientSnapshot};
use crate::domain::user::UserId;
use crate::errors::{DomainError, ValidationError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 4] = [Self::Draft, Self::Sent, Self::Accepted, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    pub fn permits_editing(&self) -> bool {
        matches!(self, Self::Draft)
    }

    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Sent) | (Self::Sent, Self::Accepted) | (Self::Sent, Self::Rejected)
        )
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ValidationError::UnknownStatus(value.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub position: u32,
    pub product_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
    pub amounts: LineAmounts,
    pub cost_price: Option<Decimal>,
    pub margin_percent: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub original_price: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub owner: UserId,
    pub client_id: Option<ClientId>,
    pub client: ClientSnapshot,
    pub delivery_days: u32,
    pub valid_days: u32,
    pub additional_costs: Decimal,
    pub additional_costs_description: Option<String>,
    pub status: QuoteStatus,
    pub totals: QuoteTotals,
    pub lines: Vec<QuoteLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::days(i64::from(self.valid_days))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    pub fn recomputed_totals(&self) -> QuoteTotals {
        let amounts: Vec<LineAmounts> = self.lines.iter().map(|line| line.amounts).collect();
        aggregate(&amounts, self.additional_costs)
    }

    pub fn transition_to(&mut self, next: QuoteStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            self.updated_at = Utc::now();
            return Ok(());
        }

        Err(DomainError::InvalidQuoteTransition { from: self.status, to: next })
    }

    /// Parse a raw status and apply it. An unrecognized value leaves the quote untouched.
    pub fn apply_status(&mut self, raw: &str) -> Result<QuoteStatus, DomainError> {
        let next = raw.parse::<QuoteStatus>()?;
        self.transition_to(next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{Quote, QuoteId, QuoteLine, QuoteStatus};
    use crate::cpq::aggregate::aggregate;
    use crate::cpq::line::compute_line;
    use crate::domain::client::ClientSnapshot;
    use crate::domain::user::UserId;
    use crate::errors::{DomainError, ValidationError};

    fn quote(status: QuoteStatus) -> Quote {
        let amounts = compute_line(Decimal::from(2), Decimal::from(10), Decimal::from(23));
        let now = Utc::now();
        Quote {
            id: QuoteId("Q-1".to_string()),
            owner: UserId("U-1".to_string()),
            client_id: None,
            client: ClientSnapshot {
                name: "Acme Sp. z o.o.".to_string(),
                email: Some("buyer@acme.test".to_string()),
                phone: None,
            },
            delivery_days: 14,
            valid_days: 30,
            additional_costs: Decimal::ZERO,
            additional_costs_description: None,
            status,
            totals: aggregate(&[amounts], Decimal::ZERO),
            lines: vec![QuoteLine {
                position: 0,
                product_name: "Cable".to_string(),
                unit: "m".to_string(),
                quantity: Decimal::from(2),
                unit_price: Decimal::from(10),
                vat_rate: Decimal::from(23),
                amounts,
                cost_price: None,
                margin_percent: None,
                discount_percent: None,
                original_price: None,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn draft_sent_accepted_is_allowed() {
        let mut quote = quote(QuoteStatus::Draft);
        quote.transition_to(QuoteStatus::Sent).expect("draft->sent");
        quote.transition_to(QuoteStatus::Accepted).expect("sent->accepted");
        assert_eq!(quote.status, QuoteStatus::Accepted);
    }

    #[test]
    fn sent_can_be_rejected() {
        let mut quote = quote(QuoteStatus::Sent);
        quote.apply_status("Rejected").expect("sent->rejected");
        assert_eq!(quote.status, QuoteStatus::Rejected);
    }

    #[test]
    fn draft_cannot_skip_to_terminal_state() {
        let mut quote = quote(QuoteStatus::Draft);
        let error = quote.transition_to(QuoteStatus::Accepted).expect_err("draft->accepted");
        assert!(matches!(error, DomainError::InvalidQuoteTransition { .. }));
        assert_eq!(quote.status, QuoteStatus::Draft);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [QuoteStatus::Accepted, QuoteStatus::Rejected] {
            assert!(terminal.is_terminal());
            for next in QuoteStatus::ALL {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn unknown_status_is_rejected_and_status_kept() {
        let mut quote = quote(QuoteStatus::Sent);
        let error = quote.apply_status("cancelled").expect_err("cancelled is not a status");
        assert_eq!(
            error,
            DomainError::Validation(ValidationError::UnknownStatus("cancelled".to_string()))
        );
        assert_eq!(quote.status, QuoteStatus::Sent);
    }

    #[test]
    fn only_drafts_are_editable() {
        assert!(QuoteStatus::Draft.permits_editing());
        assert!(!QuoteStatus::Sent.permits_editing());
        assert!(!QuoteStatus::Accepted.permits_editing());
    }

    #[test]
    fn expiry_is_created_at_plus_valid_days() {
        let quote = quote(QuoteStatus::Sent);
        assert_eq!(quote.expires_at(), quote.created_at + Duration::days(30));
        assert!(!quote.is_expired(quote.created_at + Duration::days(30)));
        assert!(quote.is_expired(quote.created_at + Duration::days(31)));
    }

    #[test]
    fn recomputed_totals_match_stored_totals() {
        let quote = quote(QuoteStatus::Draft);
        assert_eq!(quote.recomputed_totals(), quote.totals);
    }
}
