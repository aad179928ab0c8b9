use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDiscount {
    pub client_id: ClientId,
    pub product_id: ProductId,
    pub discount_percent: Decimal,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl ClientDiscount {
    /// Open-ended bounds always match.
    pub fn is_effective_on(&self, day: NaiveDate) -> bool {
        let started = self.valid_from.map_or(true, |from| from <= day);
        let not_ended = self.valid_until.map_or(true, |until| day <= until);
        started && not_ended
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{ClientDiscount, ClientId};
    use crate::domain::product::ProductId;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn discount(from: Option<NaiveDate>, until: Option<NaiveDate>) -> ClientDiscount {
        ClientDiscount {
            client_id: ClientId("C-1".to_string()),
            product_id: ProductId("P-1".to_string()),
            discount_percent: Decimal::from(5),
            valid_from: from,
            valid_until: until,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn open_window_is_always_effective() {
        assert!(discount(None, None).is_effective_on(day(2026, 1, 1)));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let windowed = discount(Some(day(2026, 3, 1)), Some(day(2026, 3, 31)));
        assert!(windowed.is_effective_on(day(2026, 3, 1)));
        assert!(windowed.is_effective_on(day(2026, 3, 31)));
        assert!(!windowed.is_effective_on(day(2026, 2, 28)));
        assert!(!windowed.is_effective_on(day(2026, 4, 1)));
    }
}
