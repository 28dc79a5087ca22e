use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Both dates present and `check_out > check_in`, within the bookable window.
pub(crate) fn require_stay(
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
) -> Result<Stay, EngineError> {
    let (Some(check_in), Some(check_out)) = (check_in, check_out) else {
        return Err(EngineError::validation("check-in and check-out dates are required"));
    };
    let stay = Stay::try_new(check_in, check_out)
        .ok_or_else(|| EngineError::validation("check-out must be after check-in"))?;
    validate_stay(&stay)?;
    Ok(stay)
}

pub(crate) fn validate_stay(stay: &Stay) -> Result<(), EngineError> {
    let in_window = |d: NaiveDate| (MIN_BOOKING_YEAR..=MAX_BOOKING_YEAR).contains(&d.year());
    if !in_window(stay.check_in) || !in_window(stay.check_out) {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

pub(crate) fn validate_amount(field: &str, amount: Decimal) -> Result<(), EngineError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(EngineError::validation(format!("{field} must not be negative")));
    }
    Ok(())
}

/// Trimmed, non-empty, bounded text.
pub(crate) fn require_text(
    field: &str,
    value: &str,
    max_len: usize,
    too_long: &'static str,
) -> Result<String, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::validation(format!("{field} is required")));
    }
    if value.len() > max_len {
        return Err(EngineError::LimitExceeded(too_long));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn require_stay_rejects_missing_dates() {
        assert!(matches!(
            require_stay(None, Some(d("2024-01-12"))),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            require_stay(Some(d("2024-01-10")), None),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn require_stay_rejects_inverted_and_empty_ranges() {
        for (a, b) in [("2024-01-12", "2024-01-10"), ("2024-01-10", "2024-01-10")] {
            let err = require_stay(Some(d(a)), Some(d(b))).unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{a}..{b}: {err}");
        }
    }

    #[test]
    fn require_stay_enforces_window() {
        assert!(matches!(
            require_stay(Some(d("1999-12-30")), Some(d("2000-01-02"))),
            Err(EngineError::LimitExceeded(_))
        ));
        assert!(matches!(
            require_stay(Some(d("2024-01-01")), Some(d("2025-06-01"))),
            Err(EngineError::LimitExceeded("stay too long"))
        ));
        let stay = require_stay(Some(d("2024-01-01")), Some(d("2024-12-31"))).unwrap();
        assert_eq!(stay.nights(), 365);
    }

    #[test]
    fn amounts_must_not_be_negative() {
        assert!(validate_amount("total_amount", Decimal::ZERO).is_ok());
        assert!(validate_amount("total_amount", Decimal::new(-1, 2)).is_err());
        assert!(validate_amount("paid_amount", Decimal::new(999, 0)).is_ok());
    }

    #[test]
    fn text_is_trimmed_and_bounded() {
        assert_eq!(require_text("number", " 101 ", 16, "too long").unwrap(), "101");
        assert!(matches!(
            require_text("number", "   ", 16, "too long"),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            require_text("number", &"9".repeat(17), 16, "too long"),
            Err(EngineError::LimitExceeded("too long"))
        ));
    }
}
