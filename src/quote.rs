// Reservation calculator: stay length, payment total and booking-date/guest
// validation derived from a draft and a nightly price

use crate::booking::{BookingDraft, ValidationError};

// Derived view of a draft and a price, never persisted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservationQuote {
    pub nights: i64,
    pub total_payment: f64,
    pub is_payable: bool,
}

/// Computes the quote for `draft` at `unit_price` per night.
///
/// Nights are counted only when both dates parse, otherwise zero. A check-out
/// before check-in yields a negative night count and total; only
/// `is_payable` decides whether the amount may be charged, and it requires a
/// positive night count as well as a positive total.
pub fn compute_quote(draft: &BookingDraft, unit_price: Option<f64>) -> ReservationQuote {
    let nights = match (draft.check_in(), draft.check_out()) {
        (Some(check_in), Some(check_out)) => (check_out - check_in).num_days(),
        _ => 0,
    };
    let price = unit_price.unwrap_or(0.0);
    let total_payment = nights as f64 * price;

    ReservationQuote {
        nights,
        total_payment,
        is_payable: nights > 0 && total_payment > 0.0,
    }
}

// Check-out must be the same day as or after check-in
pub fn check_date_order(draft: &BookingDraft) -> Result<(), ValidationError> {
    match (draft.check_in(), draft.check_out()) {
        (Some(check_in), Some(check_out)) if check_out >= check_in => Ok(()),
        _ => Err(ValidationError::DateOrder),
    }
}

pub fn is_guest_count_valid(adults: u32, children: u32) -> bool {
    adults >= 1 && adults.checked_add(children).is_some_and(|total| total >= 1)
}

// Counts whose sum overflows are rejected
pub fn check_guest_count(draft: &BookingDraft) -> Result<(), ValidationError> {
    if is_guest_count_valid(draft.adults(), draft.children()) {
        Ok(())
    } else {
        Err(ValidationError::GuestCount)
    }
}

// Both domain checks; the date error takes precedence
pub fn check_domain(draft: &BookingDraft) -> Result<(), ValidationError> {
    check_date_order(draft)?;
    check_guest_count(draft)
}
