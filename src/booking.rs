// Booking data model: the guest-editable draft, the room price snapshot and
// the wire payloads exchanged with the booking API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::room::Room;

// Date format used by the form inputs and the API
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// Validation errors raised while editing or submitting a draft
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(DraftField),

    #[error("Invalid value for {field}: {value}")]
    InvalidField { field: DraftField, value: String },

    #[error("Check-out date must come after check-in date")]
    DateOrder,

    #[error("Please select at least 1 adult")]
    GuestCount,
}

// Form fields of the booking draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    GuestName,
    GuestEmail,
    CheckInDate,
    CheckOutDate,
    NumberOfAdults,
    NumberOfChildren,
}

impl DraftField {
    // Name of the field as the form and the API know it
    pub fn name(&self) -> &'static str {
        match self {
            DraftField::GuestName => "guestName",
            DraftField::GuestEmail => "guestEmail",
            DraftField::CheckInDate => "checkInDate",
            DraftField::CheckOutDate => "checkOutDate",
            DraftField::NumberOfAdults => "numberOfAdults",
            DraftField::NumberOfChildren => "numberOfChildren",
        }
    }
}

impl std::fmt::Display for DraftField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// In-progress booking data entered by the guest.
///
/// Dates are kept as the raw form text so that an unset or malformed date can
/// be represented; use [`BookingDraft::check_in`] and
/// [`BookingDraft::check_out`] for the parsed values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub guest_name: String,
    pub guest_email: String,
    pub check_in_date: String,
    pub check_out_date: String,
    pub number_of_adults: Option<u32>,
    pub number_of_children: Option<u32>,
}

impl BookingDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_in(&self) -> Option<NaiveDate> {
        parse_date(&self.check_in_date)
    }

    pub fn check_out(&self) -> Option<NaiveDate> {
        parse_date(&self.check_out_date)
    }

    // Adults as entered, blank counts as zero
    pub fn adults(&self) -> u32 {
        self.number_of_adults.unwrap_or(0)
    }

    pub fn children(&self) -> u32 {
        self.number_of_children.unwrap_or(0)
    }

    // None when the two counts do not fit in a u32
    pub fn total_guests(&self) -> Option<u32> {
        self.adults().checked_add(self.children())
    }

    // Apply raw form input to a field. Counts must be non-negative integers;
    // a rejected value leaves the field untouched.
    pub fn set(&mut self, field: DraftField, raw: &str) -> Result<(), ValidationError> {
        match field {
            DraftField::GuestName => self.guest_name = raw.to_string(),
            DraftField::GuestEmail => self.guest_email = raw.to_string(),
            DraftField::CheckInDate => self.check_in_date = raw.trim().to_string(),
            DraftField::CheckOutDate => self.check_out_date = raw.trim().to_string(),
            DraftField::NumberOfAdults => self.number_of_adults = parse_count(field, raw)?,
            DraftField::NumberOfChildren => self.number_of_children = parse_count(field, raw)?,
        }
        Ok(())
    }

    // Structural validity: required fields present and of the declared type.
    // The children count is optional.
    pub fn missing_fields(&self) -> Vec<DraftField> {
        let mut missing = Vec::new();
        if self.guest_name.trim().is_empty() {
            missing.push(DraftField::GuestName);
        }
        if self.guest_email.trim().is_empty() {
            missing.push(DraftField::GuestEmail);
        }
        if self.check_in().is_none() {
            missing.push(DraftField::CheckInDate);
        }
        if self.check_out().is_none() {
            missing.push(DraftField::CheckOutDate);
        }
        if self.number_of_adults.is_none() {
            missing.push(DraftField::NumberOfAdults);
        }
        missing
    }

    pub fn check_structure(&self) -> Result<(), ValidationError> {
        match self.missing_fields().first() {
            Some(field) => Err(ValidationError::MissingField(*field)),
            None => Ok(()),
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

fn parse_count(field: DraftField, raw: &str) -> Result<Option<u32>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>()
        .map(Some)
        .map_err(|_| ValidationError::InvalidField {
            field,
            value: raw.to_string(),
        })
}

// Nightly price snapshot for the room being booked
#[derive(Debug, Clone, PartialEq)]
pub struct RoomPriceInfo {
    pub room_id: i64,
    pub unit_price: f64,
}

impl From<&Room> for RoomPriceInfo {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.id,
            unit_price: room.room_price,
        }
    }
}

// Payload sent to the booking endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub guest_full_name: String,
    pub guest_email: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub num_of_adults: u32,
    pub num_of_children: u32,
    pub total_num_of_guest: u32,
}

impl TryFrom<&BookingDraft> for BookingRequest {
    type Error = ValidationError;

    fn try_from(draft: &BookingDraft) -> Result<Self, Self::Error> {
        draft.check_structure()?;
        let check_in_date = draft
            .check_in()
            .ok_or(ValidationError::MissingField(DraftField::CheckInDate))?;
        let check_out_date = draft
            .check_out()
            .ok_or(ValidationError::MissingField(DraftField::CheckOutDate))?;
        let total_num_of_guest = draft.total_guests().ok_or(ValidationError::GuestCount)?;

        Ok(Self {
            guest_full_name: draft.guest_name.trim().to_string(),
            guest_email: draft.guest_email.trim().to_string(),
            check_in_date,
            check_out_date,
            num_of_adults: draft.adults(),
            num_of_children: draft.children(),
            total_num_of_guest,
        })
    }
}

// Booking as returned by the lookup endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: i64,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    #[serde(default, alias = "guestFullName")]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub num_of_adults: u32,
    #[serde(default)]
    pub num_of_children: u32,
    #[serde(default)]
    pub total_num_of_guest: u32,
    pub booking_confirmation_code: String,
    #[serde(default)]
    pub room: Option<Room>,
}
