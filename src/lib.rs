// Client-side core of the Treehouse hotel booking system: the reservation
// calculator, the booking session flow and the remote room/booking API client

pub mod api;
pub mod booking;
pub mod payment;
pub mod quote;
pub mod room;
pub mod session;

// Re-export key types for convenience
pub use api::{ApiError, ClientConfig, ClientError, ClientStats, HotelApi, HotelApiClient};
pub use booking::{
    BookingDraft, BookingRecord, BookingRequest, DraftField, RoomPriceInfo, ValidationError,
};
pub use payment::{
    PaymentError, PaymentGateway, PaymentReceipt, PaymentRequest, SimulatedPaymentGateway,
};
pub use quote::{compute_quote, is_guest_count_valid, ReservationQuote};
pub use room::{filter_rooms, paginate, Room, RoomCatalog, RoomFilter, RoomForm, RoomPage};
pub use session::{BookingSession, BookingSessionState, BookingSummary, Navigation, SessionError};
