// Booking session flow: draft entry, validation, summary, payment and the
// remote booking submission for a single room

use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::api::{ApiError, HotelApi};
use crate::booking::{BookingDraft, BookingRequest, DraftField, RoomPriceInfo, ValidationError};
use crate::payment::{PaymentGateway, PaymentRequest};
use crate::quote::{check_domain, compute_quote, ReservationQuote};
use crate::room::Room;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Booking submission already in flight")]
    SubmissionInFlight,

    #[error("Booking is not payable (total payment {0})")]
    NotPayable(f64),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingSessionState {
    Drafting,
    Validating,
    SummaryShown,
    ConfirmingPayment,
    Confirmed { confirmation_code: String },
    Failed { reason: String },
}

impl BookingSessionState {
    pub fn name(&self) -> &'static str {
        match self {
            BookingSessionState::Drafting => "drafting",
            BookingSessionState::Validating => "validating",
            BookingSessionState::SummaryShown => "summary_shown",
            BookingSessionState::ConfirmingPayment => "confirming_payment",
            BookingSessionState::Confirmed { .. } => "confirmed",
            BookingSessionState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingSessionState::Confirmed { .. } | BookingSessionState::Failed { .. }
        )
    }
}

// Where the container should go once the session ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    BookingSuccess { confirmation_code: String },
    Home { error: String },
}

// Draft and quote presented for review before confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct BookingSummary {
    pub draft: BookingDraft,
    pub quote: ReservationQuote,
}

/// One reservation attempt for one room.
///
/// The session owns the draft, the price snapshot and the flow state. Editing
/// is synchronous; the price fetch started on entry to drafting, the payment
/// step and the booking call are the only asynchronous operations.
///
/// Starting a session spawns the price fetch, so it must be created inside a
/// tokio runtime.
pub struct BookingSession {
    room_id: i64,
    draft: BookingDraft,
    price: Option<RoomPriceInfo>,
    pending_price: Option<JoinHandle<Result<Room, ApiError>>>,
    state: BookingSessionState,
    last_error: Option<ValidationError>,
    idempotency_key: String,
    api: Arc<dyn HotelApi>,
    payment: Arc<dyn PaymentGateway>,
}

impl std::fmt::Debug for BookingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingSession")
            .field("room_id", &self.room_id)
            .field("state", &self.state)
            .field("price", &self.price)
            .field("last_error", &self.last_error)
            .field("idempotency_key", &self.idempotency_key)
            .finish_non_exhaustive()
    }
}

pub const ABANDONED_CONFIRMATION: &str = "Booking confirmation was abandoned";

// Fails the session if a confirmation is dropped before it settles
struct ConfirmingGuard<'a> {
    session: &'a mut BookingSession,
}

impl Drop for ConfirmingGuard<'_> {
    fn drop(&mut self) {
        if self.session.state == BookingSessionState::ConfirmingPayment {
            self.session.fail(ABANDONED_CONFIRMATION.to_string());
        }
    }
}

fn new_idempotency_key() -> String {
    format!(
        "bk_{:016x}{:016x}",
        rand::random::<u64>(),
        rand::random::<u64>()
    )
}

impl BookingSession {
    pub fn start(room_id: i64, api: Arc<dyn HotelApi>, payment: Arc<dyn PaymentGateway>) -> Self {
        let mut session = Self {
            room_id,
            draft: BookingDraft::default(),
            price: None,
            pending_price: None,
            state: BookingSessionState::Drafting,
            last_error: None,
            idempotency_key: new_idempotency_key(),
            api,
            payment,
        };
        session.fetch_price();
        session
    }

    pub fn room_id(&self) -> i64 {
        self.room_id
    }

    pub fn state(&self) -> &BookingSessionState {
        &self.state
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn price(&self) -> Option<&RoomPriceInfo> {
        self.price.as_ref()
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    pub fn last_error(&self) -> Option<&ValidationError> {
        self.last_error.as_ref()
    }

    // Text for the form's error line
    pub fn error_message(&self) -> Option<String> {
        self.last_error.as_ref().map(ToString::to_string)
    }

    // Quote for the current draft and the price known so far
    pub fn quote(&self) -> ReservationQuote {
        compute_quote(&self.draft, self.price.as_ref().map(|price| price.unit_price))
    }

    pub fn summary(&self) -> Option<BookingSummary> {
        match self.state {
            BookingSessionState::SummaryShown => Some(BookingSummary {
                draft: self.draft.clone(),
                quote: self.quote(),
            }),
            _ => None,
        }
    }

    fn transition(&mut self, next: BookingSessionState) {
        tracing::debug!(
            room_id = self.room_id,
            from = self.state.name(),
            to = next.name(),
            "booking session transition"
        );
        self.state = next;
    }

    fn fetch_price(&mut self) {
        let api = Arc::clone(&self.api);
        let room_id = self.room_id;
        self.pending_price = Some(tokio::spawn(async move { api.get_room_by_id(room_id).await }));
    }

    /// Waits for the price fetch started on entry to drafting.
    ///
    /// A failed fetch is not fatal: the price stays unset, which makes every
    /// quote non-payable.
    pub async fn wait_for_price(&mut self) -> Option<&RoomPriceInfo> {
        if let Some(handle) = self.pending_price.take() {
            match handle.await {
                Ok(Ok(room)) => {
                    tracing::debug!(room_id = room.id, unit_price = room.room_price, "room price loaded");
                    self.price = Some(RoomPriceInfo::from(&room));
                }
                Ok(Err(e)) => {
                    tracing::warn!(room_id = self.room_id, error = %e, "room price unavailable");
                    self.price = None;
                }
                Err(e) => {
                    tracing::warn!(room_id = self.room_id, error = %e, "room price fetch aborted");
                    self.price = None;
                }
            }
        }
        self.price.as_ref()
    }

    /// Applies raw form input to a draft field and clears the last error.
    ///
    /// Editing while the summary is shown hides it again; the draft has to be
    /// resubmitted before it can be confirmed.
    pub fn set_field(&mut self, field: DraftField, raw: &str) -> Result<(), SessionError> {
        match self.state {
            BookingSessionState::Drafting => {}
            BookingSessionState::SummaryShown => self.transition(BookingSessionState::Drafting),
            _ => {
                return Err(SessionError::InvalidTransition {
                    action: "edit the draft",
                    state: self.state.name(),
                })
            }
        }

        self.last_error = None;
        if let Err(e) = self.draft.set(field, raw) {
            self.last_error = Some(e.clone());
            return Err(e.into());
        }
        Ok(())
    }

    // Back to drafting with the error shown on the form
    fn reject(&mut self, error: ValidationError) -> SessionError {
        tracing::debug!(room_id = self.room_id, %error, "booking draft rejected");
        self.last_error = Some(error.clone());
        self.transition(BookingSessionState::Drafting);
        SessionError::Validation(error)
    }

    /// Validates the draft and shows the summary.
    ///
    /// Structural validity (required fields present and well-typed) is checked
    /// first, then the date order and the guest count. Any failure returns the
    /// session to drafting with the error recorded.
    pub async fn submit(&mut self) -> Result<ReservationQuote, SessionError> {
        match self.state {
            BookingSessionState::Drafting | BookingSessionState::SummaryShown => {}
            _ => {
                return Err(SessionError::InvalidTransition {
                    action: "submit",
                    state: self.state.name(),
                })
            }
        }

        self.wait_for_price().await;
        self.transition(BookingSessionState::Validating);

        if let Err(e) = self.draft.check_structure() {
            return Err(self.reject(e));
        }
        if let Err(e) = check_domain(&self.draft) {
            return Err(self.reject(e));
        }

        self.last_error = None;
        let quote = self.quote();
        self.transition(BookingSessionState::SummaryShown);
        Ok(quote)
    }

    /// Confirms the reviewed booking: awaits the payment gateway, then submits
    /// the booking with the session's idempotency key.
    ///
    /// Returns where to navigate next. A rejected payment or booking ends the
    /// session in `Failed` and discards the draft; there is no retry in place.
    /// Dropping the returned future before it completes also fails the
    /// session, after which it can be restarted.
    pub async fn confirm(&mut self) -> Result<Navigation, SessionError> {
        match self.state {
            BookingSessionState::SummaryShown => {}
            BookingSessionState::ConfirmingPayment => return Err(SessionError::SubmissionInFlight),
            _ => {
                return Err(SessionError::InvalidTransition {
                    action: "confirm",
                    state: self.state.name(),
                })
            }
        }

        check_domain(&self.draft)?;
        let quote = self.quote();
        if !quote.is_payable {
            return Err(SessionError::NotPayable(quote.total_payment));
        }
        let request = BookingRequest::try_from(&self.draft)?;

        self.transition(BookingSessionState::ConfirmingPayment);
        let mut confirming = ConfirmingGuard { session: self };
        let navigation = confirming.session.settle(quote, request).await;
        Ok(navigation)
    }

    // Payment then booking; always leaves the session Confirmed or Failed
    async fn settle(&mut self, quote: ReservationQuote, request: BookingRequest) -> Navigation {
        let payment = PaymentRequest {
            amount: quote.total_payment,
            guest_email: request.guest_email.clone(),
            idempotency_key: self.idempotency_key.clone(),
        };
        let charged = self.payment.charge(payment).await;
        if let Err(e) = charged {
            return self.fail(e.to_string());
        }

        let booked = self
            .api
            .book_room(self.room_id, &request, &self.idempotency_key)
            .await;
        match booked {
            Ok(confirmation_code) => {
                tracing::info!(
                    room_id = self.room_id,
                    %confirmation_code,
                    nights = quote.nights,
                    total_payment = quote.total_payment,
                    "room booked"
                );
                self.transition(BookingSessionState::Confirmed {
                    confirmation_code: confirmation_code.clone(),
                });
                Navigation::BookingSuccess { confirmation_code }
            }
            Err(e) => self.fail(e.user_message()),
        }
    }

    fn fail(&mut self, reason: String) -> Navigation {
        tracing::error!(room_id = self.room_id, %reason, "booking failed");
        self.draft = BookingDraft::default();
        self.transition(BookingSessionState::Failed {
            reason: reason.clone(),
        });
        Navigation::Home { error: reason }
    }

    /// Starts over for `room_id`: discards the draft, issues a new idempotency
    /// key and fetches the room's price again.
    pub fn restart(&mut self, room_id: i64) -> Result<(), SessionError> {
        if self.state == BookingSessionState::ConfirmingPayment {
            return Err(SessionError::SubmissionInFlight);
        }
        if let Some(handle) = self.pending_price.take() {
            handle.abort();
        }

        self.room_id = room_id;
        self.draft = BookingDraft::default();
        self.price = None;
        self.last_error = None;
        self.idempotency_key = new_idempotency_key();
        self.transition(BookingSessionState::Drafting);
        self.fetch_price();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock_server::MockHotelApi;
    use crate::payment::{PaymentError, PaymentReceipt, SimulatedPaymentGateway};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::Instant;

    struct DecliningGateway;

    #[async_trait]
    impl PaymentGateway for DecliningGateway {
        async fn charge(&self, _request: PaymentRequest) -> Result<PaymentReceipt, PaymentError> {
            Err(PaymentError::Declined("card expired".to_string()))
        }
    }

    async fn api_with_rooms() -> Arc<MockHotelApi> {
        let api = Arc::new(MockHotelApi::new());
        api.add_room_record(Room {
            id: 1,
            room_type: "Double".to_string(),
            room_price: 100.0,
            photo: None,
            is_booked: false,
        })
        .await;
        api.add_room_record(Room {
            id: 2,
            room_type: "Suite".to_string(),
            room_price: 250.0,
            photo: None,
            is_booked: false,
        })
        .await;
        api
    }

    fn instant_payment() -> Arc<dyn PaymentGateway> {
        Arc::new(SimulatedPaymentGateway::new(Duration::ZERO))
    }

    fn fill(session: &mut BookingSession, check_in: &str, check_out: &str, adults: &str, children: &str) {
        session.set_field(DraftField::GuestName, "Ada Lovelace").unwrap();
        session.set_field(DraftField::GuestEmail, "ada@example.com").unwrap();
        session.set_field(DraftField::CheckInDate, check_in).unwrap();
        session.set_field(DraftField::CheckOutDate, check_out).unwrap();
        session.set_field(DraftField::NumberOfAdults, adults).unwrap();
        session.set_field(DraftField::NumberOfChildren, children).unwrap();
    }

    async fn submit_and_confirm(session: &mut BookingSession) -> Navigation {
        session.submit().await.unwrap();
        session.confirm().await.unwrap()
    }

    #[tokio::test]
    async fn test_successful_booking_flow() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api.clone(), instant_payment());
        assert_eq!(session.state(), &BookingSessionState::Drafting);

        fill(&mut session, "2024-03-01", "2024-03-04", "2", "1");
        let quote = session.submit().await.unwrap();
        assert_eq!(session.state(), &BookingSessionState::SummaryShown);
        assert_eq!(quote.nights, 3);
        assert_eq!(quote.total_payment, 300.0);
        assert!(quote.is_payable);

        let summary = session.summary().unwrap();
        assert_eq!(summary.draft.guest_name, "Ada Lovelace");
        assert_eq!(summary.quote, quote);

        let navigation = session.confirm().await.unwrap();
        let confirmation_code = match &navigation {
            Navigation::BookingSuccess { confirmation_code } => confirmation_code.clone(),
            other => panic!("Expected booking success, got {:?}", other),
        };
        assert!(!confirmation_code.is_empty());
        assert_eq!(
            session.state(),
            &BookingSessionState::Confirmed {
                confirmation_code: confirmation_code.clone()
            }
        );

        let requests = api.booking_requests().await;
        assert_eq!(requests.len(), 1);
        let (room_id, request, key) = &requests[0];
        assert_eq!(*room_id, 1);
        assert_eq!(request.total_num_of_guest, 3);
        assert_eq!(key, session.idempotency_key());

        let booking = api
            .get_booking_by_confirmation_code(&confirmation_code)
            .await
            .unwrap();
        assert_eq!(booking.guest_email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_rejected_booking_exposes_server_message() {
        let api = api_with_rooms().await;
        api.reject_bookings_with(400, "Room not available").await;
        let mut session = BookingSession::start(1, api.clone(), instant_payment());

        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await.unwrap();
        let navigation = session.confirm().await.unwrap();

        assert_eq!(
            navigation,
            Navigation::Home {
                error: "Room not available".to_string()
            }
        );
        assert_eq!(
            session.state(),
            &BookingSessionState::Failed {
                reason: "Room not available".to_string()
            }
        );
        // Draft is discarded on failure
        assert_eq!(session.draft(), &BookingDraft::default());
        assert_eq!(api.booking_calls(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_uses_generic_message() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api.clone(), instant_payment());
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await.unwrap();

        api.set_outage(true);
        let navigation = session.confirm().await.unwrap();
        assert_eq!(
            navigation,
            Navigation::Home {
                error: "Error booking room: Service unavailable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reversed_dates_return_to_drafting_with_message() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api, instant_payment());
        fill(&mut session, "2024-03-04", "2024-03-01", "1", "0");

        let err = session.submit().await.unwrap_err();
        assert_eq!(err, SessionError::Validation(ValidationError::DateOrder));
        assert_eq!(session.state(), &BookingSessionState::Drafting);
        assert_eq!(
            session.error_message().as_deref(),
            Some("Check-out date must come after check-in date")
        );
        assert!(session.summary().is_none());

        // Editing clears the message
        session.set_field(DraftField::CheckOutDate, "2024-03-06").unwrap();
        assert!(session.error_message().is_none());
        assert!(session.submit().await.is_ok());
    }

    #[tokio::test]
    async fn test_guest_count_failure_is_reported() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api, instant_payment());
        fill(&mut session, "2024-03-01", "2024-03-04", "0", "2");

        let err = session.submit().await.unwrap_err();
        assert_eq!(err, SessionError::Validation(ValidationError::GuestCount));
        assert_eq!(session.state(), &BookingSessionState::Drafting);
        assert_eq!(
            session.error_message().as_deref(),
            Some("Please select at least 1 adult")
        );
    }

    #[tokio::test]
    async fn test_overflowing_guest_total_is_reported() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api.clone(), instant_payment());
        fill(&mut session, "2024-03-01", "2024-03-04", "4294967295", "1");

        let err = session.submit().await.unwrap_err();
        assert_eq!(err, SessionError::Validation(ValidationError::GuestCount));
        assert_eq!(session.state(), &BookingSessionState::Drafting);
        assert_eq!(api.booking_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_fields_block_submission() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api, instant_payment());
        session.set_field(DraftField::GuestName, "Ada Lovelace").unwrap();

        let err = session.submit().await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Validation(ValidationError::MissingField(DraftField::GuestEmail))
        );
        assert_eq!(session.state(), &BookingSessionState::Drafting);
    }

    #[tokio::test]
    async fn test_negative_children_rejected_at_input() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api, instant_payment());

        let err = session
            .set_field(DraftField::NumberOfChildren, "-1")
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::InvalidField { .. })
        ));
        assert!(session.error_message().is_some());
        assert_eq!(session.draft().number_of_children, None);
    }

    #[tokio::test]
    async fn test_price_fetch_failure_is_not_fatal() {
        let api = api_with_rooms().await;
        // Unknown room: the lookup is rejected
        let mut session = BookingSession::start(99, api.clone(), instant_payment());
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");

        let quote = session.submit().await.unwrap();
        assert!(session.price().is_none());
        assert_eq!(quote.nights, 3);
        assert_eq!(quote.total_payment, 0.0);
        assert!(!quote.is_payable);

        let err = session.confirm().await.unwrap_err();
        assert_eq!(err, SessionError::NotPayable(0.0));
        assert_eq!(session.state(), &BookingSessionState::SummaryShown);
        assert_eq!(api.booking_calls(), 0);
    }

    #[tokio::test]
    async fn test_same_day_stay_is_shown_but_not_payable() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api, instant_payment());
        fill(&mut session, "2024-03-01", "2024-03-01", "1", "0");

        let quote = session.submit().await.unwrap();
        assert_eq!(quote.nights, 0);
        assert_eq!(session.state(), &BookingSessionState::SummaryShown);
        assert!(matches!(
            session.confirm().await,
            Err(SessionError::NotPayable(_))
        ));
    }

    #[tokio::test]
    async fn test_editing_summary_requires_resubmission() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api, instant_payment());
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await.unwrap();

        session.set_field(DraftField::CheckOutDate, "2024-03-08").unwrap();
        assert_eq!(session.state(), &BookingSessionState::Drafting);
        assert!(matches!(
            session.confirm().await,
            Err(SessionError::InvalidTransition { .. })
        ));

        let quote = session.submit().await.unwrap();
        assert_eq!(quote.nights, 7);
        assert_eq!(quote.total_payment, 700.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_awaits_payment() {
        let api = api_with_rooms().await;
        let payment: Arc<dyn PaymentGateway> = Arc::new(SimulatedPaymentGateway::default());
        let mut session = BookingSession::start(1, api.clone(), payment);
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await.unwrap();

        let started = Instant::now();
        let navigation = session.confirm().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(matches!(navigation, Navigation::BookingSuccess { .. }));
        assert_eq!(api.booking_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_payment_fails_session_and_allows_restart() {
        let api = api_with_rooms().await;
        let payment: Arc<dyn PaymentGateway> = Arc::new(SimulatedPaymentGateway::default());
        let mut session = BookingSession::start(1, api.clone(), payment);
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await.unwrap();

        // Give up on the confirmation while payment is still processing
        let abandoned = tokio::time::timeout(Duration::from_millis(10), session.confirm()).await;
        assert!(abandoned.is_err());
        assert_eq!(
            session.state(),
            &BookingSessionState::Failed {
                reason: ABANDONED_CONFIRMATION.to_string()
            }
        );
        assert!(matches!(
            session.confirm().await,
            Err(SessionError::InvalidTransition { action: "confirm", state: "failed" })
        ));

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(api.booking_calls(), 0);

        let first_key = session.idempotency_key().to_string();
        session.restart(2).unwrap();
        assert_eq!(session.state(), &BookingSessionState::Drafting);
        assert_ne!(session.idempotency_key(), first_key);

        fill(&mut session, "2024-03-01", "2024-03-03", "1", "0");
        let navigation = submit_and_confirm(&mut session).await;
        assert!(matches!(navigation, Navigation::BookingSuccess { .. }));
        assert_eq!(api.booking_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_booking_call_releases_idempotency_key() {
        let api = api_with_rooms().await;
        api.set_booking_delay(1000);
        let mut session = BookingSession::start(1, api.clone(), instant_payment());
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await.unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(10), session.confirm()).await;
        assert!(abandoned.is_err());
        assert!(matches!(session.state(), BookingSessionState::Failed { .. }));
        assert_eq!(api.booking_calls(), 1);
        assert_eq!(api.bookings_in_flight(), 0);
        assert!(api.booking_requests().await.is_empty());

        session.restart(1).unwrap();
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        let navigation = submit_and_confirm(&mut session).await;
        assert!(matches!(navigation, Navigation::BookingSuccess { .. }));
        assert_eq!(api.booking_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_while_payment_in_flight_is_rejected() {
        let api = api_with_rooms().await;
        let payment: Arc<dyn PaymentGateway> = Arc::new(SimulatedPaymentGateway::default());
        let mut session = BookingSession::start(1, api.clone(), payment);
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await.unwrap();

        // A confirmation that is neither finished nor dropped keeps the
        // session locked
        let mut confirming = Box::pin(session.confirm());
        assert!(futures::poll!(confirming.as_mut()).is_pending());
        std::mem::forget(confirming);

        assert_eq!(session.state(), &BookingSessionState::ConfirmingPayment);
        assert_eq!(session.confirm().await, Err(SessionError::SubmissionInFlight));
        assert_eq!(session.restart(2), Err(SessionError::SubmissionInFlight));
        assert_eq!(api.booking_calls(), 0);
    }

    #[tokio::test]
    async fn test_declined_payment_fails_session() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api.clone(), Arc::new(DecliningGateway));
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await.unwrap();

        let navigation = session.confirm().await.unwrap();
        assert_eq!(
            navigation,
            Navigation::Home {
                error: "Payment declined: card expired".to_string()
            }
        );
        assert!(session.state().is_terminal());
        assert_eq!(api.booking_calls(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_session_is_terminal() {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api.clone(), instant_payment());
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await.unwrap();
        session.confirm().await.unwrap();

        assert!(matches!(
            session.confirm().await,
            Err(SessionError::InvalidTransition { action: "confirm", state: "confirmed" })
        ));
        assert!(session.set_field(DraftField::GuestName, "Someone Else").is_err());
        assert!(session.submit().await.is_err());
        assert_eq!(api.booking_calls(), 1);
    }

    #[tokio::test]
    async fn test_restart_for_another_room() -> anyhow::Result<()> {
        let api = api_with_rooms().await;
        let mut session = BookingSession::start(1, api, instant_payment());
        fill(&mut session, "2024-03-01", "2024-03-04", "1", "0");
        session.submit().await?;
        assert_eq!(session.price().map(|price| price.unit_price), Some(100.0));
        let first_key = session.idempotency_key().to_string();

        session.restart(2)?;
        assert_eq!(session.room_id(), 2);
        assert_eq!(session.state(), &BookingSessionState::Drafting);
        assert_eq!(session.draft(), &BookingDraft::default());
        assert_ne!(session.idempotency_key(), first_key);

        let price = session.wait_for_price().await.cloned();
        assert_eq!(
            price,
            Some(RoomPriceInfo {
                room_id: 2,
                unit_price: 250.0
            })
        );

        fill(&mut session, "2024-03-01", "2024-03-03", "1", "0");
        assert_eq!(session.submit().await?.total_payment, 500.0);
        Ok(())
    }
}
