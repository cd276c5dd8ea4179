// Client for the remote room/booking API consumed by the booking flow and the
// catalog and admin views

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::booking::{BookingRecord, BookingRequest};
use crate::room::{Room, RoomForm, RoomFormError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("{context}: request timed out after {timeout_ms}ms")]
    Timeout { context: String, timeout_ms: u64 },

    #[error("API error: {status_code} - {message}")]
    ApiResponseError { status_code: u16, message: String },

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Booking submission already in flight for key {0}")]
    DuplicateSubmission(String),

    #[error("Invalid room form: {0}")]
    InvalidRoomForm(#[from] RoomFormError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    // Message shown to the user: the server's own text for rejections, the
    // contextual fallback message otherwise
    pub fn user_message(&self) -> String {
        match self {
            ApiError::ApiResponseError { message, .. } => message.clone(),
            ApiError::NetworkError(message) | ApiError::DecodeError(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

pub const DEFAULT_BASE_URL: &str = "http://localhost:9192";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const BASE_URL_ENV: &str = "HOTEL_API_BASE_URL";
pub const TIMEOUT_ENV: &str = "HOTEL_API_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    // Reads HOTEL_API_BASE_URL and HOTEL_API_TIMEOUT_MS, falling back to the
    // defaults for unset or malformed values
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var(BASE_URL_ENV)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.base_url),
            timeout_ms: env::var(TIMEOUT_ENV)
                .ok()
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(defaults.timeout_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::ConfigError("base_url is empty".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::ConfigError(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_timeout: usize,
    pub duplicate_submissions_rejected: usize,
}

#[async_trait]
pub trait HotelApi: Send + Sync + 'static {
    async fn get_room_by_id(&self, room_id: i64) -> Result<Room, ApiError>;

    // Books the room and returns the confirmation code. At most one call per
    // idempotency key is in flight at a time.
    async fn book_room(
        &self,
        room_id: i64,
        booking: &BookingRequest,
        idempotency_key: &str,
    ) -> Result<String, ApiError>;

    async fn get_all_bookings(&self) -> Result<Vec<BookingRecord>, ApiError>;

    async fn get_booking_by_confirmation_code(
        &self,
        confirmation_code: &str,
    ) -> Result<BookingRecord, ApiError>;

    async fn cancel_booking(&self, booking_id: i64) -> Result<(), ApiError>;

    async fn get_all_rooms(&self) -> Result<Vec<Room>, ApiError>;

    async fn get_room_types(&self) -> Result<Vec<String>, ApiError>;

    // True when the server created the room (HTTP 201)
    async fn add_room(&self, room: &RoomForm) -> Result<bool, ApiError>;

    async fn update_room(&self, room_id: i64, room: &RoomForm) -> Result<Room, ApiError>;

    async fn delete_room(&self, room_id: i64) -> Result<(), ApiError>;

    fn stats(&self) -> ClientStats;
}

// Header carrying the booking idempotency key
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// `reqwest`-backed [`HotelApi`] implementation.
#[derive(Debug)]
pub struct HotelApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    stats: Mutex<ClientStats>,
    in_flight: DashMap<String, ()>,
}

// Removes the idempotency key from the in-flight registry when the booking
// call finishes or its future is dropped
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<String, ()>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

impl HotelApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            config,
            http,
            stats: Mutex::new(ClientStats::default()),
            in_flight: DashMap::new(),
        })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.config.url(path);
        tracing::debug!(%method, %url, "sending request");
        self.http.request(method, url)
    }

    // Sends the request and turns transport failures and non-2xx responses into
    // ApiError, using `context` as the fallback message
    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response, ApiError> {
        self.stats.lock().requests_sent += 1;

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let mut stats = self.stats.lock();
                stats.requests_failed += 1;
                if e.is_timeout() {
                    stats.requests_timeout += 1;
                    tracing::warn!(context, timeout_ms = self.config.timeout_ms, "request timed out");
                    return Err(ApiError::Timeout {
                        context: context.to_string(),
                        timeout_ms: self.config.timeout_ms,
                    });
                }
                tracing::warn!(context, error = %e, "request failed");
                return Err(ApiError::NetworkError(format!("{}: {}", context, e)));
            }
        };

        let status = response.status();
        if status.is_success() {
            self.stats.lock().requests_succeeded += 1;
            return Ok(response);
        }

        self.stats.lock().requests_failed += 1;
        let body = response.text().await.unwrap_or_default();
        let message = error_message_from_body(&body)
            .unwrap_or_else(|| format!("{}: HTTP {}", context, status.as_u16()));
        tracing::warn!(context, status = status.as_u16(), %message, "request rejected");
        Err(ApiError::ApiResponseError {
            status_code: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, context: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path), context).await?;
        decode_json(response, context).await
    }

    fn room_form(room: &RoomForm) -> Result<Form, ApiError> {
        room.validate()?;
        let mut form = Form::new()
            .text("roomType", room.room_type.clone())
            .text("roomPrice", room.room_price.to_string());

        if let Some(photo) = &room.photo {
            let part = Part::bytes(photo.data.to_vec())
                .file_name(photo.file_name.clone())
                .mime_str(&photo.content_type)
                .map_err(|e| ApiError::InvalidRequest(format!("photo content type: {}", e)))?;
            form = form.part("photo", part);
        }
        Ok(form)
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::DecodeError(format!("{}: {}", context, e)))
}

// Server error bodies are either `{"message": ...}` or plain text
pub fn error_message_from_body(body: &str) -> Option<String> {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if !payload.message.trim().is_empty() {
            return Some(payload.message);
        }
    }
    let text = body.trim();
    if text.is_empty() || text.starts_with('{') {
        None
    } else {
        Some(text.to_string())
    }
}

// The booking endpoint answers "Room booked successfully, Your confirmation
// code is :CODE"; a bare code is accepted too
pub fn extract_confirmation_code(body: &str) -> Option<String> {
    let body = body.trim().trim_matches('"');
    let code = match body.rsplit_once(':') {
        Some((_, code)) => code.trim(),
        None => body,
    };
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

#[async_trait]
impl HotelApi for HotelApiClient {
    async fn get_room_by_id(&self, room_id: i64) -> Result<Room, ApiError> {
        self.get_json(&format!("/rooms/room/{}", room_id), "Error fetching room")
            .await
    }

    async fn book_room(
        &self,
        room_id: i64,
        booking: &BookingRequest,
        idempotency_key: &str,
    ) -> Result<String, ApiError> {
        const CONTEXT: &str = "Error booking room";

        match self.in_flight.entry(idempotency_key.to_string()) {
            Entry::Occupied(_) => {
                self.stats.lock().duplicate_submissions_rejected += 1;
                tracing::warn!(room_id, idempotency_key, "duplicate booking submission rejected");
                return Err(ApiError::DuplicateSubmission(idempotency_key.to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            key: idempotency_key.to_string(),
        };

        let request = self
            .request(Method::GET, &format!("/bookings/room/{}/booking", room_id))
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(booking);
        let response = self.send(request, CONTEXT).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::DecodeError(format!("{}: {}", CONTEXT, e)))?;

        extract_confirmation_code(&body).ok_or_else(|| {
            ApiError::DecodeError(format!("{}: empty confirmation code", CONTEXT))
        })
    }

    async fn get_all_bookings(&self) -> Result<Vec<BookingRecord>, ApiError> {
        self.get_json("/bookings/all-bookings", "Error fetching bookings")
            .await
    }

    async fn get_booking_by_confirmation_code(
        &self,
        confirmation_code: &str,
    ) -> Result<BookingRecord, ApiError> {
        self.get_json(
            &format!("/bookings/confirmation/{}", confirmation_code),
            "Error finding booking",
        )
        .await
    }

    async fn cancel_booking(&self, booking_id: i64) -> Result<(), ApiError> {
        let path = format!("/bookings/booking/{}/delete", booking_id);
        self.send(self.request(Method::DELETE, &path), "Error canceling the booking")
            .await?;
        Ok(())
    }

    async fn get_all_rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.get_json("/rooms/all-rooms", "Error fetching rooms").await
    }

    async fn get_room_types(&self) -> Result<Vec<String>, ApiError> {
        self.get_json("/rooms/room/types", "Error fetching room types")
            .await
    }

    async fn add_room(&self, room: &RoomForm) -> Result<bool, ApiError> {
        let form = Self::room_form(room)?;
        let request = self
            .request(Method::POST, "/rooms/add/new-room")
            .multipart(form);
        let response = self.send(request, "Error adding room").await?;
        Ok(response.status() == StatusCode::CREATED)
    }

    async fn update_room(&self, room_id: i64, room: &RoomForm) -> Result<Room, ApiError> {
        const CONTEXT: &str = "Error updating room";
        let form = Self::room_form(room)?;
        let request = self
            .request(Method::PUT, &format!("/rooms/update/{}", room_id))
            .multipart(form);
        let response = self.send(request, CONTEXT).await?;
        decode_json(response, CONTEXT).await
    }

    async fn delete_room(&self, room_id: i64) -> Result<(), ApiError> {
        let path = format!("/rooms/delete/room/{}", room_id);
        self.send(self.request(Method::DELETE, &path), "Error deleting room")
            .await?;
        Ok(())
    }

    fn stats(&self) -> ClientStats {
        self.stats.lock().clone()
    }
}
