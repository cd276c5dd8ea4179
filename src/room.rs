// Room catalog: room records, the add/edit form, filtering and paging for the
// browse views

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{ApiError, HotelApi};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoomFormError {
    #[error("Room type is required")]
    MissingRoomType,

    #[error("Invalid room price: {0}")]
    InvalidPrice(f64),
}

// Room record as served by the rooms endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: i64,
    pub room_type: String,
    pub room_price: f64,
    // Base64-encoded photo
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub is_booked: bool,
}

// Uploaded room photo
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

// Fields submitted by the add and edit room views
#[derive(Debug, Clone, PartialEq)]
pub struct RoomForm {
    pub room_type: String,
    pub room_price: f64,
    pub photo: Option<Photo>,
}

impl RoomForm {
    pub fn validate(&self) -> Result<(), RoomFormError> {
        if self.room_type.trim().is_empty() {
            return Err(RoomFormError::MissingRoomType);
        }
        if !self.room_price.is_finite() || self.room_price <= 0.0 {
            return Err(RoomFormError::InvalidPrice(self.room_price));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoomFilter {
    pub room_type: Option<String>,
    pub max_price: Option<f64>,
}

// Rooms matching the filter, catalog order preserved. An empty room type
// matches every room.
pub fn filter_rooms(rooms: &[Room], filter: &RoomFilter) -> Vec<Room> {
    let mut filtered = Vec::new();

    for room in rooms {
        if !filter
            .room_type
            .as_deref()
            .map_or(true, |room_type| room_type.is_empty() || room.room_type == room_type)
        {
            continue;
        }

        if !filter.max_price.map_or(true, |max| room.room_price <= max) {
            continue;
        }

        filtered.push(room.clone());
    }

    filtered
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomPage {
    pub rooms: Vec<Room>,
    pub current_page: usize,
    pub total_pages: usize,
}

// Slice out a 1-based page. Out-of-range pages are clamped to the last one.
pub fn paginate(rooms: &[Room], page: usize, per_page: usize) -> RoomPage {
    let per_page = per_page.max(1);
    let total_pages = rooms.len().div_ceil(per_page).max(1);
    let current_page = page.clamp(1, total_pages);
    let start = (current_page - 1) * per_page;

    RoomPage {
        rooms: rooms.iter().skip(start).take(per_page).cloned().collect(),
        current_page,
        total_pages,
    }
}

/// Rooms and room types loaded together for the browse and admin views.
#[derive(Debug, Clone, Default)]
pub struct RoomCatalog {
    pub rooms: Vec<Room>,
    pub room_types: Vec<String>,
}

impl RoomCatalog {
    pub async fn load(api: &dyn HotelApi) -> Result<Self, ApiError> {
        let (rooms, room_types) = futures::try_join!(api.get_all_rooms(), api.get_room_types())?;
        tracing::debug!(
            rooms = rooms.len(),
            room_types = room_types.len(),
            "loaded room catalog"
        );
        Ok(Self { rooms, room_types })
    }

    // Room types present in the loaded rooms, first-seen order
    pub fn distinct_room_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for room in &self.rooms {
            if !types.contains(&room.room_type) {
                types.push(room.room_type.clone());
            }
        }
        types
    }

    pub fn find(&self, room_id: i64) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == room_id)
    }

    pub fn filter(&self, filter: &RoomFilter) -> Vec<Room> {
        filter_rooms(&self.rooms, filter)
    }
}
