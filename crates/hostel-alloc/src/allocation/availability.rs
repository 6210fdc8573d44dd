//! Read-only availability listings.
//!
//! These views are taken without the room lock and can be stale by the time a booking runs;
//! the allocation transaction re-validates everything it relies on.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::domain::{Gender, Hall, HallId, Room, RoomId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallSummary {
    pub hall_id: HallId,
    pub hall_name: String,
    pub available_rooms_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub room_id: RoomId,
    pub room_number: String,
    pub block: String,
    pub capacity: u32,
    pub current_occupants: u32,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.room_id,
            room_number: room.room_number.clone(),
            block: room.block_label(),
            capacity: room.capacity,
            current_occupants: room.current_occupants,
        }
    }
}

/// Halls restricted to `gender` that still have at least one bookable room, ordered by name.
pub fn available_halls(halls: &[Hall], rooms: &[Room], gender: Gender) -> Vec<HallSummary> {
    let mut bookable: HashMap<HallId, usize> = HashMap::new();
    for room in rooms.iter().filter(|room| room.is_bookable()) {
        *bookable.entry(room.hall_id).or_default() += 1;
    }

    let mut summaries: Vec<HallSummary> = halls
        .iter()
        .filter(|hall| hall.gender_restriction == gender)
        .filter_map(|hall| {
            bookable
                .get(&hall.hall_id)
                .copied()
                .filter(|count| *count > 0)
                .map(|count| HallSummary {
                    hall_id: hall.hall_id,
                    hall_name: hall.name.clone(),
                    available_rooms_count: count,
                })
        })
        .collect();

    summaries.sort_by(|a, b| a.hall_name.cmp(&b.hall_name).then(a.hall_id.cmp(&b.hall_id)));
    summaries
}

/// Bookable rooms ordered by room number.
pub fn available_rooms(rooms: &[Room]) -> Vec<RoomView> {
    let mut views: Vec<RoomView> = rooms
        .iter()
        .filter(|room| room.is_bookable())
        .map(RoomView::from)
        .collect();
    views.sort_by(|a, b| a.room_number.cmp(&b.room_number));
    views
}

/// Group a room listing by block label, preserving the listing order inside each block.
pub fn group_by_block(rooms: &[RoomView]) -> BTreeMap<String, Vec<RoomView>> {
    let mut blocks: BTreeMap<String, Vec<RoomView>> = BTreeMap::new();
    for room in rooms {
        blocks
            .entry(room.block.clone())
            .or_default()
            .push(room.clone());
    }
    blocks
}
