//! Hall occupancy figures and allocation trends for the admin dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Allocation, Hall, HallId, Room, RoomId, StudentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupantView {
    pub student_id: StudentId,
    pub full_name: String,
    pub allocation_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOccupancy {
    pub room_id: RoomId,
    pub room_number: String,
    pub block: String,
    pub capacity: u32,
    pub current_occupants: u32,
    pub is_under_maintenance: bool,
    pub occupants: Vec<OccupantView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    pub hall_id: HallId,
    pub hall_name: String,
    pub total_rooms: usize,
    /// In service with at least one free bed.
    pub available_rooms: usize,
    pub rooms_under_maintenance: usize,
    pub total_capacity: u32,
    pub total_students: u32,
    /// Free beds in rooms that are in service.
    pub available_beds: u32,
    /// Whole percent of capacity taken; 0 for a hall without capacity.
    pub occupancy_rate: f64,
    pub rooms: Vec<RoomOccupancy>,
}

impl OccupancySnapshot {
    /// `occupants` maps rooms to the students allocated there; rooms without an entry are listed
    /// with an empty occupant list.
    pub fn build(
        hall: &Hall,
        rooms: &[Room],
        mut occupants: BTreeMap<RoomId, Vec<OccupantView>>,
    ) -> Self {
        let mut ordered: Vec<&Room> = rooms.iter().collect();
        ordered.sort_by(|a, b| a.room_number.cmp(&b.room_number));

        let total_capacity: u32 = ordered.iter().map(|room| room.capacity).sum();
        let total_students: u32 = ordered.iter().map(|room| room.current_occupants).sum();
        let available_beds: u32 = ordered
            .iter()
            .filter(|room| !room.is_under_maintenance)
            .map(|room| room.remaining_beds())
            .sum();

        let rooms = ordered
            .iter()
            .map(|room| RoomOccupancy {
                room_id: room.room_id,
                room_number: room.room_number.clone(),
                block: room.block_label(),
                capacity: room.capacity,
                current_occupants: room.current_occupants,
                is_under_maintenance: room.is_under_maintenance,
                occupants: occupants.remove(&room.room_id).unwrap_or_default(),
            })
            .collect();

        Self {
            hall_id: hall.hall_id,
            hall_name: hall.name.clone(),
            total_rooms: ordered.len(),
            available_rooms: ordered.iter().filter(|room| room.is_bookable()).count(),
            rooms_under_maintenance: ordered
                .iter()
                .filter(|room| room.is_under_maintenance)
                .count(),
            total_capacity,
            total_students,
            available_beds,
            occupancy_rate: occupancy_rate(total_students, total_capacity),
            rooms,
        }
    }
}

pub fn occupancy_rate(occupants: u32, capacity: u32) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    (f64::from(occupants) * 100.0 / f64::from(capacity)).round()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub day: NaiveDate,
    pub count: usize,
}

/// Allocations per calendar day (UTC) for the `days` days ending on `today`, oldest first.
/// Days without allocations are reported with a zero count.
pub fn allocation_trend(allocations: &[Allocation], today: NaiveDate, days: u32) -> Vec<TrendPoint> {
    if days == 0 {
        return Vec::new();
    }

    let start = today - Duration::days(i64::from(days) - 1);
    let mut buckets: BTreeMap<NaiveDate, usize> = (0..i64::from(days))
        .map(|offset| (start + Duration::days(offset), 0))
        .collect();

    for allocation in allocations {
        let day = allocation.allocation_date.date_naive();
        if let Some(count) = buckets.get_mut(&day) {
            *count += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(day, count)| TrendPoint { day, count })
        .collect()
}
