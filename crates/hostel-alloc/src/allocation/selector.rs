use super::domain::{HallId, Room, RoomId};
use super::errors::AllocationError;

/// Resolve the room a booking will target.
///
/// An explicit request is forwarded untouched; the allocation transaction validates it under
/// the room lock. Without one, the tightest-fitting bookable room in `rooms` is chosen.
pub fn select_room(
    hall_id: HallId,
    rooms: &[Room],
    requested: Option<RoomId>,
) -> Result<RoomId, AllocationError> {
    if let Some(room_id) = requested {
        return Ok(room_id);
    }

    best_fit(rooms)
        .map(|room| room.room_id)
        .ok_or(AllocationError::NoRoomAvailable { hall_id })
}

/// Smallest positive remaining capacity wins; ties go to the lowest room number.
pub fn best_fit(rooms: &[Room]) -> Option<&Room> {
    rooms
        .iter()
        .filter(|room| room.is_bookable())
        .min_by(|a, b| {
            a.remaining_beds()
                .cmp(&b.remaining_beds())
                .then_with(|| a.room_number.cmp(&b.room_number))
                .then_with(|| a.room_id.cmp(&b.room_id))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: u32, number: &str, capacity: u32, occupants: u32) -> Room {
        Room {
            room_id: RoomId(id),
            hall_id: HallId(1),
            room_number: number.to_string(),
            capacity,
            current_occupants: occupants,
            is_under_maintenance: false,
        }
    }

    #[test]
    fn requested_room_is_forwarded_without_checks() {
        let rooms = vec![room(1, "A101", 1, 1)];
        let chosen = select_room(HallId(1), &rooms, Some(RoomId(42))).expect("forwarded");
        assert_eq!(chosen, RoomId(42));
    }

    #[test]
    fn picks_tightest_fit() {
        let rooms = vec![
            room(1, "A101", 4, 0),
            room(2, "A102", 4, 3),
            room(3, "A103", 2, 0),
        ];
        assert_eq!(best_fit(&rooms).map(|room| room.room_id), Some(RoomId(2)));
    }

    #[test]
    fn ties_break_on_room_number() {
        let rooms = vec![room(7, "B201", 2, 1), room(9, "A105", 3, 2)];
        assert_eq!(best_fit(&rooms).map(|room| room.room_id), Some(RoomId(9)));
    }

    #[test]
    fn skips_full_and_maintenance_rooms() {
        let mut closed = room(1, "A101", 2, 1);
        closed.is_under_maintenance = true;
        let rooms = vec![closed, room(2, "A102", 2, 2), room(3, "A103", 3, 0)];
        assert_eq!(best_fit(&rooms).map(|room| room.room_id), Some(RoomId(3)));
    }

    #[test]
    fn empty_candidate_set_reports_no_room() {
        let rooms = vec![room(1, "A101", 1, 1)];
        match select_room(HallId(3), &rooms, None) {
            Err(AllocationError::NoRoomAvailable { hall_id }) => assert_eq!(hall_id, HallId(3)),
            other => panic!("expected no room available, got {other:?}"),
        }
    }
}
