use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::allocation::domain::{Gender, Hall, HallId, Room, RoomId};
use crate::allocation::repository::HostelRepository;
use crate::allocation::service::HostelAllocationService;
use crate::allocation::store::InMemoryHostelRepository;
use crate::allocation::AllocationError;

const CONTESTED: RoomId = RoomId(30);

/// One hall with a single room of `capacity` beds and `students` verified applicants.
fn contested_room(capacity: u32, students: usize) -> (Arc<TestService>, Arc<InMemoryHostelRepository>) {
    let repository = Arc::new(InMemoryHostelRepository::new());
    repository
        .add_hall(Hall {
            hall_id: HallId(3),
            name: "Crystal".to_string(),
            gender_restriction: Gender::Female,
        })
        .expect("hall");
    repository
        .add_room(Room {
            room_id: CONTESTED,
            hall_id: HallId(3),
            room_number: "C100".to_string(),
            capacity,
            current_occupants: 0,
            is_under_maintenance: false,
        })
        .expect("room");
    for index in 0..students {
        repository
            .add_student(student(&format!("24-{index:04}"), Gender::Female, true))
            .expect("student");
    }

    let (service, repository, _) = service_over(repository);
    (Arc::new(service), repository)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_never_overbook() {
    let (service, repository) = contested_room(3, 12);

    let mut handles = Vec::new();
    for index in 0..12 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .book(booking(&format!("24-{index:04}"), HallId(3), Some(CONTESTED)))
                .await
        }));
    }

    let mut confirmed = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.expect("task joins") {
            Ok(_) => confirmed += 1,
            Err(AllocationError::RoomFull { .. }) => full += 1,
            Err(other) => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(confirmed, 3);
    assert_eq!(full, 9);
    assert_eq!(occupants(&repository, CONTESTED), 3);
    assert_eq!(repository.allocations(None).expect("read").len(), 3);
    assert_eq!(repository.receipts_issued().expect("count"), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn best_fit_bookings_fill_every_bed_exactly_once() {
    let (service, repository) = contested_room(5, 5);

    let mut handles = Vec::new();
    for index in 0..5 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .book(booking(&format!("24-{index:04}"), HallId(3), None))
                .await
        }));
    }

    for handle in handles {
        handle.await.expect("task joins").expect("every applicant housed");
    }
    assert_eq!(occupants(&repository, CONTESTED), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_student_racing_two_rooms_gets_one() {
    let (service, repository, _) = build_service();
    let service = Arc::new(service);

    let first = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .allocate(&sid("21-0001"), QUEEN_ESTHER, ROOM_A101)
                .await
        })
    };
    let second = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .allocate(&sid("21-0001"), QUEEN_ESTHER, ROOM_A102)
                .await
        })
    };

    let outcomes = [
        first.await.expect("task joins"),
        second.await.expect("task joins"),
    ];
    let confirmed = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(confirmed, 1);
    assert!(outcomes
        .iter()
        .any(|outcome| matches!(outcome, Err(AllocationError::AlreadyAllocated { .. }))));
    assert_eq!(
        occupants(&repository, ROOM_A101) + occupants(&repository, ROOM_A102),
        4
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn maintenance_and_booking_race_has_one_consistent_outcome() {
    for _ in 0..20 {
        let (service, repository, _) = build_service();
        let service = Arc::new(service);

        let toggle = {
            let service = service.clone();
            tokio::spawn(async move { service.toggle_maintenance(ROOM_A101, ESTATE_OFFICER).await })
        };
        let book = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .book(booking("21-0001", QUEEN_ESTHER, Some(ROOM_A101)))
                    .await
            })
        };

        let toggled = toggle.await.expect("task joins").expect("toggle succeeds");
        assert!(toggled.is_under_maintenance);
        let room = repository
            .room(ROOM_A101)
            .expect("read")
            .expect("room exists");
        assert!(room.is_under_maintenance);

        match book.await.expect("task joins") {
            Ok(_) => assert_eq!(room.current_occupants, 1),
            Err(AllocationError::RoomUnderMaintenance { .. }) => {
                assert_eq!(room.current_occupants, 0)
            }
            Err(other) => panic!("unexpected outcome {other:?}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lock_wait_beyond_timeout_is_busy() {
    let inner = InMemoryHostelRepository::new();
    seed(&inner);
    let repository = Arc::new(SlowCommitRepository {
        inner,
        stall: Duration::from_millis(400),
    });
    let mut config = config();
    config.lock_timeout = Duration::from_millis(50);
    let service = Arc::new(HostelAllocationService::new(
        repository.clone(),
        Arc::new(MemoryNotifier::default()),
        config,
    ));

    let slow = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .book(booking("21-0001", QUEEN_ESTHER, Some(ROOM_A101)))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let contender = service
        .book(booking("21-0004", QUEEN_ESTHER, Some(ROOM_A101)))
        .await;
    match contender {
        Err(err @ AllocationError::Busy { .. }) => assert!(err.is_retryable()),
        other => panic!("expected busy, got {other:?}"),
    }

    slow.await.expect("task joins").expect("slow booking commits");

    let other_room = service
        .book(booking("21-0005", QUEEN_ESTHER, Some(ROOM_A102)))
        .await;
    assert!(other_room.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn best_fit_loser_moves_to_next_free_room() {
    let inner = InMemoryHostelRepository::new();
    seed(&inner);
    let repository = Arc::new(SlowCommitRepository {
        inner,
        stall: Duration::from_millis(200),
    });
    let service = Arc::new(HostelAllocationService::new(
        repository.clone(),
        Arc::new(MemoryNotifier::default()),
        config(),
    ));

    let winner = {
        let service = service.clone();
        tokio::spawn(async move { service.book(booking("21-0001", QUEEN_ESTHER, None)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // A102 still shows one free bed here, but the winner holds its lock.
    let runner_up = service
        .book(booking("21-0004", QUEEN_ESTHER, None))
        .await
        .expect("runner-up housed elsewhere");
    let winner = winner.await.expect("task joins").expect("winner housed");

    assert_eq!(winner.allocation.room_id, ROOM_A102);
    assert_eq!(runner_up.allocation.room_id, ROOM_A101);
    assert_eq!(occupants(&repository.inner, ROOM_A102), 4);
    assert_eq!(occupants(&repository.inner, ROOM_A101), 1);
}

#[tokio::test]
async fn best_fit_reports_no_room_once_hall_is_full() {
    let (service, _) = contested_room(1, 2);
    service
        .book(booking("24-0000", HallId(3), None))
        .await
        .expect("first applicant housed");

    let outcome = service.book(booking("24-0001", HallId(3), None)).await;
    assert!(matches!(
        outcome,
        Err(AllocationError::NoRoomAvailable { hall_id }) if hall_id == HallId(3)
    ));
}

#[tokio::test]
async fn cancelled_waiter_leaves_no_trace() {
    let (service, repository, _) = build_service();

    let pending = service.book(booking("21-0001", QUEEN_ESTHER, Some(ROOM_A101)));
    drop(pending);

    assert_eq!(occupants(&repository, ROOM_A101), 0);
    service
        .book(booking("21-0004", QUEEN_ESTHER, Some(ROOM_A101)))
        .await
        .expect("room still bookable");
}
