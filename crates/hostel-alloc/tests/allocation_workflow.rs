use std::io::Cursor;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use hostel_alloc::allocation::{
    Admin, AdminId, AllocationError, AllocationNotice, AllocationNotifier, BookingRequest,
    EnrollmentImporter, HallId, HostelAllocationService, ImportSummary, InMemoryHostelRepository,
    NotifyError, RoomId, StudentId,
};
use hostel_alloc::config::AllocationConfig;

const STUDENTS: &str = "\
matric_number,full_name,gender,payment_status,department,level,email,phone_number,house_address,payment_reference,amount_paid
22-1001,Amaka Eze,F,verified,Accounting,100,amaka@example.edu,08030000001,,PAY-1001,15000000
22-1002,Bisi Ojo,F,verified,Nursing,100,bisi@example.edu,,,PAY-1002,15000000
22-1003,Chioma Udo,F,unverified,Law,100,,,,,
22-1004,Dayo Ade,M,verified,Physics,100,,,,PAY-1004,15000000
";

const ROOMS: &str = "\
hall_id,hall_name,gender,room_id,room_number,capacity,current_occupants,is_under_maintenance
1,Queen Esther,F,10,a101,2,1,no
1,Queen Esther,F,11,b201,4,0,no
2,Samuel Akande,M,20,c301,2,0,yes
";

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<AllocationNotice>>,
}

impl AllocationNotifier for Outbox {
    fn notify(&self, notice: AllocationNotice) -> Result<(), NotifyError> {
        self.sent.lock().expect("outbox mutex poisoned").push(notice);
        Ok(())
    }
}

fn imported_service() -> (
    HostelAllocationService<InMemoryHostelRepository, Outbox>,
    Arc<Outbox>,
) {
    let imported_at = Utc.with_ymd_and_hms(2025, 8, 20, 9, 0, 0).unwrap();
    let students = EnrollmentImporter::students_from_reader(Cursor::new(STUDENTS), imported_at)
        .expect("students import");
    let inventory =
        EnrollmentImporter::inventory_from_reader(Cursor::new(ROOMS)).expect("rooms import");

    let summary = ImportSummary::of(&inventory, &students);
    assert_eq!(summary.halls, 2);
    assert_eq!(summary.beds, 8);
    assert_eq!(summary.verified_payments, 3);

    let repository = Arc::new(InMemoryHostelRepository::new());
    repository.load(inventory, students).expect("load enrollment");
    repository
        .add_admin(Admin {
            admin_id: AdminId(1),
            name: "Estate Officer".to_string(),
            email: "estates@example.edu".to_string(),
            hall_id: None,
        })
        .expect("admin");

    let outbox = Arc::new(Outbox::default());
    let service =
        HostelAllocationService::new(repository, outbox.clone(), AllocationConfig::default());
    (service, outbox)
}

#[tokio::test]
async fn imported_enrollment_books_end_to_end() {
    let (service, outbox) = imported_service();

    let halls = service
        .eligible_halls(&StudentId("22-1001".to_string()))
        .expect("eligible halls");
    assert_eq!(halls.len(), 1);
    assert_eq!(halls[0].hall_id, HallId(1));

    let first = service
        .book(BookingRequest {
            student_id: StudentId("22-1001".to_string()),
            hall_id: HallId(1),
            room_id: None,
        })
        .await
        .expect("first booking");
    assert_eq!(first.allocation.room_id, RoomId(10));
    assert_eq!(first.receipt.room_number, "a101");
    assert_eq!(first.receipt.receipt_no.0, "BU-HAMS-000001");

    let second = service
        .book(BookingRequest {
            student_id: StudentId("22-1002".to_string()),
            hall_id: HallId(1),
            room_id: None,
        })
        .await
        .expect("second booking");
    assert_eq!(second.allocation.room_id, RoomId(11));
    assert_eq!(second.receipt.receipt_no.0, "BU-HAMS-000002");

    let rooms = service.available_rooms(HallId(1)).expect("rooms");
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].block, "B");

    let snapshot = service.occupancy_snapshot(HallId(1)).expect("snapshot");
    assert_eq!(snapshot.total_students, 3);
    assert_eq!(snapshot.available_beds, 3);

    assert_eq!(
        outbox.sent.lock().expect("outbox mutex poisoned").len(),
        2
    );
}

#[tokio::test]
async fn male_hall_under_maintenance_is_not_offered() {
    let (service, _) = imported_service();

    let halls = service
        .eligible_halls(&StudentId("22-1004".to_string()))
        .expect("eligible halls");
    assert!(halls.is_empty());

    let outcome = service
        .book(BookingRequest {
            student_id: StudentId("22-1004".to_string()),
            hall_id: HallId(2),
            room_id: None,
        })
        .await;
    assert!(matches!(
        outcome,
        Err(AllocationError::NoRoomAvailable { hall_id }) if hall_id == HallId(2)
    ));

    service
        .toggle_maintenance(RoomId(20), AdminId(1))
        .await
        .expect("reopen room");
    let reopened = service
        .book(BookingRequest {
            student_id: StudentId("22-1004".to_string()),
            hall_id: HallId(2),
            room_id: None,
        })
        .await
        .expect("booking after reopening");
    assert_eq!(reopened.allocation.room_id, RoomId(20));
}
