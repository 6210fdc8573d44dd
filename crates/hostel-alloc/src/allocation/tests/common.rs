use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::allocation::clock::Clock;
use crate::allocation::domain::{
    Admin, AdminId, Allocation, AllocationId, AuditEntry, Gender, Hall, HallId, PaymentRecord,
    PaymentStatus, Receipt, Room, RoomId, Student, StudentId, StudentProfile,
};
use crate::allocation::repository::{
    AllocationCommit, AllocationNotice, AllocationNotifier, CommittedAllocation,
    HostelRepository, NotifyError, RepositoryError,
};
use crate::allocation::service::{BookingRequest, HostelAllocationService};
use crate::allocation::store::InMemoryHostelRepository;
use crate::config::AllocationConfig;

pub(super) const QUEEN_ESTHER: HallId = HallId(1);
pub(super) const SAMUEL_AKANDE: HallId = HallId(2);

/// Capacity 2, empty.
pub(super) const ROOM_A101: RoomId = RoomId(10);
/// Capacity 4, three occupants: the best fit in Queen Esther.
pub(super) const ROOM_A102: RoomId = RoomId(11);
/// Capacity 3, under maintenance.
pub(super) const ROOM_B201: RoomId = RoomId(12);
pub(super) const MALE_ROOM: RoomId = RoomId(20);

pub(super) const ESTATE_OFFICER: AdminId = AdminId(1);
/// Scoped to Samuel Akande.
pub(super) const HALL_PORTER: AdminId = AdminId(2);

pub(super) fn sid(raw: &str) -> StudentId {
    StudentId(raw.to_string())
}

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 8, 10, 30, 0).unwrap()
}

pub(super) fn config() -> AllocationConfig {
    AllocationConfig {
        lock_timeout: Duration::from_millis(2_000),
        receipt_prefix: "BU-HAMS".to_string(),
    }
}

pub(super) fn student(id: &str, gender: Gender, verified: bool) -> Student {
    Student {
        student_id: sid(id),
        gender,
        payment_status: if verified {
            PaymentStatus::Verified
        } else {
            PaymentStatus::Unverified
        },
        active: true,
        profile: StudentProfile {
            full_name: format!("Student {id}"),
            department: Some("Computer Science".to_string()),
            level: Some("200".to_string()),
            email: Some(format!("{id}@students.example.edu")),
            phone_number: None,
            house_address: None,
        },
        payment: verified.then(|| PaymentRecord {
            payment_reference: format!("PAY-{id}"),
            amount_paid: 15_000_000,
            verified_at: Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap(),
        }),
    }
}

fn room(id: RoomId, hall: HallId, number: &str, capacity: u32, occupants: u32) -> Room {
    Room {
        room_id: id,
        hall_id: hall,
        room_number: number.to_string(),
        capacity,
        current_occupants: occupants,
        is_under_maintenance: false,
    }
}

/// Two halls, four rooms, two admins and a small enrollment.
pub(super) fn seed(store: &InMemoryHostelRepository) {
    store
        .add_hall(Hall {
            hall_id: QUEEN_ESTHER,
            name: "Queen Esther".to_string(),
            gender_restriction: Gender::Female,
        })
        .expect("seed hall");
    store
        .add_hall(Hall {
            hall_id: SAMUEL_AKANDE,
            name: "Samuel Akande".to_string(),
            gender_restriction: Gender::Male,
        })
        .expect("seed hall");

    let mut under_repair = room(ROOM_B201, QUEEN_ESTHER, "B201", 3, 0);
    under_repair.is_under_maintenance = true;
    for room in [
        room(ROOM_A101, QUEEN_ESTHER, "A101", 2, 0),
        room(ROOM_A102, QUEEN_ESTHER, "A102", 4, 3),
        under_repair,
        room(MALE_ROOM, SAMUEL_AKANDE, "A101", 2, 0),
    ] {
        store.add_room(room).expect("seed room");
    }

    for student in [
        student("21-0001", Gender::Female, true),
        student("21-0002", Gender::Female, false),
        student("21-0003", Gender::Male, true),
        student("21-0004", Gender::Female, true),
        student("21-0005", Gender::Female, true),
    ] {
        store.add_student(student).expect("seed student");
    }

    store
        .add_admin(Admin {
            admin_id: ESTATE_OFFICER,
            name: "Estate Officer".to_string(),
            email: "estates@example.edu".to_string(),
            hall_id: None,
        })
        .expect("seed admin");
    store
        .add_admin(Admin {
            admin_id: HALL_PORTER,
            name: "Hall Porter".to_string(),
            email: "porter@example.edu".to_string(),
            hall_id: Some(SAMUEL_AKANDE),
        })
        .expect("seed admin");
}

pub(super) type TestService = HostelAllocationService<InMemoryHostelRepository, MemoryNotifier>;

pub(super) fn build_service() -> (
    TestService,
    Arc<InMemoryHostelRepository>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(InMemoryHostelRepository::new());
    seed(&repository);
    service_over(repository)
}

pub(super) fn service_over(
    repository: Arc<InMemoryHostelRepository>,
) -> (
    TestService,
    Arc<InMemoryHostelRepository>,
    Arc<MemoryNotifier>,
) {
    let notifier = Arc::new(MemoryNotifier::default());
    let service = HostelAllocationService::with_clock(
        repository.clone(),
        notifier.clone(),
        config(),
        Arc::new(FixedClock::at(fixed_now())),
    );
    (service, repository, notifier)
}

pub(super) fn booking(student_id: &str, hall_id: HallId, room_id: Option<RoomId>) -> BookingRequest {
    BookingRequest {
        student_id: sid(student_id),
        hall_id,
        room_id,
    }
}

pub(super) fn occupants(repository: &InMemoryHostelRepository, room_id: RoomId) -> u32 {
    repository
        .room(room_id)
        .expect("room read")
        .expect("room exists")
        .current_occupants
}

pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    notices: Arc<Mutex<Vec<AllocationNotice>>>,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<AllocationNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl AllocationNotifier for MemoryNotifier {
    fn notify(&self, notice: AllocationNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl AllocationNotifier for FailingNotifier {
    fn notify(&self, _notice: AllocationNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay refused".to_string()))
    }
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl HostelRepository for UnavailableRepository {
    fn student(&self, _id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        offline()
    }
    fn admin(&self, _id: AdminId) -> Result<Option<Admin>, RepositoryError> {
        offline()
    }
    fn hall(&self, _id: HallId) -> Result<Option<Hall>, RepositoryError> {
        offline()
    }
    fn halls(&self) -> Result<Vec<Hall>, RepositoryError> {
        offline()
    }
    fn room(&self, _id: RoomId) -> Result<Option<Room>, RepositoryError> {
        offline()
    }
    fn rooms_in_hall(&self, _hall_id: HallId) -> Result<Vec<Room>, RepositoryError> {
        offline()
    }
    fn active_allocation(
        &self,
        _student: &StudentId,
    ) -> Result<Option<Allocation>, RepositoryError> {
        offline()
    }
    fn allocations(&self, _hall_id: Option<HallId>) -> Result<Vec<Allocation>, RepositoryError> {
        offline()
    }
    fn allocations_for_room(&self, _room_id: RoomId) -> Result<Vec<Allocation>, RepositoryError> {
        offline()
    }
    fn receipt_for(&self, _id: AllocationId) -> Result<Option<Receipt>, RepositoryError> {
        offline()
    }
    fn commit_allocation(
        &self,
        _commit: AllocationCommit,
    ) -> Result<CommittedAllocation, RepositoryError> {
        offline()
    }
    fn set_maintenance(
        &self,
        _room_id: RoomId,
        _under_maintenance: bool,
        _audit: AuditEntry,
    ) -> Result<Room, RepositoryError> {
        offline()
    }
    fn verify_payment(
        &self,
        _student: &StudentId,
        _payment: PaymentRecord,
        _audit: AuditEntry,
    ) -> Result<Student, RepositoryError> {
        offline()
    }
    fn is_quarantined(&self, _room_id: RoomId) -> Result<bool, RepositoryError> {
        offline()
    }
    fn release_quarantine(
        &self,
        _room_id: RoomId,
        _audit: AuditEntry,
    ) -> Result<bool, RepositoryError> {
        offline()
    }
    fn record_audit(&self, _entry: AuditEntry) -> Result<(), RepositoryError> {
        offline()
    }
    fn audit_log(&self, _limit: usize) -> Result<Vec<AuditEntry>, RepositoryError> {
        offline()
    }
}

/// Delegates to the in-memory store but stalls inside every commit, keeping the room lock held.
pub(super) struct SlowCommitRepository {
    pub(super) inner: InMemoryHostelRepository,
    pub(super) stall: Duration,
}

impl HostelRepository for SlowCommitRepository {
    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        self.inner.student(id)
    }
    fn admin(&self, id: AdminId) -> Result<Option<Admin>, RepositoryError> {
        self.inner.admin(id)
    }
    fn hall(&self, id: HallId) -> Result<Option<Hall>, RepositoryError> {
        self.inner.hall(id)
    }
    fn halls(&self) -> Result<Vec<Hall>, RepositoryError> {
        self.inner.halls()
    }
    fn room(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        self.inner.room(id)
    }
    fn rooms_in_hall(&self, hall_id: HallId) -> Result<Vec<Room>, RepositoryError> {
        self.inner.rooms_in_hall(hall_id)
    }
    fn active_allocation(
        &self,
        student: &StudentId,
    ) -> Result<Option<Allocation>, RepositoryError> {
        self.inner.active_allocation(student)
    }
    fn allocations(&self, hall_id: Option<HallId>) -> Result<Vec<Allocation>, RepositoryError> {
        self.inner.allocations(hall_id)
    }
    fn allocations_for_room(&self, room_id: RoomId) -> Result<Vec<Allocation>, RepositoryError> {
        self.inner.allocations_for_room(room_id)
    }
    fn receipt_for(&self, id: AllocationId) -> Result<Option<Receipt>, RepositoryError> {
        self.inner.receipt_for(id)
    }
    fn commit_allocation(
        &self,
        commit: AllocationCommit,
    ) -> Result<CommittedAllocation, RepositoryError> {
        std::thread::sleep(self.stall);
        self.inner.commit_allocation(commit)
    }
    fn set_maintenance(
        &self,
        room_id: RoomId,
        under_maintenance: bool,
        audit: AuditEntry,
    ) -> Result<Room, RepositoryError> {
        self.inner.set_maintenance(room_id, under_maintenance, audit)
    }
    fn verify_payment(
        &self,
        student: &StudentId,
        payment: PaymentRecord,
        audit: AuditEntry,
    ) -> Result<Student, RepositoryError> {
        self.inner.verify_payment(student, payment, audit)
    }
    fn is_quarantined(&self, room_id: RoomId) -> Result<bool, RepositoryError> {
        self.inner.is_quarantined(room_id)
    }
    fn release_quarantine(
        &self,
        room_id: RoomId,
        audit: AuditEntry,
    ) -> Result<bool, RepositoryError> {
        self.inner.release_quarantine(room_id, audit)
    }
    fn record_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        self.inner.record_audit(entry)
    }
    fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, RepositoryError> {
        self.inner.audit_log(limit)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
