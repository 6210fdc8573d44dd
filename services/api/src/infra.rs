use chrono::{TimeZone, Utc};
use hostel_alloc::allocation::{
    Admin, AdminId, AllocationNotice, AllocationNotifier, EnrollmentImporter, Gender, Hall,
    HallId, InMemoryHostelRepository, NotifyError, PaymentRecord, PaymentStatus, Room, RoomId,
    Student, StudentId, StudentProfile,
};
use hostel_alloc::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stand-in for the e-mail relay: every notice becomes a structured log line.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier;

impl AllocationNotifier for LoggingNotifier {
    fn notify(&self, notice: AllocationNotice) -> Result<(), NotifyError> {
        info!(
            template = %notice.template,
            student_id = %notice.student_id,
            recipient = notice.recipient.as_deref().unwrap_or("-"),
            room = notice.details.get("room_number").map(String::as_str).unwrap_or("-"),
            "allocation notice queued"
        );
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct RecordingNotifier {
    notices: Arc<Mutex<Vec<AllocationNotice>>>,
}

impl AllocationNotifier for RecordingNotifier {
    fn notify(&self, notice: AllocationNotice) -> Result<(), NotifyError> {
        let mut guard = self
            .notices
            .lock()
            .map_err(|_| NotifyError::Transport("outbox mutex poisoned".to_string()))?;
        guard.push(notice);
        Ok(())
    }
}

impl RecordingNotifier {
    pub(crate) fn notices(&self) -> Vec<AllocationNotice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub(crate) const DEMO_HALL_FEMALE: HallId = HallId(1);
pub(crate) const DEMO_HALL_MALE: HallId = HallId(2);
pub(crate) const DEMO_ADMIN: AdminId = AdminId(1);

/// Store for `serve`: the CSV exports when both are given, otherwise the demo campus.
pub(crate) fn load_repository(
    students: Option<PathBuf>,
    rooms: Option<PathBuf>,
) -> Result<Arc<InMemoryHostelRepository>, AppError> {
    let repository = Arc::new(InMemoryHostelRepository::new());
    match (students, rooms) {
        (Some(students), Some(rooms)) => {
            let inventory = EnrollmentImporter::inventory_from_path(&rooms)?;
            let students = EnrollmentImporter::students_from_path(&students, Utc::now())?;
            info!(
                halls = inventory.halls.len(),
                rooms = inventory.rooms.len(),
                students = students.len(),
                "loaded enrollment exports"
            );
            repository.load(inventory, students)?;
            repository.add_admin(demo_admin())?;
        }
        _ => {
            seed_demo_campus(&repository)?;
            info!("no enrollment exports given; serving the demo campus");
        }
    }
    Ok(repository)
}

fn demo_admin() -> Admin {
    Admin {
        admin_id: DEMO_ADMIN,
        name: "Estate Officer".to_string(),
        email: "estates@example.edu".to_string(),
        hall_id: None,
    }
}

pub(crate) fn demo_student_id(index: usize) -> StudentId {
    StudentId(format!("25-{index:04}"))
}

/// Two halls, a handful of rooms and `applicants` verified female students plus one male and
/// one unverified student.
pub(crate) fn seed_demo_campus(repository: &InMemoryHostelRepository) -> Result<(), AppError> {
    seed_demo_campus_with(repository, 6)
}

pub(crate) fn seed_demo_campus_with(
    repository: &InMemoryHostelRepository,
    applicants: usize,
) -> Result<(), AppError> {
    repository.add_hall(Hall {
        hall_id: DEMO_HALL_FEMALE,
        name: "Queen Esther".to_string(),
        gender_restriction: Gender::Female,
    })?;
    repository.add_hall(Hall {
        hall_id: DEMO_HALL_MALE,
        name: "Samuel Akande".to_string(),
        gender_restriction: Gender::Male,
    })?;

    let rooms = [
        (1, DEMO_HALL_FEMALE, "A101", 2, 0, false),
        (2, DEMO_HALL_FEMALE, "A102", 4, 3, false),
        (3, DEMO_HALL_FEMALE, "B201", 3, 0, true),
        (4, DEMO_HALL_FEMALE, "B202", 2, 1, false),
        (5, DEMO_HALL_MALE, "C301", 2, 0, false),
    ];
    for (id, hall_id, number, capacity, occupants, maintenance) in rooms {
        repository.add_room(Room {
            room_id: RoomId(id),
            hall_id,
            room_number: number.to_string(),
            capacity,
            current_occupants: occupants,
            is_under_maintenance: maintenance,
        })?;
    }

    let verified_at = Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).single().unwrap_or_else(Utc::now);
    for index in 0..applicants {
        repository.add_student(demo_student(index, Gender::Female, Some(verified_at)))?;
    }
    repository.add_student(demo_student(applicants, Gender::Male, Some(verified_at)))?;
    repository.add_student(demo_student(applicants + 1, Gender::Female, None))?;
    repository.add_admin(demo_admin())?;
    Ok(())
}

fn demo_student(
    index: usize,
    gender: Gender,
    verified_at: Option<chrono::DateTime<Utc>>,
) -> Student {
    let student_id = demo_student_id(index);
    Student {
        payment_status: if verified_at.is_some() {
            PaymentStatus::Verified
        } else {
            PaymentStatus::Unverified
        },
        payment: verified_at.map(|verified_at| PaymentRecord {
            payment_reference: format!("PAY-{}", student_id),
            amount_paid: 15_000_000,
            verified_at,
        }),
        profile: StudentProfile {
            full_name: format!("Demo Student {index}"),
            department: Some("Computer Science".to_string()),
            level: Some("100".to_string()),
            email: Some(format!("{student_id}@students.example.edu")),
            phone_number: None,
            house_address: None,
        },
        student_id,
        gender,
        active: true,
    }
}
