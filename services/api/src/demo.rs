use crate::infra::{
    demo_student_id, seed_demo_campus_with, RecordingNotifier, DEMO_ADMIN, DEMO_HALL_FEMALE,
    DEMO_HALL_MALE,
};
use chrono::Utc;
use clap::Args;
use hostel_alloc::allocation::{
    AllocationError, BookingRequest, EnrollmentImporter, HostelAllocationService, ImportSummary,
    InMemoryHostelRepository, OccupancySnapshot, RoomId,
};
use hostel_alloc::config::AllocationConfig;
use hostel_alloc::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const RUSH_ROOM: RoomId = RoomId(1);

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of verified applicants rushing the same two-bed room
    #[arg(long, default_value_t = 6)]
    pub(crate) applicants: usize,
    /// Receipt number prefix used for this run
    #[arg(long, default_value = "BU-HAMS")]
    pub(crate) receipt_prefix: String,
    /// Lock wait budget in milliseconds
    #[arg(long, default_value_t = 2_000)]
    pub(crate) lock_timeout_ms: u64,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Student enrollment CSV export
    #[arg(long)]
    pub(crate) students: PathBuf,
    /// Room inventory CSV export
    #[arg(long)]
    pub(crate) rooms: PathBuf,
    /// Print the summary as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

type DemoService = HostelAllocationService<InMemoryHostelRepository, RecordingNotifier>;

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        applicants,
        receipt_prefix,
        lock_timeout_ms,
    } = args;

    let repository = Arc::new(InMemoryHostelRepository::new());
    seed_demo_campus_with(&repository, applicants)?;
    let notifier = Arc::new(RecordingNotifier::default());
    let config = AllocationConfig {
        lock_timeout: Duration::from_millis(lock_timeout_ms.max(1)),
        receipt_prefix,
    };
    let service: Arc<DemoService> = Arc::new(HostelAllocationService::new(
        repository,
        notifier.clone(),
        config,
    ));

    println!("Hostel allocation demo");
    let halls = service.eligible_halls(&demo_student_id(0))?;
    println!("Halls open to female applicants:");
    for hall in &halls {
        println!(
            "  - {} (hall {}): {} bookable rooms",
            hall.hall_name, hall.hall_id, hall.available_rooms_count
        );
    }

    println!("\n{applicants} applicants rush room {RUSH_ROOM} at the same moment");
    let mut handles = Vec::with_capacity(applicants);
    for index in 0..applicants {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let student_id = demo_student_id(index);
            let outcome = service
                .book(BookingRequest {
                    student_id: student_id.clone(),
                    hall_id: DEMO_HALL_FEMALE,
                    room_id: Some(RUSH_ROOM),
                })
                .await;
            (student_id, outcome)
        }));
    }

    let mut housed = Vec::new();
    for handle in handles {
        let (student_id, outcome) = handle
            .await
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        match outcome {
            Ok(confirmation) => {
                println!(
                    "  - {student_id}: confirmed, receipt {} ({})",
                    confirmation.receipt.receipt_no, confirmation.allocation.transaction_reference.0
                );
                housed.push(student_id);
            }
            Err(err) => println!("  - {student_id}: rejected ({})", err.code()),
        }
    }

    println!("\nApplicants who missed out fall back to best fit:");
    for index in 0..applicants {
        let student_id = demo_student_id(index);
        if housed.contains(&student_id) {
            continue;
        }
        let outcome = service
            .book(BookingRequest {
                student_id: student_id.clone(),
                hall_id: DEMO_HALL_FEMALE,
                room_id: None,
            })
            .await;
        describe(&student_id.0, outcome.map(|confirmation| confirmation.receipt.room_number));
    }

    println!("\nRejections the engine reports:");
    let male = demo_student_id(applicants);
    let outcome = service
        .book(BookingRequest {
            student_id: male.clone(),
            hall_id: DEMO_HALL_FEMALE,
            room_id: Some(RoomId(4)),
        })
        .await;
    describe(&format!("{male} into Queen Esther"), outcome.map(|_| String::new()));
    let unverified = demo_student_id(applicants + 1);
    let outcome = service
        .book(BookingRequest {
            student_id: unverified.clone(),
            hall_id: DEMO_HALL_FEMALE,
            room_id: None,
        })
        .await;
    describe(&format!("{unverified} without payment"), outcome.map(|_| String::new()));

    let status = service.toggle_maintenance(RoomId(5), DEMO_ADMIN).await?;
    println!(
        "\nRoom {} maintenance -> {}",
        status.room_id,
        status.state.label()
    );
    let outcome = service
        .book(BookingRequest {
            student_id: male.clone(),
            hall_id: DEMO_HALL_MALE,
            room_id: None,
        })
        .await;
    describe(&format!("{male} into Samuel Akande"), outcome.map(|_| String::new()));

    render_snapshot(&service.occupancy_snapshot(DEMO_HALL_FEMALE)?);
    println!(
        "\nReceipts issued: {} | notices queued: {}",
        service.receipts(None)?.len(),
        notifier.notices().len()
    );
    Ok(())
}

fn describe(label: &str, outcome: Result<String, AllocationError>) {
    match outcome {
        Ok(room) if room.is_empty() => println!("  - {label}: confirmed"),
        Ok(room) => println!("  - {label}: confirmed in {room}"),
        Err(err) => println!("  - {label}: {}", err.code()),
    }
}

fn render_snapshot(snapshot: &OccupancySnapshot) {
    println!("\n{} occupancy", snapshot.hall_name);
    println!(
        "- {} rooms | {} bookable | {} under maintenance",
        snapshot.total_rooms, snapshot.available_rooms, snapshot.rooms_under_maintenance
    );
    println!(
        "- {}/{} beds taken ({:.0}%) | {} beds free in service",
        snapshot.total_students,
        snapshot.total_capacity,
        snapshot.occupancy_rate,
        snapshot.available_beds
    );
    for room in &snapshot.rooms {
        let flag = if room.is_under_maintenance {
            " [maintenance]"
        } else {
            ""
        };
        println!(
            "  - {} (block {}): {}/{}{}",
            room.room_number, room.block, room.current_occupants, room.capacity, flag
        );
    }
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let inventory = EnrollmentImporter::inventory_from_path(&args.rooms)?;
    let students = EnrollmentImporter::students_from_path(&args.students, Utc::now())?;

    let repository = InMemoryHostelRepository::new();
    let summary = ImportSummary::of(&inventory, &students);
    repository.load(inventory, students)?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&summary)
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        println!("{rendered}");
    } else {
        println!("Enrollment import summary");
        println!("- {} halls | {} rooms | {} beds", summary.halls, summary.rooms, summary.beds);
        println!(
            "- {} students | {} verified payments",
            summary.students, summary.verified_payments
        );
    }
    Ok(())
}
