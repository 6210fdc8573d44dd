use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::availability::{self, HallSummary, RoomView};
use super::clock::{Clock, SystemClock};
use super::domain::{
    Actor, Admin, AdminId, Allocation, AuditAction, AuditEntry, Gender, Hall, HallId, PaymentRecord,
    PaymentStatus, ReceiptNo, Room, RoomId, Student, StudentId, TransactionReference,
};
use super::eligibility::{self, Eligibility};
use super::errors::AllocationError;
use super::ledger::ReceiptView;
use super::locks::RoomLocks;
use super::maintenance::{self, MaintenanceState, MaintenanceStatus, MaintenanceTransition};
use super::repository::{
    AllocationCommit, AllocationNotice, AllocationNotifier, HostelRepository, RepositoryError,
};
use super::selector;
use super::snapshot::{self, OccupancySnapshot, OccupantView, TrendPoint};
use crate::config::AllocationConfig;

/// Longest window accepted by [`HostelAllocationService::allocation_trend`].
pub const MAX_TREND_DAYS: u32 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub student_id: StudentId,
    pub hall_id: HallId,
    /// Explicit room choice; the best-fit room is used when absent.
    #[serde(default)]
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingConfirmation {
    pub allocation: Allocation,
    pub receipt: ReceiptView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub payment_reference: String,
    pub amount_paid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentRoom {
    pub hall_id: HallId,
    pub hall_name: String,
    pub room_id: RoomId,
    pub room_number: String,
    pub block: String,
    pub allocation_date: DateTime<Utc>,
    pub receipt_no: Option<ReceiptNo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentDashboard {
    pub student_id: StudentId,
    pub full_name: String,
    pub gender: Gender,
    pub payment_status: PaymentStatus,
    pub eligibility: Eligibility,
    /// Empty unless the student is eligible.
    pub eligible_halls: Vec<HallSummary>,
    pub current_room: Option<CurrentRoom>,
}

/// Allocation engine facade: eligibility, availability, booking, maintenance and receipts.
///
/// The service holds no booking state of its own beyond the per-room lock table; everything
/// durable, quarantine included, lives behind the repository.
pub struct HostelAllocationService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    locks: RoomLocks,
    config: AllocationConfig,
}

impl<R, N> HostelAllocationService<R, N>
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, config: AllocationConfig) -> Self {
        Self::with_clock(repository, notifier, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        notifier: Arc<N>,
        config: AllocationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            notifier,
            clock,
            locks: RoomLocks::new(config.lock_timeout),
            config,
        }
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    pub fn check_eligibility(&self, student_id: &StudentId) -> Result<Eligibility, AllocationError> {
        let student = self.student(student_id)?;
        let active = self.repository.active_allocation(student_id)?;
        Ok(eligibility::check_eligibility(&student, active.as_ref()))
    }

    /// Halls an eligible student can book into. Blocked students get the blocking reason.
    pub fn eligible_halls(&self, student_id: &StudentId) -> Result<Vec<HallSummary>, AllocationError> {
        match self.check_eligibility(student_id)? {
            Eligibility::Eligible { gender } => self.halls_for(gender),
            Eligibility::Blocked(reason) => Err(reason.into_error(student_id.clone())),
        }
    }

    pub fn available_rooms(&self, hall_id: HallId) -> Result<Vec<RoomView>, AllocationError> {
        self.hall(hall_id)?;
        let rooms = self.repository.rooms_in_hall(hall_id)?;
        Ok(availability::available_rooms(&rooms))
    }

    /// Resolve the target room for a booking without taking any lock.
    pub fn select_room(
        &self,
        hall_id: HallId,
        requested: Option<RoomId>,
    ) -> Result<RoomId, AllocationError> {
        if requested.is_some() {
            return selector::select_room(hall_id, &[], requested);
        }
        self.hall(hall_id)?;
        let rooms = self.repository.rooms_in_hall(hall_id)?;
        selector::select_room(hall_id, &rooms, None)
    }

    /// Book `room_id` for the student under the room lock.
    ///
    /// Every precondition is re-validated after the lock is held. Once it is held nothing in
    /// the transaction awaits, so cancellation can only happen while still queued.
    pub async fn allocate(
        &self,
        student_id: &StudentId,
        hall_id: HallId,
        room_id: RoomId,
    ) -> Result<BookingConfirmation, AllocationError> {
        self.ensure_not_quarantined(room_id)?;
        let guard = self.locks.acquire(room_id).await?;
        self.ensure_not_quarantined(room_id)?;
        let outcome = self.allocate_locked(student_id, hall_id, guard.room_id());
        drop(guard);
        outcome
    }

    /// Full booking flow: eligibility, room selection, locked transaction, notification.
    pub async fn book(
        &self,
        request: BookingRequest,
    ) -> Result<BookingConfirmation, AllocationError> {
        if let Eligibility::Blocked(reason) = self.check_eligibility(&request.student_id)? {
            return Err(reason.into_error(request.student_id));
        }

        let confirmation = match request.room_id {
            Some(room_id) => {
                self.allocate(&request.student_id, request.hall_id, room_id)
                    .await?
            }
            None => self.allocate_best_fit(&request.student_id, request.hall_id).await?,
        };
        self.notify(&confirmation);
        Ok(confirmation)
    }

    /// Best-fit booking. The candidate is picked from an unlocked read, so a room that fills
    /// or closes before its lock is taken sends the selection back to fresh data. Occupancy
    /// only grows, so every lost race removes a candidate and the loop ends in a booking or
    /// `NoRoomAvailable`.
    async fn allocate_best_fit(
        &self,
        student_id: &StudentId,
        hall_id: HallId,
    ) -> Result<BookingConfirmation, AllocationError> {
        loop {
            let room_id = self.select_room(hall_id, None)?;
            match self.allocate(student_id, hall_id, room_id).await {
                Err(AllocationError::RoomFull { .. })
                | Err(AllocationError::RoomUnderMaintenance { .. }) => {
                    debug!(%student_id, %hall_id, %room_id, "best-fit room taken; reselecting");
                }
                outcome => return outcome,
            }
        }
    }

    pub async fn toggle_maintenance(
        &self,
        room_id: RoomId,
        admin_id: AdminId,
    ) -> Result<MaintenanceStatus, AllocationError> {
        self.apply_maintenance(room_id, admin_id, None).await
    }

    /// Explicit form of the toggle. Requesting the current state changes nothing.
    pub async fn set_maintenance(
        &self,
        room_id: RoomId,
        admin_id: AdminId,
        under_maintenance: bool,
    ) -> Result<MaintenanceStatus, AllocationError> {
        self.apply_maintenance(
            room_id,
            admin_id,
            Some(MaintenanceState::from_flag(under_maintenance)),
        )
        .await
    }

    pub fn is_quarantined(&self, room_id: RoomId) -> Result<bool, AllocationError> {
        Ok(self.repository.is_quarantined(room_id)?)
    }

    /// Lift a quarantine after the receipt ledger has been repaired. Returns whether the room
    /// was quarantined.
    pub fn clear_quarantine(
        &self,
        room_id: RoomId,
        admin_id: AdminId,
    ) -> Result<bool, AllocationError> {
        let admin = self.admin(admin_id)?;
        let room = self.room(room_id)?;
        maintenance::authorize(&admin, &room)?;

        let audit = AuditEntry {
            action: AuditAction::QuarantineCleared,
            actor: Actor::Admin(admin_id),
            description: format!("room {} ({}) released from quarantine", room.room_number, room_id),
            timestamp: self.clock.now(),
        };
        let removed = self.repository.release_quarantine(room_id, audit)?;
        if removed {
            info!(%room_id, %admin_id, "room quarantine cleared");
        }
        Ok(removed)
    }

    pub fn receipt(&self, student_id: &StudentId) -> Result<ReceiptView, AllocationError> {
        let student = self.student(student_id)?;
        let allocation = self
            .repository
            .active_allocation(student_id)?
            .ok_or_else(|| AllocationError::ReceiptNotFound {
                student_id: student_id.clone(),
            })?;
        let receipt = self
            .repository
            .receipt_for(allocation.allocation_id)?
            .ok_or_else(|| AllocationError::ReceiptNotFound {
                student_id: student_id.clone(),
            })?;
        let hall = self.hall(allocation.hall_id)?;
        let room = self.room(allocation.room_id)?;
        Ok(ReceiptView::compose(&receipt, &allocation, &student, &hall, &room))
    }

    /// Receipts in issue order, optionally restricted to one hall.
    pub fn receipts(&self, hall_id: Option<HallId>) -> Result<Vec<ReceiptView>, AllocationError> {
        if let Some(hall_id) = hall_id {
            self.hall(hall_id)?;
        }

        let mut views = Vec::new();
        for allocation in self.repository.allocations(hall_id)? {
            let Some(receipt) = self.repository.receipt_for(allocation.allocation_id)? else {
                continue;
            };
            let student = self.student(&allocation.student_id)?;
            let hall = self.hall(allocation.hall_id)?;
            let room = self.room(allocation.room_id)?;
            views.push((
                receipt.sequence,
                ReceiptView::compose(&receipt, &allocation, &student, &hall, &room),
            ));
        }
        views.sort_by_key(|(sequence, _)| *sequence);
        Ok(views.into_iter().map(|(_, view)| view).collect())
    }

    pub fn occupancy_snapshot(&self, hall_id: HallId) -> Result<OccupancySnapshot, AllocationError> {
        let hall = self.hall(hall_id)?;
        let rooms = self.repository.rooms_in_hall(hall_id)?;

        let mut occupants: BTreeMap<RoomId, Vec<OccupantView>> = BTreeMap::new();
        for room in &rooms {
            let mut views = Vec::new();
            for allocation in self.repository.allocations_for_room(room.room_id)? {
                let student = self.student(&allocation.student_id)?;
                views.push(OccupantView {
                    student_id: allocation.student_id,
                    full_name: student.profile.full_name,
                    allocation_date: allocation.allocation_date,
                });
            }
            if !views.is_empty() {
                occupants.insert(room.room_id, views);
            }
        }

        Ok(OccupancySnapshot::build(&hall, &rooms, occupants))
    }

    /// Daily allocation counts for the last `days` days (capped at [`MAX_TREND_DAYS`]).
    pub fn allocation_trend(
        &self,
        hall_id: Option<HallId>,
        days: u32,
    ) -> Result<Vec<TrendPoint>, AllocationError> {
        if let Some(hall_id) = hall_id {
            self.hall(hall_id)?;
        }
        let allocations = self.repository.allocations(hall_id)?;
        let today = self.clock.now().date_naive();
        Ok(snapshot::allocation_trend(
            &allocations,
            today,
            days.min(MAX_TREND_DAYS),
        ))
    }

    pub fn student_dashboard(
        &self,
        student_id: &StudentId,
    ) -> Result<StudentDashboard, AllocationError> {
        let student = self.student(student_id)?;
        let active = self.repository.active_allocation(student_id)?;
        let eligibility = eligibility::check_eligibility(&student, active.as_ref());

        let eligible_halls = match eligibility {
            Eligibility::Eligible { gender } => self.halls_for(gender)?,
            Eligibility::Blocked(_) => Vec::new(),
        };

        let current_room = match active {
            Some(allocation) => {
                let hall = self.hall(allocation.hall_id)?;
                let room = self.room(allocation.room_id)?;
                let receipt_no = self
                    .repository
                    .receipt_for(allocation.allocation_id)?
                    .map(|receipt| receipt.receipt_no);
                Some(CurrentRoom {
                    hall_id: hall.hall_id,
                    hall_name: hall.name,
                    room_id: room.room_id,
                    block: room.block_label(),
                    room_number: room.room_number,
                    allocation_date: allocation.allocation_date,
                    receipt_no,
                })
            }
            None => None,
        };

        Ok(StudentDashboard {
            student_id: student.student_id,
            full_name: student.profile.full_name,
            gender: student.gender,
            payment_status: student.payment_status,
            eligibility,
            eligible_halls,
            current_room,
        })
    }

    /// Administrator confirms a hostel fee payment.
    pub fn verify_payment(
        &self,
        student_id: &StudentId,
        admin_id: AdminId,
        payment: PaymentVerification,
    ) -> Result<Student, AllocationError> {
        self.admin(admin_id)?;
        self.student(student_id)?;

        let now = self.clock.now();
        let audit = AuditEntry {
            action: AuditAction::PaymentVerified,
            actor: Actor::Admin(admin_id),
            description: format!(
                "payment {} verified for student {}",
                payment.payment_reference, student_id
            ),
            timestamp: now,
        };
        let record = PaymentRecord {
            payment_reference: payment.payment_reference,
            amount_paid: payment.amount_paid,
            verified_at: now,
        };

        let student = self
            .repository
            .verify_payment(student_id, record, audit)
            .map_err(|err| match err {
                RepositoryError::NotFound => AllocationError::StudentNotFound {
                    student_id: student_id.clone(),
                },
                other => AllocationError::Repository(other),
            })?;
        info!(%student_id, %admin_id, "hostel payment verified");
        Ok(student)
    }

    pub fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, AllocationError> {
        Ok(self.repository.audit_log(limit)?)
    }

    fn allocate_locked(
        &self,
        student_id: &StudentId,
        hall_id: HallId,
        room_id: RoomId,
    ) -> Result<BookingConfirmation, AllocationError> {
        let student = self.student(student_id)?;
        let active = self.repository.active_allocation(student_id)?;
        if let Eligibility::Blocked(reason) =
            eligibility::check_eligibility(&student, active.as_ref())
        {
            return Err(reason.into_error(student_id.clone()));
        }

        let room = self
            .repository
            .room(room_id)?
            .filter(|room| room.hall_id == hall_id)
            .ok_or(AllocationError::RoomNotFound { room_id })?;
        if room.is_under_maintenance {
            return Err(AllocationError::RoomUnderMaintenance { room_id });
        }

        let hall = self.hall(hall_id)?;
        if hall.gender_restriction != student.gender {
            return Err(AllocationError::HallGenderMismatch { hall_id });
        }

        if room.is_full() {
            return Err(AllocationError::RoomFull { room_id });
        }

        let now = self.clock.now();
        let commit = AllocationCommit {
            student_id: student_id.clone(),
            hall_id,
            room_id,
            allocation_date: now,
            transaction_reference: new_transaction_reference(),
            amount_paid: student.amount_paid(),
            receipt_prefix: self.config.receipt_prefix.clone(),
            audit: AuditEntry {
                action: AuditAction::RoomAllocated,
                actor: Actor::Student(student_id.clone()),
                description: format!("allocated room {} in {}", room.room_number, hall.name),
                timestamp: now,
            },
        };

        let committed = self
            .repository
            .commit_allocation(commit)
            .map_err(|err| match err {
                RepositoryError::StudentAlreadyAllocated => AllocationError::AlreadyAllocated {
                    student_id: student_id.clone(),
                },
                RepositoryError::CapacityExceeded => AllocationError::RoomFull { room_id },
                RepositoryError::NotFound => AllocationError::RoomNotFound { room_id },
                RepositoryError::Quarantined(_) => AllocationError::RoomQuarantined { room_id },
                RepositoryError::DuplicateReceipt(receipt_no) => {
                    error!(%room_id, %receipt_no, "receipt number already issued; room quarantined");
                    AllocationError::DuplicateReceipt {
                        receipt_no,
                        room_id,
                    }
                }
                other => AllocationError::Repository(other),
            })?;

        info!(
            %student_id,
            %hall_id,
            %room_id,
            receipt_no = %committed.receipt.receipt_no,
            occupants = committed.room.current_occupants,
            capacity = committed.room.capacity,
            "room allocated"
        );

        let receipt = ReceiptView::compose(
            &committed.receipt,
            &committed.allocation,
            &student,
            &hall,
            &committed.room,
        );
        Ok(BookingConfirmation {
            allocation: committed.allocation,
            receipt,
        })
    }

    async fn apply_maintenance(
        &self,
        room_id: RoomId,
        admin_id: AdminId,
        target: Option<MaintenanceState>,
    ) -> Result<MaintenanceStatus, AllocationError> {
        self.ensure_not_quarantined(room_id)?;
        let admin = self.admin(admin_id)?;
        let guard = self.locks.acquire(room_id).await?;
        self.ensure_not_quarantined(room_id)?;

        let room = self.room(guard.room_id())?;
        maintenance::authorize(&admin, &room)?;

        let from = MaintenanceState::of(&room);
        let to = target.unwrap_or_else(|| from.toggled());
        if from == to {
            return Ok(MaintenanceStatus {
                room_id,
                is_under_maintenance: to.is_under_maintenance(),
                state: to,
                changed: false,
            });
        }

        let transition = MaintenanceTransition {
            room_id,
            room_number: room.room_number,
            from,
            to,
            admin_id,
            at: self.clock.now(),
        };
        let updated = self
            .repository
            .set_maintenance(room_id, to.is_under_maintenance(), transition.audit_entry())
            .map_err(|err| match err {
                RepositoryError::NotFound => AllocationError::RoomNotFound { room_id },
                RepositoryError::Quarantined(_) => AllocationError::RoomQuarantined { room_id },
                other => AllocationError::Repository(other),
            })?;
        drop(guard);

        info!(%room_id, %admin_id, state = to.label(), "room maintenance state changed");
        Ok(MaintenanceStatus {
            room_id,
            is_under_maintenance: updated.is_under_maintenance,
            state: MaintenanceState::of(&updated),
            changed: true,
        })
    }

    fn notify(&self, confirmation: &BookingConfirmation) {
        let receipt = &confirmation.receipt;
        let mut details = BTreeMap::new();
        details.insert("hall_name".to_string(), receipt.hall_name.clone());
        details.insert("room_number".to_string(), receipt.room_number.clone());
        details.insert("receipt_no".to_string(), receipt.receipt_no.0.clone());
        details.insert(
            "transaction_reference".to_string(),
            receipt.transaction_reference.0.clone(),
        );
        details.insert(
            "allocation_date".to_string(),
            receipt.allocation_date.to_rfc3339(),
        );

        let notice = AllocationNotice {
            template: "room_allocated".to_string(),
            student_id: receipt.matric_no.clone(),
            recipient: receipt.email.clone(),
            details,
        };
        if let Err(err) = self.notifier.notify(notice) {
            warn!(
                student_id = %receipt.matric_no,
                receipt_no = %receipt.receipt_no,
                error = %err,
                "allocation notification not delivered"
            );
        }
    }

    fn halls_for(&self, gender: Gender) -> Result<Vec<HallSummary>, AllocationError> {
        let halls = self.repository.halls()?;
        let mut rooms = Vec::new();
        for hall in halls.iter().filter(|hall| hall.gender_restriction == gender) {
            rooms.extend(self.repository.rooms_in_hall(hall.hall_id)?);
        }
        Ok(availability::available_halls(&halls, &rooms, gender))
    }

    fn ensure_not_quarantined(&self, room_id: RoomId) -> Result<(), AllocationError> {
        if self.repository.is_quarantined(room_id)? {
            return Err(AllocationError::RoomQuarantined { room_id });
        }
        Ok(())
    }

    fn student(&self, student_id: &StudentId) -> Result<Student, AllocationError> {
        self.repository
            .student(student_id)?
            .ok_or_else(|| AllocationError::StudentNotFound {
                student_id: student_id.clone(),
            })
    }

    fn hall(&self, hall_id: HallId) -> Result<Hall, AllocationError> {
        self.repository
            .hall(hall_id)?
            .ok_or(AllocationError::HallNotFound { hall_id })
    }

    fn room(&self, room_id: RoomId) -> Result<Room, AllocationError> {
        self.repository
            .room(room_id)?
            .ok_or(AllocationError::RoomNotFound { room_id })
    }

    fn admin(&self, admin_id: AdminId) -> Result<Admin, AllocationError> {
        self.repository
            .admin(admin_id)?
            .ok_or(AllocationError::AdminNotFound { admin_id })
    }
}

fn new_transaction_reference() -> TransactionReference {
    TransactionReference(format!("TXN-{}", Uuid::new_v4().simple()))
}
