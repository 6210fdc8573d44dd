use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::domain::{
    Admin, AdminId, Allocation, AllocationId, AllocationStatus, AuditEntry, Hall, HallId,
    PaymentRecord, PaymentStatus, Receipt, Room, RoomId, Student, StudentId,
};
use super::import::HostelInventory;
use super::ledger::{LedgerError, ReceiptLedger};
use super::repository::{
    AllocationCommit, CommittedAllocation, HostelRepository, RepositoryError,
};

/// Process-local store. Every trait method runs under one mutex, which makes each write a
/// single atomic step.
#[derive(Debug, Default)]
pub struct InMemoryHostelRepository {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    halls: BTreeMap<HallId, Hall>,
    rooms: BTreeMap<RoomId, Room>,
    students: HashMap<StudentId, Student>,
    admins: HashMap<AdminId, Admin>,
    allocations: BTreeMap<AllocationId, Allocation>,
    active_by_student: HashMap<StudentId, AllocationId>,
    ledger: ReceiptLedger,
    audit: Vec<AuditEntry>,
    quarantined: HashSet<RoomId>,
    next_allocation_id: u64,
}

impl InMemoryHostelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a restored ledger, e.g. when resuming from an export.
    pub fn with_ledger(ledger: ReceiptLedger) -> Self {
        Self {
            state: Mutex::new(StoreState {
                ledger,
                ..StoreState::default()
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    pub fn add_hall(&self, hall: Hall) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.halls.contains_key(&hall.hall_id) {
            return Err(RepositoryError::Conflict);
        }
        state.halls.insert(hall.hall_id, hall);
        Ok(())
    }

    pub fn add_room(&self, room: Room) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if room.capacity == 0 {
            return Err(RepositoryError::Invalid(format!(
                "room {} has zero capacity",
                room.room_number
            )));
        }
        if room.current_occupants > room.capacity {
            return Err(RepositoryError::Invalid(format!(
                "room {} holds {} occupants but sleeps {}",
                room.room_number, room.current_occupants, room.capacity
            )));
        }
        if !state.halls.contains_key(&room.hall_id) {
            return Err(RepositoryError::NotFound);
        }
        let duplicate_number = state.rooms.values().any(|existing| {
            existing.hall_id == room.hall_id && existing.room_number == room.room_number
        });
        if state.rooms.contains_key(&room.room_id) || duplicate_number {
            return Err(RepositoryError::Conflict);
        }
        state.rooms.insert(room.room_id, room);
        Ok(())
    }

    pub fn add_student(&self, student: Student) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.students.contains_key(&student.student_id) {
            return Err(RepositoryError::Conflict);
        }
        state.students.insert(student.student_id.clone(), student);
        Ok(())
    }

    pub fn add_admin(&self, admin: Admin) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.admins.contains_key(&admin.admin_id) {
            return Err(RepositoryError::Conflict);
        }
        state.admins.insert(admin.admin_id, admin);
        Ok(())
    }

    /// Provision an imported inventory and enrollment, halls first.
    pub fn load(
        &self,
        inventory: HostelInventory,
        students: Vec<Student>,
    ) -> Result<(), RepositoryError> {
        for hall in inventory.halls {
            self.add_hall(hall)?;
        }
        for room in inventory.rooms {
            self.add_room(room)?;
        }
        for student in students {
            self.add_student(student)?;
        }
        Ok(())
    }

    /// Deactivation keeps the record; the student simply stops being eligible.
    pub fn deactivate_student(&self, id: &StudentId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let student = state
            .students
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        student.active = false;
        Ok(())
    }

    pub fn receipts_issued(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.ledger.len())
    }
}

impl HostelRepository for InMemoryHostelRepository {
    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.lock()?.students.get(id).cloned())
    }

    fn admin(&self, id: AdminId) -> Result<Option<Admin>, RepositoryError> {
        Ok(self.lock()?.admins.get(&id).cloned())
    }

    fn hall(&self, id: HallId) -> Result<Option<Hall>, RepositoryError> {
        Ok(self.lock()?.halls.get(&id).cloned())
    }

    fn halls(&self) -> Result<Vec<Hall>, RepositoryError> {
        Ok(self.lock()?.halls.values().cloned().collect())
    }

    fn room(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        Ok(self.lock()?.rooms.get(&id).cloned())
    }

    fn rooms_in_hall(&self, hall_id: HallId) -> Result<Vec<Room>, RepositoryError> {
        Ok(self
            .lock()?
            .rooms
            .values()
            .filter(|room| room.hall_id == hall_id)
            .cloned()
            .collect())
    }

    fn active_allocation(
        &self,
        student: &StudentId,
    ) -> Result<Option<Allocation>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .active_by_student
            .get(student)
            .and_then(|id| state.allocations.get(id))
            .cloned())
    }

    fn allocations(&self, hall_id: Option<HallId>) -> Result<Vec<Allocation>, RepositoryError> {
        Ok(self
            .lock()?
            .allocations
            .values()
            .filter(|allocation| hall_id.map_or(true, |hall| allocation.hall_id == hall))
            .cloned()
            .collect())
    }

    fn allocations_for_room(&self, room_id: RoomId) -> Result<Vec<Allocation>, RepositoryError> {
        Ok(self
            .lock()?
            .allocations
            .values()
            .filter(|allocation| allocation.room_id == room_id)
            .cloned()
            .collect())
    }

    fn receipt_for(&self, allocation_id: AllocationId) -> Result<Option<Receipt>, RepositoryError> {
        Ok(self.lock()?.ledger.receipt_for(allocation_id).cloned())
    }

    fn commit_allocation(
        &self,
        commit: AllocationCommit,
    ) -> Result<CommittedAllocation, RepositoryError> {
        let mut state = self.lock()?;

        // Validate everything first; nothing below the mutation point can fail.
        if state.active_by_student.contains_key(&commit.student_id) {
            return Err(RepositoryError::StudentAlreadyAllocated);
        }
        let room = state
            .rooms
            .get(&commit.room_id)
            .ok_or(RepositoryError::NotFound)?;
        if room.hall_id != commit.hall_id {
            return Err(RepositoryError::NotFound);
        }
        if state.quarantined.contains(&commit.room_id) {
            return Err(RepositoryError::Quarantined(commit.room_id));
        }
        if room.is_full() {
            return Err(RepositoryError::CapacityExceeded);
        }
        if state
            .allocations
            .values()
            .any(|existing| existing.transaction_reference == commit.transaction_reference)
        {
            return Err(RepositoryError::Conflict);
        }

        let allocation = Allocation {
            allocation_id: AllocationId(state.next_allocation_id + 1),
            student_id: commit.student_id,
            hall_id: commit.hall_id,
            room_id: commit.room_id,
            allocation_date: commit.allocation_date,
            status: AllocationStatus::Confirmed,
            transaction_reference: commit.transaction_reference,
            amount_paid: commit.amount_paid,
        };
        let receipt = match state.ledger.prepare(
            &allocation,
            &commit.receipt_prefix,
            commit.allocation_date,
        ) {
            Ok(receipt) => receipt,
            Err(
                LedgerError::DuplicateReceipt(receipt_no)
                | LedgerError::AlreadyReceipted(_, receipt_no),
            ) => {
                // The ledger is broken for this room; halt its writes until released.
                state.quarantined.insert(commit.room_id);
                return Err(RepositoryError::DuplicateReceipt(receipt_no));
            }
        };

        let room = match state.rooms.get_mut(&commit.room_id) {
            Some(room) => {
                room.current_occupants += 1;
                room.clone()
            }
            None => return Err(RepositoryError::NotFound),
        };
        state.next_allocation_id = allocation.allocation_id.0;
        state
            .active_by_student
            .insert(allocation.student_id.clone(), allocation.allocation_id);
        state
            .allocations
            .insert(allocation.allocation_id, allocation.clone());
        state.ledger.record(receipt.clone());
        state.audit.push(commit.audit);

        Ok(CommittedAllocation {
            allocation,
            receipt,
            room,
        })
    }

    fn set_maintenance(
        &self,
        room_id: RoomId,
        under_maintenance: bool,
        audit: AuditEntry,
    ) -> Result<Room, RepositoryError> {
        let mut state = self.lock()?;
        if state.quarantined.contains(&room_id) {
            return Err(RepositoryError::Quarantined(room_id));
        }
        let room = state
            .rooms
            .get_mut(&room_id)
            .ok_or(RepositoryError::NotFound)?;
        room.is_under_maintenance = under_maintenance;
        let room = room.clone();
        state.audit.push(audit);
        Ok(room)
    }

    fn verify_payment(
        &self,
        student: &StudentId,
        payment: PaymentRecord,
        audit: AuditEntry,
    ) -> Result<Student, RepositoryError> {
        let mut state = self.lock()?;
        let record = state
            .students
            .get_mut(student)
            .ok_or(RepositoryError::NotFound)?;
        record.payment_status = PaymentStatus::Verified;
        record.payment = Some(payment);
        let record = record.clone();
        state.audit.push(audit);
        Ok(record)
    }

    fn is_quarantined(&self, room_id: RoomId) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.quarantined.contains(&room_id))
    }

    fn release_quarantine(
        &self,
        room_id: RoomId,
        audit: AuditEntry,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        if !state.quarantined.remove(&room_id) {
            return Ok(false);
        }
        state.audit.push(audit);
        Ok(true)
    }

    fn record_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        self.lock()?.audit.push(entry);
        Ok(())
    }

    fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, RepositoryError> {
        Ok(self
            .lock()?
            .audit
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
