use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    Allocation, AllocationId, Gender, Hall, HallId, Receipt, ReceiptNo, Room, RoomId, Student,
    StudentId, TransactionReference,
};

/// Receipt numbers are never reused and never re-issued for the same allocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("receipt {0} already issued")]
    DuplicateReceipt(ReceiptNo),
    #[error("allocation {0:?} already has receipt {1}")]
    AlreadyReceipted(AllocationId, ReceiptNo),
}

/// Monotonic receipt issuer.
///
/// Issuance is split into `prepare` and `record` so a store can validate the whole booking
/// before mutating anything: a prepared receipt that is never recorded consumes no number.
#[derive(Debug, Clone)]
pub struct ReceiptLedger {
    next_sequence: u64,
    issued: HashMap<ReceiptNo, AllocationId>,
    by_allocation: HashMap<AllocationId, Receipt>,
}

impl Default for ReceiptLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptLedger {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            issued: HashMap::new(),
            by_allocation: HashMap::new(),
        }
    }

    /// Rebuild a ledger from previously issued receipts and a persisted counter.
    ///
    /// The counter is taken as given; a counter lagging behind the receipts surfaces as
    /// `DuplicateReceipt` on the next issuance.
    pub fn restore(receipts: Vec<Receipt>, next_sequence: u64) -> Self {
        let mut ledger = Self::new();
        for receipt in receipts {
            ledger
                .issued
                .insert(receipt.receipt_no.clone(), receipt.allocation_id);
            ledger.by_allocation.insert(receipt.allocation_id, receipt);
        }
        ledger.next_sequence = next_sequence.max(1);
        ledger
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn format_receipt_no(prefix: &str, sequence: u64) -> ReceiptNo {
        ReceiptNo(format!("{prefix}-{sequence:06}"))
    }

    /// Build the receipt the next `record` would store, without touching the ledger.
    pub fn prepare(
        &self,
        allocation: &Allocation,
        prefix: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<Receipt, LedgerError> {
        if let Some(existing) = self.by_allocation.get(&allocation.allocation_id) {
            return Err(LedgerError::AlreadyReceipted(
                allocation.allocation_id,
                existing.receipt_no.clone(),
            ));
        }

        let sequence = self.next_sequence;
        let receipt_no = Self::format_receipt_no(prefix, sequence);
        if self.issued.contains_key(&receipt_no) {
            return Err(LedgerError::DuplicateReceipt(receipt_no));
        }

        Ok(Receipt {
            receipt_no,
            sequence,
            allocation_id: allocation.allocation_id,
            issued_at,
        })
    }

    /// Store a prepared receipt and advance the counter past it.
    pub fn record(&mut self, receipt: Receipt) {
        self.next_sequence = self.next_sequence.max(receipt.sequence + 1);
        self.issued
            .insert(receipt.receipt_no.clone(), receipt.allocation_id);
        self.by_allocation.insert(receipt.allocation_id, receipt);
    }

    pub fn receipt_for(&self, allocation_id: AllocationId) -> Option<&Receipt> {
        self.by_allocation.get(&allocation_id)
    }

    pub fn len(&self) -> usize {
        self.by_allocation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_allocation.is_empty()
    }
}

/// Snapshot handed to the rendering layer (e-receipt page, PDF).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptView {
    pub receipt_no: ReceiptNo,
    pub full_name: String,
    pub matric_no: StudentId,
    pub department: Option<String>,
    pub level: Option<String>,
    pub gender: Gender,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub house_address: Option<String>,
    pub hall_id: HallId,
    pub hall_name: String,
    pub room_id: RoomId,
    pub room_number: String,
    pub allocation_date: DateTime<Utc>,
    pub status: &'static str,
    pub transaction_reference: TransactionReference,
    pub amount_paid: u64,
    pub issued_at: DateTime<Utc>,
}

impl ReceiptView {
    pub fn compose(
        receipt: &Receipt,
        allocation: &Allocation,
        student: &Student,
        hall: &Hall,
        room: &Room,
    ) -> Self {
        let profile = &student.profile;
        Self {
            receipt_no: receipt.receipt_no.clone(),
            full_name: profile.full_name.clone(),
            matric_no: student.student_id.clone(),
            department: profile.department.clone(),
            level: profile.level.clone(),
            gender: student.gender,
            email: profile.email.clone(),
            phone_number: profile.phone_number.clone(),
            house_address: profile.house_address.clone(),
            hall_id: hall.hall_id,
            hall_name: hall.name.clone(),
            room_id: room.room_id,
            room_number: room.room_number.clone(),
            allocation_date: allocation.allocation_date,
            status: allocation.status.label(),
            transaction_reference: allocation.transaction_reference.clone(),
            amount_paid: allocation.amount_paid,
            issued_at: receipt.issued_at,
        }
    }
}
