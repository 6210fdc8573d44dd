use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Actor, Admin, AdminId, AuditAction, AuditEntry, Room, RoomId};
use super::errors::AllocationError;

/// Bookability state of a room, independent of its occupancy counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceState {
    InService,
    UnderMaintenance,
}

impl MaintenanceState {
    pub fn of(room: &Room) -> Self {
        Self::from_flag(room.is_under_maintenance)
    }

    pub const fn from_flag(under_maintenance: bool) -> Self {
        if under_maintenance {
            Self::UnderMaintenance
        } else {
            Self::InService
        }
    }

    pub const fn is_under_maintenance(self) -> bool {
        matches!(self, Self::UnderMaintenance)
    }

    /// Both transitions are unconditional; occupants are never evicted.
    pub const fn toggled(self) -> Self {
        match self {
            Self::InService => Self::UnderMaintenance,
            Self::UnderMaintenance => Self::InService,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::InService => "in_service",
            Self::UnderMaintenance => "under_maintenance",
        }
    }
}

/// Response shape for maintenance commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceStatus {
    pub room_id: RoomId,
    pub is_under_maintenance: bool,
    pub state: MaintenanceState,
    /// False when the room was already in the requested state.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceTransition {
    pub room_id: RoomId,
    pub room_number: String,
    pub from: MaintenanceState,
    pub to: MaintenanceState,
    pub admin_id: AdminId,
    pub at: DateTime<Utc>,
}

impl MaintenanceTransition {
    pub fn audit_entry(&self) -> AuditEntry {
        let action = match self.to {
            MaintenanceState::UnderMaintenance => AuditAction::MaintenanceStarted,
            MaintenanceState::InService => AuditAction::MaintenanceEnded,
        };

        AuditEntry {
            action,
            actor: Actor::Admin(self.admin_id),
            description: format!(
                "room {} ({}) {} -> {}",
                self.room_number,
                self.room_id,
                self.from.label(),
                self.to.label()
            ),
            timestamp: self.at,
        }
    }
}

/// Hall-scoped administrators may only act on rooms in their hall.
pub fn authorize(admin: &Admin, room: &Room) -> Result<(), AllocationError> {
    match admin.hall_id {
        Some(hall_id) if hall_id != room.hall_id => Err(AllocationError::AdminOutOfScope {
            admin_id: admin.admin_id,
            hall_id: room.hall_id,
        }),
        _ => Ok(()),
    }
}
