use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{
    Gender, Hall, HallId, PaymentRecord, PaymentStatus, Room, RoomId, Student, StudentId,
    StudentProfile,
};

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: usize, reason: String },
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read enrollment export: {}", err),
            ImportError::Csv(err) => write!(f, "invalid enrollment CSV data: {}", err),
            ImportError::InvalidRow { line, reason } => {
                write!(f, "invalid enrollment row at line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Halls and rooms read from a room inventory export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostelInventory {
    pub halls: Vec<Hall>,
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub halls: usize,
    pub rooms: usize,
    pub beds: u32,
    pub students: usize,
    pub verified_payments: usize,
}

impl ImportSummary {
    pub fn of(inventory: &HostelInventory, students: &[Student]) -> Self {
        Self {
            halls: inventory.halls.len(),
            rooms: inventory.rooms.len(),
            beds: inventory.rooms.iter().map(|room| room.capacity).sum(),
            students: students.len(),
            verified_payments: students
                .iter()
                .filter(|student| student.payment_status == PaymentStatus::Verified)
                .count(),
        }
    }
}

/// Reads the registry's student enrollment export and the estates office room inventory.
pub struct EnrollmentImporter;

impl EnrollmentImporter {
    pub fn students_from_path<P: AsRef<Path>>(
        path: P,
        imported_at: DateTime<Utc>,
    ) -> Result<Vec<Student>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::students_from_reader(file, imported_at)
    }

    /// Verified rows carrying a payment reference get a payment record stamped `imported_at`.
    pub fn students_from_reader<R: Read>(
        reader: R,
        imported_at: DateTime<Utc>,
    ) -> Result<Vec<Student>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut students: Vec<Student> = Vec::new();

        for (index, record) in csv_reader.deserialize::<StudentRow>().enumerate() {
            let row = record?;
            let line = index + 2;
            if row.matric_number.is_empty() {
                return Err(invalid(line, "missing matric_number"));
            }
            if students
                .iter()
                .any(|student| student.student_id.0 == row.matric_number)
            {
                return Err(invalid(
                    line,
                    format!("duplicate matric_number {}", row.matric_number),
                ));
            }

            let gender = Gender::parse(&row.gender)
                .ok_or_else(|| invalid(line, format!("unknown gender {:?}", row.gender)))?;
            let payment_status = parse_payment_status(row.payment_status.as_deref())
                .ok_or_else(|| {
                    invalid(
                        line,
                        format!("unknown payment_status {:?}", row.payment_status),
                    )
                })?;
            let payment = match (payment_status, row.payment_reference) {
                (PaymentStatus::Verified, Some(payment_reference)) => Some(PaymentRecord {
                    payment_reference,
                    amount_paid: row.amount_paid.unwrap_or(0),
                    verified_at: imported_at,
                }),
                _ => None,
            };

            students.push(Student {
                student_id: StudentId(row.matric_number),
                gender,
                payment_status,
                active: true,
                profile: StudentProfile {
                    full_name: row.full_name,
                    department: row.department,
                    level: row.level,
                    email: row.email,
                    phone_number: row.phone_number,
                    house_address: row.house_address,
                },
                payment,
            });
        }

        Ok(students)
    }

    pub fn inventory_from_path<P: AsRef<Path>>(path: P) -> Result<HostelInventory, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::inventory_from_reader(file)
    }

    /// One row per room; hall columns repeat and must agree across a hall's rows.
    pub fn inventory_from_reader<R: Read>(reader: R) -> Result<HostelInventory, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut halls: BTreeMap<HallId, Hall> = BTreeMap::new();
        let mut rooms: Vec<Room> = Vec::new();

        for (index, record) in csv_reader.deserialize::<RoomRow>().enumerate() {
            let row = record?;
            let line = index + 2;
            let gender = Gender::parse(&row.gender)
                .ok_or_else(|| invalid(line, format!("unknown gender {:?}", row.gender)))?;
            let hall_id = HallId(row.hall_id);

            match halls.get(&hall_id) {
                Some(hall) if hall.name != row.hall_name || hall.gender_restriction != gender => {
                    return Err(invalid(
                        line,
                        format!("hall {} disagrees with an earlier row", hall_id),
                    ));
                }
                Some(_) => {}
                None => {
                    halls.insert(
                        hall_id,
                        Hall {
                            hall_id,
                            name: row.hall_name.clone(),
                            gender_restriction: gender,
                        },
                    );
                }
            }

            if row.capacity == 0 {
                return Err(invalid(line, format!("room {} has zero capacity", row.room_number)));
            }
            let occupants = row.current_occupants.unwrap_or(0);
            if occupants > row.capacity {
                return Err(invalid(
                    line,
                    format!("room {} is over capacity", row.room_number),
                ));
            }
            if rooms.iter().any(|room| {
                room.room_id.0 == row.room_id
                    || (room.hall_id == hall_id && room.room_number == row.room_number)
            }) {
                return Err(invalid(
                    line,
                    format!("duplicate room {} ({})", row.room_number, row.room_id),
                ));
            }

            rooms.push(Room {
                room_id: RoomId(row.room_id),
                hall_id,
                room_number: row.room_number,
                capacity: row.capacity,
                current_occupants: occupants,
                is_under_maintenance: row.is_under_maintenance,
            });
        }

        Ok(HostelInventory {
            halls: halls.into_values().collect(),
            rooms,
        })
    }
}

fn invalid(line: usize, reason: impl Into<String>) -> ImportError {
    ImportError::InvalidRow {
        line,
        reason: reason.into(),
    }
}

fn parse_payment_status(raw: Option<&str>) -> Option<PaymentStatus> {
    match raw.map(|value| value.to_ascii_lowercase()).as_deref() {
        None | Some("unverified") | Some("pending") => Some(PaymentStatus::Unverified),
        Some("verified") | Some("paid") => Some(PaymentStatus::Verified),
        Some(_) => None,
    }
}

#[derive(Debug, Deserialize)]
struct StudentRow {
    matric_number: String,
    full_name: String,
    gender: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    payment_status: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    department: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    level: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    phone_number: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    house_address: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    payment_reference: Option<String>,
    #[serde(default)]
    amount_paid: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RoomRow {
    hall_id: u32,
    hall_name: String,
    gender: String,
    room_id: u32,
    room_number: String,
    capacity: u32,
    #[serde(default)]
    current_occupants: Option<u32>,
    #[serde(default, deserialize_with = "flag")]
    is_under_maintenance: bool,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "0" => Ok(false),
        "true" | "yes" | "1" => Ok(true),
        other => Err(serde::de::Error::custom(format!("not a flag: {other}"))),
    }
}
