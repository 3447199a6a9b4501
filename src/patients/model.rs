use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Patient profile joined with the usernames of its owner and doctor.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub age: i32,
    pub address: String,
    pub contact_number: Option<String>,
    pub blood_group: String,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub user_username: String,
    #[serde(rename = "doctor")]
    pub doctor_id: Option<Uuid>,
    pub doctor_username: Option<String>,
    #[serde(skip)]
    pub created_at: OffsetDateTime,
}

/// Demographic part of a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demographics {
    pub full_name: String,
    pub age: i32,
    pub address: String,
    pub contact_number: Option<String>,
    pub blood_group: String,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub demographics: Demographics,
}

impl NewPatient {
    pub fn new(user_id: Uuid, doctor_id: Option<Uuid>, demographics: Demographics) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            doctor_id,
            demographics,
        }
    }
}

/// Partial update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientChanges {
    pub full_name: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    pub contact_number: Option<Option<String>>,
    pub blood_group: Option<String>,
    pub doctor_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct HeartRate {
    pub id: Uuid,
    #[serde(rename = "patient")]
    pub patient_id: Uuid,
    pub value: i32,
    #[serde(rename = "timestamp", with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// Row filters over `patients`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientPredicate {
    IdIs(Uuid),
    UserIs(Uuid),
    DoctorIs(Uuid),
    NameContains(String),
    AgeEq(i32),
    AgeAtLeast(i32),
    AgeAtMost(i32),
}

/// Row filters over `heart_rates`, including its parent patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartRatePredicate {
    PatientIs(Uuid),
    PatientUserIs(Uuid),
    PatientDoctorIs(Uuid),
    RecordedFrom(OffsetDateTime),
    RecordedBefore(OffsetDateTime),
    ValueEq(i32),
}
