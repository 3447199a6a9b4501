use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    patients::model::{
        HeartRate, HeartRatePredicate, NewPatient, Patient, PatientChanges, PatientPredicate,
    },
    query::{Page, Query, Window},
    users::model::{NewUser, User},
};

#[cfg(test)]
pub mod memory;
pub mod pg;

pub use pg::PgStore;

/// A write rejected by a uniqueness rule. Stores return it inside their
/// `anyhow::Error` so a lost check-then-insert race still reads as a field
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    #[error("A user with that username already exists.")]
    Username,
    #[error("patient with this user already exists.")]
    PatientUser,
}

impl Conflict {
    pub fn field(self) -> &'static str {
        match self {
            Conflict::Username => "username",
            Conflict::PatientUser => "user",
        }
    }
}

/// Persistence seam for accounts, patient profiles and readings.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn insert_user(&self, user: NewUser) -> anyhow::Result<User>;

    /// Saves the account and its profile in one transaction; on any error
    /// neither row exists afterwards.
    async fn insert_patient_account(
        &self,
        user: NewUser,
        profile: NewPatient,
    ) -> anyhow::Result<(User, Patient)>;

    async fn insert_patient(&self, patient: NewPatient) -> anyhow::Result<Patient>;
    async fn list_patients(
        &self,
        query: &Query<PatientPredicate>,
        window: Window,
    ) -> anyhow::Result<Page<Patient>>;
    async fn find_patient(
        &self,
        query: &Query<PatientPredicate>,
    ) -> anyhow::Result<Option<Patient>>;
    async fn update_patient(&self, id: Uuid, changes: &PatientChanges) -> anyhow::Result<Patient>;
    async fn delete_patient(&self, id: Uuid) -> anyhow::Result<()>;

    async fn list_heart_rates(
        &self,
        query: &Query<HeartRatePredicate>,
        window: Window,
    ) -> anyhow::Result<Page<HeartRate>>;
    async fn insert_heart_rate(&self, patient_id: Uuid, value: i32) -> anyhow::Result<HeartRate>;
}
