//! Which rows a viewer may see.
//!
//! Reads are narrowed here by filtering: a viewer outside the scope gets an
//! empty result, never an error. Rejections belong to the permission layer
//! and to [`ensure_can_record`] on writes.

use tracing::warn;
use uuid::Uuid;

use super::model::{HeartRatePredicate, Patient, PatientPredicate};
use crate::{auth::extractors::Caller, error::ApiError, query::Query, users::model::Role};

/// Who a resolver is computing a scope for.
#[derive(Debug, Clone, Copy)]
pub enum Viewer<'a> {
    Caller(&'a Caller),
    /// API description pass without a real identity; always sees nothing.
    Introspection,
}

/// Patients visible on the patient endpoints.
pub fn patients_visible_to(viewer: Viewer<'_>) -> Query<PatientPredicate> {
    let Viewer::Caller(caller) = viewer else {
        return Query::none();
    };
    match caller.role {
        Role::Hod => Query::all(),
        Role::Doctor => Query::all().and(PatientPredicate::DoctorIs(caller.id)),
        Role::Patient => Query::none(),
    }
}

/// Readings of `patient_id` visible to the viewer.
pub fn heart_rates_visible_to(viewer: Viewer<'_>, patient_id: Uuid) -> Query<HeartRatePredicate> {
    let Viewer::Caller(caller) = viewer else {
        return Query::none();
    };
    match caller.role {
        Role::Patient => Query::all()
            .and(HeartRatePredicate::PatientUserIs(caller.id))
            .and(HeartRatePredicate::PatientIs(patient_id)),
        Role::Doctor => Query::all()
            .and(HeartRatePredicate::PatientDoctorIs(caller.id))
            .and(HeartRatePredicate::PatientIs(patient_id)),
        Role::Hod => Query::none(),
    }
}

/// Only the patient's assigned doctor may add readings.
pub fn ensure_can_record(caller: &Caller, patient: &Patient) -> Result<(), ApiError> {
    if patient.doctor_id == Some(caller.id) {
        return Ok(());
    }
    warn!(user_id = %caller.id, patient_id = %patient.id, "heart rate write denied");
    Err(ApiError::forbidden(
        "You do not have permission to add data for this patient.",
    ))
}
