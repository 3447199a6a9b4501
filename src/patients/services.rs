use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateHeartRateRequest, CreatePatientRecordRequest, UpdatePatientRequest},
    filters::{HeartRateFilter, PatientFilter},
    model::{Demographics, HeartRate, NewPatient, Patient, PatientChanges, PatientPredicate},
    scope::{ensure_can_record, heart_rates_visible_to, patients_visible_to, Viewer},
};
use crate::{
    auth::extractors::Caller,
    error::{ApiError, ApiResult, FieldErrors},
    query::{Page, Query, Window},
    state::AppState,
    store::Conflict,
    users::model::Role,
    validation,
};

pub const FULL_NAME_MAX: usize = 200;
pub const CONTACT_MAX: usize = 12;
pub const BLOOD_GROUP_MAX: usize = 3;

/// Raw demographic fields as they arrive in a request.
pub struct DemographicsInput<'a> {
    pub full_name: Option<&'a str>,
    pub age: Option<i32>,
    pub address: Option<&'a str>,
    pub contact_number: Option<&'a str>,
    pub blood_group: Option<&'a str>,
}

pub fn validate_demographics(
    errors: &mut FieldErrors,
    input: DemographicsInput<'_>,
) -> Option<Demographics> {
    let full_name = validation::required_text(errors, "full_name", input.full_name, FULL_NAME_MAX);
    let age = validation::non_negative(errors, "age", input.age);
    let address = validation::required_text(errors, "address", input.address, usize::MAX);
    let contact_number =
        validation::optional_text(errors, "contact_number", input.contact_number, CONTACT_MAX);
    let blood_group =
        validation::required_text(errors, "blood_group", input.blood_group, BLOOD_GROUP_MAX);
    Some(Demographics {
        full_name: full_name?,
        age: age?,
        address: address?,
        contact_number,
        blood_group: blood_group?,
    })
}

/// Records a field error unless `id` names a DOCTOR account.
async fn check_doctor(
    state: &AppState,
    errors: &mut FieldErrors,
    id: Uuid,
) -> anyhow::Result<()> {
    match state.store.find_user(id).await? {
        Some(user) if user.role == Role::Doctor => {}
        Some(_) => errors.add("doctor", "Assigned user must have the DOCTOR role."),
        None => errors.add("doctor", format!("Invalid pk \"{id}\" - object does not exist.")),
    }
    Ok(())
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list_patients(
    state: &AppState,
    caller: &Caller,
    filter: PatientFilter,
    window: Window,
) -> ApiResult<Page<Patient>> {
    let query = patients_visible_to(Viewer::Caller(caller)).and_all(filter.predicates());
    Ok(state.store.list_patients(&query, window).await?)
}

/// A patient inside the caller's scope; anything else is 404.
pub async fn visible_patient(state: &AppState, caller: &Caller, id: Uuid) -> ApiResult<Patient> {
    let query = patients_visible_to(Viewer::Caller(caller)).and(PatientPredicate::IdIs(id));
    state
        .store
        .find_patient(&query)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))
}

#[instrument(skip(state, caller, req), fields(user_id = %caller.id))]
pub async fn create_record(
    state: &AppState,
    caller: &Caller,
    req: CreatePatientRecordRequest,
) -> ApiResult<Patient> {
    let mut errors = FieldErrors::new();

    match req.user {
        None => errors.add("user", validation::REQUIRED),
        Some(user_id) => match state.store.find_user(user_id).await? {
            None => errors.add(
                "user",
                format!("Invalid pk \"{user_id}\" - object does not exist."),
            ),
            Some(user) if user.role != Role::Patient => {
                errors.add("user", "Profile owner must have the PATIENT role.")
            }
            Some(_) => {
                let taken = Query::all().and(PatientPredicate::UserIs(user_id));
                if state.store.find_patient(&taken).await?.is_some() {
                    errors.add(Conflict::PatientUser.field(), Conflict::PatientUser.to_string());
                }
            }
        },
    }

    let doctor_id = match req.doctor {
        Some(Some(id)) => {
            check_doctor(state, &mut errors, id).await?;
            Some(id)
        }
        Some(None) => None,
        None if caller.role == Role::Doctor => Some(caller.id),
        None => None,
    };

    let demographics = validate_demographics(
        &mut errors,
        DemographicsInput {
            full_name: req.full_name.as_deref(),
            age: req.age,
            address: req.address.as_deref(),
            contact_number: req.contact_number.as_deref(),
            blood_group: req.blood_group.as_deref(),
        },
    );
    errors.into_result()?;

    let (Some(user_id), Some(demographics)) = (req.user, demographics) else {
        return Err(anyhow::anyhow!("validated patient record is incomplete").into());
    };
    let patient = state
        .store
        .insert_patient(NewPatient::new(user_id, doctor_id, demographics))
        .await?;
    info!(patient_id = %patient.id, "patient record created");
    Ok(patient)
}

/// A non-nullable column in an update body. `None` is an absent key and
/// `Some(None)` an explicit null, which is always rejected.
fn required_change<T, U>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Option<T>>,
    partial: bool,
    validate: impl FnOnce(&mut FieldErrors, Option<T>) -> Option<U>,
) -> Option<U> {
    match value {
        Some(None) => {
            errors.add(field, validation::NULL);
            None
        }
        None if partial => None,
        value => validate(errors, value.flatten()),
    }
}

/// PUT (`partial == false`) requires every demographic field; PATCH only
/// validates what it is given.
#[instrument(skip(state, caller, req), fields(user_id = %caller.id))]
pub async fn update_record(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    req: UpdatePatientRequest,
    partial: bool,
) -> ApiResult<Patient> {
    let current = visible_patient(state, caller, id).await?;
    let mut errors = FieldErrors::new();

    let full_name = required_change(
        &mut errors,
        "full_name",
        req.full_name.as_ref().map(Option::as_deref),
        partial,
        |e, v| validation::required_text(e, "full_name", v, FULL_NAME_MAX),
    );
    let age = required_change(&mut errors, "age", req.age, partial, |e, v| {
        validation::non_negative(e, "age", v)
    });
    let address = required_change(
        &mut errors,
        "address",
        req.address.as_ref().map(Option::as_deref),
        partial,
        |e, v| validation::required_text(e, "address", v, usize::MAX),
    );
    let blood_group = required_change(
        &mut errors,
        "blood_group",
        req.blood_group.as_ref().map(Option::as_deref),
        partial,
        |e, v| validation::required_text(e, "blood_group", v, BLOOD_GROUP_MAX),
    );
    let contact_number = req.contact_number.as_ref().map(|value| {
        validation::optional_text(&mut errors, "contact_number", value.as_deref(), CONTACT_MAX)
    });
    if let Some(Some(doctor)) = req.doctor {
        check_doctor(state, &mut errors, doctor).await?;
    }

    let changes = PatientChanges {
        full_name,
        age,
        address,
        contact_number,
        blood_group,
        doctor_id: req.doctor,
    };
    errors.into_result()?;

    if changes == PatientChanges::default() {
        return Ok(current);
    }
    let patient = state.store.update_patient(current.id, &changes).await?;
    info!(patient_id = %patient.id, "patient record updated");
    Ok(patient)
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete_record(state: &AppState, caller: &Caller, id: Uuid) -> ApiResult<()> {
    let patient = visible_patient(state, caller, id).await?;
    state.store.delete_patient(patient.id).await?;
    info!(patient_id = %patient.id, "patient record deleted");
    Ok(())
}

/// Readings outside the caller's scope are filtered out, never rejected.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list_heart_rates(
    state: &AppState,
    caller: &Caller,
    patient_id: Uuid,
    filter: HeartRateFilter,
    window: Window,
) -> ApiResult<Page<HeartRate>> {
    let query = heart_rates_visible_to(Viewer::Caller(caller), patient_id)
        .and_all(filter.predicates()?);
    Ok(state.store.list_heart_rates(&query, window).await?)
}

/// Re-checks ownership against the stored patient before writing.
#[instrument(skip(state, caller, req), fields(user_id = %caller.id))]
pub async fn record_heart_rate(
    state: &AppState,
    caller: &Caller,
    patient_id: Uuid,
    req: CreateHeartRateRequest,
) -> ApiResult<HeartRate> {
    let mut errors = FieldErrors::new();
    let value = validation::positive(&mut errors, "value", req.value);
    errors.into_result()?;
    let value = value.ok_or_else(|| anyhow::anyhow!("validated heart rate has no value"))?;

    let patient = state
        .store
        .find_patient(&Query::all().and(PatientPredicate::IdIs(patient_id)))
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;
    ensure_can_record(caller, &patient)?;

    let reading = state.store.insert_heart_rate(patient.id, value).await?;
    info!(patient_id = %patient.id, reading_id = %reading.id, "heart rate recorded");
    Ok(reading)
}
