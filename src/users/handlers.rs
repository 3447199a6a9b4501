use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use super::{
    dto::{CreateDoctorRequest, CreatePatientRequest, PublicUser},
    permissions::{Authorized, DoctorOrHod, HodOnly},
    services,
};
use crate::{
    error::{ApiJson, ApiResult},
    patients::model::Patient,
    state::AppState,
};

pub fn provisioning_routes() -> Router<AppState> {
    Router::new()
        .route("/create-doctor/", post(create_doctor))
        .route("/create-patient/", post(create_patient))
}

#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn create_doctor(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<HodOnly>,
    ApiJson(payload): ApiJson<CreateDoctorRequest>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    let doctor = services::create_doctor(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(doctor.into())))
}

#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn create_patient(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<DoctorOrHod>,
    ApiJson(payload): ApiJson<CreatePatientRequest>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    let patient = services::create_patient_account(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}
