use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateHeartRateRequest, CreatePatientRecordRequest, UpdatePatientRequest},
    filters::{HeartRateFilter, PatientFilter},
    model::{HeartRate, Patient},
    services,
};
use crate::{
    error::{ApiJson, ApiResult},
    query::{Page, Pagination},
    state::AppState,
    users::permissions::{Authorized, DoctorOrHod, DoctorOrPatient},
};

pub fn patient_routes() -> Router<AppState> {
    Router::new()
        .route("/patients/", get(list_patients).post(create_patient))
        .route(
            "/patients/:id/",
            get(get_patient)
                .put(replace_patient)
                .patch(patch_patient)
                .delete(delete_patient),
        )
}

pub fn heart_rate_routes() -> Router<AppState> {
    Router::new().route(
        "/patients/:id/heart-rates/",
        get(list_heart_rates).post(create_heart_rate),
    )
}

// --- patients ---

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list_patients(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<DoctorOrHod>,
    Query(p): Query<Pagination>,
    Query(filter): Query<PatientFilter>,
) -> ApiResult<Json<Page<Patient>>> {
    let window = p.window(state.config.page_size);
    let page = services::list_patients(&state, &caller, filter, window).await?;
    Ok(Json(page))
}

#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn create_patient(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<DoctorOrHod>,
    ApiJson(payload): ApiJson<CreatePatientRecordRequest>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    let patient = services::create_record(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn get_patient(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<DoctorOrHod>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(services::visible_patient(&state, &caller, id).await?))
}

#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn replace_patient(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<DoctorOrHod>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdatePatientRequest>,
) -> ApiResult<Json<Patient>> {
    let patient = services::update_record(&state, &caller, id, payload, false).await?;
    Ok(Json(patient))
}

#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn patch_patient(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<DoctorOrHod>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdatePatientRequest>,
) -> ApiResult<Json<Patient>> {
    let patient = services::update_record(&state, &caller, id, payload, true).await?;
    Ok(Json(patient))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete_patient(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<DoctorOrHod>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    services::delete_record(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- heart rates ---

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list_heart_rates(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<DoctorOrPatient>,
    Path(patient_id): Path<Uuid>,
    Query(p): Query<Pagination>,
    Query(filter): Query<HeartRateFilter>,
) -> ApiResult<Json<Page<HeartRate>>> {
    let window = p.window(state.config.page_size);
    let page =
        services::list_heart_rates(&state, &caller, patient_id, filter, window).await?;
    Ok(Json(page))
}

#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn create_heart_rate(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<DoctorOrPatient>,
    Path(patient_id): Path<Uuid>,
    ApiJson(payload): ApiJson<CreateHeartRateRequest>,
) -> ApiResult<(StatusCode, Json<HeartRate>)> {
    let reading =
        services::record_heart_rate(&state, &caller, patient_id, payload).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}
