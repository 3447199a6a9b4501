//! Machine-readable description of the HTTP surface.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    error::ApiResult,
    patients::{
        model::{HeartRate, Patient},
        scope::{heart_rates_visible_to, patients_visible_to, Viewer},
    },
    query::{Page, Pagination},
    state::AppState,
};

#[derive(Debug, Serialize)]
struct Endpoint {
    method: &'static str,
    path: &'static str,
    roles: &'static [&'static str],
    summary: &'static str,
}

const ANYONE: &[&str] = &[];
const AUTHENTICATED: &[&str] = &["DOCTOR", "PATIENT", "HOD"];
const DOCTOR_OR_HOD: &[&str] = &["DOCTOR", "HOD"];
const DOCTOR_OR_PATIENT: &[&str] = &["DOCTOR", "PATIENT"];

const fn endpoint(
    method: &'static str,
    path: &'static str,
    roles: &'static [&'static str],
    summary: &'static str,
) -> Endpoint {
    Endpoint { method, path, roles, summary }
}

const PATIENT: &str = "/patients/{id}/";
const READINGS: &str = "/patients/{id}/heart-rates/";

const ENDPOINTS: &[Endpoint] = &[
    endpoint("POST", "/token/", ANYONE, "Obtain an access/refresh pair"),
    endpoint("POST", "/token/refresh/", ANYONE, "Exchange a refresh token"),
    endpoint("POST", "/register/", ANYONE, "Self-register a DOCTOR or PATIENT account"),
    endpoint("GET", "/me/", AUTHENTICATED, "Current account"),
    endpoint("POST", "/create-doctor/", &["HOD"], "Provision a doctor"),
    endpoint("POST", "/create-patient/", DOCTOR_OR_HOD, "Provision a patient account and profile"),
    endpoint("GET", "/patients/", DOCTOR_OR_HOD, "List visible patients"),
    endpoint("POST", "/patients/", DOCTOR_OR_HOD, "Create a profile for a patient account"),
    endpoint("GET", PATIENT, DOCTOR_OR_HOD, "Patient detail"),
    endpoint("PUT", PATIENT, DOCTOR_OR_HOD, "Replace demographics"),
    endpoint("PATCH", PATIENT, DOCTOR_OR_HOD, "Update demographics"),
    endpoint("DELETE", PATIENT, DOCTOR_OR_HOD, "Delete a patient record"),
    endpoint("GET", READINGS, DOCTOR_OR_PATIENT, "List visible readings"),
    endpoint("POST", READINGS, DOCTOR_OR_PATIENT, "Record a reading (assigned doctor only)"),
];

pub fn router() -> Router<AppState> {
    Router::new().route("/schema/", get(schema))
}

/// Example list bodies are resolved without an identity, so they are always
/// empty pages and never reach the database.
#[instrument(skip(state))]
pub async fn schema(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let window = Pagination::default().window(state.config.page_size);
    let patients: Page<Patient> = state
        .store
        .list_patients(&patients_visible_to(Viewer::Introspection), window)
        .await?;
    let readings: Page<HeartRate> = state
        .store
        .list_heart_rates(&heart_rates_visible_to(Viewer::Introspection, Uuid::nil()), window)
        .await?;

    Ok(Json(json!({
        "title": "wardbook",
        "version": env!("CARGO_PKG_VERSION"),
        "auth": "Authorization: Bearer <access token>",
        "pagination": { "limit": state.config.page_size, "offset": 0 },
        "endpoints": ENDPOINTS,
        "examples": {
            "patients": patients,
            "heart_rates": readings,
        },
    })))
}
