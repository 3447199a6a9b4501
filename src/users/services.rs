use anyhow::Context;
use tracing::{info, instrument, warn};

use super::{
    dto::{CreateDoctorRequest, CreatePatientRequest, RegisterRequest},
    model::{NewUser, Role, User},
};
use crate::{
    auth::{extractors::Caller, password::hash_password},
    config::BootstrapAdmin,
    error::{ApiError, ApiResult, FieldErrors},
    patients::{
        model::{NewPatient, Patient},
        services::{validate_demographics, DemographicsInput},
    },
    state::AppState,
    store::{ClinicStore, Conflict},
    validation,
};

/// Validated credentials for a new account.
struct Credentials {
    username: String,
    email: String,
    password: String,
}

async fn validate_credentials(
    state: &AppState,
    errors: &mut FieldErrors,
    username: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
) -> anyhow::Result<Option<Credentials>> {
    let username = validation::username(errors, username);
    let email = validation::email(errors, email);
    let password = validation::password(errors, password);

    if let Some(name) = &username {
        if state.store.find_user_by_username(name).await?.is_some() {
            errors.add(Conflict::Username.field(), Conflict::Username.to_string());
            return Ok(None);
        }
    }
    Ok(match (username, password) {
        (Some(username), Some(password)) => Some(Credentials {
            username,
            email,
            password,
        }),
        _ => None,
    })
}

fn incomplete() -> ApiError {
    anyhow::anyhow!("validated account is incomplete").into()
}

/// HOD provisions a doctor account.
#[instrument(skip(state, caller, req), fields(user_id = %caller.id))]
pub async fn create_doctor(
    state: &AppState,
    caller: &Caller,
    req: CreateDoctorRequest,
) -> ApiResult<User> {
    let mut errors = FieldErrors::new();
    let creds = validate_credentials(
        state,
        &mut errors,
        req.username.as_deref(),
        req.email.as_deref(),
        req.password.as_deref(),
    )
    .await?;
    errors.into_result()?;
    let creds = creds.ok_or_else(incomplete)?;

    let hash = hash_password(&creds.password)?;
    let user = state
        .store
        .insert_user(NewUser::new(&creds.username, &creds.email, hash, Role::Doctor))
        .await?;
    info!(doctor_id = %user.id, username = %user.username, "doctor provisioned");
    Ok(user)
}

/// Creates a PATIENT account and its profile, assigned to the caller, in one
/// transaction.
#[instrument(skip(state, caller, req), fields(user_id = %caller.id))]
pub async fn create_patient_account(
    state: &AppState,
    caller: &Caller,
    req: CreatePatientRequest,
) -> ApiResult<Patient> {
    let mut errors = FieldErrors::new();
    let creds = validate_credentials(
        state,
        &mut errors,
        req.username.as_deref(),
        None,
        req.password.as_deref(),
    )
    .await?;
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
    let (Some(creds), Some(demographics)) = (creds, demographics) else {
        return Err(incomplete());
    };

    let hash = hash_password(&creds.password)?;
    let account = NewUser::new(&creds.username, &creds.email, hash, Role::Patient);
    let profile = NewPatient::new(account.id(), Some(caller.id), demographics);
    let (user, patient) = state
        .store
        .insert_patient_account(account, profile)
        .await
        .context("provision patient account")?;
    info!(patient_user_id = %user.id, patient_id = %patient.id, "patient provisioned");
    Ok(patient)
}

/// Self-service sign-up; HOD accounts cannot be self-registered.
#[instrument(skip(state, req))]
pub async fn register(state: &AppState, req: RegisterRequest) -> ApiResult<User> {
    let mut errors = FieldErrors::new();
    let role = match req.role {
        None => {
            errors.add("role", validation::REQUIRED);
            None
        }
        Some(Role::Hod) => {
            errors.add("role", "HOD accounts cannot be self-registered.");
            None
        }
        Some(role) => Some(role),
    };
    let creds = validate_credentials(
        state,
        &mut errors,
        req.username.as_deref(),
        req.email.as_deref(),
        req.password.as_deref(),
    )
    .await?;
    errors.into_result()?;
    let (Some(creds), Some(role)) = (creds, role) else {
        return Err(incomplete());
    };

    let hash = hash_password(&creds.password)?;
    let user = state
        .store
        .insert_user(NewUser::new(&creds.username, &creds.email, hash, role))
        .await?;
    info!(user_id = %user.id, role = %user.role, "user registered");
    Ok(user)
}

/// Creates the configured superuser unless the username already exists.
pub async fn ensure_superuser(
    store: &dyn ClinicStore,
    admin: &BootstrapAdmin,
) -> anyhow::Result<()> {
    if let Some(existing) = store.find_user_by_username(&admin.username).await? {
        if !existing.is_superuser {
            warn!(
                username = %admin.username,
                "bootstrap admin username belongs to a regular account"
            );
        }
        return Ok(());
    }
    let hash = hash_password(&admin.password)?;
    let user = store
        .insert_user(NewUser::superuser(&admin.username, &admin.email, hash))
        .await
        .context("create bootstrap superuser")?;
    info!(user_id = %user.id, role = %user.role, "bootstrap superuser created");
    Ok(())
}
