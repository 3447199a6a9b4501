use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{ClinicStore, Conflict};
use crate::{
    patients::model::{
        HeartRate, HeartRatePredicate, NewPatient, Patient, PatientChanges, PatientPredicate,
    },
    query::{Page, Query, Window},
    users::model::{NewUser, User},
};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_superuser, created_at";

const PATIENT_SELECT: &str = r#"
    SELECT p.id, p.full_name, p.age, p.address, p.contact_number, p.blood_group,
           p.user_id, u.username AS user_username,
           p.doctor_id, d.username AS doctor_username,
           p.created_at
      FROM patients p
      JOIN users u ON u.id = p.user_id
      LEFT JOIN users d ON d.id = p.doctor_id
     WHERE TRUE"#;

const PATIENT_COUNT: &str = "SELECT COUNT(*) FROM patients p WHERE TRUE";

const HEART_RATE_SELECT: &str = r#"
    SELECT h.id, h.patient_id, h.value, h.recorded_at
      FROM heart_rates h
      JOIN patients p ON p.id = h.patient_id
     WHERE TRUE"#;

const HEART_RATE_COUNT: &str =
    "SELECT COUNT(*) FROM heart_rates h JOIN patients p ON p.id = h.patient_id WHERE TRUE";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn conflict_for(constraint: Option<&str>) -> Option<Conflict> {
    match constraint? {
        "users_username_key" => Some(Conflict::Username),
        "patients_user_id_key" => Some(Conflict::PatientUser),
        _ => None,
    }
}

/// Unique violations on known constraints become [`Conflict`]s.
fn store_error(err: sqlx::Error) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            if let Some(conflict) = conflict_for(db.constraint()) {
                return conflict.into();
            }
        }
    }
    err.into()
}

/// Escapes `ILIKE` wildcards so user input matches literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_patient_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &Query<PatientPredicate>) {
    for predicate in query.predicates() {
        match predicate {
            PatientPredicate::IdIs(id) => {
                qb.push(" AND p.id = ").push_bind(*id);
            }
            PatientPredicate::UserIs(id) => {
                qb.push(" AND p.user_id = ").push_bind(*id);
            }
            PatientPredicate::DoctorIs(id) => {
                qb.push(" AND p.doctor_id = ").push_bind(*id);
            }
            PatientPredicate::NameContains(needle) => {
                qb.push(" AND p.full_name ILIKE ").push_bind(like_pattern(needle));
            }
            PatientPredicate::AgeEq(age) => {
                qb.push(" AND p.age = ").push_bind(*age);
            }
            PatientPredicate::AgeAtLeast(age) => {
                qb.push(" AND p.age >= ").push_bind(*age);
            }
            PatientPredicate::AgeAtMost(age) => {
                qb.push(" AND p.age <= ").push_bind(*age);
            }
        }
    }
}

fn push_heart_rate_filters<'a>(
    qb: &mut QueryBuilder<'a, Postgres>,
    query: &Query<HeartRatePredicate>,
) {
    for predicate in query.predicates() {
        match predicate {
            HeartRatePredicate::PatientIs(id) => {
                qb.push(" AND h.patient_id = ").push_bind(*id);
            }
            HeartRatePredicate::PatientUserIs(id) => {
                qb.push(" AND p.user_id = ").push_bind(*id);
            }
            HeartRatePredicate::PatientDoctorIs(id) => {
                qb.push(" AND p.doctor_id = ").push_bind(*id);
            }
            HeartRatePredicate::RecordedFrom(at) => {
                qb.push(" AND h.recorded_at >= ").push_bind(*at);
            }
            HeartRatePredicate::RecordedBefore(at) => {
                qb.push(" AND h.recorded_at < ").push_bind(*at);
            }
            HeartRatePredicate::ValueEq(value) => {
                qb.push(" AND h.value = ").push_bind(*value);
            }
        }
    }
}

async fn fetch_patient_by_id<'e, E>(executor: E, id: Uuid) -> anyhow::Result<Option<Patient>>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let mut qb = QueryBuilder::<Postgres>::new(PATIENT_SELECT);
    qb.push(" AND p.id = ").push_bind(id);
    let row = qb
        .build_query_as::<Patient>()
        .fetch_optional(executor)
        .await
        .context("select patient by id")?;
    Ok(row)
}

#[async_trait]
impl ClinicStore for PgStore {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select user by id")?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("select user by username")?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id())
        .bind(user.username())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.role())
        .bind(user.is_superuser())
        .fetch_one(&self.db)
        .await
        .map_err(store_error)
        .context("insert user")?;
        debug!(user_id = %row.id, role = %row.role, "user inserted");
        Ok(row)
    }

    async fn insert_patient_account(
        &self,
        user: NewUser,
        profile: NewPatient,
    ) -> anyhow::Result<(User, Patient)> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let account = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id())
        .bind(user.username())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.role())
        .bind(user.is_superuser())
        .fetch_one(&mut *tx)
        .await
        .map_err(store_error)
        .context("insert patient user")?;

        insert_patient_row(&mut tx, &profile).await?;

        let patient = fetch_patient_by_id(&mut *tx, profile.id)
            .await?
            .context("patient profile vanished inside its own transaction")?;

        tx.commit().await.context("commit tx")?;
        Ok((account, patient))
    }

    async fn insert_patient(&self, patient: NewPatient) -> anyhow::Result<Patient> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        insert_patient_row(&mut tx, &patient).await?;
        let row = fetch_patient_by_id(&mut *tx, patient.id)
            .await?
            .context("patient vanished inside its own transaction")?;
        tx.commit().await.context("commit tx")?;
        Ok(row)
    }

    async fn list_patients(
        &self,
        query: &Query<PatientPredicate>,
        window: Window,
    ) -> anyhow::Result<Page<Patient>> {
        if query.is_none() {
            return Ok(Page::empty());
        }

        let mut count = QueryBuilder::<Postgres>::new(PATIENT_COUNT);
        push_patient_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .context("count patients")?;

        let mut select = QueryBuilder::<Postgres>::new(PATIENT_SELECT);
        push_patient_filters(&mut select, query);
        select
            .push(" ORDER BY p.created_at ASC, p.id ASC LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.offset);
        let rows = select
            .build_query_as::<Patient>()
            .fetch_all(&self.db)
            .await
            .context("list patients")?;

        Ok(Page {
            count: total,
            results: rows,
        })
    }

    async fn find_patient(
        &self,
        query: &Query<PatientPredicate>,
    ) -> anyhow::Result<Option<Patient>> {
        if query.is_none() {
            return Ok(None);
        }
        let mut select = QueryBuilder::<Postgres>::new(PATIENT_SELECT);
        push_patient_filters(&mut select, query);
        select.push(" LIMIT 1");
        let row = select
            .build_query_as::<Patient>()
            .fetch_optional(&self.db)
            .await
            .context("find patient")?;
        Ok(row)
    }

    async fn update_patient(&self, id: Uuid, changes: &PatientChanges) -> anyhow::Result<Patient> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE patients SET id = id");
        if let Some(v) = &changes.full_name {
            qb.push(", full_name = ").push_bind(v.clone());
        }
        if let Some(v) = changes.age {
            qb.push(", age = ").push_bind(v);
        }
        if let Some(v) = &changes.address {
            qb.push(", address = ").push_bind(v.clone());
        }
        if let Some(v) = &changes.contact_number {
            qb.push(", contact_number = ").push_bind(v.clone());
        }
        if let Some(v) = &changes.blood_group {
            qb.push(", blood_group = ").push_bind(v.clone());
        }
        if let Some(v) = changes.doctor_id {
            qb.push(", doctor_id = ").push_bind(v);
        }
        qb.push(" WHERE id = ").push_bind(id);

        let done = qb
            .build()
            .execute(&self.db)
            .await
            .context("update patient")?;
        anyhow::ensure!(done.rows_affected() == 1, "patient {id} not found for update");

        fetch_patient_by_id(&self.db, id)
            .await?
            .with_context(|| format!("patient {id} vanished after update"))
    }

    async fn delete_patient(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete patient")?;
        Ok(())
    }

    async fn list_heart_rates(
        &self,
        query: &Query<HeartRatePredicate>,
        window: Window,
    ) -> anyhow::Result<Page<HeartRate>> {
        if query.is_none() {
            return Ok(Page::empty());
        }

        let mut count = QueryBuilder::<Postgres>::new(HEART_RATE_COUNT);
        push_heart_rate_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .context("count heart rates")?;

        let mut select = QueryBuilder::<Postgres>::new(HEART_RATE_SELECT);
        push_heart_rate_filters(&mut select, query);
        select
            .push(" ORDER BY h.recorded_at DESC, h.id DESC LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.offset);
        let rows = select
            .build_query_as::<HeartRate>()
            .fetch_all(&self.db)
            .await
            .context("list heart rates")?;

        Ok(Page {
            count: total,
            results: rows,
        })
    }

    async fn insert_heart_rate(&self, patient_id: Uuid, value: i32) -> anyhow::Result<HeartRate> {
        let row = sqlx::query_as::<_, HeartRate>(
            r#"
            INSERT INTO heart_rates (id, patient_id, value)
            VALUES ($1, $2, $3)
            RETURNING id, patient_id, value, recorded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(value)
        .fetch_one(&self.db)
        .await
        .context("insert heart rate")?;
        Ok(row)
    }
}

async fn insert_patient_row(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    patient: &NewPatient,
) -> anyhow::Result<()> {
    let d = &patient.demographics;
    sqlx::query(
        r#"
        INSERT INTO patients
            (id, user_id, doctor_id, full_name, age, address, contact_number, blood_group)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(patient.id)
    .bind(patient.user_id)
    .bind(patient.doctor_id) // Option<Uuid> → NULL allowed
    .bind(&d.full_name)
    .bind(d.age)
    .bind(&d.address)
    .bind(&d.contact_number)
    .bind(&d.blood_group)
    .execute(&mut **tx)
    .await
    .map_err(store_error)
    .context("insert patient")?;
    Ok(())
}
