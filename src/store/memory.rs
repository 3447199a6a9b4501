use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{ClinicStore, Conflict};
use crate::{
    patients::model::{
        HeartRate, HeartRatePredicate, NewPatient, Patient, PatientChanges, PatientPredicate,
    },
    query::{Page, Query, Window},
    users::model::{NewUser, User},
};

#[derive(Debug, Clone)]
struct PatientRow {
    id: Uuid,
    user_id: Uuid,
    doctor_id: Option<Uuid>,
    full_name: String,
    age: i32,
    address: String,
    contact_number: Option<String>,
    blood_group: String,
    created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    patients: Vec<PatientRow>,
    heart_rates: Vec<HeartRate>,
    // monotonic clock so ordering is deterministic within a test
    ticks: i64,
}

impl Tables {
    fn now(&mut self) -> OffsetDateTime {
        self.ticks += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::seconds(self.ticks)
    }

    fn username(&self, id: Uuid) -> Option<String> {
        self.users.iter().find(|u| u.id == id).map(|u| u.username.clone())
    }

    fn view(&self, row: &PatientRow) -> Patient {
        Patient {
            id: row.id,
            full_name: row.full_name.clone(),
            age: row.age,
            address: row.address.clone(),
            contact_number: row.contact_number.clone(),
            blood_group: row.blood_group.clone(),
            user_id: row.user_id,
            user_username: self.username(row.user_id).unwrap_or_default(),
            doctor_id: row.doctor_id,
            doctor_username: row.doctor_id.and_then(|id| self.username(id)),
            created_at: row.created_at,
        }
    }

    fn insert_user(&mut self, user: NewUser) -> anyhow::Result<User> {
        if self.users.iter().any(|u| u.username == user.username()) {
            return Err(Conflict::Username.into());
        }
        let created_at = self.now();
        let row = User {
            id: user.id(),
            username: user.username().to_string(),
            email: user.email().to_string(),
            password_hash: user.password_hash().to_string(),
            role: user.role(),
            is_superuser: user.is_superuser(),
            created_at,
        };
        self.users.push(row.clone());
        Ok(row)
    }

    fn insert_patient(&mut self, patient: NewPatient) -> anyhow::Result<Patient> {
        anyhow::ensure!(
            self.users.iter().any(|u| u.id == patient.user_id),
            "patient user {} does not exist",
            patient.user_id
        );
        if self.patients.iter().any(|p| p.user_id == patient.user_id) {
            return Err(Conflict::PatientUser.into());
        }
        let created_at = self.now();
        let d = patient.demographics;
        let row = PatientRow {
            id: patient.id,
            user_id: patient.user_id,
            doctor_id: patient.doctor_id,
            full_name: d.full_name,
            age: d.age,
            address: d.address,
            contact_number: d.contact_number,
            blood_group: d.blood_group,
            created_at,
        };
        let view = self.view(&row);
        self.patients.push(row);
        Ok(view)
    }
}

fn patient_matches(row: &PatientRow, predicate: &PatientPredicate) -> bool {
    match predicate {
        PatientPredicate::IdIs(id) => row.id == *id,
        PatientPredicate::UserIs(id) => row.user_id == *id,
        PatientPredicate::DoctorIs(id) => row.doctor_id == Some(*id),
        PatientPredicate::NameContains(needle) => row
            .full_name
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        PatientPredicate::AgeEq(age) => row.age == *age,
        PatientPredicate::AgeAtLeast(age) => row.age >= *age,
        PatientPredicate::AgeAtMost(age) => row.age <= *age,
    }
}

fn heart_rate_matches(hr: &HeartRate, parent: &PatientRow, predicate: &HeartRatePredicate) -> bool {
    match predicate {
        HeartRatePredicate::PatientIs(id) => hr.patient_id == *id,
        HeartRatePredicate::PatientUserIs(id) => parent.user_id == *id,
        HeartRatePredicate::PatientDoctorIs(id) => parent.doctor_id == Some(*id),
        HeartRatePredicate::RecordedFrom(at) => hr.recorded_at >= *at,
        HeartRatePredicate::RecordedBefore(at) => hr.recorded_at < *at,
        HeartRatePredicate::ValueEq(value) => hr.value == *value,
    }
}

fn paginate<T>(mut rows: Vec<T>, window: Window) -> Page<T> {
    let count = rows.len() as i64;
    let start = (window.offset as usize).min(rows.len());
    let end = (start + window.limit as usize).min(rows.len());
    let results = rows.drain(start..end).collect();
    Page { count, results }
}

/// In-process store backing `AppState::fake()`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_profile_insert: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next patient-account insert fail after its user row is staged.
    pub fn fail_next_profile_insert(&self) {
        self.fail_profile_insert.store(true, Ordering::SeqCst);
    }

    /// Stores a reading with an explicit timestamp.
    pub fn insert_heart_rate_at(
        &self,
        patient_id: Uuid,
        value: i32,
        recorded_at: OffsetDateTime,
    ) -> HeartRate {
        let row = HeartRate {
            id: Uuid::new_v4(),
            patient_id,
            value,
            recorded_at,
        };
        self.lock().heart_rates.push(row.clone());
        row
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn patient_count(&self) -> usize {
        self.lock().patients.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> anyhow::Result<User> {
        self.lock().insert_user(user)
    }

    async fn insert_patient_account(
        &self,
        user: NewUser,
        profile: NewPatient,
    ) -> anyhow::Result<(User, Patient)> {
        let mut tables = self.lock();
        let mut staged = tables.clone();

        let account = staged.insert_user(user)?;
        anyhow::ensure!(
            !self.fail_profile_insert.swap(false, Ordering::SeqCst),
            "injected failure while inserting patient profile"
        );
        let patient = staged.insert_patient(profile)?;

        *tables = staged;
        Ok((account, patient))
    }

    async fn insert_patient(&self, patient: NewPatient) -> anyhow::Result<Patient> {
        self.lock().insert_patient(patient)
    }

    async fn list_patients(
        &self,
        query: &Query<PatientPredicate>,
        window: Window,
    ) -> anyhow::Result<Page<Patient>> {
        if query.is_none() {
            return Ok(Page::empty());
        }
        let tables = self.lock();
        let rows: Vec<Patient> = tables
            .patients
            .iter()
            .filter(|p| query.predicates().iter().all(|pred| patient_matches(p, pred)))
            .map(|p| tables.view(p))
            .collect();
        Ok(paginate(rows, window))
    }

    async fn find_patient(
        &self,
        query: &Query<PatientPredicate>,
    ) -> anyhow::Result<Option<Patient>> {
        if query.is_none() {
            return Ok(None);
        }
        let tables = self.lock();
        Ok(tables
            .patients
            .iter()
            .find(|p| query.predicates().iter().all(|pred| patient_matches(p, pred)))
            .map(|p| tables.view(p)))
    }

    async fn update_patient(&self, id: Uuid, changes: &PatientChanges) -> anyhow::Result<Patient> {
        let mut tables = self.lock();
        let idx = tables
            .patients
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| anyhow::anyhow!("patient {id} not found for update"))?;

        let row = &mut tables.patients[idx];
        if let Some(v) = &changes.full_name {
            row.full_name = v.clone();
        }
        if let Some(v) = changes.age {
            row.age = v;
        }
        if let Some(v) = &changes.address {
            row.address = v.clone();
        }
        if let Some(v) = &changes.contact_number {
            row.contact_number = v.clone();
        }
        if let Some(v) = &changes.blood_group {
            row.blood_group = v.clone();
        }
        if let Some(v) = changes.doctor_id {
            row.doctor_id = v;
        }

        let row = tables.patients[idx].clone();
        Ok(tables.view(&row))
    }

    async fn delete_patient(&self, id: Uuid) -> anyhow::Result<()> {
        let mut tables = self.lock();
        tables.patients.retain(|p| p.id != id);
        tables.heart_rates.retain(|h| h.patient_id != id);
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
        let tables = self.lock();
        let mut rows: Vec<HeartRate> = tables
            .heart_rates
            .iter()
            .filter(|hr| {
                tables
                    .patients
                    .iter()
                    .find(|p| p.id == hr.patient_id)
                    .is_some_and(|parent| {
                        query
                            .predicates()
                            .iter()
                            .all(|pred| heart_rate_matches(hr, parent, pred))
                    })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, window))
    }

    async fn insert_heart_rate(&self, patient_id: Uuid, value: i32) -> anyhow::Result<HeartRate> {
        let mut tables = self.lock();
        anyhow::ensure!(
            tables.patients.iter().any(|p| p.id == patient_id),
            "patient {patient_id} does not exist"
        );
        let recorded_at = tables.now();
        let row = HeartRate {
            id: Uuid::new_v4(),
            patient_id,
            value,
            recorded_at,
        };
        tables.heart_rates.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patients::model::Demographics;
    use crate::users::model::Role;

    fn demographics(name: &str, age: i32) -> Demographics {
        Demographics {
            full_name: name.into(),
            age,
            address: "1 Test Lane".into(),
            contact_number: None,
            blood_group: "A+".into(),
        }
    }

    #[tokio::test]
    async fn failed_profile_insert_leaves_no_rows() {
        let store = MemoryStore::new();
        store.fail_next_profile_insert();

        let user = NewUser::new("p1", "", "hash".into(), Role::Patient);
        let profile = NewPatient::new(user.id(), None, demographics("P One", 30));
        assert!(store.insert_patient_account(user, profile).await.is_err());
        assert_eq!(store.user_count(), 0);
        assert_eq!(store.patient_count(), 0);

        let user = NewUser::new("p1", "", "hash".into(), Role::Patient);
        let profile = NewPatient::new(user.id(), None, demographics("P One", 30));
        store.insert_patient_account(user, profile).await.unwrap();
        assert_eq!(store.user_count(), 1);
        assert_eq!(store.patient_count(), 1);
    }

    #[tokio::test]
    async fn heart_rates_come_back_newest_first() {
        let store = MemoryStore::new();
        let user = NewUser::new("p1", "", "hash".into(), Role::Patient);
        let profile = NewPatient::new(user.id(), None, demographics("P One", 30));
        let (_, patient) = store.insert_patient_account(user, profile).await.unwrap();

        for v in [70, 80, 90] {
            store.insert_heart_rate(patient.id, v).await.unwrap();
        }
        let page = store
            .list_heart_rates(
                &Query::all().and(HeartRatePredicate::PatientIs(patient.id)),
                Window { limit: 10, offset: 0 },
            )
            .await
            .unwrap();
        let values: Vec<i32> = page.results.iter().map(|h| h.value).collect();
        assert_eq!(values, vec![90, 80, 70]);
    }

    #[tokio::test]
    async fn duplicates_are_conflicts_and_updates_are_partial() {
        let store = MemoryStore::new();
        let user = NewUser::new("p1", "", "hash".into(), Role::Patient);
        let owner = user.id();
        let profile = NewPatient::new(owner, None, demographics("P One", 30));
        let (_, patient) = store.insert_patient_account(user, profile).await.unwrap();

        let err = store
            .insert_user(NewUser::new("p1", "", "hash".into(), Role::Doctor))
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Conflict>(), Some(&Conflict::Username));

        let err = store
            .insert_patient(NewPatient::new(owner, None, demographics("Again", 1)))
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Conflict>(), Some(&Conflict::PatientUser));

        let changes = PatientChanges {
            age: Some(31),
            contact_number: Some(Some("5550100".into())),
            ..Default::default()
        };
        let updated = store.update_patient(patient.id, &changes).await.unwrap();
        assert_eq!(updated.age, 31);
        assert_eq!(updated.contact_number.as_deref(), Some("5550100"));
        assert_eq!(updated.full_name, "P One");
    }
}
