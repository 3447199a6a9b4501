use serde::{Deserialize, Deserializer};
use uuid::Uuid;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Body of `POST /patients/`.
#[derive(Debug, Deserialize)]
pub struct CreatePatientRecordRequest {
    pub user: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub doctor: Option<Option<Uuid>>,
    pub full_name: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    pub blood_group: Option<String>,
}

/// Body of `PUT`/`PATCH /patients/{id}/`. The owning user cannot change.
/// Every field keeps an explicit `null` apart from an absent key.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub age: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub blood_group: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub doctor: Option<Option<Uuid>>,
}

/// Body of `POST /patients/{id}/heart-rates/`.
#[derive(Debug, Deserialize)]
pub struct CreateHeartRateRequest {
    pub value: Option<i32>,
}
