use serde::Deserialize;
use time::{macros::format_description, Date};

use super::model::{HeartRatePredicate, PatientPredicate};
use crate::error::{ApiError, FieldErrors};

/// `GET /patients/` query filters.
#[derive(Debug, Default, Deserialize)]
pub struct PatientFilter {
    #[serde(rename = "full_name__icontains")]
    pub full_name_contains: Option<String>,
    pub age: Option<i32>,
    #[serde(rename = "age__gte")]
    pub age_gte: Option<i32>,
    #[serde(rename = "age__lte")]
    pub age_lte: Option<i32>,
}

impl PatientFilter {
    pub fn predicates(self) -> Vec<PatientPredicate> {
        let mut out = Vec::new();
        if let Some(name) = self.full_name_contains.filter(|n| !n.trim().is_empty()) {
            out.push(PatientPredicate::NameContains(name.trim().to_string()));
        }
        if let Some(age) = self.age {
            out.push(PatientPredicate::AgeEq(age));
        }
        if let Some(age) = self.age_gte {
            out.push(PatientPredicate::AgeAtLeast(age));
        }
        if let Some(age) = self.age_lte {
            out.push(PatientPredicate::AgeAtMost(age));
        }
        out
    }
}

/// `GET /patients/{id}/heart-rates/` query filters. Both dates are inclusive
/// whole days in UTC.
#[derive(Debug, Default, Deserialize)]
pub struct HeartRateFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub value: Option<i32>,
}

fn parse_date(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<Date> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Enter a valid date (YYYY-MM-DD).");
            None
        }
    }
}

impl HeartRateFilter {
    pub fn predicates(self) -> Result<Vec<HeartRatePredicate>, ApiError> {
        let mut errors = FieldErrors::new();
        let start = parse_date(&mut errors, "start_date", self.start_date.as_deref());
        let end = parse_date(&mut errors, "end_date", self.end_date.as_deref());
        errors.into_result()?;

        let mut out = Vec::new();
        if let Some(start) = start {
            out.push(HeartRatePredicate::RecordedFrom(start.midnight().assume_utc()));
        }
        if let Some(next) = end.and_then(Date::next_day) {
            out.push(HeartRatePredicate::RecordedBefore(next.midnight().assume_utc()));
        }
        if let Some(value) = self.value {
            out.push(HeartRatePredicate::ValueEq(value));
        }
        Ok(out)
    }
}
