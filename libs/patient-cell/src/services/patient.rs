use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_utils::validation::{validate_email, validate_phone};

use crate::models::{
    CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest,
};

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 200;

pub struct PatientService {
    store: PostgrestClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
        }
    }

    pub async fn create_patient(&self, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        debug!("Creating patient record for {} {}", request.first_name, request.last_name);

        require_name("First name", &request.first_name)?;
        require_name("Last name", &request.last_name)?;
        check_phone(&request.phone_number)?;
        let email = normalized_email(request.email.as_deref())?;
        check_date_of_birth(request.date_of_birth)?;

        let now = Utc::now().to_rfc3339();
        let patient: Patient = self
            .store
            .insert(
                "patients",
                json!({
                    "first_name": request.first_name.trim(),
                    "last_name": request.last_name.trim(),
                    "email": email,
                    "phone_number": request.phone_number.trim(),
                    "date_of_birth": request.date_of_birth.format("%Y-%m-%d").to_string(),
                    "gender": request.gender,
                    "address": request.address,
                    "allergies": request.allergies,
                    "notes": request.notes,
                    "created_at": now,
                    "updated_at": now
                }),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient record {} created", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, PatientError> {
        debug!("Fetching patient record: {}", patient_id);

        self.store
            .select_one("patients", &format!("id=eq.{}", patient_id))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .ok_or(PatientError::NotFound)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient record: {}", patient_id);

        let mut update_data = Map::new();

        if let Some(first_name) = request.first_name {
            require_name("First name", &first_name)?;
            update_data.insert("first_name".to_string(), json!(first_name.trim()));
        }
        if let Some(last_name) = request.last_name {
            require_name("Last name", &last_name)?;
            update_data.insert("last_name".to_string(), json!(last_name.trim()));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(normalized_email(Some(&email))?));
        }
        if let Some(phone_number) = request.phone_number {
            check_phone(&phone_number)?;
            update_data.insert("phone_number".to_string(), json!(phone_number.trim()));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            check_date_of_birth(date_of_birth)?;
            update_data.insert(
                "date_of_birth".to_string(),
                json!(date_of_birth.format("%Y-%m-%d").to_string()),
            );
        }
        if let Some(gender) = request.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(allergies) = request.allergies {
            update_data.insert("allergies".to_string(), json!(allergies));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated: Vec<Patient> = self
            .store
            .update("patients", &format!("id=eq.{}", patient_id), Value::Object(update_data))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        updated.into_iter().next().ok_or(PatientError::NotFound)
    }

    pub async fn delete_patient(&self, patient_id: Uuid) -> Result<(), PatientError> {
        self.get_patient(patient_id).await?;

        self.store
            .delete("patients", &format!("id=eq.{}", patient_id))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient record {} deleted", patient_id);
        Ok(())
    }

    pub async fn search_patients(&self, query: PatientSearchQuery) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);

        let query_string = build_search_query(&query);
        self.store
            .select("patients", &query_string)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }
}

fn build_search_query(query: &PatientSearchQuery) -> String {
    let mut parts = vec![];

    if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        let pattern = urlencoding::encode(&format!("*{}*", name)).into_owned();
        parts.push(format!(
            "or=(first_name.ilike.{},last_name.ilike.{})",
            pattern, pattern
        ));
    }
    if let Some(phone) = query.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        parts.push(format!(
            "phone_number=ilike.{}",
            urlencoding::encode(&format!("*{}*", phone))
        ));
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    parts.push("order=last_name.asc,first_name.asc".to_string());
    parts.push(format!("limit={}", limit));
    parts.push(format!("offset={}", offset));

    parts.join("&")
}

fn require_name(field: &str, value: &str) -> Result<(), PatientError> {
    if value.trim().is_empty() {
        return Err(PatientError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

fn check_phone(phone: &str) -> Result<(), PatientError> {
    if !validate_phone(phone.trim()) {
        return Err(PatientError::ValidationError("Invalid phone number".to_string()));
    }
    Ok(())
}

fn normalized_email(email: Option<&str>) -> Result<Option<String>, PatientError> {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) if validate_email(email) => Ok(Some(email.to_lowercase())),
        Some(_) => Err(PatientError::ValidationError("Invalid email address".to_string())),
        None => Ok(None),
    }
}

fn check_date_of_birth(date_of_birth: NaiveDate) -> Result<(), PatientError> {
    if date_of_birth > Utc::now().date_naive() {
        return Err(PatientError::InvalidDateOfBirth);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_search_query_paginates_and_escapes() {
        let query = PatientSearchQuery {
            name: Some("O Brien".to_string()),
            phone: None,
            limit: Some(1000),
            offset: Some(-5),
        };

        let built = build_search_query(&query);
        assert!(built.contains("first_name.ilike.%2AO%20Brien%2A"));
        assert!(built.ends_with("limit=200&offset=0"));
    }

    #[test]
    fn test_empty_search_lists_first_page() {
        let built = build_search_query(&PatientSearchQuery::default());
        assert_eq!(built, "order=last_name.asc,first_name.asc&limit=50&offset=0");
    }

    #[test]
    fn test_field_validation() {
        assert_matches!(require_name("First name", "  "), Err(PatientError::ValidationError(_)));
        assert_matches!(check_phone("call me"), Err(PatientError::ValidationError(_)));
        assert!(check_phone("+353 87 123 4567").is_ok());
        assert_matches!(normalized_email(Some("not-an-email")), Err(PatientError::ValidationError(_)));
        assert_eq!(normalized_email(Some(" Jane@Example.com ")).unwrap(), Some("jane@example.com".to_string()));
        assert_eq!(normalized_email(Some("")).unwrap(), None);

        let tomorrow = Utc::now().date_naive().succ_opt().unwrap();
        assert_matches!(check_date_of_birth(tomorrow), Err(PatientError::InvalidDateOfBirth));
    }
}
