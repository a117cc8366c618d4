use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::context::StaffIdentity;

use crate::models::{
    DentalRecordError, MedicalHistory, MedicalHistoryEntry, NewHistoryEntryRequest,
    UpdateHistoryEntryRequest,
};
use crate::services::ensure_patient_exists;

pub struct MedicalHistoryService {
    store: PostgrestClient,
}

impl MedicalHistoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
        }
    }

    pub async fn get_history(&self, patient_id: Uuid) -> Result<MedicalHistory, DentalRecordError> {
        debug!("Fetching medical history for patient {}", patient_id);

        let history: Option<MedicalHistory> = self
            .store
            .select_one("medical_histories", &format!("patient_id=eq.{}", patient_id))
            .await
            .map_err(|e| DentalRecordError::DatabaseError(e.to_string()))?;

        Ok(history.unwrap_or_else(|| MedicalHistory::empty(patient_id)))
    }

    pub async fn append_entry(
        &self,
        doctor: &StaffIdentity,
        patient_id: Uuid,
        request: NewHistoryEntryRequest,
    ) -> Result<MedicalHistory, DentalRecordError> {
        if request.notes.trim().is_empty() {
            return Err(DentalRecordError::ValidationError("Notes are required".to_string()));
        }
        ensure_patient_exists(&self.store, patient_id).await?;

        let mut history = self.get_history(patient_id).await?;
        history.entries.push(MedicalHistoryEntry {
            doctor_id: doctor.user_id,
            doctor_name: doctor.name.clone(),
            date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
            notes: request.notes.trim().to_string(),
            findings: request.findings,
            treatment: request.treatment,
        });

        let saved = self.save(history).await?;
        info!(
            "Doctor {} appended history entry #{} for patient {}",
            doctor.user_id,
            saved.entries.len() - 1,
            patient_id
        );
        Ok(saved)
    }

    pub async fn update_entry(
        &self,
        doctor: &StaffIdentity,
        patient_id: Uuid,
        index: usize,
        request: UpdateHistoryEntryRequest,
    ) -> Result<MedicalHistory, DentalRecordError> {
        let mut history = self.get_history(patient_id).await?;
        edit_entry(&mut history.entries, index, doctor.user_id, request)?;

        let saved = self.save(history).await?;
        info!("Doctor {} edited history entry #{} for patient {}", doctor.user_id, index, patient_id);
        Ok(saved)
    }

    pub async fn delete_entry(
        &self,
        doctor: &StaffIdentity,
        patient_id: Uuid,
        index: usize,
    ) -> Result<MedicalHistory, DentalRecordError> {
        let mut history = self.get_history(patient_id).await?;
        remove_entry(&mut history.entries, index, doctor.user_id)?;

        let saved = self.save(history).await?;
        info!("Doctor {} removed history entry #{} for patient {}", doctor.user_id, index, patient_id);
        Ok(saved)
    }

    async fn save(&self, history: MedicalHistory) -> Result<MedicalHistory, DentalRecordError> {
        let now = Utc::now().to_rfc3339();

        match history.id {
            Some(id) => {
                let updated: Vec<MedicalHistory> = self
                    .store
                    .update(
                        "medical_histories",
                        &format!("id=eq.{}", id),
                        json!({ "entries": history.entries, "updated_at": now }),
                    )
                    .await
                    .map_err(|e| DentalRecordError::DatabaseError(e.to_string()))?;

                updated.into_iter().next().ok_or_else(|| {
                    DentalRecordError::DatabaseError("Medical history update returned no rows".to_string())
                })
            }
            None => self
                .store
                .insert(
                    "medical_histories",
                    json!({
                        "patient_id": history.patient_id,
                        "entries": history.entries,
                        "created_at": now,
                        "updated_at": now
                    }),
                )
                .await
                .map_err(|e| DentalRecordError::DatabaseError(e.to_string())),
        }
    }
}

fn authored_entry(
    entries: &mut [MedicalHistoryEntry],
    index: usize,
    doctor_id: Uuid,
) -> Result<&mut MedicalHistoryEntry, DentalRecordError> {
    let len = entries.len();
    let entry = entries
        .get_mut(index)
        .ok_or(DentalRecordError::EntryIndexOutOfRange { index, len })?;

    if entry.doctor_id != doctor_id {
        warn!("Doctor {} attempted to modify an entry authored by {}", doctor_id, entry.doctor_id);
        return Err(DentalRecordError::NotEntryAuthor);
    }
    Ok(entry)
}

fn edit_entry(
    entries: &mut [MedicalHistoryEntry],
    index: usize,
    doctor_id: Uuid,
    request: UpdateHistoryEntryRequest,
) -> Result<(), DentalRecordError> {
    let entry = authored_entry(entries, index, doctor_id)?;

    if let Some(notes) = request.notes {
        if notes.trim().is_empty() {
            return Err(DentalRecordError::ValidationError("Notes cannot be empty".to_string()));
        }
        entry.notes = notes.trim().to_string();
    }
    if let Some(date) = request.date {
        entry.date = date;
    }
    if request.findings.is_some() {
        entry.findings = request.findings;
    }
    if request.treatment.is_some() {
        entry.treatment = request.treatment;
    }
    Ok(())
}

fn remove_entry(
    entries: &mut Vec<MedicalHistoryEntry>,
    index: usize,
    doctor_id: Uuid,
) -> Result<MedicalHistoryEntry, DentalRecordError> {
    authored_entry(entries, index, doctor_id)?;
    Ok(entries.remove(index))
}
