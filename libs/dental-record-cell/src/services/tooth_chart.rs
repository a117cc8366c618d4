use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{
    DentalRecordError, ToothChart, ToothRecord, UpdateChartNotesRequest, UpdateToothRequest,
    FIRST_TOOTH, LAST_TOOTH,
};
use crate::services::ensure_patient_exists;

pub struct ToothChartService {
    store: PostgrestClient,
}

impl ToothChartService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
        }
    }

    pub async fn get_chart(&self, patient_id: Uuid) -> Result<ToothChart, DentalRecordError> {
        debug!("Fetching tooth chart for patient {}", patient_id);

        let chart: Option<ToothChart> = self
            .store
            .select_one("tooth_charts", &format!("patient_id=eq.{}", patient_id))
            .await
            .map_err(|e| DentalRecordError::DatabaseError(e.to_string()))?;

        Ok(chart.unwrap_or_else(|| ToothChart::empty(patient_id)))
    }

    pub async fn update_tooth(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        tooth: i32,
        request: UpdateToothRequest,
    ) -> Result<ToothChart, DentalRecordError> {
        let tooth_number = validate_tooth_number(tooth)?;
        ensure_patient_exists(&self.store, patient_id).await?;

        let mut chart = self.get_chart(patient_id).await?;
        apply_tooth_update(&mut chart, doctor_id, tooth_number, request, Utc::now());

        let saved = self.save(chart).await?;
        info!("Doctor {} updated tooth {} for patient {}", doctor_id, tooth_number, patient_id);
        Ok(saved)
    }

    pub async fn update_notes(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        request: UpdateChartNotesRequest,
    ) -> Result<ToothChart, DentalRecordError> {
        ensure_patient_exists(&self.store, patient_id).await?;

        let mut chart = self.get_chart(patient_id).await?;
        chart.overall_notes = request.overall_notes;
        chart.doctor_id = Some(doctor_id);
        chart.last_review = Some(Utc::now());

        let saved = self.save(chart).await?;
        info!("Doctor {} reviewed tooth chart for patient {}", doctor_id, patient_id);
        Ok(saved)
    }

    async fn save(&self, chart: ToothChart) -> Result<ToothChart, DentalRecordError> {
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "patient_id": chart.patient_id,
            "doctor_id": chart.doctor_id,
            "teeth": chart.teeth,
            "overall_notes": chart.overall_notes,
            "last_review": chart.last_review,
            "updated_at": now
        });

        match chart.id {
            Some(id) => {
                let updated: Vec<ToothChart> = self
                    .store
                    .update("tooth_charts", &format!("id=eq.{}", id), body)
                    .await
                    .map_err(|e| DentalRecordError::DatabaseError(e.to_string()))?;

                updated.into_iter().next().ok_or_else(|| {
                    DentalRecordError::DatabaseError("Tooth chart update returned no rows".to_string())
                })
            }
            None => self
                .store
                .insert("tooth_charts", body)
                .await
                .map_err(|e| DentalRecordError::DatabaseError(e.to_string())),
        }
    }
}

pub fn validate_tooth_number(tooth: i32) -> Result<u8, DentalRecordError> {
    if (FIRST_TOOTH..=LAST_TOOTH).contains(&tooth) {
        Ok(tooth as u8)
    } else {
        Err(DentalRecordError::InvalidToothNumber(tooth))
    }
}

fn apply_tooth_update(
    chart: &mut ToothChart,
    doctor_id: Uuid,
    tooth: u8,
    request: UpdateToothRequest,
    now: DateTime<Utc>,
) {
    chart.teeth.insert(
        tooth,
        ToothRecord {
            status: request.status,
            notes: request.notes,
            last_updated: now,
        },
    );
    chart.doctor_id = Some(doctor_id);
}
