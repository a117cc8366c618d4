pub mod history;
pub mod images;
pub mod tooth_chart;

use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::DentalRecordError;

/// Write operations on a patient's records require the patient to exist.
pub(crate) async fn ensure_patient_exists(
    store: &PostgrestClient,
    patient_id: Uuid,
) -> Result<(), DentalRecordError> {
    let found: Option<serde_json::Value> = store
        .select_one("patients", &format!("id=eq.{}&select=id", patient_id))
        .await
        .map_err(|e| DentalRecordError::DatabaseError(e.to_string()))?;

    found.map(|_| ()).ok_or(DentalRecordError::PatientNotFound)
}
