use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::Role;
use shared_models::context::StaffIdentity;

use crate::models::{DentalRecordError, PatientImage, UploadImageRequest, MAX_IMAGE_BYTES};
use crate::services::ensure_patient_exists;

#[derive(Debug, PartialEq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

pub struct ImageService {
    store: PostgrestClient,
    bucket: String,
}

impl ImageService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
            bucket: config.storage_bucket.clone(),
        }
    }

    pub async fn upload_image(
        &self,
        uploader: &StaffIdentity,
        patient_id: Uuid,
        request: UploadImageRequest,
    ) -> Result<PatientImage, DentalRecordError> {
        debug!("Uploading {:?} image for patient {}", request.kind, patient_id);

        let image = decode_image_payload(&request.image_data, request.content_type.as_deref())?;
        ensure_patient_exists(&self.store, patient_id).await?;

        let storage_path = format!("patients/{}/{}.{}", patient_id, Uuid::new_v4(), image.extension);
        let size_bytes = image.bytes.len() as i64;

        self.store
            .upload_object(&self.bucket, &storage_path, image.bytes, image.content_type)
            .await
            .map_err(|e| DentalRecordError::StorageError(e.to_string()))?;

        let url = self.store.public_url(&self.bucket, &storage_path);
        let inserted: Result<PatientImage, _> = self
            .store
            .insert(
                "patient_images",
                json!({
                    "patient_id": patient_id,
                    "uploaded_by": uploader.user_id,
                    "kind": request.kind,
                    "storage_path": storage_path,
                    "url": url,
                    "content_type": image.content_type,
                    "size_bytes": size_bytes,
                    "description": request.description,
                    "taken_at": request.taken_at,
                    "created_at": Utc::now().to_rfc3339()
                }),
            )
            .await;

        match inserted {
            Ok(record) => {
                info!("Image {} stored for patient {} by {}", record.id, patient_id, uploader.user_id);
                Ok(record)
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete_object(&self.bucket, &storage_path).await {
                    warn!("Failed to remove orphaned object {}: {}", storage_path, cleanup);
                }
                Err(DentalRecordError::DatabaseError(e.to_string()))
            }
        }
    }

    pub async fn list_images(&self, patient_id: Uuid) -> Result<Vec<PatientImage>, DentalRecordError> {
        self.store
            .select(
                "patient_images",
                &format!("patient_id=eq.{}&order=created_at.desc", patient_id),
            )
            .await
            .map_err(|e| DentalRecordError::DatabaseError(e.to_string()))
    }

    pub async fn delete_image(
        &self,
        actor: &StaffIdentity,
        patient_id: Uuid,
        image_id: Uuid,
    ) -> Result<(), DentalRecordError> {
        let image: PatientImage = self
            .store
            .select_one(
                "patient_images",
                &format!("id=eq.{}&patient_id=eq.{}", image_id, patient_id),
            )
            .await
            .map_err(|e| DentalRecordError::DatabaseError(e.to_string()))?
            .ok_or(DentalRecordError::ImageNotFound)?;

        if actor.role != Role::Admin && actor.user_id != image.uploaded_by {
            return Err(DentalRecordError::NotPermitted(
                "Only an admin or the uploader may delete this image".to_string(),
            ));
        }

        self.store
            .delete_object(&self.bucket, &image.storage_path)
            .await
            .map_err(|e| DentalRecordError::StorageError(e.to_string()))?;

        self.store
            .delete("patient_images", &format!("id=eq.{}", image_id))
            .await
            .map_err(|e| DentalRecordError::DatabaseError(e.to_string()))?;

        info!("Image {} deleted by {}", image_id, actor.user_id);
        Ok(())
    }
}

fn image_format(content_type: &str) -> Option<(&'static str, &'static str)> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => Some(("image/png", "png")),
        "image/jpeg" | "image/jpg" => Some(("image/jpeg", "jpg")),
        "image/webp" => Some(("image/webp", "webp")),
        "application/dicom" => Some(("application/dicom", "dcm")),
        _ => None,
    }
}

/// Accepts plain base64 with an explicit content type, or a
/// `data:<mime>;base64,<payload>` URL whose mime wins.
pub fn decode_image_payload(
    image_data: &str,
    content_type: Option<&str>,
) -> Result<DecodedImage, DentalRecordError> {
    let (declared, payload) = match image_data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or(DentalRecordError::InvalidImageData)?;
            let mime = header.strip_suffix(";base64").unwrap_or(header);
            (Some(mime), payload)
        }
        None => (content_type, image_data),
    };

    let declared = declared.ok_or_else(|| {
        DentalRecordError::ValidationError("content_type is required for raw base64 data".to_string())
    })?;
    let (content_type, extension) = image_format(declared)
        .ok_or_else(|| DentalRecordError::UnsupportedImageType(declared.to_string()))?;

    // Base64 inflates by 4/3; reject oversized payloads before decoding.
    if payload.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(DentalRecordError::ImageTooLarge);
    }

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| DentalRecordError::InvalidImageData)?;

    if bytes.is_empty() {
        return Err(DentalRecordError::InvalidImageData);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(DentalRecordError::ImageTooLarge);
    }

    Ok(DecodedImage {
        bytes,
        content_type,
        extension,
    })
}
