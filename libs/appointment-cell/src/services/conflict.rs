use chrono::{NaiveTime, Timelike};
use tracing::{debug, warn};

use shared_database::PostgrestClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CandidateSlot, ConflictCheckResponse,
    MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};

pub fn parse_time(raw: &str) -> Result<NaiveTime, AppointmentError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| AppointmentError::InvalidTime(raw.to_string()))
}

pub fn validate_duration(duration_minutes: i32) -> Result<(), AppointmentError> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        Ok(())
    } else {
        Err(AppointmentError::InvalidDuration)
    }
}

const MINUTES_PER_DAY: i32 = 24 * 60;

/// Duration bounds, and the slot must end on the day it starts: conflicts are
/// only checked against the same date.
pub fn validate_slot(time: NaiveTime, duration_minutes: i32) -> Result<(), AppointmentError> {
    validate_duration(duration_minutes)?;
    if minutes_since_midnight(time) + duration_minutes > MINUTES_PER_DAY {
        return Err(AppointmentError::EndsAfterMidnight(time.format("%H:%M").to_string()));
    }
    Ok(())
}

pub fn minutes_since_midnight(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

/// Half-open `[start, end)` intervals: touching end-to-start is not an overlap.
pub fn intervals_overlap(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn conflict_reason(existing: &Appointment) -> String {
    format!(
        "Doctor already has an appointment at {} ({} minutes)",
        existing.time_label(),
        existing.duration_minutes
    )
}

/// First existing appointment the candidate would overlap. Cancelled
/// appointments, other doctors, other dates and the excluded appointment are
/// ignored.
pub fn find_conflict<'a>(existing: &'a [Appointment], candidate: &CandidateSlot) -> Option<&'a Appointment> {
    let start = minutes_since_midnight(candidate.time);
    let end = start + candidate.duration_minutes;

    existing
        .iter()
        .filter(|a| a.doctor_id == candidate.doctor_id && a.date == candidate.date)
        .filter(|a| a.status != AppointmentStatus::Cancelled)
        .filter(|a| Some(a.id) != candidate.exclude_appointment_id)
        .find(|a| {
            let other_start = minutes_since_midnight(a.time);
            intervals_overlap(start, end, other_start, other_start + a.duration_minutes)
        })
}

pub fn evaluate_slot(existing: &[Appointment], candidate: &CandidateSlot) -> ConflictCheckResponse {
    match find_conflict(existing, candidate) {
        Some(conflict) => ConflictCheckResponse {
            is_available: false,
            reason: Some(conflict_reason(conflict)),
            conflicting_appointment_id: Some(conflict.id),
        },
        None => ConflictCheckResponse {
            is_available: true,
            reason: None,
            conflicting_appointment_id: None,
        },
    }
}

pub struct ConflictDetectionService {
    store: PostgrestClient,
}

impl ConflictDetectionService {
    pub fn new(store: PostgrestClient) -> Self {
        Self { store }
    }

    /// Loads the doctor's appointments for the candidate's date and evaluates
    /// the slot against them.
    pub async fn check(&self, candidate: &CandidateSlot) -> Result<ConflictCheckResponse, AppointmentError> {
        validate_slot(candidate.time, candidate.duration_minutes)?;

        debug!(
            "Checking conflicts for doctor {} on {} at {} ({} min)",
            candidate.doctor_id,
            candidate.date,
            candidate.time.format("%H:%M"),
            candidate.duration_minutes
        );

        let query = format!(
            "doctor_id=eq.{}&date=eq.{}&status=neq.cancelled&order=time.asc",
            candidate.doctor_id, candidate.date
        );
        let existing: Vec<Appointment> = self
            .store
            .select("appointments", &query)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let result = evaluate_slot(&existing, candidate);
        if let Some(reason) = &result.reason {
            warn!("Conflict for doctor {}: {}", candidate.doctor_id, reason);
        }
        Ok(result)
    }

    /// Like `check`, but a conflict is an error.
    pub async fn ensure_available(&self, candidate: &CandidateSlot) -> Result<(), AppointmentError> {
        match self.check(candidate).await?.reason {
            Some(reason) => Err(AppointmentError::SlotConflict(reason)),
            None => Ok(()),
        }
    }
}
