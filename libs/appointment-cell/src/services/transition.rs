use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentPatch, AppointmentStatus, Referral, ReferralAction,
    TransitionPlan,
};

/// Decides what a referral action does without touching storage.
///
/// The actor check runs before the transition table, so a doctor who is not
/// the recipient gets `NotReferralRecipient` whatever state the referral is in.
pub fn plan_transition(
    referral: &Referral,
    appointment: &Appointment,
    actor_id: Uuid,
    action: ReferralAction,
) -> Result<TransitionPlan, AppointmentError> {
    if actor_id != referral.to_doctor_id {
        return Err(AppointmentError::NotReferralRecipient);
    }

    let referral_status = referral.status.apply(action)?;

    let appointment_patch = match action {
        ReferralAction::Accept => AppointmentPatch {
            doctor_id: Some(referral.to_doctor_id),
            original_doctor_id: Some(Some(
                appointment.original_doctor_id.unwrap_or(referral.from_doctor_id),
            )),
            ..Default::default()
        },
        ReferralAction::Reject => {
            let previous = &referral.previous_assignment;
            AppointmentPatch {
                doctor_id: Some(previous.doctor_id),
                is_referred: Some(previous.is_referred),
                original_doctor_id: Some(previous.original_doctor_id),
                current_referral_id: Some(previous.current_referral_id),
                ..Default::default()
            }
        }
        ReferralAction::ReferBack => AppointmentPatch {
            status: Some(AppointmentStatus::ReferBack),
            awaiting_original_doctor: Some(true),
            ..Default::default()
        },
        ReferralAction::Complete => AppointmentPatch::default(),
    };

    Ok(TransitionPlan {
        referral_status,
        appointment_patch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PreviousAssignment, ReferralStatus};
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, NaiveTime, Utc};

    struct Scenario {
        doctor_a: Uuid,
        doctor_b: Uuid,
        appointment: Appointment,
        referral: Referral,
    }

    /// Doctor A's appointment referred to doctor B, as stored right after
    /// referral creation.
    fn scenario() -> Scenario {
        let doctor_a = Uuid::new_v4();
        let doctor_b = Uuid::new_v4();
        let referral_id = Uuid::new_v4();

        let mut appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: doctor_a,
            date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 30,
            status: AppointmentStatus::Confirmed,
            treatment_type: Some("root canal".to_string()),
            notes: None,
            is_referred: false,
            original_doctor_id: None,
            current_referral_id: None,
            awaiting_original_doctor: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let previous_assignment = PreviousAssignment::capture(&appointment);

        appointment.is_referred = true;
        appointment.original_doctor_id = Some(doctor_a);
        appointment.current_referral_id = Some(referral_id);

        let referral = Referral {
            id: referral_id,
            appointment_id: appointment.id,
            from_doctor_id: doctor_a,
            to_doctor_id: doctor_b,
            status: ReferralStatus::Pending,
            notes: None,
            previous_assignment,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        Scenario {
            doctor_a,
            doctor_b,
            appointment,
            referral,
        }
    }

    #[test]
    fn test_referring_doctor_cannot_reject_then_recipient_restores() {
        let s = scenario();

        assert_matches!(
            plan_transition(&s.referral, &s.appointment, s.doctor_a, ReferralAction::Reject),
            Err(AppointmentError::NotReferralRecipient)
        );

        let plan = plan_transition(&s.referral, &s.appointment, s.doctor_b, ReferralAction::Reject).unwrap();
        assert_eq!(plan.referral_status, ReferralStatus::Rejected);

        let mut restored = s.appointment.clone();
        plan.appointment_patch.apply_to(&mut restored);
        assert_eq!(restored.doctor_id, s.doctor_a);
        assert!(!restored.is_referred);
        assert_eq!(restored.original_doctor_id, None);
        assert_eq!(restored.current_referral_id, None);
        assert_eq!(PreviousAssignment::capture(&restored), s.referral.previous_assignment);
    }

    #[test]
    fn test_accept_keeps_original_doctor() {
        let s = scenario();

        let plan = plan_transition(&s.referral, &s.appointment, s.doctor_b, ReferralAction::Accept).unwrap();
        assert_eq!(plan.referral_status, ReferralStatus::Accepted);

        let mut accepted = s.appointment.clone();
        plan.appointment_patch.apply_to(&mut accepted);
        assert_eq!(accepted.doctor_id, s.doctor_b);
        assert_eq!(accepted.original_doctor_id, Some(s.doctor_a));
        assert_eq!(accepted.current_referral_id, Some(s.referral.id));
    }

    #[test]
    fn test_refer_back_flags_appointment() {
        let mut s = scenario();
        s.referral.status = ReferralStatus::Accepted;

        let plan = plan_transition(&s.referral, &s.appointment, s.doctor_b, ReferralAction::ReferBack).unwrap();
        assert_eq!(plan.referral_status, ReferralStatus::ReferredBack);
        assert_eq!(plan.appointment_patch.status, Some(AppointmentStatus::ReferBack));
        assert_eq!(plan.appointment_patch.awaiting_original_doctor, Some(true));
    }

    #[test]
    fn test_complete_leaves_appointment_untouched() {
        let mut s = scenario();
        s.referral.status = ReferralStatus::Accepted;

        let plan = plan_transition(&s.referral, &s.appointment, s.doctor_b, ReferralAction::Complete).unwrap();
        assert_eq!(plan.referral_status, ReferralStatus::Completed);
        assert!(plan.appointment_patch.is_empty());
    }

    #[test]
    fn test_reject_requires_pending() {
        let mut s = scenario();
        s.referral.status = ReferralStatus::Accepted;

        assert_matches!(
            plan_transition(&s.referral, &s.appointment, s.doctor_b, ReferralAction::Reject),
            Err(AppointmentError::InvalidTransition {
                from: ReferralStatus::Accepted,
                action: ReferralAction::Reject
            })
        );
    }

    #[test]
    fn test_wrong_actor_checked_before_state() {
        let mut s = scenario();
        s.referral.status = ReferralStatus::Completed;

        assert_matches!(
            plan_transition(&s.referral, &s.appointment, Uuid::new_v4(), ReferralAction::Accept),
            Err(AppointmentError::NotReferralRecipient)
        );
    }
}
