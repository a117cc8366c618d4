use uuid::Uuid;

use crate::auth::Role;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct StaffIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientIdentity {
    pub patient_id: Uuid,
}

/// Identity of the caller for a single request.
///
/// Built once by the auth middleware from a verified token and handed to
/// every service operation, so authorization decisions never look at raw
/// token payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestContext {
    Staff(StaffIdentity),
    Patient(PatientIdentity),
}

impl RequestContext {
    pub fn staff(&self) -> Option<&StaffIdentity> {
        match self {
            RequestContext::Staff(staff) => Some(staff),
            RequestContext::Patient(_) => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.staff().map(|s| s.role)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    pub fn is_patient(&self, patient_id: Uuid) -> bool {
        matches!(self, RequestContext::Patient(p) if p.patient_id == patient_id)
    }

    pub fn is_user(&self, user_id: Uuid) -> bool {
        matches!(self, RequestContext::Staff(s) if s.user_id == user_id)
    }

    pub fn require_staff(&self) -> Result<&StaffIdentity, AppError> {
        self.staff()
            .ok_or_else(|| AppError::Forbidden("Staff access required".to_string()))
    }

    pub fn require_any_role(&self, roles: &[Role]) -> Result<&StaffIdentity, AppError> {
        let staff = self.require_staff()?;
        if roles.contains(&staff.role) {
            Ok(staff)
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' is not permitted to perform this action",
                staff.role
            )))
        }
    }

    pub fn require_doctor(&self) -> Result<&StaffIdentity, AppError> {
        self.require_any_role(&[Role::Doctor])
    }

    /// Staff may read any patient's data; a patient session only its own.
    pub fn ensure_can_read_patient(&self, patient_id: Uuid) -> Result<(), AppError> {
        match self {
            RequestContext::Staff(_) => Ok(()),
            RequestContext::Patient(p) if p.patient_id == patient_id => Ok(()),
            RequestContext::Patient(_) => Err(AppError::Forbidden(
                "Patients may only access their own records".to_string(),
            )),
        }
    }
}
