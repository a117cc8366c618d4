pub mod auth;
pub mod context;
pub mod error;

pub use auth::{PatientSessionClaims, Role, StaffClaims, TokenResponse};
pub use context::{PatientIdentity, RequestContext, StaffIdentity};
pub use error::AppError;
