pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::dental_record_routes;

pub mod api {
    pub use crate::services::history::MedicalHistoryService;
    pub use crate::services::images::ImageService;
    pub use crate::services::tooth_chart::ToothChartService;
}
