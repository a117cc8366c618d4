pub mod dispatcher;
pub mod email;
pub mod queue;
pub mod sender;
pub mod templates;
pub mod whatsapp;
pub mod worker;

pub use dispatcher::NotificationDispatcher;
pub use email::EmailClient;
pub use queue::{InMemoryQueue, NotificationQueue, RedisQueue};
pub use sender::{NotificationSender, ProviderSender};
pub use templates::{AppointmentEvent, AppointmentNotice, ReportNotice};
pub use whatsapp::WhatsappClient;
pub use worker::NotificationWorker;
