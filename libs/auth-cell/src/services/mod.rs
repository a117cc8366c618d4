pub mod password;
pub mod session;
pub mod users;

pub use password::PasswordService;
pub use session::TokenAuthorityService;
pub use users::UserService;
