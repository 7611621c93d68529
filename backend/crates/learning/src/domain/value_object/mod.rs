pub mod email;
pub mod user_role;

pub use email::{Email, EmailError};
pub use user_role::UserRole;
