pub mod gateway;
pub mod handlers;
pub mod password;
pub mod token;

pub use gateway::{authenticate, require_admin};
pub use token::{Identity, TokenError, TokenService};
