mod auth;
mod pages;
mod verify;

pub use auth::start_auth;
pub use pages::index;
pub use verify::{verify_get, verify_post};
