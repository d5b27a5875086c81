pub mod filejump_auth;
pub mod session;

pub use filejump_auth::FileJumpAuth;
pub use session::Session;
