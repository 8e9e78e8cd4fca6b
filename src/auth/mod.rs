pub mod credentials;
pub mod handlers;
pub mod session;

pub use handlers::SESSION_COOKIE;
