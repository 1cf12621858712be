pub mod ports;
pub mod service;

pub use ports::{
    generate_session_token, hash_session_token, AuthError, AuthService, LoginOutcome,
    SessionRepository, User, UserRepository, UserSession,
};
pub use service::AuthServiceImpl;
