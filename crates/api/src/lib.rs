pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiErrorResponse};
pub use middleware::{auth_middleware, optional_auth_middleware, AuthState, AuthenticatedUser};
pub use openapi::ApiDoc;
pub use routes::create_router_with_cors;
pub use state::AppState;
