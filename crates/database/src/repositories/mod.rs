pub mod app_config_repository;
pub mod profile_repository;
pub mod promo_code_repository;
pub mod session_repository;
pub mod user_repository;

pub use app_config_repository::PostgresAppConfigRepository;
pub use profile_repository::PostgresProfileRepository;
pub use promo_code_repository::PostgresPromoCodeRepository;
pub use session_repository::PostgresSessionRepository;
pub use user_repository::PostgresUserRepository;
