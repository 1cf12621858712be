pub mod ports;
pub mod service;

pub use ports::{
    AppConfigRepository, EntitlementError, EntitlementService, EntitlementSnapshot, PlanCatalog,
    PlanLimits, PlanSpec, BILLING_PLANS_CONFIG_KEY,
};
pub use service::{EntitlementServiceImpl, PlanCatalogCache};
