pub mod ports;
pub mod service;
pub mod stripe;

pub use ports::{
    BillingCustomer, BillingError, BillingInterval, BillingProvider, BillingService,
    BillingSubscription, CheckoutSession, CreateCheckoutParams, DiscountType, PromoCode,
    PromoCodeRepository,
};
pub use service::BillingServiceImpl;
pub use stripe::StripeBillingProvider;
