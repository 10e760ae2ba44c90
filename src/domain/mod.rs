mod identity;
mod metrics;
mod principal;
mod repository;
mod try_on;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr, TryOnOutcome};

// Identity verification and user directory abstractions
pub use identity::{AuthError, IdentityVerifier, VerifierPtr};
pub use principal::{Principal, UserRecord};
pub use repository::{DatabaseStatus, PersistenceError, UserRepository, UserRepositoryPtr};

// Virtual try-on abstractions
pub use try_on::{
    GarmentCategory, GeneratedImage, TryOnError, TryOnGateway, TryOnGatewayPtr, TryOnRequest,
    UsageInfo, RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER, REMAINING_CREDITS_HEADER,
};
