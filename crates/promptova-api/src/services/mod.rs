//! Business logic services.

pub mod credit;
pub mod generation;
pub mod stripe;
pub mod user;

pub use credit::CreditService;
pub use generation::{CompletedGeneration, GenerationOutput, GenerationService};
pub use stripe::StripeClient;
pub use user::{ProfileView, UserService};
