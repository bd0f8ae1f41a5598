pub mod error;
pub mod export;
pub mod secrets;
pub mod service;

mod claims;
mod clients;
mod roles;
mod scopes;

pub use error::{ControlError, Result};
pub use service::{ControlPlane, CreatedTenant, JwksInvalidationHook, UpdatedSettings};
