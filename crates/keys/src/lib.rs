pub mod error;
pub mod manager;
pub mod material;

pub use error::{KeyError, Result};
pub use manager::{KeyManager, RotationOutcome};
pub use material::generate_signing_key;
