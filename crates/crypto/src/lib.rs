pub mod canonical;
pub mod envelope;
pub mod error;

pub use canonical::{canonicalize, canonicalize_to_value, etag};
pub use envelope::{Envelope, MASTER_KEY_LEN};
pub use error::{CryptoError, Result};
