pub mod consents;
pub mod rbac;
pub mod schema;
pub mod sessions;
pub mod tokens;
pub mod users;

pub use consents::{Consent, ConsentRepository};
pub use rbac::RbacRepository;
pub use schema::SchemaInspector;
pub use sessions::{Session, SessionRepository};
pub use tokens::{RefreshToken, TokenRepository};
pub use users::{NewUser, User, UserRepository};
