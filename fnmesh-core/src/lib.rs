pub mod config;
pub mod credentials;
pub mod error;
pub mod request_id;
pub mod telemetry;

pub use config::{ConfigError, FnMeshConfig};
pub use credentials::{CredentialKey, CryptoError};
pub use error::{envelope_with_call_id, AppError};
pub use request_id::{CallId, RequestId};
