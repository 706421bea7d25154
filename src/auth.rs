//! Tenant-domain identifiers, secrets, scope sets, and install records.

pub mod credentials;
pub mod id;
pub mod scope;
pub mod secret;

pub use credentials::*;
pub use id::*;
pub use scope::*;
pub use secret::*;
