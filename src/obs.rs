//! Optional observability helpers for authentication and outbound calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `atlassian_connect.op` with the `op` and
//!   `stage` fields.
//! - Enable `metrics` to increment the `atlassian_connect_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Inbound token validation.
	ValidateRequest,
	/// Outbound client construction.
	NewClient,
	/// Impersonation cache lookup or fill.
	AsUser,
	/// JWT-bearer token exchange.
	TokenExchange,
	/// Outbound API call.
	Execute,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::ValidateRequest => "validate_request",
			Operation::NewClient => "new_client",
			Operation::AsUser => "as_user",
			Operation::TokenExchange => "token_exchange",
			Operation::Execute => "execute",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
