// self
use crate::{
	_prelude::*,
	obs::{Operation, Outcome},
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_outcome(op: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"atlassian_connect_op_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

/// Records [`Outcome::Success`] or [`Outcome::Failure`] depending on `result`.
pub fn record_result<T>(op: Operation, result: &Result<T>) {
	match result {
		Ok(_) => record_outcome(op, Outcome::Success),
		Err(_) => record_outcome(op, Outcome::Failure),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_outcome_noop_without_metrics() {
		record_outcome(Operation::ValidateRequest, Outcome::Failure);
		record_result::<()>(Operation::Execute, &Err(Error::TokenMissing));
	}
}
