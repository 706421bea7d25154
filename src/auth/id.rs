//! Strongly typed identifiers for tenants and impersonated users.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $rules:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$rules.check(view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$rules.check(&value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $rules.kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

// Client keys are host-assigned opaque strings (usually UUIDs) stored in VARCHAR(255) columns.
const TENANT_KEY: Rules = Rules { kind: "Tenant", max_len: 255, allowed: is_visible };
// Account IDs are at most 128 characters and end up inside the `sub` URN of impersonation
// assertions.
const USER_ACCOUNT_ID: Rules = Rules { kind: "UserAccount", max_len: 128, allowed: is_account_char };

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (tenant, user account).
		kind: &'static str,
	},
	/// The identifier contains a character its kind does not allow.
	#[error("{kind} identifier contains disallowed character {character:?}.")]
	InvalidCharacter {
		/// Kind of identifier (tenant, user account).
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (tenant, user account).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { TenantKey, "Client key the host assigns to one installation of the add-on.", TENANT_KEY }
def_id! { UserAccountId, "Atlassian account ID of a user the add-on acts as.", USER_ACCOUNT_ID }

struct Rules {
	kind: &'static str,
	max_len: usize,
	allowed: fn(char) -> bool,
}
impl Rules {
	fn check(&self, view: &str) -> Result<(), IdentifierError> {
		let kind = self.kind;

		if view.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if let Some(character) = view.chars().find(|c| !(self.allowed)(*c)) {
			return Err(IdentifierError::InvalidCharacter { kind, character });
		}
		if view.chars().count() > self.max_len {
			return Err(IdentifierError::TooLong { kind, max: self.max_len });
		}

		Ok(())
	}
}

fn is_visible(c: char) -> bool {
	!c.is_whitespace() && !c.is_control()
}

fn is_account_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_')
}
