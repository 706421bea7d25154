//! Install records the host delivers on the `installed` lifecycle callback.

// self
use crate::{_prelude::*, auth::{SharedSecret, TenantKey}};

/// Host product a tenant runs on.
///
/// Only [`ProductType::Jira`] allows user impersonation.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProductType {
	/// Jira Cloud.
	Jira,
	/// Confluence Cloud.
	Confluence,
	/// Any other product string, preserved as sent.
	Other(String),
}
impl ProductType {
	/// Returns the wire label.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Jira => "jira",
			Self::Confluence => "confluence",
			Self::Other(value) => value,
		}
	}

	/// Returns `true` when outbound calls may impersonate users.
	pub fn supports_impersonation(&self) -> bool {
		matches!(self, Self::Jira)
	}
}
impl From<String> for ProductType {
	fn from(value: String) -> Self {
		match value.to_ascii_lowercase().as_str() {
			"jira" => Self::Jira,
			"confluence" => Self::Confluence,
			_ => Self::Other(value),
		}
	}
}
impl From<&str> for ProductType {
	fn from(value: &str) -> Self {
		Self::from(value.to_owned())
	}
}
impl From<ProductType> for String {
	fn from(value: ProductType) -> Self {
		value.as_str().to_owned()
	}
}
impl Debug for ProductType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ProductType({})", self.as_str())
	}
}
impl Display for ProductType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Lifecycle callbacks the host sends to an add-on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
	/// Add-on was installed or reinstalled.
	Installed,
	/// Add-on was uninstalled.
	Uninstalled,
	/// Add-on was enabled.
	Enabled,
	/// Add-on was disabled.
	Disabled,
}
impl LifecycleEvent {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Installed => "installed",
			Self::Uninstalled => "uninstalled",
			Self::Enabled => "enabled",
			Self::Disabled => "disabled",
		}
	}

	/// Returns `false` for [`LifecycleEvent::Installed`].
	///
	/// The first `installed` call arrives before any record exists in the tenant store, so
	/// [`validate_request`](crate::inbound::validate_request) can never succeed for it. Route that
	/// endpoint around validation and persist the payload instead.
	pub const fn requires_verification(self) -> bool {
		!matches!(self, Self::Installed)
	}
}
impl FromStr for LifecycleEvent {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"installed" => Ok(Self::Installed),
			"uninstalled" => Ok(Self::Uninstalled),
			"enabled" => Ok(Self::Enabled),
			"disabled" => Ok(Self::Disabled),
			other => Err(format!("Unknown lifecycle event `{other}`.")),
		}
	}
}
impl Display for LifecycleEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-tenant install record.
///
/// Records are immutable once handed out; stores replace them whole on reinstall.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantCredentials {
	/// Add-on key; issuer of outbound shared-secret tokens.
	pub key: String,
	/// Tenant identifier; issuer of inbound tokens.
	pub client_key: TenantKey,
	/// OAuth client ID used for the JWT-bearer grant.
	#[serde(rename = "oauthClientId", alias = "oauthClientID", default)]
	pub oauth_client_id: String,
	/// Host public key.
	#[serde(default)]
	pub public_key: String,
	/// HMAC key for inbound verification and outbound signing.
	pub shared_secret: SharedSecret,
	/// Host server version.
	#[serde(default)]
	pub server_version: String,
	/// Host plugins version.
	#[serde(default)]
	pub plugins_version: String,
	/// API base URL of the tenant site.
	#[serde(rename = "baseUrl", alias = "baseURL", default)]
	pub base_url: String,
	/// Host product.
	pub product_type: ProductType,
	/// Host-provided description.
	#[serde(default)]
	pub description: String,
	/// Lifecycle event that delivered this payload.
	#[serde(default)]
	pub event_type: String,
}
impl TenantCredentials {
	/// Returns the key this record is stored under.
	pub fn tenant_key(&self) -> &TenantKey {
		&self.client_key
	}

	/// Parses [`event_type`](Self::event_type), when it names a known lifecycle event.
	pub fn lifecycle_event(&self) -> Option<LifecycleEvent> {
		self.event_type.parse().ok()
	}
}
impl Debug for TenantCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TenantCredentials")
			.field("key", &self.key)
			.field("client_key", &self.client_key)
			.field("oauth_client_id", &self.oauth_client_id)
			.field("shared_secret", &self.shared_secret)
			.field("base_url", &self.base_url)
			.field("product_type", &self.product_type)
			.field("event_type", &self.event_type)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const INSTALL_PAYLOAD: &str = r#"{
		"key": "io.example.connect-addon",
		"clientKey": "d4a8d2ab-1a2b-3c4d-5e6f-1234567890ab",
		"oauthClientId": "oauth-client",
		"publicKey": "MIIBIjANBgkq",
		"sharedSecret": "s3cr3t",
		"serverVersion": "100000",
		"pluginsVersion": "1001.0.0",
		"baseUrl": "https://example.atlassian.net",
		"productType": "jira",
		"description": "Atlassian JIRA at https://example.atlassian.net",
		"eventType": "installed"
	}"#;

	#[test]
	fn install_payload_deserializes() {
		let credentials: TenantCredentials =
			serde_json::from_str(INSTALL_PAYLOAD).expect("Install payload should deserialize.");

		assert_eq!(credentials.tenant_key().as_ref(), "d4a8d2ab-1a2b-3c4d-5e6f-1234567890ab");
		assert_eq!(credentials.shared_secret.expose(), "s3cr3t");
		assert_eq!(credentials.product_type, ProductType::Jira);
		assert_eq!(credentials.base_url, "https://example.atlassian.net");
		assert_eq!(credentials.lifecycle_event(), Some(LifecycleEvent::Installed));
	}

	#[test]
	fn legacy_field_casing_is_accepted() {
		let payload = INSTALL_PAYLOAD
			.replace("oauthClientId", "oauthClientID")
			.replace("baseUrl", "baseURL")
			.replace("\"jira\"", "\"Confluence\"");
		let credentials: TenantCredentials =
			serde_json::from_str(&payload).expect("Legacy casing should deserialize.");

		assert_eq!(credentials.oauth_client_id, "oauth-client");
		assert_eq!(credentials.base_url, "https://example.atlassian.net");
		assert_eq!(credentials.product_type, ProductType::Confluence);
		assert!(!credentials.product_type.supports_impersonation());
	}

	#[test]
	fn debug_redacts_shared_secret() {
		let credentials: TenantCredentials =
			serde_json::from_str(INSTALL_PAYLOAD).expect("Install payload should deserialize.");
		let rendered = format!("{credentials:?}");

		assert!(!rendered.contains("s3cr3t"));
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn only_installed_skips_verification() {
		assert!(!LifecycleEvent::Installed.requires_verification());
		assert!(LifecycleEvent::Uninstalled.requires_verification());
		assert!(LifecycleEvent::Enabled.requires_verification());
		assert_eq!("disabled".parse::<LifecycleEvent>(), Ok(LifecycleEvent::Disabled));
	}
}
