use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Remote agent service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the remote agent service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the agent service project endpoint.
    #[serde(default)]
    pub endpoint: String,
    /// Value of the `api-version` query parameter sent with every request.
    #[serde(default = "d_api_version")]
    pub api_version: String,
    /// Environment variable holding the API key / bearer token.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Header carrying the credential.
    #[serde(default = "d_auth_header")]
    pub auth_header: String,
    /// Prefix prepended to the credential (e.g. `"Bearer "`).
    #[serde(default = "d_auth_prefix")]
    pub auth_prefix: String,
    /// Timeout for non-streaming requests (seconds).
    #[serde(default = "d_120")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_version: d_api_version(),
            api_key_env: d_api_key_env(),
            auth_header: d_auth_header(),
            auth_prefix: d_auth_prefix(),
            request_timeout_secs: 120,
        }
    }
}

fn d_api_version() -> String {
    "2025-05-01".into()
}
fn d_api_key_env() -> String {
    "AR_REMOTE_API_KEY".into()
}
fn d_auth_header() -> String {
    "Authorization".into()
}
fn d_auth_prefix() -> String {
    "Bearer ".into()
}
fn d_120() -> u64 {
    120
}
