use serde::{Deserialize, Serialize};

/// Gateway environment a key belongs to - test (sandbox) or live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Test,
    Live,
}

pub const SECRET_KEY_PREFIX: &str = "sk_";
pub const PUBLISHABLE_KEY_PREFIX: &str = "pk_";
pub const WEBHOOK_SECRET_PREFIX: &str = "whsec_";

impl GatewayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayMode::Test => "test",
            GatewayMode::Live => "live",
        }
    }

    /// Detect the mode from a key such as `sk_test_...` or `pk_live_...`.
    ///
    /// `kind_prefix` is the key family (`sk_` or `pk_`). Returns `None` when the key does
    /// not belong to that family or carries no recognizable mode.
    pub fn from_key(key: &str, kind_prefix: &str) -> Option<Self> {
        let rest = key.strip_prefix(kind_prefix)?;
        if rest.starts_with("test_") {
            Some(GatewayMode::Test)
        } else if rest.starts_with("live_") {
            Some(GatewayMode::Live)
        } else {
            None
        }
    }

    /// Validate that a key's prefix matches this mode.
    pub fn validate_key_prefix(&self, key: &str, kind_prefix: &str, key_name: &str) -> Result<(), String> {
        match Self::from_key(key, kind_prefix) {
            Some(detected) if detected == *self => Ok(()),
            Some(detected) => Err(format!(
                "{} has {} prefix but {} mode was expected",
                key_name,
                detected.as_str(),
                self.as_str()
            )),
            None => Err(format!(
                "{} must start with {}test_ or {}live_",
                key_name, kind_prefix, kind_prefix
            )),
        }
    }
}

impl std::fmt::Display for GatewayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
