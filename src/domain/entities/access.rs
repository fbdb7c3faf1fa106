use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// The source granting a tenant access to a feature, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccessType {
    Plan,
    Trial,
    Addon,
}
