//! # Configuration
//!
//! Settings for a [`SubkeyContext`](crate::SubkeyContext).
//!
//! ```json
//! {
//!   "allow_legacy_verification": false,
//!   "verbose_logging": false
//! }
//! ```
//!
//! Missing fields take their defaults; unknown fields are rejected.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a subkey context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubkeyConfig {
    /// Permit `verify_legacy`, which checks master certifications with the
    /// lenient RFC 8032 rules. Off by default.
    pub allow_legacy_verification: bool,
    /// Log rejected signatures at `warn` instead of `debug`
    pub verbose_logging: bool,
}

impl SubkeyConfig {
    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Opt into legacy master verification
    pub fn with_legacy_verification(mut self) -> Self {
        self.allow_legacy_verification = true;
        self
    }

    /// Log rejected signatures at `warn`
    pub fn with_verbose_logging(mut self) -> Self {
        self.verbose_logging = true;
        self
    }
}
