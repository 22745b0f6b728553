//! User accounts and the storage quota shown to them.

use chrono::{DateTime, Utc};
use humansize::{format_size, BINARY};

/// The subset of a user record the archive cares about.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub email: String,
    /// Total bytes of all attachments across the user's items. Only changed
    /// through the catalog's atomic adjust operation.
    #[serde(default)]
    pub storage_used: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Storage usage against the configured quota, as displayed to the user.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct StorageQuota {
    /// Bytes in use, as read from the server.
    pub used: u64,
    /// Quota size in bytes.
    pub limit: u64,
    /// Fraction of the quota at which the display turns into a warning.
    pub warning_threshold: f64,
}

impl StorageQuota {
    pub fn new(used: u64, limit: u64, warning_threshold: f64) -> Self {
        Self {
            used,
            limit,
            warning_threshold,
        }
    }

    /// Usage as a percentage of the limit (0 when the limit is 0).
    pub fn percent(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        self.used as f64 / self.limit as f64 * 100.0
    }

    /// Whether usage has reached the warning threshold.
    pub fn is_near_limit(&self) -> bool {
        self.percent() >= self.warning_threshold * 100.0
    }

    /// Bytes left before the quota is reached.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// One-line summary: `Storage: 12 MiB / 5 GiB (0.2%)`.
    pub fn summary(&self) -> String {
        format!(
            "Storage: {} / {} ({:.1}%)",
            format_size(self.used, BINARY),
            format_size(self.limit, BINARY),
            self.percent()
        )
    }
}
