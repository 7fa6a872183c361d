//! Poll profiles
//!
//! Each remote operation kind converges at its own cadence, so the interval
//! and budget are tuned per operation rather than globally.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interval and budget for one kind of convergence wait
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollProfile {
    /// Seconds to sleep between two status fetches
    pub interval_secs: u64,

    /// Maximum number of status fetches (`None` = no cap)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Wall-clock budget for the whole wait (`None` = no cap)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl PollProfile {
    pub const fn fixed(interval_secs: u64, max_attempts: u32) -> Self {
        Self {
            interval_secs,
            max_attempts: Some(max_attempts),
            timeout_secs: None,
        }
    }

    pub const fn uncapped(interval_secs: u64) -> Self {
        Self {
            interval_secs,
            max_attempts: None,
            timeout_secs: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Reject profiles the poller cannot honor
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::InvalidProfile {
                profile: name.to_string(),
                reason: "max_attempts must be at least 1".to_string(),
            });
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidProfile {
                profile: name.to_string(),
                reason: "timeout_secs must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn default_account_onboarding() -> PollProfile {
    PollProfile::fixed(30, 10)
}
fn default_stack_deployment() -> PollProfile {
    PollProfile::fixed(30, 11)
}
fn default_stack_deletion() -> PollProfile {
    PollProfile::fixed(30, 11)
}
fn default_firewall() -> PollProfile {
    PollProfile::fixed(30, 120) // 1 hour
}
fn default_commit() -> PollProfile {
    PollProfile::uncapped(1)
}
fn default_validate() -> PollProfile {
    PollProfile::uncapped(1)
}

/// Poll profiles for every operation kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollProfiles {
    #[serde(default = "default_account_onboarding")]
    pub account_onboarding: PollProfile,
    #[serde(default = "default_stack_deployment")]
    pub stack_deployment: PollProfile,
    #[serde(default = "default_stack_deletion")]
    pub stack_deletion: PollProfile,
    #[serde(default = "default_firewall")]
    pub firewall: PollProfile,
    #[serde(default = "default_commit")]
    pub commit: PollProfile,
    #[serde(default = "default_validate")]
    pub validate: PollProfile,
}

impl Default for PollProfiles {
    fn default() -> Self {
        Self {
            account_onboarding: default_account_onboarding(),
            stack_deployment: default_stack_deployment(),
            stack_deletion: default_stack_deletion(),
            firewall: default_firewall(),
            commit: default_commit(),
            validate: default_validate(),
        }
    }
}

impl PollProfiles {
    pub fn validate(&self) -> Result<()> {
        self.account_onboarding.validate("account_onboarding")?;
        self.stack_deployment.validate("stack_deployment")?;
        self.stack_deletion.validate("stack_deletion")?;
        self.firewall.validate("firewall")?;
        self.commit.validate("commit")?;
        self.validate.validate("validate")
    }
}
