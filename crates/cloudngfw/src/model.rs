//! Remote object shapes the core reasons about
//!
//! Only the fields that reconciliation and polling look at are modelled;
//! everything else is opaque to the core.

use crate::diff::MemberKey;
use crate::tags::TagBag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Firewall to subnet association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubnetMapping {
    pub subnet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

impl SubnetMapping {
    pub fn new(subnet_id: impl Into<String>) -> Self {
        Self {
            subnet_id: subnet_id.into(),
            availability_zone: None,
        }
    }
}

impl MemberKey for SubnetMapping {
    type Key = String;

    fn member_key(&self) -> String {
        self.subnet_id.clone()
    }
}

/// Firewall endpoint in a customer subnet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointConfig {
    /// Assigned by the service; empty until the endpoint exists
    #[serde(default)]
    pub endpoint_id: String,
    pub subnet_id: String,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub zone_id: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub egress_nat_enabled: bool,
    #[serde(default)]
    pub status: String,
}

impl MemberKey for EndpointConfig {
    type Key = String;

    fn member_key(&self) -> String {
        self.subnet_id.clone()
    }
}

/// Firewall lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FirewallStatus {
    Creating,
    Updating,
    Deleting,
    CreateComplete,
    UpdateComplete,
    CreateFail,
    UpdateFail,
    DeleteFail,
}

impl fmt::Display for FirewallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirewallStatus::Creating => write!(f, "CREATING"),
            FirewallStatus::Updating => write!(f, "UPDATING"),
            FirewallStatus::Deleting => write!(f, "DELETING"),
            FirewallStatus::CreateComplete => write!(f, "CREATE_COMPLETE"),
            FirewallStatus::UpdateComplete => write!(f, "UPDATE_COMPLETE"),
            FirewallStatus::CreateFail => write!(f, "CREATE_FAIL"),
            FirewallStatus::UpdateFail => write!(f, "UPDATE_FAIL"),
            FirewallStatus::DeleteFail => write!(f, "DELETE_FAIL"),
        }
    }
}

/// Commit or validation status of a rulestack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitStatus::Pending => write!(f, "Pending"),
            CommitStatus::Success => write!(f, "Success"),
            CommitStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Account onboarding status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnboardingStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnboardingStatus::Pending => write!(f, "Pending"),
            OnboardingStatus::Success => write!(f, "Success"),
            OnboardingStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Onboarding stack (CloudFormation) status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    RollbackInProgress,
    RollbackComplete,
    RollbackFailed,
    DeleteInProgress,
    DeleteComplete,
    DeleteFailed,
    UpdateInProgress,
    UpdateComplete,
    /// No stack is visible under the requested id
    Gone,
}

impl StackStatus {
    /// Failures while waiting for a deployment
    pub const DEPLOY_FAILURES: [StackStatus; 6] = [
        StackStatus::CreateFailed,
        StackStatus::RollbackFailed,
        StackStatus::RollbackComplete,
        StackStatus::RollbackInProgress,
        StackStatus::DeleteFailed,
        StackStatus::DeleteComplete,
    ];

    /// Failures while waiting for a deletion
    pub const DELETE_FAILURES: [StackStatus; 4] = [
        StackStatus::DeleteFailed,
        StackStatus::RollbackFailed,
        StackStatus::RollbackComplete,
        StackStatus::RollbackInProgress,
    ];
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StackStatus::CreateInProgress => "CREATE_IN_PROGRESS",
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::CreateFailed => "CREATE_FAILED",
            StackStatus::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            StackStatus::RollbackComplete => "ROLLBACK_COMPLETE",
            StackStatus::RollbackFailed => "ROLLBACK_FAILED",
            StackStatus::DeleteInProgress => "DELETE_IN_PROGRESS",
            StackStatus::DeleteComplete => "DELETE_COMPLETE",
            StackStatus::DeleteFailed => "DELETE_FAILED",
            StackStatus::UpdateInProgress => "UPDATE_IN_PROGRESS",
            StackStatus::UpdateComplete => "UPDATE_COMPLETE",
            StackStatus::Gone => "GONE",
        };
        f.write_str(s)
    }
}

/// Firewall instance as declared by the user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Firewall display name; may instead be given as the `FirewallName` tag
    #[serde(default)]
    pub name: String,
    pub account_id: String,
    pub region: String,
    pub vpc_id: String,
    pub rulestack: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subnet_mappings: Vec<SubnetMapping>,
    #[serde(default)]
    pub tags: TagBag,
}

/// Firewall instance as reported by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallInfo {
    pub account_id: String,
    pub name: String,
    pub status: FirewallStatus,
    #[serde(default)]
    pub subnet_mappings: Vec<SubnetMapping>,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub allowlist_accounts: Vec<String>,
    #[serde(default)]
    pub tags: TagBag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Commit/validation state of a rulestack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitState {
    pub commit_status: CommitStatus,
    pub validation_status: CommitStatus,
    #[serde(default)]
    pub commit_messages: Vec<String>,
    #[serde(default)]
    pub validation_messages: Vec<String>,
}

/// Account as reported by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    pub onboarding_status: OnboardingStatus,
}

/// Rulestack as reported by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulestackInfo {
    pub scope: String,
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub tags: TagBag,
}

/// CloudFormation stack that onboards an account
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OnboardingStackSpec {
    pub account_id: String,
    pub stack_name: String,
    pub template_url: String,
    #[serde(default)]
    pub parameters: std::collections::BTreeMap<String, String>,
}
