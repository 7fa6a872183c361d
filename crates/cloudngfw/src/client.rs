//! Remote API collaborators
//!
//! HTTP transport, request signing and JSON marshaling live behind these
//! traits. Implementations classify their failures into a [`RemoteError`] so
//! that workflows never inspect wire-level error shapes.

use crate::error::RemoteError;
use crate::id::{FirewallRef, RulestackId};
use crate::model::{
    AccountInfo, CommitState, FirewallInfo, InstanceSpec, OnboardingStackSpec, RulestackInfo,
    StackStatus, SubnetMapping,
};
use crate::tags::Tag;
use async_trait::async_trait;

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Firewall instances
#[async_trait]
pub trait FirewallApi: Send + Sync {
    async fn create_firewall(&self, spec: &InstanceSpec) -> RemoteResult<FirewallInfo>;

    async fn read_firewall(&self, firewall: &FirewallRef) -> RemoteResult<FirewallInfo>;

    /// Never called with both lists empty
    async fn update_subnet_mappings(
        &self,
        firewall: &FirewallRef,
        associate: &[SubnetMapping],
        disassociate: &[SubnetMapping],
    ) -> RemoteResult<()>;

    async fn update_allowlist_accounts(
        &self,
        firewall: &FirewallRef,
        add: &[String],
        remove: &[String],
    ) -> RemoteResult<()>;

    async fn update_tags(
        &self,
        firewall: &FirewallRef,
        set: &[Tag],
        remove: &[String],
    ) -> RemoteResult<()>;

    async fn delete_firewall(&self, firewall: &FirewallRef) -> RemoteResult<()>;
}

/// Rulestacks and their commit pipeline
#[async_trait]
pub trait RulestackApi: Send + Sync {
    async fn read_rulestack(&self, rulestack: &RulestackId) -> RemoteResult<RulestackInfo>;

    async fn commit(&self, rulestack: &RulestackId) -> RemoteResult<()>;

    async fn validate(&self, rulestack: &RulestackId) -> RemoteResult<()>;

    async fn commit_status(&self, rulestack: &RulestackId) -> RemoteResult<CommitState>;
}

/// Account onboarding
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn create_account(&self, account_id: &str) -> RemoteResult<AccountInfo>;

    async fn read_account(&self, account_id: &str) -> RemoteResult<AccountInfo>;

    async fn delete_account(&self, account_id: &str) -> RemoteResult<()>;
}

/// Onboarding CloudFormation stacks
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Returns the stack id
    async fn create_stack(&self, spec: &OnboardingStackSpec) -> RemoteResult<String>;

    /// `None` when no stack is visible under `stack_id`
    async fn describe_stack(&self, stack_id: &str) -> RemoteResult<Option<StackStatus>>;

    async fn delete_stack(&self, stack_id: &str) -> RemoteResult<()>;
}
