//! Convergence workflows
//!
//! Each workflow drives one orchestration step against the remote clients:
//! compute the plan, issue the mutating calls, wait for the remote object to
//! settle and keep the local record in step. Workflows take the collaborators
//! they need as arguments and hold no state of their own.

pub mod account;
pub mod instance;
pub mod rulestack;

pub use account::{
    delete_onboarding_stack, deploy_onboarding_stack, offboard_account, onboard_account,
};
pub use instance::{
    ObservedInstance, create_instance, delete_instance, read_instance, resolve_endpoints,
    update_allowlist_accounts, update_instance_subnets, update_instance_tags,
};
pub use rulestack::{commit_rulestack, read_rulestack, validate_rulestack};

use crate::error::{CloudError, RemoteError, Result};

/// Treat "already gone" as success for deletes
pub(crate) fn ignore_not_found(result: std::result::Result<(), RemoteError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(CloudError::Remote(e)),
    }
}
