//! Account onboarding workflows

use super::ignore_not_found;
use crate::client::{AccountApi, StackApi};
use crate::error::Result;
use crate::id::{CompositeId, ResourceKind};
use crate::model::{AccountInfo, OnboardingStackSpec, OnboardingStatus, StackStatus};
use crate::poller::{OperationContext, PollSpec, poll_until_terminal};
use crate::state::{GlobalState, ResourceRecord};
use cloudngfw_config::Settings;
use tracing::info;

/// Register an account and wait for onboarding to succeed
pub async fn onboard_account<A>(
    api: &A,
    settings: &Settings,
    ctx: &OperationContext,
    state: &mut GlobalState,
    account_id: &str,
) -> Result<AccountInfo>
where
    A: AccountApi + ?Sized,
{
    CompositeId::new([account_id]).validate()?;

    info!(account_id = %account_id, "Onboarding account");
    let created = api.create_account(account_id).await?;
    state.set_record(
        ResourceRecord::new(ResourceKind::Account, account_id)
            .with_status(created.onboarding_status),
    );

    let spec = PollSpec::from_profile(&settings.poll.account_onboarding)
        .terminal([OnboardingStatus::Success])
        .failure([OnboardingStatus::Failed]);
    let resource = format!("onboarding of account {}", account_id);
    let report = poll_until_terminal(&resource, &spec, ctx, || async move {
        api.read_account(account_id)
            .await
            .map(|a| (a.onboarding_status, a))
    })
    .await?;

    if let Some(record) = state.get_record_mut(account_id) {
        record.set_status(report.status);
    }
    report.into_result()
}

/// Remove an account registration. Removing an unknown account succeeds.
pub async fn offboard_account<A>(api: &A, state: &mut GlobalState, account_id: &str) -> Result<()>
where
    A: AccountApi + ?Sized,
{
    info!(account_id = %account_id, "Removing account");
    ignore_not_found(api.delete_account(account_id).await)?;
    state.remove_record(account_id);
    Ok(())
}

/// Launch the onboarding stack and wait for it to deploy.
///
/// Returns the stack id. A rolled-back or vanished stack is a failure.
pub async fn deploy_onboarding_stack<A>(
    api: &A,
    settings: &Settings,
    ctx: &OperationContext,
    state: &mut GlobalState,
    spec: &OnboardingStackSpec,
) -> Result<String>
where
    A: StackApi + ?Sized,
{
    info!(
        account_id = %spec.account_id,
        stack_name = %spec.stack_name,
        "Deploying onboarding stack"
    );
    // Stack ids are service-assigned ARNs and may contain the separator.
    // They are stored whole and never split.
    let stack_id = api.create_stack(spec).await?;

    state.set_record(
        ResourceRecord::new(ResourceKind::OnboardingStack, stack_id.as_str())
            .with_status(StackStatus::CreateInProgress)
            .with_attribute("account_id", serde_json::json!(spec.account_id))
            .with_attribute("stack_name", serde_json::json!(spec.stack_name)),
    );

    let poll = PollSpec::from_profile(&settings.poll.stack_deployment)
        .terminal([StackStatus::CreateComplete, StackStatus::UpdateComplete])
        .failure(StackStatus::DEPLOY_FAILURES)
        .failure([StackStatus::Gone]);
    let resource = format!("onboarding stack {}", stack_id);
    let id = stack_id.as_str();
    let report = poll_until_terminal(&resource, &poll, ctx, || async move {
        api.describe_stack(id)
            .await
            .map(|s| (s.unwrap_or(StackStatus::Gone), ()))
    })
    .await?;

    if let Some(record) = state.get_record_mut(&stack_id) {
        record.set_status(report.status);
    }
    report.into_result()?;
    Ok(stack_id)
}

/// Delete the onboarding stack and wait for it to go away.
/// A stack that no longer exists counts as deleted.
pub async fn delete_onboarding_stack<A>(
    api: &A,
    settings: &Settings,
    ctx: &OperationContext,
    state: &mut GlobalState,
    stack_id: &str,
) -> Result<()>
where
    A: StackApi + ?Sized,
{
    info!(stack_id = %stack_id, "Deleting onboarding stack");
    ignore_not_found(api.delete_stack(stack_id).await)?;

    let poll = PollSpec::from_profile(&settings.poll.stack_deletion)
        .terminal([StackStatus::DeleteComplete, StackStatus::Gone])
        .failure(StackStatus::DELETE_FAILURES);
    let resource = format!("onboarding stack {}", stack_id);
    let report = poll_until_terminal(&resource, &poll, ctx, || async move {
        match api.describe_stack(stack_id).await {
            Ok(status) => Ok((status.unwrap_or(StackStatus::Gone), ())),
            Err(e) if e.is_not_found() => Ok((StackStatus::Gone, ())),
            Err(e) => Err(e),
        }
    })
    .await?;

    if let Some(record) = state.get_record_mut(stack_id) {
        record.set_status(report.status);
    }
    report.into_result()?;

    state.remove_record(stack_id);
    Ok(())
}
