//! Firewall instance workflows

use super::ignore_not_found;
use crate::client::FirewallApi;
use crate::diff::{MemberKey, ReconciliationPlan, diff_members};
use crate::error::{CloudError, Result};
use crate::id::{CompositeId, FirewallRef, InstanceId, ResourceKind};
use crate::model::{EndpointConfig, FirewallInfo, FirewallStatus, InstanceSpec, SubnetMapping};
use crate::poller::{OperationContext, PollReport, PollSpec, poll_until_terminal};
use crate::state::{GlobalState, ResourceRecord};
use crate::tags::{
    FIREWALL_NAME_TAG, TagBag, TagChanges, extract_named_attribute, resolve_named_attribute,
};
use cloudngfw_config::Settings;
use std::collections::HashMap;
use tracing::{debug, info, warn};

const SETTLED: [FirewallStatus; 2] = [
    FirewallStatus::CreateComplete,
    FirewallStatus::UpdateComplete,
];
const FAILED: [FirewallStatus; 3] = [
    FirewallStatus::CreateFail,
    FirewallStatus::UpdateFail,
    FirewallStatus::DeleteFail,
];

/// Firewall instance as seen after a create or read
#[derive(Debug, Clone)]
pub struct ObservedInstance {
    pub id: InstanceId,
    /// Display name carried in the `FirewallName` tag
    pub name: String,
    pub firewall: FirewallInfo,
}

/// Id of a newly created firewall, taking the account the service reports
fn minted_id(request: &InstanceSpec, created: &FirewallInfo) -> Result<InstanceId> {
    let account_id = match (created.account_id.as_str(), request.account_id.as_str()) {
        ("", "") => {
            return Err(CloudError::MissingRequiredAttribute("account_id".to_string()));
        }
        ("", requested) => requested,
        (reported, requested) => {
            if !requested.is_empty() && reported != requested {
                warn!(
                    requested = %requested,
                    reported = %reported,
                    "Firewall created under a different account than requested"
                );
            }
            reported
        }
    };

    let id = InstanceId {
        account_id: account_id.to_string(),
        region: request.region.clone(),
        name: request.name.clone(),
    };
    id.to_composite().validate()?;
    Ok(id)
}

fn firewall_ref(instance: &InstanceId) -> FirewallRef {
    FirewallRef {
        account_id: instance.account_id.clone(),
        firewall: instance.name.clone(),
    }
}

fn settle_spec(settings: &Settings) -> PollSpec<FirewallStatus> {
    PollSpec::from_profile(&settings.poll.firewall)
        .terminal(SETTLED)
        .failure(FAILED)
}

fn record_status(state: &mut GlobalState, id: &str, status: FirewallStatus) {
    if let Some(record) = state.get_record_mut(id) {
        record.set_status(status);
    }
}

async fn wait_for_firewall<A>(
    api: &A,
    ctx: &OperationContext,
    firewall: &FirewallRef,
    spec: &PollSpec<FirewallStatus>,
) -> Result<PollReport<FirewallStatus, FirewallInfo>>
where
    A: FirewallApi + ?Sized,
{
    let resource = format!("firewall {}", firewall);
    poll_until_terminal(&resource, spec, ctx, || async move {
        api.read_firewall(firewall).await.map(|fw| (fw.status, fw))
    })
    .await
}

/// Create a firewall instance and wait until it is usable.
///
/// The display name may be given as `spec.name`, as the `FirewallName` tag,
/// or both when they agree. The local record is written as soon as the
/// create call returns, so a failed or abandoned wait still leaves a handle
/// to the remote object.
pub async fn create_instance<A>(
    api: &A,
    settings: &Settings,
    ctx: &OperationContext,
    state: &mut GlobalState,
    spec: &InstanceSpec,
) -> Result<ObservedInstance>
where
    A: FirewallApi + ?Sized,
{
    let tags = resolve_named_attribute(&spec.tags, Some(spec.name.as_str()), FIREWALL_NAME_TAG)?;
    let name = extract_named_attribute(&tags, FIREWALL_NAME_TAG)?;

    // An empty account is filled in by the service; the rest is checked up front.
    let mut supplied = vec![spec.region.as_str(), name.as_str()];
    if !spec.account_id.is_empty() {
        supplied.push(spec.account_id.as_str());
    }
    CompositeId::new(supplied).validate()?;

    let request = InstanceSpec {
        name,
        tags: tags.clone(),
        ..spec.clone()
    };

    info!(
        account_id = %request.account_id,
        region = %request.region,
        name = %request.name,
        vpc_id = %request.vpc_id,
        rulestack = %request.rulestack,
        subnets = request.subnet_mappings.len(),
        "Creating firewall instance"
    );
    let created = api.create_firewall(&request).await?;

    let id = minted_id(&request, &created)?;
    let key = id.to_string();

    state.set_record(
        ResourceRecord::new(ResourceKind::FirewallInstance, key.clone())
            .with_tags(tags)
            .with_status(created.status),
    );

    let report = wait_for_firewall(api, ctx, &firewall_ref(&id), &settle_spec(settings)).await?;
    record_status(state, &key, report.status);
    let firewall = report.into_result()?;

    Ok(ObservedInstance {
        id,
        name: request.name,
        firewall,
    })
}

/// Converge the instance's subnet mappings on `desired`.
///
/// Returns the plan that was applied; an empty plan means no call was made.
pub async fn update_instance_subnets<A>(
    api: &A,
    settings: &Settings,
    ctx: &OperationContext,
    state: &mut GlobalState,
    id: &str,
    desired: &[SubnetMapping],
) -> Result<ReconciliationPlan<SubnetMapping>>
where
    A: FirewallApi + ?Sized,
{
    let instance: InstanceId = id.parse()?;
    let firewall = firewall_ref(&instance);

    let observed = api.read_firewall(&firewall).await?;
    let plan = diff_members(desired, &observed.subnet_mappings);
    if plan.is_empty() {
        debug!(id = %id, "Subnet mappings already converged");
        return Ok(plan);
    }

    let associate: Vec<String> = plan.associate.iter().map(|m| m.member_key()).collect();
    let disassociate: Vec<String> = plan.disassociate.iter().map(|m| m.member_key()).collect();
    info!(id = %id, ?associate, ?disassociate, "Updating subnet mappings");
    api.update_subnet_mappings(&firewall, &plan.associate, &plan.disassociate)
        .await?;

    let report = wait_for_firewall(api, ctx, &firewall, &settle_spec(settings)).await?;
    record_status(state, id, report.status);
    report.into_result()?;

    Ok(plan)
}

/// Read an instance back.
///
/// `None` means the firewall no longer exists; its local record is dropped
/// so the orchestration layer can recreate it.
pub async fn read_instance<A>(
    api: &A,
    state: &mut GlobalState,
    id: &str,
) -> Result<Option<ObservedInstance>>
where
    A: FirewallApi + ?Sized,
{
    let instance: InstanceId = id.parse()?;

    let firewall = match api.read_firewall(&firewall_ref(&instance)).await {
        Ok(firewall) => firewall,
        Err(e) if e.is_not_found() => {
            if state.remove_record(id).is_some() {
                info!(id = %id, "Firewall instance is gone, dropping local record");
            }
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let name = extract_named_attribute(&firewall.tags, FIREWALL_NAME_TAG)?;

    match state.get_record_mut(id) {
        Some(record) => {
            record.set_status(firewall.status);
            record.set_tags(firewall.tags.clone());
        }
        None => state.set_record(
            ResourceRecord::new(ResourceKind::FirewallInstance, id)
                .with_tags(firewall.tags.clone())
                .with_status(firewall.status),
        ),
    }

    Ok(Some(ObservedInstance {
        id: instance,
        name,
        firewall,
    }))
}

/// Delete an instance and wait until it disappears. Deleting an instance
/// that is already gone succeeds.
pub async fn delete_instance<A>(
    api: &A,
    settings: &Settings,
    ctx: &OperationContext,
    state: &mut GlobalState,
    id: &str,
) -> Result<()>
where
    A: FirewallApi + ?Sized,
{
    let instance: InstanceId = id.parse()?;
    let firewall = firewall_ref(&instance);

    info!(id = %id, "Deleting firewall instance");
    ignore_not_found(api.delete_firewall(&firewall).await)?;

    // there is no success status: the firewall is deleted once reads 404
    let spec =
        PollSpec::from_profile(&settings.poll.firewall).failure([FirewallStatus::DeleteFail]);
    match wait_for_firewall(api, ctx, &firewall, &spec).await {
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
        Ok(report) => {
            record_status(state, id, report.status);
            report.into_result()?;
        }
    }

    state.remove_record(id);
    Ok(())
}

/// Fill in the endpoint ids the service assigned.
///
/// Desired endpoints without an id take the id of the observed endpoint in
/// the same subnet. Endpoints with an id, or whose subnet has no observed
/// endpoint, are returned unchanged.
pub fn resolve_endpoints(
    desired: &[EndpointConfig],
    observed: &[EndpointConfig],
) -> Vec<EndpointConfig> {
    let by_subnet: HashMap<String, &EndpointConfig> =
        observed.iter().map(|e| (e.member_key(), e)).collect();

    desired
        .iter()
        .map(|endpoint| {
            let mut endpoint = endpoint.clone();
            if endpoint.endpoint_id.is_empty() {
                if let Some(found) = by_subnet.get(&endpoint.subnet_id) {
                    endpoint.endpoint_id = found.endpoint_id.clone();
                    if endpoint.status.is_empty() {
                        endpoint.status = found.status.clone();
                    }
                }
            }
            endpoint
        })
        .collect()
}

/// Converge the accounts allowed to attach endpoints to the firewall
pub async fn update_allowlist_accounts<A>(
    api: &A,
    state: &mut GlobalState,
    id: &str,
    desired: &[String],
) -> Result<ReconciliationPlan<String>>
where
    A: FirewallApi + ?Sized,
{
    let instance: InstanceId = id.parse()?;
    let firewall = firewall_ref(&instance);

    let observed = api.read_firewall(&firewall).await?;
    let plan = diff_members(desired, &observed.allowlist_accounts);
    if plan.is_empty() {
        debug!(id = %id, "Allow-listed accounts already converged");
        return Ok(plan);
    }

    info!(
        id = %id,
        add = ?plan.associate,
        remove = ?plan.disassociate,
        "Updating allow-listed accounts"
    );
    api.update_allowlist_accounts(&firewall, &plan.associate, &plan.disassociate)
        .await?;

    if let Some(record) = state.get_record_mut(id) {
        record.set_attribute("allowlist_accounts", serde_json::json!(desired));
    }
    Ok(plan)
}

/// Converge the instance's tags.
///
/// The `FirewallName` tag is pinned to the name in the id; a desired bag
/// that names a different firewall is rejected.
pub async fn update_instance_tags<A>(
    api: &A,
    state: &mut GlobalState,
    id: &str,
    desired: &TagBag,
) -> Result<TagChanges>
where
    A: FirewallApi + ?Sized,
{
    let instance: InstanceId = id.parse()?;
    let firewall = firewall_ref(&instance);

    let desired = resolve_named_attribute(desired, Some(instance.name.as_str()), FIREWALL_NAME_TAG)?;
    let observed = api.read_firewall(&firewall).await?;

    let changes = desired.changes_from(&observed.tags);
    if changes.is_empty() {
        debug!(id = %id, "Tags already converged");
        return Ok(changes);
    }

    info!(
        id = %id,
        set = changes.set.len(),
        remove = changes.remove.len(),
        "Updating firewall tags"
    );
    api.update_tags(&firewall, &changes.set, &changes.remove)
        .await?;

    if let Some(record) = state.get_record_mut(id) {
        record.set_tags(desired);
    }
    Ok(changes)
}
