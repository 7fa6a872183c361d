//! Rulestack workflows

use crate::client::RulestackApi;
use crate::error::Result;
use crate::id::{ResourceKind, RulestackId};
use crate::model::{CommitState, CommitStatus, RulestackInfo};
use crate::poller::{OperationContext, PollOutcome, PollSpec, poll_until_terminal};
use crate::state::{GlobalState, ResourceRecord};
use cloudngfw_config::{PollProfile, Settings};
use tracing::{info, warn};

/// Resolve a rulestack id, moving a legacy bare-name record to its scoped id
fn resolve_id(state: &mut GlobalState, settings: &Settings, id: &str) -> Result<RulestackId> {
    let (rulestack, upgraded) = RulestackId::parse_or_upgrade(id, &settings.default_scope)?;
    if upgraded {
        let new_id = rulestack.to_string();
        info!(old_id = %id, new_id = %new_id, "Upgrading legacy rulestack id");
        if let Some(mut record) = state.remove_record(id) {
            record.id = new_id;
            state.set_record(record);
        }
    }
    Ok(rulestack)
}

/// Read a rulestack. Accepts the bare names written by older releases.
///
/// `None` means the rulestack no longer exists.
pub async fn read_rulestack<A>(
    api: &A,
    settings: &Settings,
    state: &mut GlobalState,
    id: &str,
) -> Result<Option<(RulestackId, RulestackInfo)>>
where
    A: RulestackApi + ?Sized,
{
    let rulestack = resolve_id(state, settings, id)?;
    let key = rulestack.to_string();

    let info = match api.read_rulestack(&rulestack).await {
        Ok(info) => info,
        Err(e) if e.is_not_found() => {
            if state.remove_record(&key).is_some() {
                info!(id = %key, "Rulestack is gone, dropping local record");
            }
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    match state.get_record_mut(&key) {
        Some(record) => {
            record.set_status(&info.state);
            record.set_tags(info.tags.clone());
        }
        None => state.set_record(
            ResourceRecord::new(ResourceKind::Rulestack, key)
                .with_tags(info.tags.clone())
                .with_status(&info.state),
        ),
    }

    Ok(Some((rulestack, info)))
}

#[derive(Clone, Copy)]
enum Pipeline {
    Commit,
    Validate,
}

impl Pipeline {
    fn label(self) -> &'static str {
        match self {
            Pipeline::Commit => "commit",
            Pipeline::Validate => "validation",
        }
    }

    fn kind(self) -> ResourceKind {
        match self {
            Pipeline::Commit => ResourceKind::CommitRulestack,
            Pipeline::Validate => ResourceKind::ValidateRulestack,
        }
    }

    fn profile(self, settings: &Settings) -> &PollProfile {
        match self {
            Pipeline::Commit => &settings.poll.commit,
            Pipeline::Validate => &settings.poll.validate,
        }
    }

    fn status(self, state: &CommitState) -> CommitStatus {
        match self {
            Pipeline::Commit => state.commit_status,
            Pipeline::Validate => state.validation_status,
        }
    }

    fn messages(self, state: &CommitState) -> &[String] {
        match self {
            Pipeline::Commit => &state.commit_messages,
            Pipeline::Validate => &state.validation_messages,
        }
    }
}

async fn run_pipeline<A>(
    api: &A,
    settings: &Settings,
    ctx: &OperationContext,
    state: &mut GlobalState,
    id: &str,
    pipeline: Pipeline,
) -> Result<CommitState>
where
    A: RulestackApi + ?Sized,
{
    let rulestack = resolve_id(state, settings, id)?;
    let key = rulestack.to_string();

    match pipeline {
        Pipeline::Commit => {
            info!(rulestack = %key, "Committing rulestack");
            api.commit(&rulestack).await?;
        }
        Pipeline::Validate => {
            info!(rulestack = %key, "Validating rulestack");
            api.validate(&rulestack).await?;
        }
    }
    let resource = format!("{} of rulestack {}", pipeline.label(), key);

    let spec = PollSpec::from_profile(pipeline.profile(settings))
        .terminal([CommitStatus::Success])
        .failure([CommitStatus::Failed]);
    let rulestack = &rulestack;
    let report = poll_until_terminal(&resource, &spec, ctx, || async move {
        api.commit_status(rulestack)
            .await
            .map(|s| (pipeline.status(&s), s))
    })
    .await?;

    // A tracked rulestack keeps its kind, tags and status; the pipeline
    // result lands in an attribute next to them.
    let status_attribute = format!("{}_status", pipeline.label());
    match state.get_record_mut(&key) {
        Some(record) => {
            if record.kind == pipeline.kind() {
                record.set_status(report.status);
            }
            record.set_attribute(&status_attribute, serde_json::json!(report.status));
        }
        None => state.set_record(
            ResourceRecord::new(pipeline.kind(), key.clone())
                .with_status(report.status)
                .with_attribute(&status_attribute, serde_json::json!(report.status)),
        ),
    }

    match report.outcome {
        PollOutcome::Succeeded => Ok(report.response),
        PollOutcome::Failed => {
            warn!(
                rulestack = %key,
                messages = ?pipeline.messages(&report.response),
                "Rulestack {} failed",
                pipeline.label()
            );
            Ok(report.response)
        }
        PollOutcome::TimedOut => report.into_result(),
    }
}

/// Commit a rulestack and wait for the commit to finish.
///
/// A `Failed` commit is returned as the final state, with the service's
/// messages, rather than as an error.
pub async fn commit_rulestack<A>(
    api: &A,
    settings: &Settings,
    ctx: &OperationContext,
    state: &mut GlobalState,
    id: &str,
) -> Result<CommitState>
where
    A: RulestackApi + ?Sized,
{
    run_pipeline(api, settings, ctx, state, id, Pipeline::Commit).await
}

/// Validate a rulestack and wait for the validation to finish
pub async fn validate_rulestack<A>(
    api: &A,
    settings: &Settings,
    ctx: &OperationContext,
    state: &mut GlobalState,
    id: &str,
) -> Result<CommitState>
where
    A: RulestackApi + ?Sized,
{
    run_pipeline(api, settings, ctx, state, id, Pipeline::Validate).await
}
