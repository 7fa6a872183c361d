//! Cloud NGFW convergence core
//!
//! Orchestration glue that turns declared cloud next-generation firewall
//! resources into remote API calls and waits for the remote side to settle.
//!
//! # Components
//!
//! - **Identifiers**: composite `a:b:c` handles for every resource kind
//! - **Reconciliation**: add/remove sets for keyed member collections
//! - **Polling**: fixed-interval wait for terminal statuses
//! - **Tags**: merging a required attribute stored as a reserved tag
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           orchestration layer (caller)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │ create / read / update / delete
//! ┌─────────────────▼───────────────────────────────┐
//! │                   cloudngfw                      │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │               workflows                   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐    │
//! │  │   id   │ │  diff  │ │ poller │ │  tags  │    │
//! │  └────────┘ └────────┘ └────────┘ └────────┘    │
//! └───────┬─────────────────────────────┬───────────┘
//!         │                             │
//! ┌───────▼───────┐             ┌───────▼───────┐
//! │ remote client │             │ records.json  │
//! │ (FirewallApi…)│             │ (RecordStore) │
//! └───────────────┘             └───────────────┘
//! ```

pub mod client;
pub mod diff;
pub mod error;
pub mod id;
pub mod model;
pub mod poller;
pub mod state;
pub mod tags;
pub mod workflow;

// Re-exports
pub use client::{AccountApi, FirewallApi, RemoteResult, RulestackApi, StackApi};
pub use diff::{DriftPlan, MemberKey, ReconciliationPlan, diff, diff_members, diff_with_drift};
pub use error::{CloudError, RemoteError, RemoteErrorKind, Result};
pub use id::{
    CompositeId, FirewallRef, ID_SEPARATOR, InstanceId, ResourceKind, RulestackId,
    RulestackObjectId, ScopedObjectId, SecurityRuleId,
};
pub use model::{
    AccountInfo, CommitState, CommitStatus, EndpointConfig, FirewallInfo, FirewallStatus,
    InstanceSpec, OnboardingStackSpec, OnboardingStatus, RulestackInfo, StackStatus,
    SubnetMapping,
};
pub use poller::{
    OperationContext, PollOutcome, PollReport, PollSpec, poll_until_terminal,
};
pub use state::{GlobalState, RecordStore, ResourceRecord, StoreSession};
pub use tags::{
    FIREWALL_NAME_TAG, Tag, TagBag, TagChanges, extract_named_attribute, resolve_named_attribute,
};

pub use cloudngfw_config::{PollProfile, PollProfiles, Settings};
