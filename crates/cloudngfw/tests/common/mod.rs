use async_trait::async_trait;
use cloudngfw::{
    AccountApi, AccountInfo, CommitState, CommitStatus, FirewallApi, FirewallInfo, FirewallRef,
    FirewallStatus, InstanceSpec, OnboardingStackSpec, OnboardingStatus, RemoteError,
    RemoteResult, RulestackApi, RulestackId, RulestackInfo, StackApi, StackStatus, SubnetMapping,
    Tag, TagBag,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Account the fake assigns when a firewall is created without one
pub const DEFAULT_ACCOUNT: &str = "123456789012";

/// In-memory remote side. Status scripts are replayed one entry per read;
/// once a script runs dry the stored status is returned unchanged.
#[derive(Default)]
pub struct FakeCloud {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    calls: Vec<String>,
    firewalls: HashMap<String, FirewallInfo>,
    firewall_script: VecDeque<FirewallStatus>,
    rulestacks: HashMap<String, RulestackInfo>,
    commit_script: VecDeque<CommitStatus>,
    commit_messages: Vec<String>,
    accounts: HashMap<String, AccountInfo>,
    onboarding_script: VecDeque<OnboardingStatus>,
    stacks: HashMap<String, StackStatus>,
    stack_script: VecDeque<Option<StackStatus>>,
}

#[allow(dead_code)]
impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the mutating calls received so far
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn script_firewall(&self, statuses: &[FirewallStatus]) {
        self.inner
            .lock()
            .unwrap()
            .firewall_script
            .extend(statuses.iter().copied());
    }

    pub fn script_commit(&self, statuses: &[CommitStatus]) {
        self.inner
            .lock()
            .unwrap()
            .commit_script
            .extend(statuses.iter().copied());
    }

    pub fn set_commit_messages(&self, messages: &[&str]) {
        self.inner.lock().unwrap().commit_messages =
            messages.iter().map(|m| m.to_string()).collect();
    }

    pub fn script_onboarding(&self, statuses: &[OnboardingStatus]) {
        self.inner
            .lock()
            .unwrap()
            .onboarding_script
            .extend(statuses.iter().copied());
    }

    pub fn script_stack(&self, statuses: &[Option<StackStatus>]) {
        self.inner
            .lock()
            .unwrap()
            .stack_script
            .extend(statuses.iter().copied());
    }

    pub fn insert_firewall(&self, info: FirewallInfo) {
        let key = format!("{}:{}", info.account_id, info.name);
        self.inner.lock().unwrap().firewalls.insert(key, info);
    }

    pub fn firewall(&self, account_id: &str, name: &str) -> Option<FirewallInfo> {
        self.inner
            .lock()
            .unwrap()
            .firewalls
            .get(&format!("{}:{}", account_id, name))
            .cloned()
    }

    pub fn insert_rulestack(&self, info: RulestackInfo) {
        let key = format!("{}:{}", info.scope, info.name);
        self.inner.lock().unwrap().rulestacks.insert(key, info);
    }

    pub fn stack(&self, stack_id: &str) -> Option<StackStatus> {
        self.inner.lock().unwrap().stacks.get(stack_id).copied()
    }

    fn record(&self, call: &str) {
        self.inner.lock().unwrap().calls.push(call.to_string());
    }
}

#[allow(dead_code)]
pub fn firewall(account_id: &str, name: &str, status: FirewallStatus) -> FirewallInfo {
    let tags: TagBag = [("FirewallName", name)].into_iter().collect();
    FirewallInfo {
        account_id: account_id.to_string(),
        name: name.to_string(),
        status,
        subnet_mappings: Vec::new(),
        endpoints: Vec::new(),
        allowlist_accounts: Vec::new(),
        tags,
        failure_reason: None,
    }
}

#[async_trait]
impl FirewallApi for FakeCloud {
    async fn create_firewall(&self, spec: &InstanceSpec) -> RemoteResult<FirewallInfo> {
        self.record("create_firewall");
        let account_id = if spec.account_id.is_empty() {
            DEFAULT_ACCOUNT
        } else {
            spec.account_id.as_str()
        };
        let mut info = firewall(account_id, &spec.name, FirewallStatus::Creating);
        info.subnet_mappings = spec.subnet_mappings.clone();
        info.tags = spec.tags.clone();

        let key = format!("{}:{}", account_id, spec.name);
        let mut inner = self.inner.lock().unwrap();
        if inner.firewalls.contains_key(&key) {
            return Err(RemoteError::from_status(409, format!("{} already exists", key)));
        }
        inner.firewalls.insert(key, info.clone());
        Ok(info)
    }

    async fn read_firewall(&self, firewall: &FirewallRef) -> RemoteResult<FirewallInfo> {
        let mut inner = self.inner.lock().unwrap();
        let next = inner.firewall_script.pop_front();
        match inner.firewalls.get_mut(&firewall.to_string()) {
            Some(info) => {
                if let Some(status) = next {
                    info.status = status;
                }
                Ok(info.clone())
            }
            None => Err(RemoteError::not_found(format!("firewall {}", firewall))),
        }
    }

    async fn update_subnet_mappings(
        &self,
        firewall: &FirewallRef,
        associate: &[SubnetMapping],
        disassociate: &[SubnetMapping],
    ) -> RemoteResult<()> {
        self.record("update_subnet_mappings");
        let mut inner = self.inner.lock().unwrap();
        let info = inner
            .firewalls
            .get_mut(&firewall.to_string())
            .ok_or_else(|| RemoteError::not_found(firewall.to_string()))?;
        info.subnet_mappings
            .retain(|m| !disassociate.iter().any(|d| d.subnet_id == m.subnet_id));
        info.subnet_mappings.extend(associate.iter().cloned());
        info.status = FirewallStatus::Updating;
        Ok(())
    }

    async fn update_allowlist_accounts(
        &self,
        firewall: &FirewallRef,
        add: &[String],
        remove: &[String],
    ) -> RemoteResult<()> {
        self.record("update_allowlist_accounts");
        let mut inner = self.inner.lock().unwrap();
        let info = inner
            .firewalls
            .get_mut(&firewall.to_string())
            .ok_or_else(|| RemoteError::not_found(firewall.to_string()))?;
        info.allowlist_accounts.retain(|a| !remove.contains(a));
        info.allowlist_accounts.extend(add.iter().cloned());
        Ok(())
    }

    async fn update_tags(
        &self,
        firewall: &FirewallRef,
        set: &[Tag],
        remove: &[String],
    ) -> RemoteResult<()> {
        self.record("update_tags");
        let mut inner = self.inner.lock().unwrap();
        let info = inner
            .firewalls
            .get_mut(&firewall.to_string())
            .ok_or_else(|| RemoteError::not_found(firewall.to_string()))?;
        for key in remove {
            info.tags.remove(key);
        }
        for tag in set {
            info.tags.insert(tag.key.clone(), tag.value.clone());
        }
        Ok(())
    }

    async fn delete_firewall(&self, firewall: &FirewallRef) -> RemoteResult<()> {
        self.record("delete_firewall");
        let mut inner = self.inner.lock().unwrap();
        match inner.firewalls.remove(&firewall.to_string()) {
            Some(_) => Ok(()),
            None => Err(RemoteError::not_found(format!("firewall {}", firewall))),
        }
    }
}

#[async_trait]
impl RulestackApi for FakeCloud {
    async fn read_rulestack(&self, rulestack: &RulestackId) -> RemoteResult<RulestackInfo> {
        self.inner
            .lock()
            .unwrap()
            .rulestacks
            .get(&rulestack.to_string())
            .cloned()
            .ok_or_else(|| RemoteError::not_found(format!("rulestack {}", rulestack)))
    }

    async fn commit(&self, _rulestack: &RulestackId) -> RemoteResult<()> {
        self.record("commit");
        Ok(())
    }

    async fn validate(&self, _rulestack: &RulestackId) -> RemoteResult<()> {
        self.record("validate");
        Ok(())
    }

    async fn commit_status(&self, _rulestack: &RulestackId) -> RemoteResult<CommitState> {
        let mut inner = self.inner.lock().unwrap();
        let status = inner.commit_script.pop_front().unwrap_or(CommitStatus::Pending);
        Ok(CommitState {
            commit_status: status,
            validation_status: status,
            commit_messages: inner.commit_messages.clone(),
            validation_messages: inner.commit_messages.clone(),
        })
    }
}

#[async_trait]
impl AccountApi for FakeCloud {
    async fn create_account(&self, account_id: &str) -> RemoteResult<AccountInfo> {
        self.record("create_account");
        let info = AccountInfo {
            account_id: account_id.to_string(),
            onboarding_status: OnboardingStatus::Pending,
        };
        self.inner
            .lock()
            .unwrap()
            .accounts
            .insert(account_id.to_string(), info.clone());
        Ok(info)
    }

    async fn read_account(&self, account_id: &str) -> RemoteResult<AccountInfo> {
        let mut inner = self.inner.lock().unwrap();
        let next = inner.onboarding_script.pop_front();
        let info = inner
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| RemoteError::not_found(format!("account {}", account_id)))?;
        if let Some(status) = next {
            info.onboarding_status = status;
        }
        Ok(info.clone())
    }

    async fn delete_account(&self, account_id: &str) -> RemoteResult<()> {
        self.record("delete_account");
        match self.inner.lock().unwrap().accounts.remove(account_id) {
            Some(_) => Ok(()),
            None => Err(RemoteError::not_found(format!("account {}", account_id))),
        }
    }
}

#[async_trait]
impl StackApi for FakeCloud {
    async fn create_stack(&self, spec: &OnboardingStackSpec) -> RemoteResult<String> {
        self.record("create_stack");
        let stack_id = format!(
            "arn:aws:cloudformation:us-east-1:{}:stack/{}/0f1e2d3c",
            spec.account_id, spec.stack_name
        );
        self.inner
            .lock()
            .unwrap()
            .stacks
            .insert(stack_id.clone(), StackStatus::CreateInProgress);
        Ok(stack_id)
    }

    async fn describe_stack(&self, stack_id: &str) -> RemoteResult<Option<StackStatus>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.stack_script.pop_front() {
            Some(Some(status)) => {
                inner.stacks.insert(stack_id.to_string(), status);
                Ok(Some(status))
            }
            Some(None) => {
                inner.stacks.remove(stack_id);
                Ok(None)
            }
            None => Ok(inner.stacks.get(stack_id).copied()),
        }
    }

    async fn delete_stack(&self, stack_id: &str) -> RemoteResult<()> {
        self.record("delete_stack");
        let mut inner = self.inner.lock().unwrap();
        match inner.stacks.get_mut(stack_id) {
            Some(status) => {
                *status = StackStatus::DeleteInProgress;
                Ok(())
            }
            None => Err(RemoteError::not_found(format!("stack {}", stack_id))),
        }
    }
}
