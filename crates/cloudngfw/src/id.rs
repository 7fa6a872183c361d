//! Composite identifiers
//!
//! A managed resource is addressed remotely by several coordinates (account,
//! scope, rulestack, rule list, priority, ...). Those coordinates are joined
//! into a single string that the orchestration layer persists as the
//! resource's handle, and split again on every read/update/delete.
//!
//! The token order and arity of every [`ResourceKind`] is a compatibility
//! contract: previously provisioned resources can only be re-read as long as
//! their persisted id still parses.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token separator
pub const ID_SEPARATOR: char = ':';

/// Join tokens into a composite identifier. No escaping is performed.
pub fn build<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut id = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i != 0 {
            id.push(ID_SEPARATOR);
        }
        id.push_str(token.as_ref());
    }
    id
}

/// Split a composite identifier, requiring exactly `arity` tokens
pub fn parse(id: &str, arity: usize) -> Result<Vec<String>> {
    let tokens: Vec<String> = id.split(ID_SEPARATOR).map(str::to_string).collect();
    if tokens.len() != arity {
        return Err(CloudError::malformed(
            id,
            format!("expected {} tokens, got {}", arity, tokens.len()),
        ));
    }
    Ok(tokens)
}

/// Ordered tuple of identifier tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeId {
    tokens: Vec<String>,
}

impl CompositeId {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse an identifier of a known kind
    pub fn parse(id: &str, kind: ResourceKind) -> Result<Self> {
        Ok(Self {
            tokens: parse(id, kind.arity())?,
        })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn arity(&self) -> usize {
        self.tokens.len()
    }

    /// Check that the id would survive a parse unchanged.
    ///
    /// Parsing never validates, so ids minted before this check existed keep
    /// working; new ids are checked before they are persisted.
    pub fn validate(&self) -> Result<()> {
        let id = self.to_string();
        for (i, token) in self.tokens.iter().enumerate() {
            if token.is_empty() {
                return Err(CloudError::malformed(&id, format!("token {} is empty", i)));
            }
            if token.contains(ID_SEPARATOR) {
                return Err(CloudError::malformed(
                    &id,
                    format!("token '{}' contains the separator '{}'", token, ID_SEPARATOR),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build(&self.tokens))
    }
}

/// Resource kinds and their identifier layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Account,
    AccountOnboarding,
    OnboardingStack,
    Rulestack,
    CommitRulestack,
    ValidateRulestack,
    FqdnList,
    IntelligentFeed,
    Certificate,
    CustomUrlCategory,
    PrefixList,
    SecurityRule,
    FirewallInstance,
    Ngfw,
    NgfwTag,
    NgfwLogProfile,
}

impl ResourceKind {
    /// Names of the identifier tokens, in order
    pub fn token_names(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Account | ResourceKind::AccountOnboarding => &["account_id"],
            // an opaque ARN, kept whole even though it contains separators
            ResourceKind::OnboardingStack => &["stack_id"],
            ResourceKind::Rulestack
            | ResourceKind::CommitRulestack
            | ResourceKind::ValidateRulestack => &["scope", "rulestack"],
            ResourceKind::FqdnList | ResourceKind::IntelligentFeed => &["rulestack", "name"],
            ResourceKind::Certificate
            | ResourceKind::CustomUrlCategory
            | ResourceKind::PrefixList => &["scope", "rulestack", "name"],
            ResourceKind::SecurityRule => &["scope", "rulestack", "rule_list", "priority"],
            ResourceKind::FirewallInstance => &["account_id", "region", "name"],
            ResourceKind::Ngfw | ResourceKind::NgfwTag | ResourceKind::NgfwLogProfile => {
                &["account_id", "firewall"]
            }
        }
    }

    pub fn arity(&self) -> usize {
        self.token_names().len()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Account => "account",
            ResourceKind::AccountOnboarding => "account_onboarding",
            ResourceKind::OnboardingStack => "account_onboarding_stack",
            ResourceKind::Rulestack => "rulestack",
            ResourceKind::CommitRulestack => "commit_rulestack",
            ResourceKind::ValidateRulestack => "validate_rulestack",
            ResourceKind::FqdnList => "fqdn_list",
            ResourceKind::IntelligentFeed => "intelligent_feed",
            ResourceKind::Certificate => "certificate",
            ResourceKind::CustomUrlCategory => "custom_url_category",
            ResourceKind::PrefixList => "prefix_list",
            ResourceKind::SecurityRule => "security_rule",
            ResourceKind::FirewallInstance => "instance",
            ResourceKind::Ngfw => "ngfw",
            ResourceKind::NgfwTag => "ngfw_tag",
            ResourceKind::NgfwLogProfile => "ngfw_log_profile",
        };
        f.write_str(name)
    }
}

/// `scope:rulestack`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RulestackId {
    pub scope: String,
    pub name: String,
}

impl RulestackId {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }

    /// Parse, upgrading a bare rulestack name written by older releases.
    ///
    /// Returns the id and whether it was upgraded. Only an id with exactly
    /// one token is upgraded; every other arity mismatch is still an error.
    pub fn parse_or_upgrade(id: &str, default_scope: &str) -> Result<(Self, bool)> {
        if !id.contains(ID_SEPARATOR) {
            return Ok((Self::new(default_scope, id), true));
        }
        Ok((id.parse()?, false))
    }
}

impl fmt::Display for RulestackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build(&[&self.scope, &self.name]))
    }
}

impl FromStr for RulestackId {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let mut tok = parse(s, ResourceKind::Rulestack.arity())?.into_iter();
        match (tok.next(), tok.next()) {
            (Some(scope), Some(name)) => Ok(Self { scope, name }),
            _ => Err(CloudError::malformed(s, "expected 2 tokens")),
        }
    }
}

/// `rulestack:name`, for objects that live in a local rulestack only
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RulestackObjectId {
    pub rulestack: String,
    pub name: String,
}

impl fmt::Display for RulestackObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build(&[&self.rulestack, &self.name]))
    }
}

impl FromStr for RulestackObjectId {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let mut tok = parse(s, ResourceKind::FqdnList.arity())?.into_iter();
        match (tok.next(), tok.next()) {
            (Some(rulestack), Some(name)) => Ok(Self { rulestack, name }),
            _ => Err(CloudError::malformed(s, "expected 2 tokens")),
        }
    }
}

/// `scope:rulestack:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedObjectId {
    pub scope: String,
    pub rulestack: String,
    pub name: String,
}

impl fmt::Display for ScopedObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build(&[&self.scope, &self.rulestack, &self.name]))
    }
}

impl FromStr for ScopedObjectId {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let mut tok = parse(s, ResourceKind::PrefixList.arity())?.into_iter();
        match (tok.next(), tok.next(), tok.next()) {
            (Some(scope), Some(rulestack), Some(name)) => Ok(Self {
                scope,
                rulestack,
                name,
            }),
            _ => Err(CloudError::malformed(s, "expected 3 tokens")),
        }
    }
}

/// `scope:rulestack:rule_list:priority`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityRuleId {
    pub scope: String,
    pub rulestack: String,
    pub rule_list: String,
    pub priority: u32,
}

impl fmt::Display for SecurityRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let priority = self.priority.to_string();
        f.write_str(&build(&[
            self.scope.as_str(),
            self.rulestack.as_str(),
            self.rule_list.as_str(),
            priority.as_str(),
        ]))
    }
}

impl FromStr for SecurityRuleId {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let mut tok = parse(s, ResourceKind::SecurityRule.arity())?.into_iter();
        match (tok.next(), tok.next(), tok.next(), tok.next()) {
            (Some(scope), Some(rulestack), Some(rule_list), Some(priority)) => {
                let priority = priority.parse::<u32>().map_err(|_| {
                    CloudError::malformed(s, format!("priority '{}' is not a number", priority))
                })?;
                Ok(Self {
                    scope,
                    rulestack,
                    rule_list,
                    priority,
                })
            }
            _ => Err(CloudError::malformed(s, "expected 4 tokens")),
        }
    }
}

/// `account_id:region:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId {
    pub account_id: String,
    pub region: String,
    pub name: String,
}

impl InstanceId {
    pub fn to_composite(&self) -> CompositeId {
        CompositeId::new([&self.account_id, &self.region, &self.name].map(String::as_str))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build(&[&self.account_id, &self.region, &self.name]))
    }
}

impl FromStr for InstanceId {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let mut tok = parse(s, ResourceKind::FirewallInstance.arity())?.into_iter();
        match (tok.next(), tok.next(), tok.next()) {
            (Some(account_id), Some(region), Some(name)) => Ok(Self {
                account_id,
                region,
                name,
            }),
            _ => Err(CloudError::malformed(s, "expected 3 tokens")),
        }
    }
}

/// `account_id:firewall`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FirewallRef {
    pub account_id: String,
    pub firewall: String,
}

impl fmt::Display for FirewallRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build(&[&self.account_id, &self.firewall]))
    }
}

impl FromStr for FirewallRef {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let mut tok = parse(s, ResourceKind::Ngfw.arity())?.into_iter();
        match (tok.next(), tok.next()) {
            (Some(account_id), Some(firewall)) => Ok(Self {
                account_id,
                firewall,
            }),
            _ => Err(CloudError::malformed(s, "expected 2 tokens")),
        }
    }
}
