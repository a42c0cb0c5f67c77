//! Application presets.
//!
//! The three hosting applications share the same chain shape and differ
//! only in base path, allow-list and rule set. An [`AppProfile`] captures
//! those differences and assembles the chain.
//!
//! | Profile | Base path | Allow-list | Rule set |
//! |---|---|---|---|
//! | administration | `/administration` | `profile` | [`OperationsAccess`] |
//! | registration | `/registration` | `profile` | [`SelectOperator`] |
//! | dashboard | `/dashboard` | `profile` | none |

use crate::backend::RegistrationBackend;
use crate::chain::StageChain;
use crate::rules::{OperationsAccess, RuleSet, SelectOperator};
use crate::stages::authorization::{DEFAULT_EXEMPT_PREFIXES, DEFAULT_ONBOARDING_PATH};
use crate::stages::business_rules::DEFAULT_RULE_TIMEOUT;
use crate::stages::{AuthorizationStage, BusinessRuleStage, ResponseStage};
use crate::token::TokenResolver;
use std::sync::Arc;
use std::time::Duration;

/// Settings for one hosting application.
#[derive(Clone)]
pub struct AppProfile {
    label: &'static str,
    base_path: String,
    onboarding_path: String,
    allow_list: Vec<String>,
    exempt_prefixes: Vec<String>,
    rules: Option<Arc<dyn RuleSet>>,
    rule_timeout: Duration,
}

impl AppProfile {
    /// A profile with no allow-list and no rules.
    #[must_use]
    pub fn new(label: &'static str, base_path: impl Into<String>) -> Self {
        Self {
            label,
            base_path: base_path.into(),
            onboarding_path: DEFAULT_ONBOARDING_PATH.to_string(),
            allow_list: Vec::new(),
            exempt_prefixes: DEFAULT_EXEMPT_PREFIXES
                .iter()
                .map(|prefix| (*prefix).to_string())
                .collect(),
            rules: None,
            rule_timeout: DEFAULT_RULE_TIMEOUT,
        }
    }

    /// The administration application.
    #[must_use]
    pub fn administration() -> Self {
        Self::new("administration", "/administration")
            .allow("profile")
            .with_rules(OperationsAccess)
    }

    /// The registration application.
    #[must_use]
    pub fn registration() -> Self {
        Self::new("registration", "/registration")
            .allow("profile")
            .with_rules(SelectOperator)
    }

    /// The dashboard application.
    #[must_use]
    pub fn dashboard() -> Self {
        Self::new("dashboard", "/dashboard").allow("profile")
    }

    /// Looks a profile up by name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "administration" => Some(Self::administration()),
            "registration" => Some(Self::registration()),
            "dashboard" => Some(Self::dashboard()),
            _ => None,
        }
    }

    /// Adds an allow-listed final segment.
    #[must_use]
    pub fn allow(mut self, segment: impl Into<String>) -> Self {
        self.allow_list.push(segment.into());
        self
    }

    /// Sets the rule set.
    #[must_use]
    pub fn with_rules<R: RuleSet>(mut self, rules: R) -> Self {
        self.rules = Some(Arc::new(rules));
        self
    }

    /// Overrides the base path.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Overrides the onboarding path.
    #[must_use]
    pub fn with_onboarding_path(mut self, path: impl Into<String>) -> Self {
        self.onboarding_path = path.into();
        self
    }

    /// Replaces the path prefixes the chain never intercepts.
    #[must_use]
    pub fn with_exempt_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.exempt_prefixes = prefixes;
        self
    }

    /// Overrides the business-rule timeout.
    #[must_use]
    pub fn with_rule_timeout(mut self, timeout: Duration) -> Self {
        self.rule_timeout = timeout;
        self
    }

    /// Metrics / log label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Base path.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// True when the profile has a rule set.
    #[must_use]
    pub fn has_rules(&self) -> bool {
        self.rules.is_some()
    }

    /// Assembles Authorization → BusinessRules (if any) → Response.
    #[must_use]
    pub fn build_chain(
        &self,
        resolver: Arc<dyn TokenResolver>,
        backend: Arc<dyn RegistrationBackend>,
    ) -> StageChain {
        let authorization = self.allow_list.iter().fold(
            AuthorizationStage::new(resolver, self.base_path.clone())
                .with_onboarding_path(self.onboarding_path.clone())
                .with_exempt_prefixes(self.exempt_prefixes.clone()),
            |stage, segment| stage.allow(segment.clone()),
        );

        let mut builder = StageChain::builder(self.label).stage(authorization);

        if let Some(rules) = &self.rules {
            builder = builder.stage(
                BusinessRuleStage::new(self.label, self.base_path.clone(), rules.clone(), backend)
                    .with_timeout(self.rule_timeout),
            );
        }

        builder.stage(ResponseStage::new()).build()
    }
}

impl std::fmt::Debug for AppProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppProfile")
            .field("label", &self.label)
            .field("base_path", &self.base_path)
            .field("onboarding_path", &self.onboarding_path)
            .field("allow_list", &self.allow_list)
            .field("exempt_prefixes", &self.exempt_prefixes)
            .field("rules", &self.rules.as_ref().map(|r| r.name()))
            .field("rule_timeout", &self.rule_timeout)
            .finish()
    }
}
