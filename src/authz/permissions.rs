//! Static permission catalogue (`spec.md` §3, §4.7, component "Permissions").

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Closed set of actions. `View` is implied by any non-`View` action on the
/// same `ResourceType` at the same namespace (`spec.md` §3 rule; §8
/// property 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
    Claim,
    Issue,
}

impl Action {
    pub fn is_view(self) -> bool {
        matches!(self, Action::View)
    }
}

/// Closed set of resource types a permission can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Group,
    Workspace,
    Run,
    Plan,
    Apply,
    Job,
    ConfigurationVersion,
    StateVersion,
    ManagedIdentity,
    Variable,
    Team,
    User,
    ServiceAccount,
    VcsProvider,
    TerraformModule,
    TerraformProvider,
    TerraformProviderMirror,
    Runner,
    FederatedRegistry,
}

/// `{Action, ResourceType}` — the unit permission checks are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub action: Action,
    pub resource: ResourceType,
}

impl Permission {
    pub const fn new(action: Action, resource: ResourceType) -> Self {
        Self { action, resource }
    }

    pub const fn view(resource: ResourceType) -> Self {
        Self::new(Action::View, resource)
    }

    /// Assignable permissions may appear in a `Role` definition. A handful
    /// of permissions are caller-internal only (e.g. the synthetic
    /// `Issue{FederatedRegistry}` token-mint permission) and are never
    /// assignable.
    pub fn is_assignable(self) -> bool {
        !matches!(
            (self.action, self.resource),
            (Action::Issue, ResourceType::FederatedRegistry)
        )
    }
}

/// A permission set unioned across memberships at one depth
/// (`spec.md` §4.7 step 2–3). Computes the "View implied by write" rule
/// lazily on lookup rather than eagerly expanding the set.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    permissions: HashSet<Permission>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a crate::model::Role>) -> Self {
        let mut permissions = HashSet::new();
        for role in roles {
            permissions.extend(role.permissions.iter().copied());
        }
        Self { permissions }
    }

    pub fn insert(&mut self, perm: Permission) {
        self.permissions.insert(perm);
    }

    pub fn extend(&mut self, other: &PermissionSet) {
        self.permissions.extend(other.permissions.iter().copied());
    }

    /// Holds `perm` iff it's directly present, or — when `perm` is a View
    /// permission — any non-View action on the same resource is present
    /// (`spec.md` §3, §4.7 step 3).
    pub fn holds(&self, perm: Permission) -> bool {
        if self.permissions.contains(&perm) {
            return true;
        }
        if perm.action.is_view() {
            return self
                .permissions
                .iter()
                .any(|p| p.resource == perm.resource && !p.action.is_view());
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

/// The three built-in roles (`spec.md` §3). Custom roles are arbitrary
/// permission sets loaded from the `Store`, not constructed here.
pub mod builtin_roles {
    use super::*;

    pub fn viewer_permissions() -> HashSet<Permission> {
        [
            ResourceType::Group,
            ResourceType::Workspace,
            ResourceType::Run,
            ResourceType::Plan,
            ResourceType::Apply,
            ResourceType::Job,
            ResourceType::ConfigurationVersion,
            ResourceType::StateVersion,
            ResourceType::ManagedIdentity,
            ResourceType::Variable,
            ResourceType::VcsProvider,
            ResourceType::TerraformModule,
            ResourceType::TerraformProvider,
            ResourceType::Runner,
        ]
        .into_iter()
        .map(Permission::view)
        .collect()
    }

    pub fn deployer_permissions() -> HashSet<Permission> {
        let mut perms = viewer_permissions();
        perms.insert(Permission::new(Action::Create, ResourceType::Run));
        perms.insert(Permission::new(Action::Update, ResourceType::Run));
        perms.insert(Permission::new(Action::Create, ResourceType::ConfigurationVersion));
        perms.insert(Permission::new(Action::Create, ResourceType::Variable));
        perms.insert(Permission::new(Action::Update, ResourceType::Variable));
        perms
    }

    pub fn owner_permissions() -> HashSet<Permission> {
        let mut perms = deployer_permissions();
        for resource in [
            ResourceType::Group,
            ResourceType::Workspace,
            ResourceType::ManagedIdentity,
            ResourceType::VcsProvider,
            ResourceType::TerraformModule,
            ResourceType::TerraformProvider,
            ResourceType::Runner,
            ResourceType::Variable,
        ] {
            perms.insert(Permission::new(Action::Create, resource));
            perms.insert(Permission::new(Action::Update, resource));
            perms.insert(Permission::new(Action::Delete, resource));
        }
        perms
    }
}
