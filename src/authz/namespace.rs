//! Hierarchical role/permission evaluation (`spec.md` §4.7).
//!
//! One `NamespaceAuthorizer` is constructed per `Caller` at caller-creation
//! time and bound to a single `(userID|serviceAccountID)` subject. Its
//! cache is never shared across subjects or requests (`spec.md` §9).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::authz::permissions::{Permission, PermissionSet, ResourceType};
use crate::caller::constraints::Constraints;
use crate::error::{AuthError, Result};
use crate::model::NamespaceMembership;
use crate::store::Store;

fn depth(path: &str) -> usize {
    path.split('/').count()
}

/// `"a/b/c"` -> `["a", "a/b", "a/b/c"]`.
fn ancestors_inclusive(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').collect();
    (1..=segments.len()).map(|n| segments[..n].join("/")).collect()
}

fn is_ancestor_or_equal(candidate: &str, of: &str) -> bool {
    of == candidate || of.starts_with(&format!("{candidate}/"))
}

fn root_of(path: &str) -> &str {
    path.split('/').next().unwrap_or(path)
}

pub struct NamespaceAuthorizer {
    store: Arc<dyn Store>,
    subject: String,
    cache: Mutex<HashMap<String, PermissionSet>>,
}

impl NamespaceAuthorizer {
    pub fn new(store: Arc<dyn Store>, subject: impl Into<String>) -> Self {
        Self { store, subject: subject.into(), cache: Mutex::new(HashMap::new()) }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Namespaces such that no strict ancestor is also a membership
    /// namespace for this subject (`spec.md` §4.7 `GetRootNamespaces`).
    pub async fn root_namespaces(&self) -> Result<HashSet<String>> {
        let memberships = self.store.get_all_memberships(&self.subject).await?;
        let paths: HashSet<String> = memberships.into_iter().map(|m| m.namespace_path).collect();
        Ok(paths
            .iter()
            .filter(|p| !paths.iter().any(|other| other != *p && is_ancestor_or_equal(other, p)))
            .cloned()
            .collect())
    }

    /// Resolves a `Constraints` pack to the single namespace path it
    /// targets: `groupID`/`workspaceID` are looked up via the store;
    /// `namespacePath` is used directly.
    async fn resolve_path(&self, constraints: &Constraints) -> Result<String> {
        if let Some(path) = &constraints.namespace_path {
            return Ok(path.clone());
        }
        if let Some(workspace_id) = &constraints.workspace_id {
            let ns = self
                .store
                .get_workspace_namespace(workspace_id)
                .await?
                .ok_or(AuthError::NotFound)?;
            return Ok(ns.full_path);
        }
        if let Some(group_id) = &constraints.group_id {
            let ns = self.store.get_group_namespace(group_id).await?.ok_or(AuthError::NotFound)?;
            return Ok(ns.full_path);
        }
        Err(AuthError::invalid("no namespace-resolving constraint provided (workspace_id/group_id/namespace_path)"))
    }

    /// Computes the union permission set at `path`, walking the sorted
    /// (deepest-first) membership chain and stopping once the deepest
    /// depth holding any membership has been consumed
    /// (`spec.md` §4.7, "Evaluation algorithm").
    ///
    /// A single store round trip covers the full ancestor chain of `path`;
    /// the result for every ancestor prefix is derived from that same
    /// membership list and opportunistically cached, so a later direct
    /// query for an ancestor never re-hits the store.
    async fn permissions_at_path(&self, path: &str) -> Result<PermissionSet> {
        if let Some(cached) = self.cache.lock().get(path) {
            return Ok(cached.clone());
        }

        let ancestors = ancestors_inclusive(path);
        let memberships = self.store.get_memberships_at_paths(&self.subject, &ancestors).await?;

        let mut roles = HashMap::new();
        for membership in &memberships {
            if roles.contains_key(&membership.role_id) {
                continue;
            }
            let role = self.store.get_role(&membership.role_id).await?.ok_or(AuthError::NotFound)?;
            roles.insert(membership.role_id.clone(), role);
        }

        let mut computed: Vec<(String, PermissionSet)> = Vec::with_capacity(ancestors.len());
        for prefix in &ancestors {
            let relevant: Vec<&NamespaceMembership> =
                memberships.iter().filter(|m| is_ancestor_or_equal(&m.namespace_path, prefix)).collect();

            let mut set = PermissionSet::new();
            if let Some(max_depth) = relevant.iter().map(|m| depth(&m.namespace_path)).max() {
                for membership in relevant.into_iter().filter(|m| depth(&m.namespace_path) == max_depth) {
                    if let Some(role) = roles.get(&membership.role_id) {
                        set.extend(&PermissionSet::from_roles([role]));
                    }
                }
            }
            computed.push((prefix.clone(), set));
        }

        {
            let mut cache = self.cache.lock();
            for (key, set) in &computed {
                cache.entry(key.clone()).or_insert_with(|| set.clone());
            }
        }

        Ok(computed.into_iter().find(|(key, _)| key == path).map(|(_, set)| set).unwrap_or_default())
    }

    /// Whether the subject holds View on `resource` at `path` — used to
    /// decide `Forbidden` vs `NotFound` (`spec.md` §4.6 `UnauthorizedError`).
    pub async fn has_viewer_access(&self, path: &str, resource: ResourceType) -> Result<bool> {
        let set = self.permissions_at_path(path).await?;
        Ok(set.holds(Permission::view(resource)))
    }

    /// `spec.md` §4.7 `RequireAccess`: resolves the constraint to a
    /// namespace path, then requires every permission in `perms`.
    pub async fn require_access(&self, perms: &[Permission], constraints: &Constraints) -> Result<()> {
        let path = self.resolve_path(constraints).await?;
        let set = self.permissions_at_path(&path).await?;

        for perm in perms {
            if !set.holds(*perm) {
                let viewer = set.holds(Permission::view(perm.resource));
                return Err(AuthError::unauthorized_error(
                    format!("missing permission {:?} at {path}", perm),
                    viewer,
                ));
            }
        }
        Ok(())
    }

    /// `spec.md` §4.7 `RequireAccessToInheritableResource`: allow iff the
    /// subject holds View on any of `resource_types` anywhere under the
    /// referenced namespace's root.
    pub async fn require_access_to_inheritable_resource(
        &self,
        resource_types: &[ResourceType],
        constraints: &Constraints,
    ) -> Result<()> {
        let path = self.resolve_path(constraints).await?;
        let root = root_of(&path).to_string();

        let memberships = self.store.get_memberships_under_root(&self.subject, &root).await?;
        for membership in &memberships {
            let Some(role) = self.store.get_role(&membership.role_id).await? else { continue };
            let mut set = PermissionSet::new();
            set.extend(&PermissionSet::from_roles([&role]));
            if resource_types.iter().any(|rt| set.holds(Permission::view(*rt))) {
                return Ok(());
            }
        }

        Err(AuthError::NotFound)
    }
}
