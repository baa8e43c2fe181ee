//! `Caller` variants and per-kind permission dispatch (`spec.md` §4.6).
//!
//! Modeled as a closed tagged `enum` (`spec.md` §9 redesign note) rather
//! than a trait-object-per-provider shape: the variant set is fixed and
//! small, and a `match` gives exhaustiveness for free when a new
//! `ResourceType`/`Action` combination needs handling.

use std::sync::Arc;

use crate::authz::{Action, NamespaceAuthorizer, Permission, ResourceType};
use crate::caller::constraints::Constraints;
use crate::error::{AuthError, Result};
use crate::model::{Job, NamespaceAccessPolicy, User};
use crate::store::Store;

pub struct UserCaller {
    pub user: User,
    pub session_id: Option<String>,
    pub(crate) authorizer: NamespaceAuthorizer,
    pub(crate) store: Arc<dyn Store>,
}

pub struct ServiceAccountCaller {
    pub service_account_id: String,
    pub path: String,
    pub(crate) authorizer: NamespaceAuthorizer,
    pub(crate) store: Arc<dyn Store>,
}

pub struct JobCaller {
    pub job: Job,
    pub(crate) store: Arc<dyn Store>,
}

pub struct ScimCaller {
    pub idp_issuer_url: String,
    pub(crate) store: Arc<dyn Store>,
}

pub struct VcsWorkspaceLinkCaller {
    pub link_id: String,
    pub workspace_id: String,
}

pub struct FederatedRegistryCaller {
    pub group_id: String,
}

pub struct SystemCaller;

/// A request's authenticated principal for its lifetime. Built once by the
/// `Authenticator` and attached to the request context (`spec.md` §4.4).
pub enum Caller {
    User(UserCaller),
    ServiceAccount(ServiceAccountCaller),
    Job(JobCaller),
    Scim(ScimCaller),
    VcsWorkspaceLink(VcsWorkspaceLinkCaller),
    FederatedRegistry(FederatedRegistryCaller),
    System(SystemCaller),
}

impl Caller {
    pub fn subject(&self) -> &str {
        match self {
            Caller::User(c) => &c.user.id,
            Caller::ServiceAccount(c) => &c.service_account_id,
            Caller::Job(c) => &c.job.id,
            Caller::Scim(c) => &c.idp_issuer_url,
            Caller::VcsWorkspaceLink(c) => &c.link_id,
            Caller::FederatedRegistry(c) => &c.group_id,
            Caller::System(_) => "system",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::User(c) if c.user.admin) || matches!(self, Caller::System(_))
    }

    /// `spec.md` §3 `NamespaceAccessPolicy`: admins and the system caller
    /// get `AllowAll`; every other caller lists the root namespaces it can
    /// reach.
    pub async fn namespace_access_policy(&self) -> Result<NamespaceAccessPolicy> {
        match self {
            Caller::System(_) => Ok(NamespaceAccessPolicy::allow_all()),
            Caller::User(c) if c.user.admin => Ok(NamespaceAccessPolicy::allow_all()),
            Caller::User(c) => {
                let roots = c.authorizer.root_namespaces().await?;
                Ok(NamespaceAccessPolicy { allow_all: false, root_namespace_ids: roots.into_iter().collect() })
            }
            Caller::ServiceAccount(c) => {
                let roots = c.authorizer.root_namespaces().await?;
                Ok(NamespaceAccessPolicy { allow_all: false, root_namespace_ids: roots.into_iter().collect() })
            }
            Caller::Job(c) => {
                let ns = c.store.get_workspace_namespace(&c.job.workspace_id).await?.ok_or(AuthError::NotFound)?;
                Ok(NamespaceAccessPolicy { allow_all: false, root_namespace_ids: vec![ns.root_path().to_string()] })
            }
            Caller::VcsWorkspaceLink(c) => {
                Ok(NamespaceAccessPolicy { allow_all: false, root_namespace_ids: vec![c.workspace_id.clone()] })
            }
            Caller::FederatedRegistry(c) => {
                Ok(NamespaceAccessPolicy { allow_all: false, root_namespace_ids: vec![c.group_id.clone()] })
            }
            Caller::Scim(_) => Ok(NamespaceAccessPolicy::default()),
        }
    }

    pub async fn require_permission(&self, perm: Permission, constraints: &Constraints) -> Result<()> {
        match self {
            Caller::User(c) => c.require_permission(perm, constraints).await,
            Caller::ServiceAccount(c) => c.require_permission(perm, constraints).await,
            Caller::Job(c) => c.require_permission(perm, constraints).await,
            Caller::Scim(c) => c.require_permission(perm, constraints).await,
            Caller::VcsWorkspaceLink(c) => c.require_permission(perm, constraints).await,
            Caller::FederatedRegistry(c) => c.require_permission(perm, constraints).await,
            Caller::System(_) => Ok(()),
        }
    }

    pub async fn require_access_to_inheritable_resource(
        &self,
        resource_types: &[ResourceType],
        constraints: &Constraints,
    ) -> Result<()> {
        match self {
            Caller::User(c) => c.authorizer.require_access_to_inheritable_resource(resource_types, constraints).await,
            Caller::ServiceAccount(c) => {
                c.authorizer.require_access_to_inheritable_resource(resource_types, constraints).await
            }
            Caller::System(_) => Ok(()),
            // Job/SCIM/VCS/federated-registry callers are never namespace
            // subjects; they have no ancestor membership to inherit from.
            _ => Err(AuthError::NotFound),
        }
    }

    /// `spec.md` §4.6 `UnauthorizedError`: `Forbidden` if `has_viewer_access`,
    /// else `NotFound`.
    pub fn unauthorized_error(&self, message: impl Into<String>, has_viewer_access: bool) -> AuthError {
        AuthError::unauthorized_error(message, has_viewer_access)
    }
}

impl UserCaller {
    async fn require_permission(&self, perm: Permission, constraints: &Constraints) -> Result<()> {
        if !perm.action.is_view() && self.store.is_maintenance_mode().await? {
            return Err(AuthError::InMaintenanceMode);
        }
        if perm.is_assignable() && self.user.admin {
            return Ok(());
        }
        if let Some(result) = self.special(perm, constraints).await {
            return result;
        }
        self.authorizer.require_access(&[perm], constraints).await
    }

    /// Team/user special-cases (`spec.md` §4.6): team-update requires team
    /// maintainership; other Team/User write verbs require global admin.
    /// Returns `None` when `perm` isn't one of these specials, so the
    /// caller falls through to `NamespaceAuthorizer`.
    async fn special(&self, perm: Permission, constraints: &Constraints) -> Option<Result<()>> {
        match (perm.action, perm.resource) {
            (Action::Update, ResourceType::Team) => {
                let team_id = match constraints.require_team_id() {
                    Ok(id) => id,
                    Err(e) => return Some(Err(e)),
                };
                match self.store.is_team_maintainer(&self.user.id, team_id).await {
                    Ok(true) => Some(Ok(())),
                    Ok(false) => Some(Err(AuthError::forbidden("team update requires team maintainer"))),
                    Err(e) => Some(Err(e)),
                }
            }
            (action, ResourceType::Team | ResourceType::User) if !action.is_view() => Some(if self.user.admin {
                Ok(())
            } else {
                Err(AuthError::forbidden("this operation requires admin"))
            }),
            _ => None,
        }
    }
}

impl ServiceAccountCaller {
    async fn require_permission(&self, perm: Permission, constraints: &Constraints) -> Result<()> {
        if !perm.action.is_view() && self.store.is_maintenance_mode().await? {
            return Err(AuthError::InMaintenanceMode);
        }
        self.authorizer.require_access(&[perm], constraints).await
    }
}

impl JobCaller {
    async fn require_permission(&self, perm: Permission, constraints: &Constraints) -> Result<()> {
        use Action::*;
        use ResourceType::*;

        match (perm.action, perm.resource) {
            (View, Workspace | ConfigurationVersion | StateVersion | ManagedIdentity | Variable | Run) => {
                self.require_same_root_namespace(constraints.require_workspace_id()?).await
            }
            (Claim, StateVersion) | (Claim, Variable) | (Create, StateVersion) => {
                self.require_own_workspace(constraints.require_workspace_id()?)
            }
            (_, Job) => {
                let job_id = constraints.require_job_id()?;
                if job_id == self.job.id {
                    Ok(())
                } else {
                    Err(AuthError::NotFound)
                }
            }
            (Update, Plan) => self.require_update_plan(constraints).await,
            (Update, Apply) => self.require_update_apply(constraints).await,
            (Create, TerraformProviderMirror) => self.require_create_provider_mirror(constraints).await,
            _ => Err(AuthError::NotFound),
        }
    }

    async fn require_same_root_namespace(&self, workspace_id: &str) -> Result<()> {
        let requested =
            self.store.get_workspace_namespace(workspace_id).await?.ok_or(AuthError::NotFound)?;
        let own =
            self.store.get_workspace_namespace(&self.job.workspace_id).await?.ok_or(AuthError::NotFound)?;
        if requested.root_path() == own.root_path() {
            Ok(())
        } else {
            Err(AuthError::NotFound)
        }
    }

    fn require_own_workspace(&self, workspace_id: &str) -> Result<()> {
        if workspace_id == self.job.workspace_id {
            Ok(())
        } else {
            Err(AuthError::NotFound)
        }
    }

    async fn require_update_plan(&self, constraints: &Constraints) -> Result<()> {
        let run = self.store.get_run(&self.job.run_id).await?.ok_or(AuthError::NotFound)?;
        let plan_id = constraints.require_plan_id()?;
        if run.plan_id.as_deref() != Some(plan_id) {
            return Err(AuthError::NotFound);
        }
        let latest = self.store.get_latest_job_by_type(&self.job.run_id, "plan").await?;
        match latest {
            Some(job) if job.id == self.job.id => Ok(()),
            _ => Err(AuthError::NotFound),
        }
    }

    async fn require_update_apply(&self, constraints: &Constraints) -> Result<()> {
        let run = self.store.get_run(&self.job.run_id).await?.ok_or(AuthError::NotFound)?;
        let apply_id = constraints.require_apply_id()?;
        if run.apply_id.as_deref() != Some(apply_id) {
            return Err(AuthError::NotFound);
        }
        let latest = self.store.get_latest_job_by_type(&self.job.run_id, "apply").await?;
        match latest {
            Some(job) if job.id == self.job.id => Ok(()),
            _ => Err(AuthError::NotFound),
        }
    }

    async fn require_create_provider_mirror(&self, constraints: &Constraints) -> Result<()> {
        let enabled = self.job.properties.get("provider_mirror_enabled").map(String::as_str) == Some("true");
        if !enabled {
            return Err(AuthError::forbidden("job is not permitted to mirror terraform providers"));
        }
        let group_id = constraints.require_group_id()?;
        let own = self.store.get_workspace_namespace(&self.job.workspace_id).await?.ok_or(AuthError::NotFound)?;
        if group_id == own.root_path() {
            Ok(())
        } else {
            Err(AuthError::NotFound)
        }
    }
}

impl ScimCaller {
    async fn require_permission(&self, perm: Permission, constraints: &Constraints) -> Result<()> {
        if !perm.action.is_view() && self.store.is_maintenance_mode().await? {
            return Err(AuthError::InMaintenanceMode);
        }

        match (perm.action, perm.resource) {
            (Action::Create | Action::Update, ResourceType::User | ResourceType::Team) => Ok(()),
            (Action::Delete, ResourceType::User) => {
                let user_id = constraints.require_user_id()?;
                let user = self.store.get_user_by_id(user_id).await?.ok_or(AuthError::NotFound)?;
                self.require_non_empty_scim_id(user.scim_external_id.as_deref())
            }
            (Action::Delete, ResourceType::Team) => {
                let team_id = constraints.require_team_id()?;
                let team = self.store.get_team_by_id(team_id).await?.ok_or(AuthError::NotFound)?;
                self.require_non_empty_scim_id(team.scim_external_id.as_deref())
            }
            _ => Err(AuthError::forbidden("scim callers may only manage users and teams")),
        }
    }

    fn require_non_empty_scim_id(&self, scim_external_id: Option<&str>) -> Result<()> {
        match scim_external_id {
            Some(id) if !id.is_empty() => Ok(()),
            _ => Err(AuthError::forbidden("scim delete requires a provisioned external id")),
        }
    }
}

impl VcsWorkspaceLinkCaller {
    async fn require_permission(&self, perm: Permission, constraints: &Constraints) -> Result<()> {
        let allowed = perm.action.is_view() || perm == Permission::new(Action::Create, ResourceType::Run);
        if !allowed {
            return Err(AuthError::forbidden("vcs workspace link callers may only view or create runs"));
        }
        let workspace_id = constraints.require_workspace_id()?;
        if workspace_id == self.workspace_id {
            Ok(())
        } else {
            Err(AuthError::NotFound)
        }
    }
}

impl FederatedRegistryCaller {
    async fn require_permission(&self, perm: Permission, constraints: &Constraints) -> Result<()> {
        if !perm.action.is_view() {
            return Err(AuthError::forbidden("federated registry callers are read-only"));
        }
        let group_id = constraints.require_group_id()?;
        if group_id == self.group_id {
            Ok(())
        } else {
            Err(AuthError::NotFound)
        }
    }
}
