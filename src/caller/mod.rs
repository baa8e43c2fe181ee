//! Authenticated principals and per-kind permission dispatch (`spec.md` §4.6).

pub mod constraints;
pub mod types;

pub use constraints::{
    build_constraints, with_apply_id, with_group_id, with_job_id, with_namespace_path, with_plan_id,
    with_run_id, with_runner_id, with_team_id, with_user_id, with_workspace_id, Constraints,
};
pub use types::{
    Caller, FederatedRegistryCaller, JobCaller, ScimCaller, ServiceAccountCaller, SystemCaller, UserCaller,
    VcsWorkspaceLinkCaller,
};
