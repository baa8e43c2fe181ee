//! Constraints DSL (`spec.md` §4.6, §9): an immutable option-style argument
//! pack built by free-standing option functions. Handlers read only the
//! fields they declare required; a missing required field is
//! `AuthError::Invalid`, distinct from a permission denial.

use crate::error::{AuthError, Result};

#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub workspace_id: Option<String>,
    pub group_id: Option<String>,
    pub namespace_path: Option<String>,
    pub run_id: Option<String>,
    pub plan_id: Option<String>,
    pub apply_id: Option<String>,
    pub job_id: Option<String>,
    pub team_id: Option<String>,
    pub user_id: Option<String>,
    pub runner_id: Option<String>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_workspace_id(&self) -> Result<&str> {
        self.workspace_id
            .as_deref()
            .ok_or_else(|| AuthError::invalid("missing required constraint: workspace_id"))
    }

    pub fn require_group_id(&self) -> Result<&str> {
        self.group_id
            .as_deref()
            .ok_or_else(|| AuthError::invalid("missing required constraint: group_id"))
    }

    pub fn require_namespace_path(&self) -> Result<&str> {
        self.namespace_path
            .as_deref()
            .ok_or_else(|| AuthError::invalid("missing required constraint: namespace_path"))
    }

    pub fn require_run_id(&self) -> Result<&str> {
        self.run_id.as_deref().ok_or_else(|| AuthError::invalid("missing required constraint: run_id"))
    }

    pub fn require_plan_id(&self) -> Result<&str> {
        self.plan_id
            .as_deref()
            .ok_or_else(|| AuthError::invalid("missing required constraint: plan_id"))
    }

    pub fn require_apply_id(&self) -> Result<&str> {
        self.apply_id
            .as_deref()
            .ok_or_else(|| AuthError::invalid("missing required constraint: apply_id"))
    }

    pub fn require_job_id(&self) -> Result<&str> {
        self.job_id.as_deref().ok_or_else(|| AuthError::invalid("missing required constraint: job_id"))
    }

    pub fn require_team_id(&self) -> Result<&str> {
        self.team_id.as_deref().ok_or_else(|| AuthError::invalid("missing required constraint: team_id"))
    }

    pub fn require_user_id(&self) -> Result<&str> {
        self.user_id.as_deref().ok_or_else(|| AuthError::invalid("missing required constraint: user_id"))
    }
}

pub type ConstraintOpt = fn(Constraints) -> Constraints;

pub fn with_workspace_id(id: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let id = id.into();
    move |mut c| {
        c.workspace_id = Some(id);
        c
    }
}

pub fn with_group_id(id: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let id = id.into();
    move |mut c| {
        c.group_id = Some(id);
        c
    }
}

pub fn with_namespace_path(path: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let path = path.into();
    move |mut c| {
        c.namespace_path = Some(path);
        c
    }
}

pub fn with_run_id(id: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let id = id.into();
    move |mut c| {
        c.run_id = Some(id);
        c
    }
}

pub fn with_plan_id(id: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let id = id.into();
    move |mut c| {
        c.plan_id = Some(id);
        c
    }
}

pub fn with_apply_id(id: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let id = id.into();
    move |mut c| {
        c.apply_id = Some(id);
        c
    }
}

pub fn with_job_id(id: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let id = id.into();
    move |mut c| {
        c.job_id = Some(id);
        c
    }
}

pub fn with_team_id(id: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let id = id.into();
    move |mut c| {
        c.team_id = Some(id);
        c
    }
}

pub fn with_user_id(id: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let id = id.into();
    move |mut c| {
        c.user_id = Some(id);
        c
    }
}

pub fn with_runner_id(id: impl Into<String>) -> impl FnOnce(Constraints) -> Constraints {
    let id = id.into();
    move |mut c| {
        c.runner_id = Some(id);
        c
    }
}

/// Builds a `Constraints` from a sequence of option closures, mirroring the
/// free-standing option-function pattern used throughout this codebase's
/// builder-style configs (e.g. `OidcConfig`'s `..Default::default()` chains,
/// generalized here to composable closures since constraints are assembled
/// at call sites rather than from one struct literal).
pub fn build_constraints(opts: impl IntoIterator<Item = Box<dyn FnOnce(Constraints) -> Constraints>>) -> Constraints {
    let mut constraints = Constraints::new();
    for opt in opts {
        constraints = opt(constraints);
    }
    constraints
}
