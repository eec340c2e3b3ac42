use std::fmt;

use crate::error::MirrorError;
use crate::provider::RepositoryProvider;

/// Named steps of the create-mirror saga, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum SagaStep {
    ResolveOrganization,
    AcquireIdentities,
    CheckDuplicate,
    FetchFork,
    PrepareWorkDir,
    CloneFork,
    EnsureTrackingSchema,
    CreateRepository,
    PushDefaultBranch,
    CreateBranch,
    PushBranchToMirror,
    PushBranchToFork,
}

impl SagaStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::ResolveOrganization => "resolve_organization",
            SagaStep::AcquireIdentities => "acquire_identities",
            SagaStep::CheckDuplicate => "check_duplicate",
            SagaStep::FetchFork => "fetch_fork",
            SagaStep::PrepareWorkDir => "prepare_workdir",
            SagaStep::CloneFork => "clone_fork",
            SagaStep::EnsureTrackingSchema => "ensure_tracking_schema",
            SagaStep::CreateRepository => "create_repository",
            SagaStep::PushDefaultBranch => "push_default_branch",
            SagaStep::CreateBranch => "create_branch",
            SagaStep::PushBranchToMirror => "push_branch_to_mirror",
            SagaStep::PushBranchToFork => "push_branch_to_fork",
        }
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An undo action recorded once the step it reverses has committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Compensation {
    DeleteRepository { owner: String, name: String },
}

impl Compensation {
    async fn apply(&self, provider: &dyn RepositoryProvider) -> Result<(), MirrorError> {
        match self {
            Compensation::DeleteRepository { owner, name } => {
                provider.delete_repository(owner, name).await
            }
        }
    }
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::DeleteRepository { owner, name } => {
                write!(f, "delete {}/{}", owner, name)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct UndoLog {
    actions: Vec<Compensation>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Compensation) {
        self.actions.push(action);
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs every recorded action, newest first, then hands back the error
    /// to propagate. Undo failures escalate to `MirrorError::Compensation`.
    pub async fn unwind(
        &mut self,
        original: MirrorError,
        provider: &dyn RepositoryProvider,
    ) -> MirrorError {
        let mut failures = Vec::new();

        while let Some(action) = self.actions.pop() {
            tracing::warn!(action = %action, "Compensating");
            if let Err(e) = action.apply(provider).await {
                tracing::error!(action = %action, error = %e, "Compensation failed");
                failures.push(format!("{}: {}", action, e));
            }
        }

        if failures.is_empty() {
            original
        } else {
            MirrorError::Compensation {
                original: Box::new(original),
                failures,
            }
        }
    }
}
