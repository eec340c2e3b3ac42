//! The create-mirror saga.
//!
//! Steps run strictly in order. Once the private repository exists, every
//! later failure unwinds the [`UndoLog`] before the error propagates. The
//! working directory lives for one `run` and is removed on every exit path.

use std::path::Path;

use crate::cli::{MirrorRequest, OrganizationConfig, Settings};
use crate::error::MirrorError;
use crate::event::{Compensation, SagaStep, UndoLog};
use crate::git::{CommitIdentity, RemoteUrl, VersionControl, WorkDir};
use crate::identity::IdentityBundle;
use crate::provider::{
    CustomProperty, NewRepository, RepositoryProvider, RepositoryRecord, FORK_PROPERTY,
};

pub const ORIGIN_REMOTE: &str = "origin";
pub const UPSTREAM_REMOTE: &str = "upstream";

const FORK_PROPERTY_DESCRIPTION: &str = "Public fork this repository mirrors";

pub struct MirrorSaga<'a> {
    settings: &'a Settings,
    vcs: &'a dyn VersionControl,
    orgs: &'a OrganizationConfig,
    identities: &'a IdentityBundle,
    request: &'a MirrorRequest,
    undo: UndoLog,
}

impl<'a> MirrorSaga<'a> {
    pub fn new(
        settings: &'a Settings,
        vcs: &'a dyn VersionControl,
        orgs: &'a OrganizationConfig,
        identities: &'a IdentityBundle,
        request: &'a MirrorRequest,
    ) -> Self {
        MirrorSaga {
            settings,
            vcs,
            orgs,
            identities,
            request,
            undo: UndoLog::new(),
        }
    }

    pub async fn run(mut self) -> Result<RepositoryRecord, MirrorError> {
        self.enter(SagaStep::CheckDuplicate);
        self.check_duplicate()
            .await
            .map_err(|e| e.at(SagaStep::CheckDuplicate))?;

        self.enter(SagaStep::FetchFork);
        let default_branch = self
            .fork_default_branch()
            .await
            .map_err(|e| e.at(SagaStep::FetchFork))?;

        self.enter(SagaStep::PrepareWorkDir);
        let workdir = WorkDir::new().map_err(|e| e.at(SagaStep::PrepareWorkDir))?;

        self.enter(SagaStep::CloneFork);
        self.clone_fork(workdir.path())
            .await
            .map_err(|e| e.at(SagaStep::CloneFork))?;

        self.enter(SagaStep::EnsureTrackingSchema);
        self.ensure_tracking_schema()
            .await
            .map_err(|e| e.at(SagaStep::EnsureTrackingSchema))?;

        self.enter(SagaStep::CreateRepository);
        let mirror = self
            .create_repository()
            .await
            .map_err(|e| e.at(SagaStep::CreateRepository))?;

        if let Err(e) = self.replicate(workdir.path(), &mirror, &default_branch).await {
            tracing::warn!(
                org = %self.orgs.private_org,
                repo = %mirror.name,
                error = %e,
                "Mirror replication failed, rolling back"
            );
            let client = self.identities.private_installation.client.as_ref();
            return Err(self.undo.unwind(e, client).await);
        }

        tracing::info!(
            org = %self.orgs.private_org,
            repo = %mirror.name,
            fork = %self.request.fork_full_name(),
            "Mirror created"
        );
        Ok(mirror)
    }

    fn enter(&self, step: SagaStep) {
        tracing::info!(
            org = %self.orgs.private_org,
            repo = %self.request.new_repo_name,
            step = %step,
            "Saga step"
        );
    }

    /// Fails with `AlreadyExists` if the name is taken under the public
    /// organization's canonical login or in the private organization.
    async fn check_duplicate(&self) -> Result<(), MirrorError> {
        let public = self.identities.contribution.client.as_ref();
        let login = public.organization_login(&self.orgs.public_org).await?;
        ensure_absent(public, &login, &self.request.new_repo_name).await?;

        let private = self.identities.private_installation.client.as_ref();
        ensure_absent(private, &self.orgs.private_org, &self.request.new_repo_name).await
    }

    async fn fork_default_branch(&self) -> Result<String, MirrorError> {
        let fork = self
            .identities
            .contribution
            .client
            .get_repository(&self.request.fork_repo_owner, &self.request.fork_repo_name)
            .await?;

        fork.default_branch.ok_or_else(|| {
            MirrorError::NotFound(format!(
                "default branch of {}",
                self.request.fork_full_name()
            ))
        })
    }

    async fn clone_fork(&self, workdir: &Path) -> Result<(), MirrorError> {
        let origin = RemoteUrl::credentialed(
            &self.settings.git_host,
            &self.identities.contribution.access_token,
            &self.request.fork_repo_owner,
            &self.request.fork_repo_name,
        );
        self.vcs.clone_repository(workdir, &origin).await?;

        let identity = CommitIdentity::bot(
            &self.settings.bot_name,
            &self.settings.bot_email_domain,
            self.identities.installation_id,
        );
        self.vcs.configure_identity(workdir, &identity).await
    }

    async fn ensure_tracking_schema(&self) -> Result<(), MirrorError> {
        let client = self.identities.private_installation.client.as_ref();
        let org = &self.orgs.private_org;

        let properties = client.list_custom_properties(org).await?;
        if properties.iter().any(|p| p.is_string_named(FORK_PROPERTY)) {
            return Ok(());
        }

        let property = CustomProperty::string(FORK_PROPERTY, FORK_PROPERTY_DESCRIPTION);
        match client.create_custom_property(org, &property).await {
            Ok(_) => {
                tracing::info!(org = %org, "Created fork tracking property");
                Ok(())
            }
            Err(e) => {
                // A concurrent saga may have created it first.
                let properties = client.list_custom_properties(org).await?;
                if properties.iter().any(|p| p.is_string_named(FORK_PROPERTY)) {
                    tracing::warn!(
                        org = %org,
                        error = %e,
                        "Tracking property appeared concurrently"
                    );
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn create_repository(&mut self) -> Result<RepositoryRecord, MirrorError> {
        let repository = NewRepository::private_mirror(
            &self.request.new_repo_name,
            &self.request.fork_repo_owner,
            &self.request.fork_repo_name,
        );

        let mirror = self
            .identities
            .private_installation
            .client
            .create_repository(&self.orgs.private_org, &repository)
            .await?;

        self.undo.push(Compensation::DeleteRepository {
            owner: self.orgs.private_org.clone(),
            name: mirror.name.clone(),
        });

        Ok(mirror)
    }

    async fn replicate(
        &self,
        workdir: &Path,
        mirror: &RepositoryRecord,
        default_branch: &str,
    ) -> Result<(), MirrorError> {
        let branch = &self.request.new_branch_name;
        let upstream = RemoteUrl::credentialed(
            &self.settings.git_host,
            &self.identities.private_installation.access_token,
            &self.orgs.private_org,
            &mirror.name,
        );

        self.enter(SagaStep::PushDefaultBranch);
        self.vcs
            .add_remote(workdir, UPSTREAM_REMOTE, &upstream)
            .await
            .map_err(|e| e.at(SagaStep::PushDefaultBranch))?;
        self.vcs
            .push(workdir, UPSTREAM_REMOTE, default_branch)
            .await
            .map_err(|e| e.at(SagaStep::PushDefaultBranch))?;

        self.enter(SagaStep::CreateBranch);
        self.vcs
            .create_branch(workdir, branch, default_branch)
            .await
            .map_err(|e| e.at(SagaStep::CreateBranch))?;

        self.enter(SagaStep::PushBranchToMirror);
        self.vcs
            .push(workdir, UPSTREAM_REMOTE, branch)
            .await
            .map_err(|e| e.at(SagaStep::PushBranchToMirror))?;

        self.enter(SagaStep::PushBranchToFork);
        self.vcs
            .push(workdir, ORIGIN_REMOTE, branch)
            .await
            .map_err(|e| e.at(SagaStep::PushBranchToFork))
    }
}

async fn ensure_absent(
    client: &dyn RepositoryProvider,
    owner: &str,
    name: &str,
) -> Result<(), MirrorError> {
    match client.get_repository(owner, name).await {
        Ok(_) => Err(MirrorError::AlreadyExists {
            owner: owner.to_string(),
            name: name.to_string(),
        }),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}
