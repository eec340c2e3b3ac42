use std::sync::Arc;

use serde::Serialize;

use crate::admin;
use crate::cli::{MirrorRequest, Settings};
use crate::error::MirrorError;
use crate::event::SagaStep;
use crate::git::VersionControl;
use crate::identity::IdentityProvider;
use crate::lease::NameLeases;
use crate::provider::RepositoryRecord;
use crate::query;
use crate::saga::MirrorSaga;

/// Result envelope of `create_mirror`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateMirrorOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RepositoryRecord>,
}

impl CreateMirrorOutcome {
    pub fn created(record: RepositoryRecord) -> Self {
        CreateMirrorOutcome {
            success: true,
            data: Some(record),
        }
    }

    pub fn failed() -> Self {
        CreateMirrorOutcome {
            success: false,
            data: None,
        }
    }
}

/// Entry point for the four mirror operations.
#[derive(Clone)]
pub struct MirrorService {
    settings: Arc<Settings>,
    identity: Arc<dyn IdentityProvider>,
    vcs: Arc<dyn VersionControl>,
    leases: NameLeases,
}

impl MirrorService {
    pub fn new(
        settings: Settings,
        identity: Arc<dyn IdentityProvider>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        MirrorService {
            settings: Arc::new(settings),
            identity,
            vcs,
            leases: NameLeases::new(),
        }
    }

    pub fn leases(&self) -> &NameLeases {
        &self.leases
    }

    /// Creates a private mirror of a fork.
    ///
    /// Returns `success: false` when the repository already exists, when the
    /// name is being mirrored concurrently in this process, or when the
    /// organization or identities cannot be resolved. Anything failing later
    /// is raised, after the partially created mirror has been rolled back.
    pub async fn create_mirror(
        &self,
        org_id: &str,
        request: &MirrorRequest,
    ) -> Result<CreateMirrorOutcome, MirrorError> {
        let orgs = match self.settings.organization(org_id) {
            Ok(orgs) => orgs,
            Err(e) => {
                tracing::warn!(
                    org = org_id,
                    step = %SagaStep::ResolveOrganization,
                    error = %e,
                    "Cannot resolve organization"
                );
                return Ok(CreateMirrorOutcome::failed());
            }
        };

        let identities = match self.identity.bundle(&orgs).await {
            Ok(identities) => identities,
            Err(e) => {
                tracing::warn!(
                    org = org_id,
                    step = %SagaStep::AcquireIdentities,
                    error = %e,
                    "Cannot acquire identities"
                );
                return Ok(CreateMirrorOutcome::failed());
            }
        };

        let _lease = match self
            .leases
            .try_acquire(&orgs.private_org, &request.new_repo_name)
        {
            Some(lease) => lease,
            None => {
                tracing::warn!(
                    org = %orgs.private_org,
                    repo = %request.new_repo_name,
                    "Mirror with this name is already being created"
                );
                return Ok(CreateMirrorOutcome::failed());
            }
        };

        let saga = MirrorSaga::new(
            &self.settings,
            self.vcs.as_ref(),
            &orgs,
            &identities,
            request,
        );

        match saga.run().await {
            Ok(record) => Ok(CreateMirrorOutcome::created(record)),
            Err(e) if e.is_already_exists() => {
                tracing::info!(org = org_id, error = %e, "Mirror not created");
                Ok(CreateMirrorOutcome::failed())
            }
            Err(e) => {
                tracing::error!(
                    org = org_id,
                    repo = %request.new_repo_name,
                    error = %e,
                    "Mirror creation failed"
                );
                Err(e)
            }
        }
    }

    pub async fn list_mirrors(
        &self,
        org_id: &str,
        fork_name: &str,
    ) -> Result<Vec<RepositoryRecord>, MirrorError> {
        query::list_mirrors(&self.settings, self.identity.as_ref(), org_id, fork_name).await
    }

    pub async fn edit_mirror(
        &self,
        org_id: &str,
        mirror_name: &str,
        new_mirror_name: &str,
    ) -> Result<RepositoryRecord, MirrorError> {
        admin::rename_mirror(
            &self.settings,
            self.identity.as_ref(),
            org_id,
            mirror_name,
            new_mirror_name,
        )
        .await
    }

    pub async fn delete_mirror(
        &self,
        org_id: &str,
        org_name: &str,
        mirror_name: &str,
    ) -> Result<bool, MirrorError> {
        admin::delete_mirror(
            &self.settings,
            self.identity.as_ref(),
            org_id,
            org_name,
            mirror_name,
        )
        .await
    }
}
