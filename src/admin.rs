//! Rename and delete passthroughs.
//!
//! Neither operation touches the fork property; it lives on the repository
//! and moves or disappears with it.

use crate::cli::Settings;
use crate::error::MirrorError;
use crate::identity::{IdentityContext, IdentityProvider};
use crate::provider::RepositoryRecord;

async fn private_context(
    settings: &Settings,
    identity: &dyn IdentityProvider,
    org_id: &str,
) -> Result<(String, IdentityContext), MirrorError> {
    let orgs = settings.organization(org_id)?;
    let installation_id = identity.installation_id(&orgs.private_org).await?;
    let context = identity.installation_context(installation_id).await?;

    Ok((orgs.private_org, context))
}

pub async fn rename_mirror(
    settings: &Settings,
    identity: &dyn IdentityProvider,
    org_id: &str,
    mirror_name: &str,
    new_mirror_name: &str,
) -> Result<RepositoryRecord, MirrorError> {
    let result = async {
        let (private_org, context) = private_context(settings, identity, org_id).await?;
        context
            .client
            .update_repository_name(&private_org, mirror_name, new_mirror_name)
            .await
    }
    .await;

    match result {
        Ok(record) => {
            tracing::info!(org = org_id, from = mirror_name, to = %record.name, "Renamed mirror");
            Ok(record)
        }
        Err(e) => {
            tracing::error!(org = org_id, repo = mirror_name, error = %e, "Renaming mirror failed");
            Err(MirrorError::internal("rename mirror", e))
        }
    }
}

pub async fn delete_mirror(
    settings: &Settings,
    identity: &dyn IdentityProvider,
    org_id: &str,
    org_name: &str,
    mirror_name: &str,
) -> Result<bool, MirrorError> {
    let result = async {
        let (_, context) = private_context(settings, identity, org_id).await?;
        context.client.delete_repository(org_name, mirror_name).await
    }
    .await;

    match result {
        Ok(()) => {
            tracing::info!(org = org_name, repo = mirror_name, "Deleted mirror");
            Ok(true)
        }
        Err(e) => {
            tracing::error!(org = org_name, repo = mirror_name, error = %e, "Deleting mirror failed");
            Err(MirrorError::internal("delete mirror", e))
        }
    }
}
