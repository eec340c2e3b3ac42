use crate::cli::Settings;
use crate::error::MirrorError;
use crate::identity::IdentityProvider;
use crate::provider::{RepositoryRecord, FORK_PROPERTY};

/// Search query matching every repository of `private_login` whose fork
/// property is `"<public_login>/<fork_name>"`.
pub fn mirror_search_query(private_login: &str, public_login: &str, fork_name: &str) -> String {
    format!(
        "org:{} props.{}:{}/{}",
        private_login, FORK_PROPERTY, public_login, fork_name
    )
}

/// Lists the mirrors tracking `fork_name` of the organization pair behind `org_id`.
///
/// Results keep the search service's ordering across pages.
pub async fn list_mirrors(
    settings: &Settings,
    identity: &dyn IdentityProvider,
    org_id: &str,
    fork_name: &str,
) -> Result<Vec<RepositoryRecord>, MirrorError> {
    find_mirrors(settings, identity, org_id, fork_name)
        .await
        .map_err(|e| {
            tracing::error!(org = org_id, fork = fork_name, error = %e, "Listing mirrors failed");
            MirrorError::internal("list mirrors", e)
        })
}

async fn find_mirrors(
    settings: &Settings,
    identity: &dyn IdentityProvider,
    org_id: &str,
    fork_name: &str,
) -> Result<Vec<RepositoryRecord>, MirrorError> {
    let orgs = settings.organization(org_id)?;
    let installation_id = identity.installation_id(&orgs.private_org).await?;
    let context = identity.installation_context(installation_id).await?;
    let client = context.client.as_ref();

    let (public_login, private_login) = futures::try_join!(
        client.organization_login(&orgs.public_org),
        client.organization_login(&orgs.private_org)
    )?;

    let query = mirror_search_query(&private_login, &public_login, fork_name);
    tracing::debug!(query = %query, "Searching mirrors");

    let mirrors = client.search_repositories(&query).await?;
    tracing::info!(org = org_id, fork = fork_name, count = mirrors.len(), "Listed mirrors");

    Ok(mirrors)
}
