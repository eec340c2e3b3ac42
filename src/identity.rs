//! Authorization contexts used by mirror operations.
//!
//! Two installation-scoped roles are involved, both minted on demand by the
//! app-level identity, which also looks up installations:
//!
//! - *contribution*: reads the fork and pushes branches back to it,
//! - *private installation*: creates and manages repositories in the private
//!   organization.
//!
//! Contexts are built fresh for every request and never cached here.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use octocrab::models::AppId;
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::Deserialize;

use crate::cli::{OrganizationConfig, Settings};
use crate::error::MirrorError;
use crate::github_provider::GithubProvider;
use crate::provider::RepositoryProvider;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityRole {
    Contribution,
    PrivateInstallation,
}

/// An API client together with the credential it acts with.
#[derive(Clone)]
pub struct IdentityContext {
    pub role: IdentityRole,
    pub client: Arc<dyn RepositoryProvider>,
    pub access_token: String,
    pub installation_id: Option<u64>,
}

impl fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityContext")
            .field("role", &self.role)
            .field("access_token", &"***")
            .field("installation_id", &self.installation_id)
            .finish()
    }
}

/// The contexts one create-mirror saga needs.
#[derive(Clone, Debug)]
pub struct IdentityBundle {
    pub contribution: IdentityContext,
    pub private_installation: IdentityContext,
    /// Installation of the app on the private organization.
    pub installation_id: u64,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn bundle(&self, orgs: &OrganizationConfig) -> Result<IdentityBundle, MirrorError>;

    /// Installation identifier of the app on `org`, resolved with the app-level identity.
    async fn installation_id(&self, org: &str) -> Result<u64, MirrorError>;

    /// Mints a private-installation context for `installation_id`.
    async fn installation_context(
        &self,
        installation_id: u64,
    ) -> Result<IdentityContext, MirrorError>;
}

#[derive(Deserialize)]
struct InstallationRecord {
    id: u64,
}

#[derive(Deserialize)]
struct InstallationToken {
    token: String,
}

/// Identity provider backed by a GitHub App installed on both organizations.
pub struct GithubAppIdentityProvider {
    app: Octocrab,
    api_url: String,
}

impl GithubAppIdentityProvider {
    pub fn new(settings: &Settings) -> Result<Self, MirrorError> {
        let pem = std::fs::read(&settings.private_key_path)?;
        Self::from_pem(settings.app_id, &pem, settings.api_url.as_str())
    }

    pub fn from_pem(app_id: u64, pem: &[u8], api_url: &str) -> Result<Self, MirrorError> {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(pem)?;
        let api_url = api_url.trim_end_matches('/').to_string();

        let app = Octocrab::builder()
            .app(AppId(app_id), key)
            .add_retry_config(RetryConfig::None)
            .base_uri(api_url.as_str())?
            .build()?;

        Ok(GithubAppIdentityProvider { app, api_url })
    }

    async fn mint(
        &self,
        installation_id: u64,
        role: IdentityRole,
    ) -> Result<IdentityContext, MirrorError> {
        let token: InstallationToken = self
            .app
            .post(
                format!("/app/installations/{}/access_tokens", installation_id),
                None::<&()>,
            )
            .await
            .map_err(|source| MirrorError::Identity {
                context: format!("minting token for installation {}", installation_id),
                source,
            })?;

        let client = GithubProvider::configure_provider(&token.token, Some(&self.api_url))?;
        tracing::debug!(installation_id, ?role, "Minted installation token");

        Ok(IdentityContext {
            role,
            client: Arc::new(client),
            access_token: token.token,
            installation_id: Some(installation_id),
        })
    }
}

#[async_trait]
impl IdentityProvider for GithubAppIdentityProvider {
    async fn bundle(&self, orgs: &OrganizationConfig) -> Result<IdentityBundle, MirrorError> {
        let (public_installation, private_installation) = futures::try_join!(
            self.installation_id(&orgs.public_org),
            self.installation_id(&orgs.private_org)
        )?;

        let contribution = self
            .mint(public_installation, IdentityRole::Contribution)
            .await?;
        let private = self
            .mint(private_installation, IdentityRole::PrivateInstallation)
            .await?;

        Ok(IdentityBundle {
            contribution,
            private_installation: private,
            installation_id: private_installation,
        })
    }

    async fn installation_id(&self, org: &str) -> Result<u64, MirrorError> {
        let installation: InstallationRecord = self
            .app
            .get(format!("/orgs/{}/installation", org), None::<&()>)
            .await
            .map_err(|source| MirrorError::Identity {
                context: format!("looking up app installation on {}", org),
                source,
            })?;

        Ok(installation.id)
    }

    async fn installation_context(
        &self,
        installation_id: u64,
    ) -> Result<IdentityContext, MirrorError> {
        self.mint(installation_id, IdentityRole::PrivateInstallation)
            .await
    }
}
