use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::common::OrganizationConfig;
use super::reader;
use crate::error::MirrorError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GIT_HOST: &str = "github.com";
pub const DEFAULT_EMAIL_DOMAIN: &str = "users.noreply.github.com";
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 300;

/// Validated configuration with defaults applied.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub api_url: Url,
    pub git_host: String,
    pub app_id: u64,
    pub private_key_path: PathBuf,
    pub bot_name: String,
    pub bot_email_domain: String,
    pub git_binary: String,
    pub git_timeout: Duration,
    pub organizations: BTreeMap<String, OrganizationConfig>,
}

impl Settings {
    /// Resolves a logical organization identifier to its organization pair.
    pub fn organization(&self, org_id: &str) -> Result<OrganizationConfig, MirrorError> {
        self.organizations
            .get(org_id)
            .cloned()
            .ok_or_else(|| MirrorError::UnknownOrganization(org_id.to_string()))
    }
}

pub fn parse_config(config: reader::Config) -> Result<Settings, MirrorError> {
    let github = config.github.unwrap_or(super::common::GithubSection {
        api_url: None,
        host: None,
    });

    let api_url = parse_api_url(github.api_url.as_deref().unwrap_or(DEFAULT_API_URL))?;
    let git_host = match github.host {
        Some(host) => non_empty("github.host", host)?,
        None => api_url
            .host_str()
            .map(git_host_for)
            .unwrap_or_else(|| DEFAULT_GIT_HOST.to_string()),
    };

    for (org_id, orgs) in config.organizations.iter() {
        non_empty(&format!("organizations.{}.public_org", org_id), orgs.public_org.clone())?;
        non_empty(&format!("organizations.{}.private_org", org_id), orgs.private_org.clone())?;
    }

    let git = config.git.unwrap_or(super::common::GitSection {
        timeout_secs: None,
        binary: None,
    });
    let timeout_secs = git.timeout_secs.unwrap_or(DEFAULT_GIT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(MirrorError::Config("git.timeout_secs must be positive".to_string()));
    }

    Ok(Settings {
        api_url,
        git_host,
        app_id: config.app.app_id,
        private_key_path: PathBuf::from(config.app.private_key_path),
        bot_name: non_empty("bot.name", config.bot.name)?,
        bot_email_domain: config
            .bot
            .email_domain
            .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string()),
        git_binary: git.binary.unwrap_or_else(|| "git".to_string()),
        git_timeout: Duration::from_secs(timeout_secs),
        organizations: config.organizations,
    })
}

fn parse_api_url(val: &str) -> Result<Url, MirrorError> {
    let url = Url::parse(val)
        .map_err(|e| MirrorError::Config(format!("github.api_url `{}`: {}", val, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(MirrorError::Config(format!(
            "github.api_url must be http(s), got `{}`",
            scheme
        ))),
    }
}

/// `api.github.com` serves clones from `github.com`; enterprise hosts serve both.
fn git_host_for(api_host: &str) -> String {
    api_host
        .strip_prefix("api.")
        .unwrap_or(api_host)
        .to_string()
}

fn non_empty(field: &str, val: String) -> Result<String, MirrorError> {
    if val.trim().is_empty() {
        Err(MirrorError::Config(format!("{} must not be empty", field)))
    } else {
        Ok(val)
    }
}
