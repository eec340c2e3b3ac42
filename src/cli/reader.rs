use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;
use serde_yaml;

use super::common::{AppSection, BotSection, GitSection, GithubSection, OrganizationConfig};

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Config {
    pub version: String,
    pub github: Option<GithubSection>,
    pub app: AppSection,
    pub bot: BotSection,
    pub organizations: BTreeMap<String, OrganizationConfig>,
    pub git: Option<GitSection>,
}

pub fn read_config(config: &str) -> Result<Config> {
    let deserialized_config: Config = serde_yaml::from_str(config)?;

    Ok(deserialized_config)
}
