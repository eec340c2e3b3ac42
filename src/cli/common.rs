use serde::{Deserialize, Serialize};

/// Public/private organization pair behind a logical organization identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub public_org: String,
    pub private_org: String,
}

/// Input of the create-mirror saga.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRequest {
    pub fork_repo_owner: String,
    pub fork_repo_name: String,
    pub new_repo_name: String,
    pub new_branch_name: String,
}

impl MirrorRequest {
    /// `"<owner>/<name>"` of the source fork.
    pub fn fork_full_name(&self) -> String {
        format!("{}/{}", self.fork_repo_owner, self.fork_repo_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GithubSection {
    pub api_url: Option<String>,
    pub host: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AppSection {
    pub app_id: u64,
    pub private_key_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BotSection {
    pub name: String,
    pub email_domain: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GitSection {
    pub timeout_secs: Option<u64>,
    pub binary: Option<String>,
}
