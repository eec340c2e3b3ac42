use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use forkmirror::cli::{self, Args, Command, MirrorRequest};
use forkmirror::git::GitCli;
use forkmirror::identity::GithubAppIdentityProvider;
use forkmirror::{telemetry, MirrorService};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init(args.verbose);

    let settings = cli::load_settings(&args.config)?;
    let identity = GithubAppIdentityProvider::new(&settings)?;
    let git = GitCli::new(&settings.git_binary, settings.git_timeout);
    let service = MirrorService::new(settings, Arc::new(identity), Arc::new(git));

    let output = match args.command {
        Command::Create {
            org,
            fork_owner,
            fork_name,
            name,
            branch,
        } => {
            let request = MirrorRequest {
                fork_repo_owner: fork_owner,
                fork_repo_name: fork_name,
                new_repo_name: name,
                new_branch_name: branch,
            };
            serde_json::to_string_pretty(&service.create_mirror(&org, &request).await?)?
        }
        Command::List { org, fork_name } => {
            serde_json::to_string_pretty(&service.list_mirrors(&org, &fork_name).await?)?
        }
        Command::Edit {
            org,
            name,
            new_name,
        } => serde_json::to_string_pretty(&service.edit_mirror(&org, &name, &new_name).await?)?,
        Command::Delete { org, owner, name } => {
            serde_json::to_string_pretty(&service.delete_mirror(&org, &owner, &name).await?)?
        }
    };

    println!("{}", output);
    Ok(())
}
