use anyhow::Result;
use std::path::PathBuf;

use crate::config::DockhandConfig;
use crate::deploy;
use crate::deploy::context::DeployContext;
use crate::params::DeployParams;
use crate::prompt::Prompter;

pub async fn run(
    prompter: &mut dyn Prompter,
    config: DockhandConfig,
    log_path: PathBuf,
) -> Result<()> {
    let params = DeployParams::gather(prompter, &config.defaults)?;

    let ctx = DeployContext::new(params, config, log_path);

    deploy::run(&ctx).await
}
