use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::container::{self, BuildKind};
use crate::nginx;
use crate::os::{self, HostOs};
use crate::output;
use crate::repo;
use crate::ssh::{self, transfer, Remote, SshSession};

use super::context::{DeployContext, RemoteTarget};

const TOTAL_STEPS: usize = 8;

pub fn sync_repository(ctx: &DeployContext) -> Result<(PathBuf, BuildKind)> {
    output::step(1, TOTAL_STEPS, "Fetching source code");

    let checkout = repo::sync(&ctx.params, &ctx.config.local.workspace)
        .context("Failed to fetch repository")?;
    let kind = BuildKind::detect(&checkout)?;

    match &kind {
        BuildKind::Dockerfile => output::success("Source ready (Dockerfile)"),
        BuildKind::Compose(file) => output::success(&format!("Source ready ({})", file)),
    }
    Ok((checkout, kind))
}

pub async fn verify_connectivity(ctx: &DeployContext) -> Result<SshSession> {
    output::step(2, TOTAL_STEPS, "Verifying SSH connectivity");

    let conn = &ctx.params.conn;
    let session = SshSession::connect(conn, ctx.connect_timeout())
        .await
        .with_context(|| {
            format!(
                "Cannot reach {}@{} within {}s",
                conn.user,
                conn.host,
                ctx.connect_timeout().as_secs()
            )
        })?;

    ssh::check_connectivity(&session).await?;

    output::success(&format!("Connected to {}@{}", conn.user, conn.host));
    Ok(session)
}

/// Detect the OS family and resolve the absolute application directory.
pub async fn inspect_target<R: Remote>(remote: &R, ctx: &DeployContext) -> Result<RemoteTarget> {
    let os = HostOs::detect(remote).await?;

    let home = ssh::remote_home(remote).await?;

    let target = RemoteTarget::new(os, &home, &ctx.config.remote.app_dir);
    debug!("remote target: {:?}", target);
    output::info(&format!("Detected OS family: {:?}", target.os));
    Ok(target)
}

pub async fn install_dependencies<R: Remote>(
    remote: &R,
    ctx: &DeployContext,
    target: &RemoteTarget,
) -> Result<()> {
    output::step(3, TOTAL_STEPS, "Installing dependencies");

    os::install_prerequisites(remote, target.os, &ctx.params.conn.user).await?;

    output::success("Dependencies ready");
    Ok(())
}

/// Remove and recreate the application directory on the host. Removal
/// runs as root since containers may leave root-owned files behind; the
/// new directory belongs to the SSH user so the upload can write to it.
pub async fn reset_app_dir<R: Remote>(remote: &R, target: &RemoteTarget) -> Result<()> {
    let path = ssh::shell_quote(&target.app_path);
    remote
        .sudo_exec(&format!("rm -rf {}", path))
        .await
        .with_context(|| format!("Failed to remove {}", target.app_path))?;
    remote
        .exec(&format!("mkdir -p {}", path))
        .await
        .with_context(|| format!("Failed to create {}", target.app_path))?;
    Ok(())
}

pub async fn transfer_files<R: Remote>(
    remote: &R,
    ctx: &DeployContext,
    target: &RemoteTarget,
    checkout: &Path,
) -> Result<()> {
    output::step(4, TOTAL_STEPS, "Transferring files");

    reset_app_dir(remote, target).await?;

    let spinner = output::create_spinner(&format!("Uploading to {}...", target.app_path));
    let uploaded = transfer::upload_dir(
        checkout,
        &ctx.params.conn,
        ctx.connect_timeout(),
        &target.app_path,
    );
    spinner.finish_and_clear();
    uploaded?;

    output::success(&format!("Files copied to {}", target.app_path));
    Ok(())
}

pub async fn build_and_run<R: Remote>(
    remote: &R,
    ctx: &DeployContext,
    target: &RemoteTarget,
    kind: &BuildKind,
) -> Result<()> {
    output::step(5, TOTAL_STEPS, "Building and starting container");

    let spinner = output::create_spinner("Building image...");
    let result = container::build_and_run(
        remote,
        kind,
        &target.app_path,
        &ctx.config.remote,
        ctx.params.app_port,
    )
    .await;
    spinner.finish_and_clear();
    result?;

    output::success(&format!(
        "Container {} running on port {}",
        ctx.config.remote.container_name, ctx.params.app_port
    ));
    Ok(())
}

pub async fn configure_proxy<R: Remote>(
    remote: &R,
    ctx: &DeployContext,
    target: &RemoteTarget,
) -> Result<()> {
    output::step(6, TOTAL_STEPS, "Configuring nginx reverse proxy");

    let site = nginx::render_site(&ctx.params.conn.host, ctx.params.app_port, target.os)?;
    nginx::configure(remote, target.os, &ctx.config.remote.nginx_site, &site).await?;

    output::success(&format!("nginx proxies :80 → 127.0.0.1:{}", ctx.params.app_port));
    Ok(())
}

/// `curl` the URL from the host itself and return the HTTP status, 0 when
/// nothing answered.
async fn http_status<R: Remote>(remote: &R, url: &str) -> Result<u16> {
    let out = remote
        .exec(&format!(
            "curl -s -o /dev/null --max-time 10 -w '%{{http_code}}' {} || true",
            url
        ))
        .await?;
    Ok(parse_http_code(&out))
}

pub fn parse_http_code(out: &str) -> u16 {
    out.trim().parse().unwrap_or(0)
}

pub async fn validate<R: Remote>(remote: &R, ctx: &DeployContext, kind: &BuildKind) -> Result<()> {
    output::step(7, TOTAL_STEPS, "Validating deployment");

    let settle = ctx.settle_delay();
    if !settle.is_zero() {
        let spinner = output::create_spinner("Waiting for the application to start...");
        tokio::time::sleep(settle).await;
        spinner.finish_and_clear();
    }

    let states = container::inspect(remote, kind, &ctx.config.remote).await?;
    if let Some(stopped) = states.iter().find(|s| !s.running) {
        bail!(
            "Container is not running (status {}, exit code {})",
            stopped.status,
            stopped.exit_code
        );
    }
    output::success("Container is running");

    let checks = [
        ("nginx", "http://localhost/".to_string()),
        (
            "application",
            format!("http://127.0.0.1:{}/", ctx.params.app_port),
        ),
    ];

    for (name, url) in checks {
        let code = http_status(remote, &url).await?;
        match code {
            0 => bail!("{} did not answer at {}", name, url),
            500.. => bail!("{} answered {} with HTTP {}", name, url, code),
            _ => output::success(&format!("{} answered HTTP {}", name, code)),
        }
    }

    Ok(())
}

pub fn summary(ctx: &DeployContext) {
    output::step(8, TOTAL_STEPS, "Done");
    output::success(&format!("Application is live at {}", ctx.public_url()));
    output::info(&format!("Log file: {}", ctx.log_path.display()));
}
