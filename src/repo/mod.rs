use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::output;
use crate::params::DeployParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Clone,
    Pull,
}

/// Directory name a clone of `url` lands in: the last path segment without `.git`.
pub fn repo_dir_name(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last);

    if name.is_empty() || name == "." || name == ".." {
        bail!("Cannot derive a directory name from repository URL '{}'", url);
    }
    Ok(name.to_string())
}

/// Embed the token as userinfo for http(s) URLs. Other schemes are returned unchanged.
pub fn authenticated_url(url: &str, token: &str) -> String {
    let url = url.trim();
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    if !scheme.eq_ignore_ascii_case("https") && !scheme.eq_ignore_ascii_case("http") {
        return url.to_string();
    }

    let (authority, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };
    let host = authority.rsplit('@').next().unwrap_or(authority);

    format!("{}://{}@{}{}", scheme, token, host, path)
}

/// Replace every occurrence of the token with `***`.
pub fn redact(text: &str, token: &str) -> String {
    if token.is_empty() {
        return text.to_string();
    }
    text.replace(token, "***")
}

pub fn plan(path: &Path) -> Result<SyncAction> {
    if path.join(".git").exists() {
        return Ok(SyncAction::Pull);
    }

    if path.is_dir() {
        let occupied = std::fs::read_dir(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .next()
            .is_some();
        if occupied {
            bail!(
                "{} exists but is not a git checkout; move it away or pick another workspace",
                path.display()
            );
        }
    } else if path.exists() {
        bail!("{} exists and is not a directory", path.display());
    }

    Ok(SyncAction::Clone)
}

/// The git invocations that bring `path` up to date with `branch`.
///
/// `auth_url` only ever appears on the command line. The checkout's
/// `origin` is left pointing at `plain_url`, so the token is never stored
/// in `.git/config`.
pub fn git_commands(
    action: SyncAction,
    auth_url: &str,
    plain_url: &str,
    branch: &str,
    path: &Path,
) -> Vec<Vec<String>> {
    let path = path.display().to_string();
    let path = path.as_str();
    let owned = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
    let refspec = format!("+refs/heads/{b}:refs/remotes/origin/{b}", b = branch);
    let tracking = format!("origin/{}", branch);

    match action {
        SyncAction::Clone => vec![
            owned(&["clone", "--branch", branch, auth_url, path]),
            owned(&["-C", path, "remote", "set-url", "origin", plain_url]),
        ],
        SyncAction::Pull => vec![
            owned(&["-C", path, "remote", "set-url", "origin", plain_url]),
            owned(&["-C", path, "fetch", auth_url, &refspec]),
            owned(&["-C", path, "checkout", branch]),
            owned(&["-C", path, "merge", "--ff-only", &tracking]),
        ],
    }
}

/// Clone the repository into `workspace`, or pull `branch` if it is already there.
/// Returns the local checkout path.
pub fn sync(params: &DeployParams, workspace: &Path) -> Result<PathBuf> {
    which::which("git").context("git is not installed or not on PATH")?;

    let path = workspace.join(repo_dir_name(&params.repository)?);
    let action = plan(&path)?;
    let auth_url = authenticated_url(&params.repository, &params.token);

    match action {
        SyncAction::Clone => output::info(&format!(
            "Cloning {} ({}) into {}",
            params.repository,
            params.branch,
            path.display()
        )),
        SyncAction::Pull => output::info(&format!(
            "Repository exists at {}, pulling {}",
            path.display(),
            params.branch
        )),
    }

    let plain_url = params.repository.trim();
    for args in git_commands(action, &auth_url, plain_url, &params.branch, &path) {
        run_git(&args, &params.token)?;
    }

    Ok(path)
}

fn run_git(args: &[String], token: &str) -> Result<()> {
    let shown = redact(&args.join(" "), token);
    debug!("git {}", shown);

    let out = Command::new("git")
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .with_context(|| format!("Failed to run git {}", shown))?;

    let stdout = redact(String::from_utf8_lossy(&out.stdout).trim(), token);
    let stderr = redact(String::from_utf8_lossy(&out.stderr).trim(), token);
    if !stdout.is_empty() {
        debug!("stdout: {}", stdout);
    }
    if !stderr.is_empty() {
        debug!("stderr: {}", stderr);
    }

    if !out.status.success() {
        bail!("git {} failed ({}): {}", shown, out.status, stderr);
    }
    Ok(())
}
