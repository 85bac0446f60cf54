use anyhow::{Context, Result};
use minijinja::Environment;
use std::net::IpAddr;
use tracing::debug;

use crate::os::HostOs;
use crate::output;
use crate::ssh::Remote;

const SITE_TEMPLATE: &str = include_str!("../../templates/nginx-site.conf.j2");

/// Where the site definition lives on the host.
#[derive(Debug, PartialEq, Eq)]
pub struct SitePaths {
    pub config: String,
    /// Debian-style symlink that activates the site.
    pub enabled: Option<String>,
}

pub fn site_paths(os: HostOs, site: &str) -> SitePaths {
    match os {
        HostOs::Debian => SitePaths {
            config: format!("/etc/nginx/sites-available/{}", site),
            enabled: Some(format!("/etc/nginx/sites-enabled/{}", site)),
        },
        HostOs::Rhel => SitePaths {
            config: format!("/etc/nginx/conf.d/{}.conf", site),
            enabled: None,
        },
    }
}

/// Render the reverse proxy server block forwarding port 80 to the app.
pub fn render_site(host: &str, port: u16, os: HostOs) -> Result<String> {
    let server_name = if host.parse::<IpAddr>().is_ok() {
        "_"
    } else {
        host
    };

    let mut env = Environment::new();
    env.add_template("site", SITE_TEMPLATE)
        .context("Failed to load nginx site template")?;
    let tmpl = env.get_template("site")?;

    let rendered = tmpl
        .render(minijinja::context! {
            server_name => server_name,
            port => port,
            // RHEL's stock nginx.conf already declares a default server.
            default_server => os == HostOs::Debian,
        })
        .context("Failed to render nginx site template")?;

    Ok(rendered)
}

pub async fn configure<R: Remote>(remote: &R, os: HostOs, site: &str, content: &str) -> Result<()> {
    let paths = site_paths(os, site);

    remote
        .sudo_write_file(&paths.config, content)
        .await
        .with_context(|| format!("Failed to write {}", paths.config))?;

    if let Some(enabled) = &paths.enabled {
        remote
            .sudo_exec(&format!(
                "ln -sfn {} {} && rm -f /etc/nginx/sites-enabled/default",
                paths.config, enabled
            ))
            .await
            .context("Failed to enable nginx site")?;
    }

    if os == HostOs::Rhel && remote.command_exists("setsebool").await? {
        if let Err(e) = remote
            .sudo_exec("setsebool -P httpd_can_network_connect 1")
            .await
        {
            output::warning("Could not allow nginx outbound connections under SELinux");
            debug!("setsebool failed: {:#}", e);
        }
    }

    remote
        .sudo_exec("nginx -t")
        .await
        .context("nginx rejected the generated configuration")?;

    remote
        .sudo_exec("systemctl reload nginx")
        .await
        .context("Failed to reload nginx")?;

    Ok(())
}

/// Delete the site from every location either OS family uses and reload
/// nginx if it is installed.
pub async fn remove<R: Remote>(remote: &R, site: &str) -> Result<()> {
    let files: Vec<String> = [HostOs::Debian, HostOs::Rhel]
        .into_iter()
        .flat_map(|os| {
            let paths = site_paths(os, site);
            std::iter::once(paths.config).chain(paths.enabled)
        })
        .collect();

    remote
        .sudo_exec(&format!("rm -f {}", files.join(" ")))
        .await
        .context("Failed to remove nginx site")?;

    if remote.command_exists("nginx").await? {
        remote
            .sudo_exec("nginx -t && systemctl reload nginx")
            .await
            .context("Failed to reload nginx")?;
    }

    Ok(())
}
