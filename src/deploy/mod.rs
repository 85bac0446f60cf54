pub mod context;
pub mod steps;

use anyhow::Result;

use crate::output;

use context::DeployContext;

/// Run every stage in order. The first failure aborts the run; nothing is
/// rolled back.
pub async fn run(ctx: &DeployContext) -> Result<()> {
    output::header(&format!(
        "Deploying {} ({}) to {}",
        ctx.params.repository, ctx.params.branch, ctx.params.conn.host
    ));

    // Step 1: Clone or update the repository locally
    let (checkout, kind) = steps::sync_repository(ctx)?;

    // Step 2: Connect with a bounded timeout and round-trip a command
    let session = steps::verify_connectivity(ctx).await?;
    let target = steps::inspect_target(&session, ctx).await?;

    // Step 3: Docker, nginx, curl
    steps::install_dependencies(&session, ctx, &target).await?;

    // Step 4: Replace the application directory with the checkout
    steps::transfer_files(&session, ctx, &target, &checkout).await?;

    // Step 5: Build the image and (re)start the container
    steps::build_and_run(&session, ctx, &target, &kind).await?;

    // Step 6: Point nginx at the application port
    steps::configure_proxy(&session, ctx, &target).await?;

    // Step 7: Container running and reachable through nginx
    steps::validate(&session, ctx, &kind).await?;

    session.close().await?;

    println!();
    steps::summary(ctx);
    Ok(())
}
