//! FileJump FUSE filesystem for Linux
//!
//! Mounts a FileJump cloud-storage account at a local directory. Files are
//! staged locally while open and uploaded when closed.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use filejump_fuse::app_state::mount_context_factory;
use filejump_fuse::config::{Cli, ProjectConfig};
use filejump_fuse::fuse::{mount_filesystem, FileJumpFuse};
use filejump_fuse::log_appender::setup_logging;
use log::{error, info, warn};
use std::path::Path;
use std::process::Command;

fn unmount(mountpoint: &Path) -> bool {
    match Command::new("fusermount").arg("-u").arg(mountpoint).output() {
        Ok(output) if output.status.success() => {
            info!("Filesystem unmounted successfully");
            true
        }
        Ok(output) => {
            error!(
                "fusermount -u failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            error!("Failed to unmount filesystem: {}", e);
            false
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let project_config = ProjectConfig::new().context("Failed to load configuration")?;
    setup_logging(project_config.project_dirs.data_dir(), cli.verbose)
        .context("Failed to setup logging")?;

    info!("Starting FileJump FUSE filesystem");
    info!("Mount point: {}", cli.mountpoint.display());

    // Clear a stale mount ("Transport endpoint is not connected") left by a crash
    let _ = Command::new("fusermount")
        .arg("-u")
        .arg(&cli.mountpoint)
        .output();

    if !cli.mountpoint.exists() {
        return Err(anyhow!(
            "Mount point does not exist: {}",
            cli.mountpoint.display()
        ));
    }
    if !cli.mountpoint.is_dir() {
        return Err(anyhow!(
            "Mount point is not a directory: {}",
            cli.mountpoint.display()
        ));
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let context = runtime.block_on(mount_context_factory(&cli, &project_config))?;

    let operations = context.operations.clone();
    let mountpoint_for_shutdown = cli.mountpoint.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        // Uploads are only cut short once the mount is really gone
        if unmount(&mountpoint_for_shutdown) {
            operations.cancel_uploads();
        } else {
            warn!("Mount is still active; keep serving");
        }
    })
    .context("Error setting Ctrl-C handler")?;

    let fs = FileJumpFuse::new(context.operations.clone(), runtime.handle().clone());
    info!("FUSE filesystem mounting. Press Ctrl+C to unmount.");
    mount_filesystem(fs, &cli.mountpoint)?;

    info!("FileJump filesystem stopped");
    Ok(())
}
