//! Subcommand implementations over the tool manager.

// Command output goes straight to stdout by design.
#![allow(clippy::print_stdout)]

use tokio_util::sync::CancellationToken;

use dotkit_toolchain::{InstallOptions, Tool, ToolManager};

use crate::cli::CliError;

/// Install one tool, or both in fixed order.
pub async fn install(
    manager: &ToolManager,
    tool: Option<Tool>,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let options = InstallOptions::default();
    match tool {
        Some(tool) => manager.install(tool, options, cancel).await?,
        None => manager.install_all(options, cancel).await?,
    }
    Ok(())
}

/// Print per-tool install state.
pub fn status(manager: &ToolManager) -> Result<(), CliError> {
    for tool in Tool::ALL {
        if manager.is_installed(tool) {
            println!(
                "{tool}\t{}\t{}",
                tool.version(),
                manager.binary_path(tool).display()
            );
        } else {
            println!("{tool}\t(not installed)\tpinned {}", tool.version());
        }
    }
    Ok(())
}

/// Print the managed binary path of an installed tool.
pub fn which(manager: &ToolManager, tool: Tool) -> Result<(), CliError> {
    // installed_version is the installed-state check; the path is only
    // meaningful if it passes.
    manager.installed_version(tool)?;
    println!("{}", manager.binary_path(tool).display());
    Ok(())
}

/// (Re)write the embedded verification keyrings.
pub fn keyrings(manager: &ToolManager) -> Result<(), CliError> {
    manager.ensure_keyrings()?;
    println!(
        "keyrings written to {}",
        manager.root().keyrings_dir().display()
    );
    Ok(())
}
