use std::path::Path;

use anyhow::Result;
use clap::Args;

use tether_core::config::{self, SyncConfig};
use tether_core::store;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config with the defaults.
    #[arg(long)]
    pub force: bool,
}

/// Execute `tether init`. Creates the project skeleton:
///
/// ```text
/// .tether/
///   config.toml    (default sync config template)
///   sync.db        (empty snapshot cache and command queue)
/// ```
///
/// # Errors
///
/// Returns an error if `.tether/config.toml` already exists and `--force`
/// is not set, or if the store cannot be created.
pub fn run_init(args: &InitArgs, project_root: &Path) -> Result<()> {
    let config_path = config::config_path(project_root);
    if config_path.exists() && !args.force {
        anyhow::bail!(
            ".tether/config.toml already exists. Use `tether init --force` to overwrite."
        );
    }

    let config = SyncConfig::default();
    config::save(project_root, &config)?;
    store::open(&config::store_path(project_root))?;

    println!("Initialized {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit .tether/config.toml: set user/orgs and mirror_database.");
    println!(
        "  2. Export API tokens: {} and {}.",
        config.tracker_token_env, config.mirror_token_env
    );
    println!("  3. Run `tether import` to seed the mirror, then `tether run`.");
    Ok(())
}
