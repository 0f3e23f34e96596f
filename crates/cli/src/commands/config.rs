//! `sift config show` / `sift config init`.

use anyhow::{Context, Result};
use sift_core::Config;
use std::path::Path;

pub fn cmd_config_show(config: &Config) -> Result<()> {
  println!("{}", config.generate_template().context("rendering config")?);
  Ok(())
}

pub fn cmd_config_init(project_root: &Path, force: bool) -> Result<()> {
  let path = Config::project_config_path(project_root);
  if path.exists() && !force {
    anyhow::bail!("{} already exists, pass --force to overwrite", path.display());
  }

  let mut config = Config::default();
  config.workspace.root = project_root.to_path_buf();
  config.save_to(&path).context("writing config template")?;
  println!("wrote {}", path.display());
  Ok(())
}
