use std::path::Path;

use anyhow::{Result, bail};

/// The output directory must already exist; it is never created.
pub(crate) fn ensure_output_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        bail!("directory {} does not exist", dir.display());
    }
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    Ok(())
}
