//! Settings file command

use std::path::Path;

use tapkey::Settings;

pub fn init(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    settings.save(path)?;
    println!("Settings written to {}", path.display());
    Ok(())
}
