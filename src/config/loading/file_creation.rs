use std::{fs, path::Path};

use crate::{CastlinkError, Result};

const DEFAULT_CONFIG: &str = "\
# castlink configuration file
#
# Every setting is optional. Run `castlink config` to print the effective
# configuration and `castlink schema` for the full schema.

[general]
# log_level = \"info\"

[p2p]
# connect_timeout = 100
# dedicated_interface = \"p2p0\"

[display]
# capabilities = [\"source\"]
";

/// Creates a default configuration file if it doesn't exist
pub fn create_default_config_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CastlinkError::ConfigValidation {
            component: "config directory".to_string(),
            details: format!("Failed to create {}: {e}", parent.display()),
        })?;
    }

    fs::write(path, DEFAULT_CONFIG).map_err(|e| CastlinkError::io_at(e, path))?;

    Ok(())
}
