//! `kiln check-config`: validate a `kiln.toml`.

use std::path::Path;

use kiln_config::{load_config, CONFIG_FILE_NAME};

use crate::GlobalArgs;

/// Runs the `kiln check-config` command.
///
/// Returns exit code 0 if the file parses and validates, 1 otherwise.
pub fn run(dir: Option<&str>, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let dir = Path::new(dir.unwrap_or("."));
    let path = dir.join(CONFIG_FILE_NAME);
    match load_config(dir) {
        Ok(config) => {
            if !global.quiet {
                eprintln!("    Checked {}", path.display());
                eprintln!(
                    "     Module `{}`, default domain `{}`, {} denied, {} allowed",
                    config.codegen.name,
                    config.elaborate.default_domain,
                    config.lint.deny.len(),
                    config.lint.allow.len()
                );
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("error: {}: {e}", path.display());
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: None,
        }
    }

    fn check(contents: &str) -> i32 {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), contents).unwrap();
        run(dir.path().to_str(), &quiet()).unwrap()
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(check("[codegen]\nname = \"soc\"\n"), 0);
    }

    #[test]
    fn invalid_config_fails() {
        assert_eq!(check("[lint]\ndeny = \"W301\"\nallow = \"W301\"\n"), 1);
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(run(dir.path().to_str(), &quiet()).unwrap(), 1);
    }
}
