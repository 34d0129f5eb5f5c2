//! `kiln demo`: convert a bundled design to Verilog.
//!
//! The pipeline:
//!
//! 1. Load `kiln.toml` from `--config`, or use the defaults
//! 2. Merge `--allow`/`--deny` into the lint section
//! 3. Build the selected design
//! 4. Convert it with the lowering table for `--target`
//! 5. Render diagnostics and write the Verilog

use std::path::Path;

use kiln_config::{ConfigError, KilnConfig, LintConfig, CONFIG_FILE_NAME};
use kiln_diagnostics::{Diagnostic, DiagnosticRenderer, JsonRenderer, TerminalRenderer};
use kiln_lower::SpecialOverrides;
use kiln_verilog::ConvertOutput;
use tracing::{debug, info};

use crate::{DemoArgs, GlobalArgs, ReportFormat};

/// Runs the `kiln demo` command.
///
/// Returns exit code 0 on success, 1 if conversion failed.
pub fn run(args: &DemoArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = match &global.config {
        Some(dir) => {
            let dir = Path::new(dir);
            debug!(path = %dir.join(CONFIG_FILE_NAME).display(), "loading configuration");
            kiln_config::load_config(dir)?
        }
        None => KilnConfig::default(),
    };
    config.lint = merge_lint_config(&config.lint, args)?;
    if let Some(name) = &args.name {
        config.codegen.name = name.clone();
    } else if global.config.is_none() {
        config.codegen.name = args.design.module_name().to_string();
    }

    let overrides = SpecialOverrides::for_target(&args.target)?;
    let design = args.design.build()?;
    info!(design = ?args.design, target = %args.target, "converting demo");

    match kiln_verilog::convert(design.module, &design.ios, &overrides, &config) {
        Ok(out) => {
            render(&out.diagnostics, args.format, global);
            write_output(&out, args.output.as_deref(), global)?;
            if !global.quiet && args.format == ReportFormat::Text {
                eprintln!(
                    "   Emitted `{}` ({} port(s), {} warning(s), hash {})",
                    out.module_name,
                    out.ports.len(),
                    out.diagnostics.len(),
                    out.hash
                );
            }
            Ok(0)
        }
        Err(e) => {
            render(&[e.to_diagnostic()], args.format, global);
            Ok(1)
        }
    }
}

/// Merges CLI `--allow`/`--deny` flags with the config file's lint section.
///
/// CLI flags take precedence: a code allowed on the command line is removed
/// from the config's deny list, and vice versa. Fails if any merged entry is
/// not a diagnostic code.
fn merge_lint_config(config: &LintConfig, args: &DemoArgs) -> Result<LintConfig, ConfigError> {
    let mut deny: Vec<String> = config
        .deny
        .iter()
        .filter(|c| !args.allow.contains(c))
        .cloned()
        .collect();
    let mut allow: Vec<String> = config
        .allow
        .iter()
        .filter(|c| !args.deny.contains(c))
        .cloned()
        .collect();
    for code in &args.deny {
        if !deny.contains(code) {
            deny.push(code.clone());
        }
    }
    for code in &args.allow {
        if !allow.contains(code) {
            allow.push(code.clone());
        }
    }
    let merged = LintConfig { deny, allow };
    merged.policy()?;
    Ok(merged)
}

fn render(diagnostics: &[Diagnostic], format: ReportFormat, global: &GlobalArgs) {
    if diagnostics.is_empty() {
        return;
    }
    let text = match format {
        ReportFormat::Text => TerminalRenderer::new(global.color).render_all(diagnostics),
        ReportFormat::Json => JsonRenderer.render_all(diagnostics),
    };
    eprint!("{text}");
}

/// Writes the source to `output` (data files beside it), or to stdout.
fn write_output(
    out: &ConvertOutput,
    output: Option<&str>,
    global: &GlobalArgs,
) -> std::io::Result<()> {
    match output {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, &out.source)?;
            for file in &out.data_files {
                std::fs::write(dir.join(&file.name), &file.contents)?;
            }
            if !global.quiet {
                eprintln!("     Wrote {}", path.display());
            }
        }
        None => {
            print!("{}", out.source);
            if !out.data_files.is_empty() && !global.quiet {
                eprintln!(
                    "warning: {} data file(s) not written; pass -o to write them",
                    out.data_files.len()
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::designs::DemoDesign;

    fn args(design: DemoDesign) -> DemoArgs {
        DemoArgs {
            design,
            output: None,
            name: None,
            target: "generic".to_string(),
            format: ReportFormat::Text,
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }

    fn quiet() -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: None,
        }
    }

    #[test]
    fn cli_overrides_config_lists() {
        let config = LintConfig {
            deny: vec!["W300".into()],
            allow: vec!["W304".into()],
        };
        let mut a = args(DemoDesign::Counter);
        a.allow = vec!["W300".into()];
        a.deny = vec!["W304".into()];
        let merged = merge_lint_config(&config, &a).unwrap();
        assert_eq!(merged.deny, vec!["W304"]);
        assert_eq!(merged.allow, vec!["W300"]);
    }

    #[test]
    fn misspelled_cli_code_is_rejected() {
        let mut a = args(DemoDesign::Counter);
        a.deny = vec!["W304".into(), "typo".into()];
        let err = merge_lint_config(&LintConfig::default(), &a).unwrap_err();
        assert!(err.to_string().contains("typo"), "{err}");
        assert!(run(&a, &quiet()).is_err());
    }

    #[test]
    fn writes_verilog_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("counter.v");
        let mut a = args(DemoDesign::Counter);
        a.output = Some(path.to_string_lossy().into_owned());
        assert_eq!(run(&a, &quiet()).unwrap(), 0);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("module counter("));
    }

    #[test]
    fn explicit_name_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.v");
        let mut a = args(DemoDesign::Cdc);
        a.output = Some(path.to_string_lossy().into_owned());
        a.name = Some("sync_top".into());
        assert_eq!(run(&a, &quiet()).unwrap(), 0);
        assert!(std::fs::read_to_string(&path).unwrap().contains("module sync_top("));
    }

    #[test]
    fn denied_warning_fails_conversion() {
        let mut a = args(DemoDesign::Counter);
        a.deny = vec!["W300".into()];
        assert_eq!(run(&a, &quiet()).unwrap(), 1);
    }

    #[test]
    fn native_target_rejects_cdc() {
        let mut a = args(DemoDesign::Cdc);
        a.target = "native".into();
        assert_eq!(run(&a, &quiet()).unwrap(), 1);
    }

    #[test]
    fn unknown_target_is_an_error() {
        let mut a = args(DemoDesign::Counter);
        a.target = "ice40".into();
        assert!(run(&a, &quiet()).is_err());
    }

    #[test]
    fn config_directory_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[codegen]\nname = \"from_config\"\n",
        )
        .unwrap();
        let path = dir.path().join("top.v");
        let mut a = args(DemoDesign::Counter);
        a.output = Some(path.to_string_lossy().into_owned());
        let mut global = quiet();
        global.config = Some(dir.path().to_string_lossy().into_owned());
        assert_eq!(run(&a, &global).unwrap(), 0);
        assert!(std::fs::read_to_string(&path).unwrap().contains("module from_config("));
    }
}
