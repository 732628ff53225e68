//! One-shot subcommands: `scenarios` and `check-config`.

use std::path::Path;
use std::process;
use std::sync::Arc;

use parley_engine::{EngineError, PartyConfig, SandboxConfig, Standard};
use parley_sample::{SampleStandard, PUBLISHER, SUBSCRIBER};

use crate::keys::RejectAllVerifier;
use crate::{report_error, OutputFormat};

/// Sandbox settings used when no configuration file is given: one party per
/// sample role, named after the role.
pub(crate) fn default_config() -> SandboxConfig {
    SandboxConfig {
        parties: [PUBLISHER, SUBSCRIBER]
            .into_iter()
            .map(|role| PartyConfig {
                name: role.to_lowercase(),
                role: role.to_string(),
                notification_url: None,
            })
            .collect(),
        ..SandboxConfig::default()
    }
}

/// Load `path`, or the defaults, and check it can drive the sample standard.
pub(crate) fn load_config(
    path: Option<&Path>,
    standard: &SampleStandard,
) -> Result<SandboxConfig, EngineError> {
    let config = match path {
        Some(path) => SandboxConfig::load(path)?,
        None => default_config().with_env_overrides()?,
    };
    config.validate()?;
    standard.build_scenarios(&config.build_context(standard))?;
    Ok(config)
}

fn sample_standard(output: OutputFormat, quiet: bool) -> SampleStandard {
    match SampleStandard::new(Arc::new(RejectAllVerifier)) {
        Ok(standard) => standard,
        Err(e) => {
            report_error(
                &format!("internal error: failed to build the sample standard: {}", e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

pub(crate) fn cmd_scenarios(output: OutputFormat, quiet: bool) {
    let standard = sample_standard(output, quiet);
    let modules: Vec<(String, Vec<String>)> = standard
        .suite()
        .modules()
        .map(|(name, root)| {
            let titles = root
                .label_paths()
                .into_iter()
                .map(|path| path.join(" - "))
                .collect();
            (name.to_string(), titles)
        })
        .collect();

    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "standard": standard.name(),
                "version": standard.version(),
                "roles": standard.role_names(),
                "modules": modules
                    .iter()
                    .map(|(name, scenarios)| serde_json::json!({
                        "name": name,
                        "scenarios": scenarios,
                    }))
                    .collect::<Vec<_>>(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json)
                    .unwrap_or_else(|e| format!("serialization error: {}", e))
            );
        }
        OutputFormat::Text => {
            println!("{}", standard.report_title());
            for (name, scenarios) in &modules {
                println!("  {}", name);
                for title in scenarios {
                    println!("    {}", title);
                }
            }
        }
    }
}

pub(crate) fn cmd_check_config(file: &Path, output: OutputFormat, quiet: bool) {
    let standard = sample_standard(output, quiet);
    let config = match load_config(Some(file), &standard) {
        Ok(config) => config,
        Err(e) => {
            report_error(
                &format!("invalid configuration '{}': {}", file.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };

    let rendered = match output {
        OutputFormat::Json => serde_json::to_string_pretty(&config).map_err(EngineError::from),
        OutputFormat::Text => config.to_toml_string(),
    };
    match rendered {
        Ok(rendered) => println!("{}", rendered.trim_end()),
        Err(e) => {
            report_error(&format!("serialization error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}
