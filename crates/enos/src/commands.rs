//! One lifecycle phase per invocation
//!
//! Inputs are wire values in their JSON form, read from files (`-` for
//! stdin). Every phase prints a JSON document with a `diagnostics` array.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use enos_core::{CancellationToken, CoreError, Diagnostic, Registry, has_errors};
use enos_wire::Value;
use eyre::WrapErr;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the schema of every registered resource type, or of one
    Schema {
        /// Resource type name
        resource: Option<String>,
    },
    /// Check a resource configuration without side effects
    Validate {
        resource: String,
        /// Configuration file
        file: PathBuf,
    },
    /// Compute the planned state and replacement paths
    Plan {
        resource: String,
        /// Proposed state file
        proposed: PathBuf,
        /// Prior state file; omitted for a create
        #[arg(long)]
        prior: Option<PathBuf>,
    },
    /// Apply a planned state
    Apply {
        resource: String,
        /// Planned state file; omitted to destroy
        #[arg(long)]
        planned: Option<PathBuf>,
        /// Prior state file; omitted for a create
        #[arg(long)]
        prior: Option<PathBuf>,
    },
    /// Refresh current state
    Read {
        resource: String,
        /// Current state file
        state: PathBuf,
    },
    /// Re-encode stored state for the current schema
    Upgrade {
        resource: String,
        /// Schema version the state was stored under
        #[arg(long)]
        version: i64,
        /// Stored state file
        state: PathBuf,
    },
    /// Produce state for an existing object
    Import { resource: String, id: String },
}

/// Printed result of a phase
#[derive(Debug)]
pub struct Outcome {
    pub body: serde_json::Value,
    pub failed: bool,
}

impl Outcome {
    fn success(mut body: serde_json::Value, diagnostics: &[Diagnostic]) -> eyre::Result<Self> {
        body["diagnostics"] = serde_json::to_value(diagnostics)?;
        Ok(Self {
            body,
            failed: has_errors(diagnostics),
        })
    }

    fn failure(error: &CoreError) -> eyre::Result<Self> {
        Self::success(json!({}), &[error.to_diagnostic()])
    }
}

/// Read a wire value from `path`, or stdin when `path` is `-`
fn read_value(path: &Path) -> eyre::Result<Value> {
    let mut payload = Vec::new();
    if path == Path::new("-") {
        std::io::stdin()
            .read_to_end(&mut payload)
            .wrap_err("failed to read stdin")?;
    } else {
        payload = std::fs::read(path).wrap_err_with(|| format!("failed to read {}", path.display()))?;
    }
    Value::parse_json(&payload).wrap_err_with(|| format!("invalid JSON in {}", path.display()))
}

fn read_optional(path: Option<&PathBuf>) -> eyre::Result<Value> {
    path.map_or(Ok(Value::Null), |p| read_value(p))
}

/// Run `command` against `registry`
///
/// Phase failures are reported as diagnostics in the outcome; only problems
/// with the inputs themselves are errors.
///
/// # Errors
/// Returns error if an input file cannot be read or parsed
pub async fn execute(
    registry: &Registry,
    command: &Command,
    cancel: &CancellationToken,
) -> eyre::Result<Outcome> {
    debug!(?command, "executing");
    match command {
        Command::Schema { resource } => {
            let mut infos = registry.describe();
            if let Some(name) = resource {
                infos.retain(|info| info.type_name == name.as_str());
                if infos.is_empty() {
                    return Outcome::failure(&CoreError::UnknownResource(name.clone()));
                }
            }
            Outcome::success(json!({ "resources": infos }), &[])
        }
        Command::Validate { resource, file } => {
            let config = read_value(file)?;
            let handler = match registry.get(resource) {
                Ok(handler) => handler,
                Err(e) => return Outcome::failure(&e),
            };
            let diagnostics = handler.validate_config(&config, cancel).await;
            Outcome::success(json!({}), &diagnostics)
        }
        Command::Plan {
            resource,
            proposed,
            prior,
        } => {
            let prior = read_optional(prior.as_ref())?;
            let proposed = read_value(proposed)?;
            let result = match registry.get(resource) {
                Ok(handler) => handler.plan(&prior, &proposed, cancel).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(plan) => {
                    let paths: Vec<String> =
                        plan.requires_replace.iter().map(ToString::to_string).collect();
                    Outcome::success(
                        json!({ "planned": plan.planned.to_json(), "requires_replace": paths }),
                        &[],
                    )
                }
                Err(e) => Outcome::failure(&e),
            }
        }
        Command::Apply {
            resource,
            planned,
            prior,
        } => {
            let prior = read_optional(prior.as_ref())?;
            let planned = read_optional(planned.as_ref())?;
            let result = match registry.get(resource) {
                Ok(handler) => handler.apply(&prior, &planned, cancel).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(applied) => Outcome::success(
                    json!({ "new_state": applied.new_state.to_json(), "applied": applied.applied }),
                    &[],
                ),
                Err(e) => Outcome::failure(&e),
            }
        }
        Command::Read { resource, state } => {
            let current = read_value(state)?;
            let result = match registry.get(resource) {
                Ok(handler) => handler.read(&current, cancel).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(read) => {
                    Outcome::success(json!({ "state": read.state.to_json() }), &read.diagnostics)
                }
                Err(e) => Outcome::failure(&e),
            }
        }
        Command::Upgrade {
            resource,
            version,
            state,
        } => {
            let raw = read_value(state)?;
            let result = match registry.get(resource) {
                Ok(handler) => handler.upgrade_state(*version, &raw, cancel).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(upgraded) => Outcome::success(json!({ "state": upgraded.to_json() }), &[]),
                Err(e) => Outcome::failure(&e),
            }
        }
        Command::Import { resource, id } => {
            let result = match registry.get(resource) {
                Ok(handler) => handler.import_state(id, cancel).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(state) => Outcome::success(json!({ "state": state.to_json() }), &[]),
                Err(e) => Outcome::failure(&e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const KEY: &str = include_str!("../../enos-exec/testdata/id_ed25519");

    fn registry() -> Registry {
        let mut registry = Registry::default();
        enos_resources::register_all(&mut registry);
        registry
    }

    fn write(json: &serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.to_string().as_bytes()).unwrap();
        file
    }

    async fn run(command: Command) -> Outcome {
        execute(&registry(), &command, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_schema_lists_resources() {
        let outcome = run(Command::Schema { resource: None }).await;
        assert!(!outcome.failed);
        assert_eq!(outcome.body["resources"].as_array().unwrap().len(), 4);

        let outcome = run(Command::Schema {
            resource: Some("enos_nope".to_string()),
        })
        .await;
        assert!(outcome.failed);
        assert_eq!(outcome.body["diagnostics"][0]["severity"], "error");
    }

    #[tokio::test]
    async fn test_validate_reports_unsupported_argument() {
        let file = write(&json!({ "destination": "/etc/motd", "content": "hi", "mode": "0644" }));
        let outcome = run(Command::Validate {
            resource: "enos_file".to_string(),
            file: file.path().to_path_buf(),
        })
        .await;
        assert!(outcome.failed);
        assert_eq!(outcome.body["diagnostics"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_plan_create() {
        let proposed = write(&json!({
            "transport": { "ssh": { "host": "10.0.0.5", "user": "ubuntu", "private_key": KEY } },
            "inline": ["uptime"],
        }));
        let outcome = run(Command::Plan {
            resource: "enos_remote_exec".to_string(),
            proposed: proposed.path().to_path_buf(),
            prior: None,
        })
        .await;

        assert!(!outcome.failed, "{}", outcome.body);
        assert_eq!(
            outcome.body["planned"]["stdout"],
            enos_wire::UNKNOWN_SENTINEL
        );
        assert_eq!(outcome.body["requires_replace"], json!([]));
    }

    #[tokio::test]
    async fn test_plan_missing_key_is_diagnostic() {
        let proposed = write(&json!({
            "transport": { "ssh": { "host": "10.0.0.5", "user": "ubuntu" } },
            "inline": ["uptime"],
        }));
        let outcome = run(Command::Plan {
            resource: "enos_remote_exec".to_string(),
            proposed: proposed.path().to_path_buf(),
            prior: None,
        })
        .await;

        assert!(outcome.failed);
        assert_eq!(outcome.body["diagnostics"][0]["summary"], "missing key");
    }

    #[tokio::test]
    async fn test_destroy_returns_null_state() {
        let prior = write(&json!({ "id": "static", "destination": "/etc/motd", "content": "hi" }));
        let outcome = run(Command::Apply {
            resource: "enos_file".to_string(),
            planned: None,
            prior: Some(prior.path().to_path_buf()),
        })
        .await;
        assert!(!outcome.failed);
        assert!(outcome.body["new_state"].is_null());
    }

    #[tokio::test]
    async fn test_import_and_upgrade() {
        let outcome = run(Command::Import {
            resource: "enos_host_info".to_string(),
            id: "static".to_string(),
        })
        .await;
        assert_eq!(outcome.body["state"]["id"], "static");
        assert!(outcome.body["state"]["arch"].is_null());

        let stored = write(&outcome.body["state"]);
        let outcome = run(Command::Upgrade {
            resource: "enos_host_info".to_string(),
            version: 0,
            state: stored.path().to_path_buf(),
        })
        .await;
        assert!(outcome.failed);
    }

    #[tokio::test]
    async fn test_malformed_input_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        let result = execute(
            &registry(),
            &Command::Read {
                resource: "enos_host_info".to_string(),
                state: file.path().to_path_buf(),
            },
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }
}
