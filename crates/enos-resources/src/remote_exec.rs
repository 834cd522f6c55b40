//! `enos_remote_exec`: run commands and scripts on the target

use std::sync::Arc;

use async_trait::async_trait;
use enos_core::{Attribute, CoreError, Resource, Schema, State};
use enos_exec::{CopyRequest, ExecRequest, Transport, shell_quote};
use enos_transport::TransportConfig;
use enos_wire::{
    AttributePath, DecodeError, ObjectReader, ObjectWriter, TfString, TfStringList, Value,
    WireObject, WireType,
};
use tracing::{debug, info};

use crate::error::ResourceError;
use crate::remote::{run_checked, sha256_hex};

/// State of an `enos_remote_exec`
#[derive(Clone, Default, PartialEq)]
pub struct RemoteExecState {
    pub id: TfString,
    pub transport: TransportConfig,
    /// Commands run one after another
    pub inline: TfStringList,
    /// Script uploaded and executed after `inline`
    pub content: TfString,
    pub stdout: TfString,
    pub stderr: TfString,
}

const ATTRIBUTES: &[&str] = &["id", "transport", "inline", "content", "stdout", "stderr"];

impl WireObject for RemoteExecState {
    fn wire_type(&self) -> WireType {
        WireType::object([
            ("id", WireType::String),
            ("transport", self.transport.wire_type()),
            ("inline", WireType::string_list()),
            ("content", WireType::String),
            ("stdout", WireType::String),
            ("stderr", WireType::String),
        ])
    }

    fn encode(&self) -> Value {
        ObjectWriter::new()
            .attr("id", &self.id)
            .object("transport", &self.transport)
            .attr("inline", &self.inline)
            .attr("content", &self.content)
            .attr("stdout", &self.stdout)
            .attr("stderr", &self.stderr)
            .finish()
    }

    fn decode(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        let reader = ObjectReader::new(value, path)?;
        reader.reject_unknown_keys(ATTRIBUTES)?;
        Ok(Self {
            id: reader.attr("id")?,
            transport: reader.object("transport")?,
            inline: reader.attr("inline")?,
            content: reader.attr("content")?,
            stdout: reader.attr("stdout")?,
            stderr: reader.attr("stderr")?,
        })
    }
}

impl State for RemoteExecState {
    fn id(&self) -> &TfString {
        &self.id
    }

    fn id_mut(&mut self) -> &mut TfString {
        &mut self.id
    }

    fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    fn mark_outputs_unknown(&mut self) {
        self.stdout.set_unknown();
        self.stderr.set_unknown();
    }

    fn carry_outputs(&mut self, prior: &Self) {
        self.stdout = prior.stdout.clone();
        self.stderr = prior.stderr.clone();
    }
}

impl RemoteExecState {
    /// Identity derived from the commands and script
    fn fingerprint(&self) -> String {
        let inline = self.inline.get().cloned().unwrap_or_default();
        let content = self.content.get().cloned().unwrap_or_default();
        sha256_hex(inline.iter().map(String::as_str).chain([content.as_str()]))
    }
}

/// Runs inline commands and an optional script
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteExec;

impl RemoteExec {
    async fn execute(
        &self,
        client: &dyn Transport,
        state: &mut RemoteExecState,
    ) -> Result<(), ResourceError> {
        let mut stdout = String::new();
        let mut stderr = String::new();

        for command in state.inline.get().into_iter().flatten() {
            debug!(command = %command, "running inline command");
            let result = run_checked(client, "run inline command", ExecRequest::new(command)).await?;
            stdout.push_str(&result.stdout);
            stderr.push_str(&result.stderr);
        }

        let fingerprint = state.fingerprint();

        if let Some(content) = state.content.get() {
            let script = format!("/tmp/enos_remote_exec_{}.sh", &fingerprint[..16]);
            client
                .copy(CopyRequest::new(content.as_bytes(), script.as_str()).with_chmod("0755"))
                .await?;

            let quoted = shell_quote(&script);
            let result = run_checked(
                client,
                "run script",
                ExecRequest::new(format!("{quoted}; status=$?; rm -f {quoted}; exit $status")),
            )
            .await?;
            stdout.push_str(&result.stdout);
            stderr.push_str(&result.stderr);
        }

        state.id.set(fingerprint);
        state.stdout.set(stdout);
        state.stderr.set(stderr);
        Ok(())
    }
}

#[async_trait]
impl Resource for RemoteExec {
    type State = RemoteExecState;

    fn type_name(&self) -> &'static str {
        "enos_remote_exec"
    }

    fn schema(&self) -> Schema {
        Schema::new(1)
            .attribute(Attribute::optional("transport", WireType::Dynamic))
            .attribute(
                Attribute::optional("inline", WireType::string_list())
                    .describe("Commands to run in order"),
            )
            .attribute(
                Attribute::optional("content", WireType::String)
                    .sensitive()
                    .describe("Script to upload and execute"),
            )
            .attribute(Attribute::computed("stdout", WireType::String))
            .attribute(Attribute::computed("stderr", WireType::String))
    }

    fn validate(&self, state: &RemoteExecState) -> Result<(), CoreError> {
        if state.inline.is_null() && state.content.is_null() {
            return Err(CoreError::validation(
                AttributePath::new("inline"),
                "missing command",
                "one of inline or content must be set",
            ));
        }

        if let Some(commands) = state.inline.get() {
            for (i, command) in commands.iter().enumerate() {
                if command.trim().is_empty() {
                    return Err(CoreError::validation(
                        AttributePath::new("inline").index(i),
                        "empty command",
                        "inline commands must not be empty",
                    ));
                }
            }
        }

        Ok(())
    }

    fn needs_action(&self, prior: &RemoteExecState, planned: &RemoteExecState) -> bool {
        prior.inline != planned.inline || prior.content != planned.content
    }

    async fn apply(
        &self,
        client: Arc<dyn Transport>,
        state: &mut RemoteExecState,
    ) -> Result<(), CoreError> {
        info!(
            commands = state.inline.get().map_or(0, Vec::len),
            script = state.content.is_known(),
            "executing"
        );
        self.execute(client.as_ref(), state).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(inline: &[&str], content: Option<&str>) -> RemoteExecState {
        RemoteExecState {
            inline: TfStringList::known(inline.iter().map(|s| (*s).to_string()).collect::<Vec<_>>()),
            content: content.map_or(TfString::Null, |c| TfString::known(c)),
            ..RemoteExecState::default()
        }
    }

    #[test]
    fn test_validate() {
        assert!(RemoteExec.validate(&state(&["uptime"], None)).is_ok());
        assert!(RemoteExec.validate(&RemoteExecState {
            content: TfString::known("echo hi"),
            ..RemoteExecState::default()
        })
        .is_ok());

        let err = RemoteExec.validate(&RemoteExecState::default()).unwrap_err();
        assert_eq!(err.path(), Some(&AttributePath::new("inline")));

        let err = RemoteExec.validate(&state(&["uptime", " "], None)).unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "inline[1]");
    }

    #[test]
    fn test_needs_action_ignores_outputs() {
        let prior = RemoteExecState {
            stdout: TfString::known("old"),
            ..state(&["uptime"], None)
        };
        assert!(!RemoteExec.needs_action(&prior, &state(&["uptime"], None)));
        assert!(RemoteExec.needs_action(&prior, &state(&["uptime", "id"], None)));
        assert!(RemoteExec.needs_action(&prior, &state(&["uptime"], Some("echo"))));
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        let a = state(&["uptime"], None).fingerprint();
        assert_eq!(a, state(&["uptime"], None).fingerprint());
        assert_ne!(a, state(&["uptime"], Some("echo hi")).fingerprint());
        assert_ne!(a, state(&["upti", "me"], None).fingerprint());
    }

    #[test]
    fn test_unknown_list_element_decodes_unknown() {
        let value = Value::object([(
            "inline",
            Value::List(vec![Value::from("uptime"), Value::Unknown]),
        )]);
        let state = RemoteExecState::decode(&value, &AttributePath::root()).unwrap();
        assert!(state.inline.is_unknown());
    }
}
