//! `enos_file`: place a file on the target

use std::sync::Arc;

use async_trait::async_trait;
use enos_core::{Attribute, CoreError, Resource, Schema, State};
use enos_exec::{CopyRequest, Transport};
use enos_transport::TransportConfig;
use enos_wire::{
    AttributePath, DecodeError, ObjectReader, ObjectWriter, TfString, Value, WireObject, WireType,
};
use tracing::info;

use crate::remote::sha256_hex;

/// State of an `enos_file`
#[derive(Clone, Default, PartialEq)]
pub struct FileState {
    pub id: TfString,
    pub transport: TransportConfig,
    /// Absolute path on the target
    pub destination: TfString,
    pub content: TfString,
    /// Mode, e.g. `0644`
    pub chmod: TfString,
    /// Owner, e.g. `vault:vault`
    pub chown: TfString,
    /// SHA-256 of `content`
    pub sum: TfString,
}

impl WireObject for FileState {
    fn wire_type(&self) -> WireType {
        WireType::object([
            ("id", WireType::String),
            ("transport", self.transport.wire_type()),
            ("destination", WireType::String),
            ("content", WireType::String),
            ("chmod", WireType::String),
            ("chown", WireType::String),
            ("sum", WireType::String),
        ])
    }

    fn encode(&self) -> Value {
        ObjectWriter::new()
            .attr("id", &self.id)
            .object("transport", &self.transport)
            .attr("destination", &self.destination)
            .attr("content", &self.content)
            .attr("chmod", &self.chmod)
            .attr("chown", &self.chown)
            .attr("sum", &self.sum)
            .finish()
    }

    fn decode(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        let reader = ObjectReader::new(value, path)?;
        reader.reject_unknown_keys(&[
            "id",
            "transport",
            "destination",
            "content",
            "chmod",
            "chown",
            "sum",
        ])?;
        Ok(Self {
            id: reader.attr("id")?,
            transport: reader.object("transport")?,
            destination: reader.attr("destination")?,
            content: reader.attr("content")?,
            chmod: reader.attr("chmod")?,
            chown: reader.attr("chown")?,
            sum: reader.attr("sum")?,
        })
    }
}

impl State for FileState {
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
        self.sum.set_unknown();
    }

    fn carry_outputs(&mut self, prior: &Self) {
        self.sum = prior.sum.clone();
    }
}

/// Copies content to a path on the target
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteFile;

#[async_trait]
impl Resource for RemoteFile {
    type State = FileState;

    fn type_name(&self) -> &'static str {
        "enos_file"
    }

    fn schema(&self) -> Schema {
        Schema::new(1)
            .attribute(Attribute::optional("transport", WireType::Dynamic))
            .attribute(Attribute::required("destination", WireType::String))
            .attribute(Attribute::required("content", WireType::String).sensitive())
            .attribute(Attribute::optional("chmod", WireType::String))
            .attribute(Attribute::optional("chown", WireType::String))
            .attribute(
                Attribute::computed("sum", WireType::String).describe("SHA-256 of the content"),
            )
    }

    fn validate(&self, state: &FileState) -> Result<(), CoreError> {
        if let Some(destination) = state.destination.get()
            && !destination.starts_with('/')
        {
            return Err(CoreError::validation(
                AttributePath::new("destination"),
                "relative destination",
                format!("destination {destination:?} must be an absolute path"),
            ));
        }

        if let Some(mode) = state.chmod.get()
            && (mode.is_empty() || !mode.chars().all(|c| c.is_digit(8)))
        {
            return Err(CoreError::validation(
                AttributePath::new("chmod"),
                "invalid mode",
                format!("chmod {mode:?} must be an octal mode such as 0644"),
            ));
        }

        Ok(())
    }

    fn needs_action(&self, prior: &FileState, planned: &FileState) -> bool {
        prior.destination != planned.destination
            || prior.content != planned.content
            || prior.chmod != planned.chmod
            || prior.chown != planned.chown
    }

    async fn apply(&self, client: Arc<dyn Transport>, state: &mut FileState) -> Result<(), CoreError> {
        let destination = state.destination.get().cloned().unwrap_or_default();
        let content = state.content.get().cloned().unwrap_or_default();

        let mut request = CopyRequest::new(content.as_bytes(), destination.as_str());
        if let Some(mode) = state.chmod.get() {
            request = request.with_chmod(mode.as_str());
        }
        if let Some(owner) = state.chown.get() {
            request = request.with_chown(owner.as_str());
        }

        info!(destination = %destination, "copying file");
        client.copy(request).await?;

        state.sum.set(sha256_hex([content.as_bytes()]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> FileState {
        FileState {
            destination: TfString::known("/etc/vault.d/vault.hcl"),
            content: TfString::known("ui = true"),
            chmod: TfString::known("0640"),
            ..FileState::default()
        }
    }

    #[test]
    fn test_validate() {
        assert!(RemoteFile.validate(&state()).is_ok());

        let relative = FileState {
            destination: TfString::known("vault.hcl"),
            ..state()
        };
        assert_eq!(
            RemoteFile.validate(&relative).unwrap_err().path(),
            Some(&AttributePath::new("destination"))
        );

        let bad_mode = FileState {
            chmod: TfString::known("rw-r--r--"),
            ..state()
        };
        assert_eq!(
            RemoteFile.validate(&bad_mode).unwrap_err().path(),
            Some(&AttributePath::new("chmod"))
        );
    }

    #[test]
    fn test_needs_action() {
        let prior = FileState {
            sum: TfString::known("abc"),
            ..state()
        };
        assert!(!RemoteFile.needs_action(&prior, &state()));

        let chowned = FileState {
            chown: TfString::known("vault"),
            ..state()
        };
        assert!(RemoteFile.needs_action(&prior, &chowned));
    }
}
