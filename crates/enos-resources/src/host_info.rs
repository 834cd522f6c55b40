//! `enos_host_info`: facts about the target host

use std::sync::Arc;

use async_trait::async_trait;
use enos_core::{Attribute, CoreError, Resource, Schema, State};
use enos_exec::{ExecRequest, Transport};
use enos_transport::TransportConfig;
use enos_wire::{
    AttributePath, DecodeError, ObjectReader, ObjectWriter, TfString, Value, WireObject, WireType,
};
use tracing::debug;

use crate::error::ResourceError;
use crate::remote::run_checked;

const GATHER: &str =
    r#"uname -m; hostname; (. /etc/os-release && echo "$ID" && echo "$VERSION_ID")"#;

/// Facts reported by the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    pub arch: String,
    pub hostname: String,
    pub distro: String,
    pub distro_version: String,
}

impl HostFacts {
    /// Parse the output of the gather command
    ///
    /// `VERSION_ID` is absent on rolling releases, so the last line may be
    /// missing or empty.
    ///
    /// # Errors
    /// Returns `ResourceError::ParseError` if fewer than three lines came back
    pub fn parse(output: &str) -> Result<Self, ResourceError> {
        let mut lines = output.lines().map(str::trim);
        let mut next = |what: &str| {
            lines
                .next()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ResourceError::ParseError(format!("missing {what} in {output:?}")))
        };

        let arch = next("architecture")?;
        let hostname = next("hostname")?;
        let distro = next("distribution")?;
        let distro_version = next("version").unwrap_or_default();

        Ok(Self {
            arch,
            hostname,
            distro,
            distro_version,
        })
    }
}

/// State of an `enos_host_info`
#[derive(Clone, Default, PartialEq)]
pub struct HostInfoState {
    pub id: TfString,
    pub transport: TransportConfig,
    pub arch: TfString,
    pub distro: TfString,
    pub distro_version: TfString,
    pub hostname: TfString,
}

impl HostInfoState {
    fn set_facts(&mut self, facts: HostFacts) {
        self.arch.set(facts.arch);
        self.distro.set(facts.distro);
        self.distro_version.set(facts.distro_version);
        self.hostname.set(facts.hostname);
    }
}

impl WireObject for HostInfoState {
    fn wire_type(&self) -> WireType {
        WireType::object([
            ("id", WireType::String),
            ("transport", self.transport.wire_type()),
            ("arch", WireType::String),
            ("distro", WireType::String),
            ("distro_version", WireType::String),
            ("hostname", WireType::String),
        ])
    }

    fn encode(&self) -> Value {
        ObjectWriter::new()
            .attr("id", &self.id)
            .object("transport", &self.transport)
            .attr("arch", &self.arch)
            .attr("distro", &self.distro)
            .attr("distro_version", &self.distro_version)
            .attr("hostname", &self.hostname)
            .finish()
    }

    fn decode(value: &Value, path: &AttributePath) -> Result<Self, DecodeError> {
        let reader = ObjectReader::new(value, path)?;
        reader.reject_unknown_keys(&[
            "id",
            "transport",
            "arch",
            "distro",
            "distro_version",
            "hostname",
        ])?;
        Ok(Self {
            id: reader.attr("id")?,
            transport: reader.object("transport")?,
            arch: reader.attr("arch")?,
            distro: reader.attr("distro")?,
            distro_version: reader.attr("distro_version")?,
            hostname: reader.attr("hostname")?,
        })
    }
}

impl State for HostInfoState {
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
        self.arch.set_unknown();
        self.distro.set_unknown();
        self.distro_version.set_unknown();
        self.hostname.set_unknown();
    }

    fn carry_outputs(&mut self, prior: &Self) {
        self.arch = prior.arch.clone();
        self.distro = prior.distro.clone();
        self.distro_version = prior.distro_version.clone();
        self.hostname = prior.hostname.clone();
    }
}

/// Reads architecture, distribution and hostname
#[derive(Debug, Clone, Copy, Default)]
pub struct HostInfo;

impl HostInfo {
    async fn gather(&self, client: &dyn Transport) -> Result<HostFacts, ResourceError> {
        let result = run_checked(client, "gather host facts", ExecRequest::new(GATHER)).await?;
        let facts = HostFacts::parse(&result.stdout)?;
        debug!(arch = %facts.arch, distro = %facts.distro, "gathered host facts");
        Ok(facts)
    }
}

#[async_trait]
impl Resource for HostInfo {
    type State = HostInfoState;

    fn type_name(&self) -> &'static str {
        "enos_host_info"
    }

    fn schema(&self) -> Schema {
        Schema::new(1)
            .attribute(Attribute::optional("transport", WireType::Dynamic))
            .attribute(Attribute::computed("arch", WireType::String))
            .attribute(Attribute::computed("distro", WireType::String))
            .attribute(Attribute::computed("distro_version", WireType::String))
            .attribute(Attribute::computed("hostname", WireType::String))
    }

    // Facts change out from under us; Read picks them up instead.
    fn needs_action(&self, _prior: &HostInfoState, _planned: &HostInfoState) -> bool {
        false
    }

    async fn apply(
        &self,
        client: Arc<dyn Transport>,
        state: &mut HostInfoState,
    ) -> Result<(), CoreError> {
        let facts = self.gather(client.as_ref()).await?;
        state.set_facts(facts);
        Ok(())
    }

    fn refreshes(&self) -> bool {
        true
    }

    async fn refresh(
        &self,
        client: Arc<dyn Transport>,
        state: &mut HostInfoState,
    ) -> Result<(), CoreError> {
        let facts = self.gather(client.as_ref()).await?;
        state.set_facts(facts);
        Ok(())
    }
}
