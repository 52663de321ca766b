//! Oxidul settings, which are configurable using environment variables.
use crate::assembler::DEFAULT_MAX_MESSAGE_SIZE;
use crate::engine::EngineConfig;
use crate::negotiation::AcceptorPolicy;
use crate::pdu::DEFAULT_MAX_PDU;
use crate::sop_classes::supported_transfer_syntaxes;
use crate::types::AETitle;
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct OxidulEnvOptions {
    #[serde(flatten)]
    pub scp: ScpSettings,
    #[serde(default = "default_listener_port")]
    pub listener_port: u16,
    #[serde(default = "default_max_pdu_length")]
    pub max_pdu_length: u32,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub association_timeout: Duration,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub release_timeout: Duration,
    #[serde(default, with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,
    /// Append association statistics to this file as JSON lines.
    #[serde(default)]
    pub audit_file: Option<Utf8PathBuf>,
    /// Export traces and metrics over OTLP.
    #[serde(default)]
    pub otel_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScpSettings {
    /// Our AE title.
    #[serde(default = "default_aet")]
    pub aet: AETitle,
    /// Whether receiving PDUs must not surpass the negotiated maximum PDU length.
    #[serde(default)]
    pub strict: bool,
    /// Only accept uncompressed transfer syntaxes.
    #[serde(default)]
    pub uncompressed_only: bool,
    /// Whether to accept unknown abstract syntaxes.
    #[serde(default)]
    pub promiscuous: bool,
    /// Reject associations addressed to another AE title.
    #[serde(default)]
    pub check_called_ae_title: bool,
}

impl OxidulEnvOptions {
    pub fn acceptor_policy(&self) -> AcceptorPolicy {
        AcceptorPolicy::new(self.scp.aet.clone())
            .with_transfer_syntaxes(supported_transfer_syntaxes(self.scp.uncompressed_only))
            .promiscuous(self.scp.promiscuous)
            .check_called_ae_title(self.scp.check_called_ae_title)
            .strict(self.scp.strict)
            .max_pdu_length(self.max_pdu_length)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            association_timeout: self.association_timeout,
            release_timeout: self.release_timeout,
            idle_timeout: self.idle_timeout,
            max_message_size: self.max_message_size,
            strict: self.scp.strict,
            ..Default::default()
        }
    }
}

fn default_aet() -> AETitle {
    AETitle::from_static("OXIDUL")
}

fn default_listener_port() -> u16 {
    11111
}

fn default_max_pdu_length() -> u32 {
    DEFAULT_MAX_PDU
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}
