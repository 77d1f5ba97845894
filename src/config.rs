//! Runtime configuration surface.
//!
//! The binary's one entry point for every external tunable; library code
//! never reads the environment directly — callers build a [`Config`] (from
//! CLI flags, environment variables, or by hand in tests) and pass it in.

use clap::Parser;

/// Configuration for the ESL connection, the dialer, recording, and the
/// orchestrator's answer-detection timeouts.
#[derive(Parser, Debug, Clone)]
#[command(name = "dialbridge", about = "Outbound call orchestrator over FreeSWITCH ESL")]
pub struct Config {
    /// FreeSWITCH ESL host.
    #[arg(long, env = "ESL_HOST", default_value = "127.0.0.1")]
    pub esl_host: String,

    /// FreeSWITCH ESL port.
    #[arg(long, env = "ESL_PORT", default_value_t = 8021)]
    pub esl_port: u16,

    /// FreeSWITCH ESL password.
    #[arg(long, env = "ESL_PASSWORD", default_value = "ClueCon")]
    pub esl_password: String,

    /// SIP gateway name used in `originate` dial strings.
    #[arg(long, env = "DIALER_GATEWAY")]
    pub dialer_gateway: String,

    /// Caller ID presented to the lead leg.
    #[arg(long, env = "DIALER_DID_NUMBER")]
    pub dialer_did_number: String,

    /// Absolute directory `.wav` recordings are written to.
    #[arg(long, env = "RECORDING_DIRECTORY", default_value = "/var/lib/dialbridge/recordings")]
    pub recording_directory: String,

    /// Prefix used when composing a retrievable recording URL.
    #[arg(long, env = "RECORDING_BASE_URL", default_value = "http://localhost:8080")]
    pub recording_base_url: String,

    /// ESL TCP connect timeout, in milliseconds.
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value_t = 10_000)]
    pub connect_timeout_ms: u64,

    /// Budget for the agent leg's `CHANNEL_ANSWER`, in milliseconds.
    #[arg(long, env = "AGENT_ANSWER_TIMEOUT_MS", default_value_t = 30_000)]
    pub agent_answer_timeout_ms: u64,

    /// Budget for the lead leg's `CHANNEL_ANSWER`, in milliseconds.
    #[arg(long, env = "LEAD_ANSWER_TIMEOUT_MS", default_value_t = 60_000)]
    pub lead_answer_timeout_ms: u64,

    /// Delay before confirming the agent leg's answer survived early media,
    /// in milliseconds.
    #[arg(long, env = "EARLY_MEDIA_CONFIRM_MS", default_value_t = 500)]
    pub early_media_confirm_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_timeouts() {
        let config = Config::parse_from([
            "dialbridge",
            "--dialer-gateway",
            "gw1",
            "--dialer-did-number",
            "15551234567",
        ]);
        assert_eq!(config.connect_timeout_ms, 10_000);
        assert_eq!(config.agent_answer_timeout_ms, 30_000);
        assert_eq!(config.lead_answer_timeout_ms, 60_000);
        assert_eq!(config.early_media_confirm_ms, 500);
        assert_eq!(config.esl_port, 8021);
    }
}
