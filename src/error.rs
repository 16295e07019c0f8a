use thiserror::Error;

/// Failure modes a probe can run into. Every variant is non-fatal for the
/// session: the probe logs it and reports an empty observation. The one
/// exception is `Privilege`, which the orchestrator uses to skip ICMP
/// entirely instead of retrying it.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("peer refused or reset the connection: {0}")]
    Refused(String),

    #[error("response present but unrecognized: {0}")]
    Parse(String),

    #[error("raw socket denied: {0}")]
    Privilege(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
