use pcap_file::DataLink;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run. Per-packet problems never end up here: undecodable
/// packets are skipped during profiling.
#[derive(Error, Debug)]
pub enum Error {
    /// The capture file cannot be opened or read
    #[error("cannot read capture {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is readable but is not a valid pcap container
    #[error("invalid capture {path}: {source}")]
    InvalidCapture {
        path: PathBuf,
        #[source]
        source: pcap_file::PcapError,
    },

    /// The capture uses a link layer we cannot demultiplex
    #[error("unsupported link type {0:?} (expected Ethernet, raw IPv4 or Linux cooked capture)")]
    UnsupportedDataLink(DataLink),

    /// The configuration file cannot be read
    #[error("cannot read configuration {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for our schema
    #[error("ill-formed configuration: {0}")]
    ConfigInvalid(#[from] toml::de::Error),

    /// An output sink failed
    #[error("cannot write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The profile could not be serialized
    #[error("cannot serialize profile: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
