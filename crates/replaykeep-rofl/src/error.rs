use std::fmt;

use thiserror::Error;

/// The framing region being stripped when a [`DecodeError::Truncated`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Trailing 4-byte metadata length.
    MetadataLength,
    /// JSON metadata block preceding the length field.
    Metadata,
    /// Fixed 256-byte signature block.
    Signature,
    /// Leading 16-byte container header.
    Header,
    /// 12 or 13 byte secondary header.
    SecondaryHeader,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::MetadataLength => "metadata length",
            Stage::Metadata => "metadata",
            Stage::Signature => "signature",
            Stage::Header => "header",
            Stage::SecondaryHeader => "secondary header",
        };
        f.write_str(name)
    }
}

/// Errors produced while decoding a replay container.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The file ends before the framing it claims to contain.
    #[error("Truncated container: {stage} needs {needed} bytes, {available} available")]
    Truncated {
        stage: Stage,
        needed: usize,
        available: usize,
    },

    /// A chunk body is short or does not inflate to what its header declares.
    #[error("Corrupt chunk #{chunk_index}: {reason}")]
    Corrupt { chunk_index: usize, reason: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DecodeError>;
