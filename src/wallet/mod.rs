//! Wallet payloads, signing and deployment.

pub use self::batch::*;
pub use self::deploy::*;
pub use self::flows::*;
pub use self::highload_v3::*;
pub use self::signer::*;

mod batch;
mod deploy;
mod flows;
mod highload_v3;
mod signer;

#[cfg(test)]
mod tests;

/// Regular wallet contract generation.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletVersion {
    /// Wallet v3 (r1 and r2 share the message layout).
    #[default]
    V3,
    /// Wallet v4 with plugin support.
    V4,
}

impl WalletVersion {
    /// Operation code of a simple send, present only in v4 payloads.
    pub const SIMPLE_SEND_OP: u8 = 0;

    /// Returns `true` if the to-sign payload contains an operation code.
    #[inline]
    pub const fn has_op(self) -> bool {
        matches!(self, Self::V4)
    }
}

/// Stage of a single transaction attempt.
///
/// Stages are passed strictly in order and never retried. An error at any
/// stage aborts the whole attempt, see [`Error::Aborted`].
///
/// [`Error::Aborted`]: crate::error::Error::Aborted
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Stage {
    /// Messages are collected into a batch.
    CollectIntent,
    /// The to-sign payload cell is built.
    BuildPayload,
    /// The payload hash is computed.
    Hash,
    /// The payload hash is signed.
    Sign,
    /// The signed body is wrapped into an external message.
    WrapEnvelope,
    /// The external message was handed to the transport.
    Submitted,
}

impl Stage {
    /// Returns the next stage, or `None` for the terminal one.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::CollectIntent => Some(Self::BuildPayload),
            Self::BuildPayload => Some(Self::Hash),
            Self::Hash => Some(Self::Sign),
            Self::Sign => Some(Self::WrapEnvelope),
            Self::WrapEnvelope => Some(Self::Submitted),
            Self::Submitted => None,
        }
    }

    /// Returns `true` for the terminal stage.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CollectIntent => "collect_intent",
            Self::BuildPayload => "build_payload",
            Self::Hash => "hash",
            Self::Sign => "sign",
            Self::WrapEnvelope => "wrap_envelope",
            Self::Submitted => "submitted",
        })
    }
}
