//! The `ton-wallet-types` prelude.
//!
//! This brings into scope the wallet types and the cell traits they rely on.

pub use everscale_types::boc::Boc;
pub use everscale_types::cell::{Cell, CellBuilder, CellSlice, HashBytes, Load, Store};
pub use everscale_types::num::Tokens;

pub use crate::config::{HighloadConfig, HighloadV3Config, WalletConfig, DEFAULT_SUBWALLET_ID};
pub use crate::error::{Error, SendError, TransportError};
pub use crate::models::{
    Address, ExternalMessage, InternalMessage, NftTransfer, SendMode, StateInit,
};
pub use crate::transport::Transport;
pub use crate::wallet::{
    HighloadBatch, HighloadQueryId, HighloadV3Wallet, HighloadWallet, PreparedMessage, QueryId,
    SignedBody, SimpleBatch, Transfer, Wallet, WalletVersion,
};
