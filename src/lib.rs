//! Message construction and signing for TON wallet contracts.
//!
//! The crate decides which fields go into which cell, in what order and
//! with what bit widths, for every message a wallet contract accepts:
//!
//! - [`InternalMessage`] and [`ExternalMessage`] envelopes,
//! - ordered and dictionary-based transfer batches,
//! - text comment and NFT transfer bodies,
//! - to-sign payloads of regular (v3/v4) and high-load (v2/v3) wallets,
//! - state init and address derivation for the first deployment message.
//!
//! Cells, dictionaries and the bag-of-cells container format come from
//! [`everscale_types`]. Network access is abstracted by [`transport::Transport`].
//!
//! [`InternalMessage`]: crate::models::InternalMessage
//! [`ExternalMessage`]: crate::models::ExternalMessage

macro_rules! ok {
    ($e:expr $(,)?) => {
        match $e {
            core::result::Result::Ok(val) => val,
            core::result::Result::Err(err) => return core::result::Result::Err(err),
        }
    };
}

pub use everscale_types;

pub mod config;
pub mod error;
pub mod models;
pub mod prelude;
pub mod transport;
pub mod wallet;

mod util;
