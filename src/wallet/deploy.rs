use everscale_types::cell::*;
use everscale_types::num::Tokens;

use super::highload_v3::TIMEOUT_BITS;
use super::WalletVersion;
use crate::error::{CellError, Error};
use crate::models::{Address, ExternalMessage, InternalMessage, StateInit};

/// Initial data of a regular wallet contract.
///
/// Layout: `seqno:u32 subwallet_id:u32 public_key:bits256`,
/// v4 also stores an empty plugins dictionary.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct WalletData {
    /// Wallet generation.
    pub version: WalletVersion,
    /// Initial seqno, always zero for a new contract.
    pub seqno: u32,
    /// Subwallet id.
    pub subwallet_id: u32,
    /// Owner public key.
    pub public_key: HashBytes,
}

impl WalletData {
    /// Creates data for a new contract with a zero seqno.
    pub const fn new(version: WalletVersion, subwallet_id: u32, public_key: HashBytes) -> Self {
        Self {
            version,
            seqno: 0,
            subwallet_id,
            public_key,
        }
    }
}

impl Store for WalletData {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        _: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        ok!(builder.store_u32(self.seqno));
        ok!(builder.store_u32(self.subwallet_id));
        ok!(builder.store_u256(&self.public_key));
        match self.version {
            WalletVersion::V3 => Ok(()),
            WalletVersion::V4 => builder.store_bit_zero(), // plugins:(HashmapE 264 bool)
        }
    }
}

/// Initial data of a high-load wallet v2 contract.
///
/// Layout: `subwallet_id:u32 last_cleaned:u64 public_key:bits256 queries:(HashmapE 64 Cell)`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct HighloadData {
    /// Subwallet id.
    pub subwallet_id: u32,
    /// Time of the last cleanup of processed queries, zero for a new contract.
    pub last_cleaned: u64,
    /// Owner public key.
    pub public_key: HashBytes,
}

impl HighloadData {
    /// Creates data for a new contract.
    pub const fn new(subwallet_id: u32, public_key: HashBytes) -> Self {
        Self {
            subwallet_id,
            last_cleaned: 0,
            public_key,
        }
    }
}

impl Store for HighloadData {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        _: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        ok!(builder.store_u32(self.subwallet_id));
        ok!(builder.store_u64(self.last_cleaned));
        ok!(builder.store_u256(&self.public_key));
        builder.store_bit_zero() // no processed queries
    }
}

/// Initial data of a high-load wallet v3 contract.
///
/// Layout: `public_key:bits256 subwallet_id:u32 old_queries:(HashmapE 13 ^Cell)
/// queries:(HashmapE 13 ^Cell) last_clean_time:u64 timeout:uint22`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct HighloadV3Data {
    /// Owner public key.
    pub public_key: HashBytes,
    /// Subwallet id.
    pub subwallet_id: u32,
    /// Time of the last cleanup of processed queries, zero for a new contract.
    pub last_clean_time: u64,
    /// Lifetime of a query in seconds.
    pub timeout: u32,
}

impl HighloadV3Data {
    /// Creates data for a new contract.
    pub const fn new(subwallet_id: u32, timeout: u32, public_key: HashBytes) -> Self {
        Self {
            public_key,
            subwallet_id,
            last_clean_time: 0,
            timeout,
        }
    }
}

impl Store for HighloadV3Data {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        _: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        if self.timeout >> TIMEOUT_BITS != 0 {
            return Err(CellError::IntOverflow);
        }
        ok!(builder.store_u256(&self.public_key));
        ok!(builder.store_u32(self.subwallet_id));
        ok!(builder.store_small_uint(0b00, 2)); // no old or current queries
        ok!(builder.store_u64(self.last_clean_time));
        builder.store_uint(self.timeout as u64, TIMEOUT_BITS)
    }
}

/// Contract deployment: the state init and the address derived from it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Deployment {
    /// Contract code and initial data.
    pub state_init: StateInit,
    /// Address of the contract.
    pub address: Address,
}

impl Deployment {
    /// Computes the deployment of the contract with the specified code and data.
    ///
    /// The result depends only on the arguments.
    pub fn new(code: Cell, data: Cell, workchain: i8) -> Result<Self, Error> {
        let state_init = StateInit::new(code, data);
        let address = state_init.compute_address(workchain)?;
        Ok(Self {
            state_init,
            address,
        })
    }

    /// Same as [`Deployment::new`] but serializes the data first.
    pub fn with_data<T: Store>(code: Cell, data: &T, workchain: i8) -> Result<Self, Error> {
        let data = CellBuilder::build_from(data)?;
        Self::new(code, data, workchain)
    }

    /// Wraps a signed body into the first external message of the contract.
    pub fn external_message(&self, body: Cell) -> ExternalMessage {
        ExternalMessage {
            dst: self.address,
            init: Some(self.state_init.clone()),
            body,
        }
    }

    /// Creates a non-bounceable internal message which deploys the contract
    /// from another wallet.
    pub fn internal_message(&self, amount: Tokens, body: Option<Cell>) -> InternalMessage {
        InternalMessage {
            bounce: false,
            dst: self.address,
            amount,
            init: Some(self.state_init.clone()),
            body,
        }
    }
}
