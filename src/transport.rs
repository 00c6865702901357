//! Network access used by the wallet flows.
//!
//! This crate does not implement a transport. Callers provide one
//! on top of a lite client or an HTTP API.

use async_trait::async_trait;
use everscale_types::cell::{Cell, HashBytes};
use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};

use crate::error::{RejectReason, TransportError};
use crate::models::Address;
use crate::wallet::HighloadQueryId;

/// Reference to a block at which get methods are executed.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BlockRef {
    /// Workchain of the block.
    pub workchain: i32,
    /// Shard prefix.
    pub shard: u64,
    /// Block seqno.
    pub seqno: u32,
    /// Block root hash.
    pub root_hash: HashBytes,
    /// Block file hash.
    pub file_hash: HashBytes,
}

/// Value of a get method stack.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StackEntry {
    /// Empty value.
    Null,
    /// 257-bit integer.
    Int(BigInt),
    /// Cell.
    Cell(Cell),
}

impl StackEntry {
    /// Returns the integer value if the entry is an integer.
    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Self::Int(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the cell if the entry is a cell.
    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Self::Cell(cell) => Some(cell),
            _ => None,
        }
    }
}

impl From<BigInt> for StackEntry {
    #[inline]
    fn from(value: BigInt) -> Self {
        Self::Int(value)
    }
}

impl From<Cell> for StackEntry {
    #[inline]
    fn from(value: Cell) -> Self {
        Self::Cell(value)
    }
}

/// Result of an external message submission.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SendStatus {
    /// The message was accepted for processing.
    Accepted,
    /// The wallet contract refused the message.
    Rejected(RejectReason),
}

/// Remote network endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the latest known masterchain block.
    async fn get_latest_block(&self) -> Result<BlockRef, TransportError>;

    /// Executes a get method of the account at the specified block.
    async fn run_get_method(
        &self,
        block: &BlockRef,
        address: &Address,
        method: &str,
        args: &[StackEntry],
    ) -> Result<Vec<StackEntry>, TransportError>;

    /// Submits a serialized external message.
    async fn send_message(&self, boc: &[u8]) -> Result<SendStatus, TransportError>;
}

/// Reads the current seqno of a regular wallet.
pub async fn get_seqno<T>(transport: &T, address: &Address) -> Result<u32, TransportError>
where
    T: Transport + ?Sized,
{
    const METHOD: &str = "seqno";

    let block = transport.get_latest_block().await?;
    let stack = transport
        .run_get_method(&block, address, METHOD, &[])
        .await?;
    first_int(&stack, METHOD)?
        .to_u32()
        .ok_or_else(|| TransportError::UnexpectedResponse(METHOD.to_owned()))
}

/// Reads the public key stored in a wallet.
pub async fn get_public_key<T>(
    transport: &T,
    address: &Address,
) -> Result<HashBytes, TransportError>
where
    T: Transport + ?Sized,
{
    const METHOD: &str = "get_public_key";

    let block = transport.get_latest_block().await?;
    let stack = transport
        .run_get_method(&block, address, METHOD, &[])
        .await?;
    int_to_hash(first_int(&stack, METHOD)?)
        .ok_or_else(|| TransportError::UnexpectedResponse(METHOD.to_owned()))
}

/// Checks whether the plugin is installed in a v4 wallet.
pub async fn is_plugin_installed<T>(
    transport: &T,
    wallet: &Address,
    plugin: &Address,
) -> Result<bool, TransportError>
where
    T: Transport + ?Sized,
{
    const METHOD: &str = "is_plugin_installed";

    let args = [
        StackEntry::Int(BigInt::from(plugin.workchain)),
        StackEntry::Int(BigInt::from_bytes_be(Sign::Plus, plugin.account.as_slice())),
    ];

    let block = transport.get_latest_block().await?;
    let stack = transport
        .run_get_method(&block, wallet, METHOD, &args)
        .await?;
    Ok(!first_int(&stack, METHOD)?.is_zero())
}

/// Checks whether a high-load v3 wallet has already processed the query.
///
/// With `need_clean` the contract also takes expired queries into account.
pub async fn is_query_processed<T>(
    transport: &T,
    wallet: &Address,
    query_id: HighloadQueryId,
    need_clean: bool,
) -> Result<bool, TransportError>
where
    T: Transport + ?Sized,
{
    const METHOD: &str = "processed?";

    let args = [
        StackEntry::Int(BigInt::from(query_id.as_raw())),
        StackEntry::Int(BigInt::from(-(need_clean as i8))),
    ];

    let block = transport.get_latest_block().await?;
    let stack = transport
        .run_get_method(&block, wallet, METHOD, &args)
        .await?;
    Ok(!first_int(&stack, METHOD)?.is_zero())
}

fn first_int<'a>(stack: &'a [StackEntry], method: &str) -> Result<&'a BigInt, TransportError> {
    stack
        .first()
        .and_then(StackEntry::as_int)
        .ok_or_else(|| TransportError::UnexpectedResponse(method.to_owned()))
}

fn int_to_hash(value: &BigInt) -> Option<HashBytes> {
    let (sign, bytes) = value.to_bytes_be();
    if sign == Sign::Minus || bytes.len() > 32 {
        return None;
    }
    let mut result = HashBytes::ZERO;
    result.0[32 - bytes.len()..].copy_from_slice(&bytes);
    Some(result)
}
