use std::collections::{btree_map, BTreeMap};

use everscale_types::cell::*;
use everscale_types::dict::Dict;
use everscale_types::error::Error as CellError;
use rand::Rng;

use crate::error::Error;
use crate::models::{InternalMessage, SendMode};

/// The maximum number of messages in a regular wallet batch.
///
/// Each message is stored as a reference of the payload cell.
pub const MAX_MESSAGES: usize = 4;

/// The maximum number of messages in a high-load wallet batch.
///
/// Each message becomes an output action, and the action list is limited to 255.
pub const MAX_HIGHLOAD_MESSAGES: usize = 255;

/// A single outgoing message with its send mode.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Transfer {
    /// Send mode flags.
    pub mode: SendMode,
    /// Message to send.
    pub message: InternalMessage,
}

impl Transfer {
    /// Creates a new transfer.
    #[inline]
    pub const fn new(mode: SendMode, message: InternalMessage) -> Self {
        Self { mode, message }
    }
}

impl Store for Transfer {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        let message = {
            let mut builder = CellBuilder::new();
            ok!(self.message.store_into(&mut builder, context));
            ok!(builder.build_ext(context))
        };
        ok!(self.mode.store_into(builder, context));
        builder.store_reference(message)
    }
}

impl<'a> Load<'a> for Transfer {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, CellError> {
        let mode = ok!(SendMode::load_from(slice));
        let message = ok!(slice.load_reference());
        Ok(Self {
            mode,
            message: ok!(message.parse::<InternalMessage>()),
        })
    }
}

/// Ordered batch of a regular wallet.
///
/// Messages are sent in the order they were pushed.
/// Duplicates are allowed and kept as is.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct SimpleBatch {
    transfers: Vec<Transfer>,
}

impl SimpleBatch {
    /// Creates an empty batch.
    pub const fn new() -> Self {
        Self {
            transfers: Vec::new(),
        }
    }

    /// Creates a batch with a single transfer.
    pub fn single(mode: SendMode, message: InternalMessage) -> Self {
        Self {
            transfers: vec![Transfer::new(mode, message)],
        }
    }

    /// Appends a transfer to the end of the batch.
    pub fn push(&mut self, mode: SendMode, message: InternalMessage) -> Result<(), Error> {
        if self.transfers.len() >= MAX_MESSAGES {
            return Err(Error::BatchOverflow { max: MAX_MESSAGES });
        }
        self.transfers.push(Transfer::new(mode, message));
        Ok(())
    }

    /// Returns the number of transfers.
    #[inline]
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    /// Returns `true` if the batch has no transfers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Returns transfers in submission order.
    #[inline]
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }
}

impl TryFrom<Vec<Transfer>> for SimpleBatch {
    type Error = Error;

    fn try_from(transfers: Vec<Transfer>) -> Result<Self, Self::Error> {
        if transfers.len() > MAX_MESSAGES {
            return Err(Error::BatchOverflow { max: MAX_MESSAGES });
        }
        Ok(Self { transfers })
    }
}

impl Store for SimpleBatch {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        for transfer in &self.transfers {
            ok!(transfer.store_into(builder, context));
        }
        Ok(())
    }
}

/// Dictionary batch of a high-load wallet.
///
/// Indices are assigned in insertion order, starting from zero.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct HighloadBatch {
    transfers: BTreeMap<u16, Transfer>,
}

impl HighloadBatch {
    /// Creates an empty batch.
    pub const fn new() -> Self {
        Self {
            transfers: BTreeMap::new(),
        }
    }

    /// Appends a transfer with the next free index and returns that index.
    pub fn push(&mut self, mode: SendMode, message: InternalMessage) -> Result<u16, Error> {
        let index = match self.transfers.last_key_value() {
            Some((last, _)) => last.checked_add(1),
            None => Some(0),
        };
        let index = match index {
            Some(index) if (index as usize) < MAX_HIGHLOAD_MESSAGES => index,
            _ => {
                return Err(Error::BatchOverflow {
                    max: MAX_HIGHLOAD_MESSAGES,
                })
            }
        };
        self.transfers.insert(index, Transfer::new(mode, message));
        Ok(index)
    }

    /// Inserts a transfer with an explicit index.
    ///
    /// Fails if the index was already assigned.
    pub fn insert(
        &mut self,
        index: u16,
        mode: SendMode,
        message: InternalMessage,
    ) -> Result<(), Error> {
        if index as usize >= MAX_HIGHLOAD_MESSAGES {
            return Err(Error::BatchOverflow {
                max: MAX_HIGHLOAD_MESSAGES,
            });
        }
        match self.transfers.entry(index) {
            btree_map::Entry::Occupied(_) => Err(Error::DuplicateIndex(index)),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(Transfer::new(mode, message));
                Ok(())
            }
        }
    }

    /// Returns the number of transfers.
    #[inline]
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    /// Returns `true` if the batch has no transfers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Returns transfers ordered by index.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Transfer)> {
        self.transfers.iter().map(|(index, transfer)| (*index, transfer))
    }

    /// Builds a dictionary with 16-bit keys.
    ///
    /// Fails if the indices do not form a dense `0..N` range.
    pub fn build_dict(&self) -> Result<Dict<u16, Transfer>, Error> {
        let mut dict = Dict::<u16, Transfer>::new();
        for (expected, (index, transfer)) in self.transfers.iter().enumerate() {
            if *index as usize != expected {
                return Err(Error::SparseIndex(*index));
            }
            dict.set(*index, transfer)?;
        }
        Ok(dict)
    }
}

/// Query id of a high-load wallet message.
///
/// The upper 32 bits hold the expiration time, the lower 32 bits
/// hold a random nonce. The contract remembers processed query ids until
/// they expire and rejects duplicates, so this is the only replay
/// protection of the high-load wallet. It is weaker than a seqno:
/// two batches with the same nonce and expiration time collide.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct QueryId(u64);

impl QueryId {
    /// Creates a query id from the expiration time and nonce.
    #[inline]
    pub const fn new(expire_at: u32, nonce: u32) -> Self {
        Self(((expire_at as u64) << 32) | nonce as u64)
    }

    /// Creates a query id from its raw representation.
    #[inline]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Creates a query id which expires `timeout` seconds after `now`
    /// with a random nonce.
    pub fn generate(now: u32, timeout: u32) -> Self {
        Self::generate_with_rng(&mut rand::thread_rng(), now, timeout)
    }

    /// Same as [`QueryId::generate`] but with the provided rng.
    pub fn generate_with_rng<R: Rng + ?Sized>(rng: &mut R, now: u32, timeout: u32) -> Self {
        Self::new(now.saturating_add(timeout), rng.gen())
    }

    /// Returns the raw representation.
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the expiration time.
    #[inline]
    pub const fn expire_at(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the random part.
    #[inline]
    pub const fn nonce(&self) -> u32 {
        self.0 as u32
    }

    /// Returns `true` if the query id is no longer accepted at `now`.
    #[inline]
    pub const fn is_expired(&self, now: u32) -> bool {
        self.expire_at() <= now
    }
}

impl std::fmt::Display for QueryId {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Store for QueryId {
    #[inline]
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        _: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        builder.store_u64(self.0)
    }
}

impl<'a> Load<'a> for QueryId {
    #[inline]
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, CellError> {
        slice.load_u64().map(Self)
    }
}
