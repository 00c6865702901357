//! High-load wallet v3.
//!
//! The owner signs a single internal message which the wallet sends to
//! itself. That message carries the output action list, so one external
//! message can send up to 254 transfers, and more with nested lists.

use everscale_types::cell::*;
use everscale_types::num::Tokens;

use super::batch::Transfer;
use crate::error::{CellError, Error};
use crate::models::{Address, InternalMessage, SendMode};
use crate::util::unlikely;

/// The maximum number of actions in a single output action list.
///
/// The network allows 255, one slot is left for the nested list.
pub const MAX_V3_ACTIONS: usize = 254;

/// Tag of the `action_send_msg` output action.
pub const SEND_MSG_ACTION_TAG: u32 = 0x0ec3c86d;

/// Operation code of the message the wallet sends to itself.
pub const INTERNAL_TRANSFER_OP: u32 = 0xae42e5a4;

/// The number of bits of the query timeout.
pub const TIMEOUT_BITS: u16 = 22;

/// Query id of a high-load wallet v3.
///
/// The contract keeps a bitmap of processed ids for each timeout window.
/// An id is a `shift` (row) and a `bit_number` inside that row.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HighloadQueryId {
    shift: u16,
    bit_number: u16,
}

impl HighloadQueryId {
    /// The number of data bits that query id occupies.
    pub const BITS: u16 = 23;
    /// The largest shift.
    pub const MAX_SHIFT: u16 = 8191;
    /// The largest bit number.
    pub const MAX_BIT_NUMBER: u16 = 1022;
    /// Query id left for emergency use, never returned by [`next`].
    ///
    /// [`next`]: Self::next
    pub const EMERGENCY: Self = Self {
        shift: Self::MAX_SHIFT,
        bit_number: Self::MAX_BIT_NUMBER,
    };

    /// Creates a query id from its parts.
    pub fn from_shift_and_bit_number(shift: u16, bit_number: u16) -> Result<Self, Error> {
        if shift > Self::MAX_SHIFT || bit_number > Self::MAX_BIT_NUMBER {
            return Err(Error::InvalidQueryId);
        }
        Ok(Self { shift, bit_number })
    }

    /// Splits a raw 23-bit query id.
    pub fn from_raw(value: u32) -> Result<Self, Error> {
        if value >> Self::BITS != 0 {
            return Err(Error::InvalidQueryId);
        }
        Self::from_shift_and_bit_number((value >> 10) as u16, (value & 0x3ff) as u16)
    }

    /// Returns the raw 23-bit value.
    #[inline]
    pub const fn as_raw(&self) -> u32 {
        ((self.shift as u32) << 10) | self.bit_number as u32
    }

    /// Row of the processed queries bitmap.
    #[inline]
    pub const fn shift(&self) -> u16 {
        self.shift
    }

    /// Bit inside the row.
    #[inline]
    pub const fn bit_number(&self) -> u16 {
        self.bit_number
    }

    /// Returns the query id which follows this one.
    ///
    /// Fails with [`Error::QueryIdOverflow`] when only the emergency id is left.
    pub fn next(&self) -> Result<Self, Error> {
        let mut shift = self.shift;
        let mut bit_number = self.bit_number + 1;
        if shift == Self::MAX_SHIFT && bit_number >= Self::MAX_BIT_NUMBER {
            return Err(Error::QueryIdOverflow);
        }
        if bit_number > Self::MAX_BIT_NUMBER {
            bit_number = 0;
            shift += 1;
        }
        Ok(Self { shift, bit_number })
    }
}

impl std::fmt::Display for HighloadQueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.as_raw(), f)
    }
}

impl Store for HighloadQueryId {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        _: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        builder.store_uint(self.as_raw() as u64, Self::BITS)
    }
}

impl<'a> Load<'a> for HighloadQueryId {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, CellError> {
        let value = ok!(slice.load_uint(Self::BITS)) as u32;
        match Self::from_raw(value) {
            Ok(query_id) => Ok(query_id),
            Err(_) => Err(CellError::InvalidData),
        }
    }
}

/// Output action list with a `send_msg` action for each transfer.
///
/// Layout: `out_list$_ prev:^OutList action:OutAction`, the empty list is
/// an empty cell. Actions are executed in the order of the slice.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct OutList<'a>(pub &'a [Transfer]);

impl Store for OutList<'_> {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        if self.0.len() > 255 {
            return Err(CellError::CellOverflow);
        }
        let Some((last, rest)) = self.0.split_last() else {
            return Ok(());
        };

        let prev = {
            let mut builder = CellBuilder::new();
            ok!(OutList(rest).store_into(&mut builder, context));
            ok!(builder.build_ext(context))
        };
        ok!(builder.store_reference(prev));
        ok!(builder.store_u32(SEND_MSG_ACTION_TAG));
        last.store_into(builder, context)
    }
}

/// Body of the message the wallet sends to itself.
///
/// Layout: `internal_transfer#ae42e5a4 query_id:u64 actions:^OutList`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InternalTransfer {
    /// Query id of the external message.
    pub query_id: u64,
    /// Output action list.
    pub actions: Cell,
}

impl Store for InternalTransfer {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        _: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        if !builder.has_capacity(32 + 64, 1) {
            return Err(CellError::CellOverflow);
        }
        ok!(builder.store_u32(INTERNAL_TRANSFER_OP));
        ok!(builder.store_u64(self.query_id));
        builder.store_reference(self.actions.clone())
    }
}

impl<'a> Load<'a> for InternalTransfer {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, CellError> {
        if unlikely(ok!(slice.load_u32()) != INTERNAL_TRANSFER_OP) {
            return Err(CellError::InvalidTag);
        }
        Ok(Self {
            query_id: ok!(slice.load_u64()),
            actions: ok!(slice.load_reference_cloned()),
        })
    }
}

/// Returns the send mode of a message the wallet sends to itself.
///
/// With a zero value the message carries the whole balance.
pub fn self_transfer_mode(value: Tokens) -> SendMode {
    if value == Tokens::ZERO {
        SendMode::CARRY_ALL_BALANCE
    } else {
        SendMode::PAY_FEE_SEPARATELY
    }
}

/// Packs transfers into a message from the wallet to itself.
///
/// When there are more than [`MAX_V3_ACTIONS`] transfers, the last action
/// of the list is another such message with the rest of them.
pub fn pack_actions(
    wallet: Address,
    transfers: &[Transfer],
    value: Tokens,
    query_id: HighloadQueryId,
) -> Result<InternalMessage, Error> {
    if transfers.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let actions = if transfers.len() > MAX_V3_ACTIONS {
        let (head, tail) = transfers.split_at(MAX_V3_ACTIONS - 1);
        let nested = ok!(pack_actions(wallet, tail, value, query_id));

        let mut batch = Vec::with_capacity(MAX_V3_ACTIONS);
        batch.extend_from_slice(head);
        batch.push(Transfer::new(self_transfer_mode(value), nested));
        ok!(CellBuilder::build_from(OutList(&batch)).map_err(Error::Cell))
    } else {
        ok!(CellBuilder::build_from(OutList(transfers)).map_err(Error::Cell))
    };

    let body = InternalTransfer {
        query_id: query_id.as_raw() as u64,
        actions,
    };
    let body = ok!(CellBuilder::build_from(body).map_err(Error::Cell));

    Ok(InternalMessage::transfer(wallet, value, true).with_body(body))
}

/// To-sign payload of a high-load wallet v3.
///
/// Layout: `subwallet_id:u32 message:^Message mode:u8 query_id:uint23
/// created_at:u64 timeout:uint22`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HighloadV3Payload {
    /// Subwallet id stored in the contract data.
    pub subwallet_id: u32,
    /// Message the wallet sends, usually to itself.
    pub message: InternalMessage,
    /// Send mode of the message.
    pub mode: SendMode,
    /// Unique query id.
    pub query_id: HighloadQueryId,
    /// Creation time, the message expires `timeout` seconds later.
    pub created_at: u64,
    /// Timeout stored in the contract data.
    pub timeout: u32,
}

impl HighloadV3Payload {
    /// The number of data bits that payload occupies.
    pub const BITS: u16 = 32 + 8 + HighloadQueryId::BITS + 64 + TIMEOUT_BITS;
}

impl Store for HighloadV3Payload {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        if !builder.has_capacity(Self::BITS, 1) {
            return Err(CellError::CellOverflow);
        }
        if self.timeout >> TIMEOUT_BITS != 0 {
            return Err(CellError::IntOverflow);
        }

        let message = {
            let mut builder = CellBuilder::new();
            ok!(self.message.store_into(&mut builder, context));
            ok!(builder.build_ext(context))
        };

        ok!(builder.store_u32(self.subwallet_id));
        ok!(builder.store_reference(message));
        ok!(self.mode.store_into(builder, context));
        ok!(self.query_id.store_into(builder, context));
        ok!(builder.store_u64(self.created_at));
        builder.store_uint(self.timeout as u64, TIMEOUT_BITS)
    }
}

/// Checks that the timeout fits into the contract data.
pub(crate) fn check_timeout(timeout: u32) -> Result<u32, Error> {
    if timeout >> TIMEOUT_BITS != 0 {
        Err(Error::InvalidTimeout(timeout))
    } else {
        Ok(timeout)
    }
}
