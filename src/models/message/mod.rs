//! Message models.

use bitflags::bitflags;
use everscale_types::cell::*;
use everscale_types::error::Error;
use everscale_types::num::Tokens;

use crate::models::address::Address;
use crate::models::state_init::StateInit;
use crate::util::unlikely;

pub use self::comment::*;
pub use self::nft::*;

mod comment;
mod nft;


bitflags! {
    /// Mode flags of an outgoing message.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SendMode: u8 {
        /// The sender will pay transfer fees separately.
        const PAY_FEE_SEPARATELY = 1;
        /// Any errors arising while processing this message during
        /// the action phase should be ignored.
        const IGNORE_ERRORS = 2;
        /// Causes bounce if action fails.
        const BOUNCE_ON_ERROR = 16;
        /// The current account must be destroyed if its resulting balance is zero.
        const DELETE_IF_EMPTY = 32;
        /// Message will carry all the remaining value of the inbound message
        /// in addition to the value initially indicated in the new message.
        const CARRY_REMAINING_VALUE = 64;
        /// Message will carry all the remaining balance of the current smart contract
        /// (instead of the value originally indicated in the message).
        const CARRY_ALL_BALANCE = 128;
    }
}

impl SendMode {
    /// Regular wallet transfer: fees are paid separately and
    /// a failed message does not abort the rest of the batch.
    pub const REGULAR: Self = Self::PAY_FEE_SEPARATELY.union(Self::IGNORE_ERRORS);
}

impl Default for SendMode {
    #[inline]
    fn default() -> Self {
        Self::REGULAR
    }
}

impl Store for SendMode {
    fn store_into(&self, builder: &mut CellBuilder, _: &mut dyn CellContext) -> Result<(), Error> {
        builder.store_u8(self.bits())
    }
}

impl<'a> Load<'a> for SendMode {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        Ok(Self::from_bits_retain(ok!(slice.load_u8())))
    }
}

/// Internal message sent by a wallet contract.
///
/// Source address, fees and creation time are left empty,
/// the remote node fills them in when the wallet sends the message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InternalMessage {
    /// Whether to return the funds if the message fails.
    pub bounce: bool,
    /// Destination address.
    pub dst: Address,
    /// Attached amount in nanotons.
    pub amount: Tokens,
    /// Optional state init for the destination contract.
    pub init: Option<StateInit>,
    /// Optional payload.
    pub body: Option<Cell>,
}

impl InternalMessage {
    /// Creates a plain transfer without a body.
    pub fn transfer(dst: Address, amount: Tokens, bounce: bool) -> Self {
        Self {
            bounce,
            dst,
            amount,
            init: None,
            body: None,
        }
    }

    /// Sets the message body.
    pub fn with_body(mut self, body: Cell) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the message body to a text comment.
    pub fn with_comment(self, comment: &str) -> Result<Self, crate::error::Error> {
        let body = ok!(build_comment(comment));
        Ok(self.with_body(body))
    }

    /// Attaches the state init of the destination contract.
    pub fn with_state_init(mut self, init: StateInit) -> Self {
        self.init = Some(init);
        self
    }

    /// Returns the number of data bits and references this message occupies.
    pub fn compute_size(&self) -> (u16, u8) {
        let bits = 1 + 3 + 2 // int_msg_info$0, flags, src:addr_none
            + Address::BITS
            + coins_bit_len(&self.amount)
            + 1 // extra currencies
            + 4 + 4 // ihr_fee, fwd_fee
            + 64 + 32 // created_lt, created_at
            + if self.init.is_some() { 2 } else { 1 }
            + 1; // body
        let refs = self.init.is_some() as u8 + self.body.is_some() as u8;
        (bits, refs)
    }
}

impl Store for InternalMessage {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        let (bits, refs) = self.compute_size();
        if !builder.has_capacity(bits, refs) {
            return Err(Error::CellOverflow);
        }

        // int_msg_info$0 ihr_disabled:Bool bounce:Bool bounced:Bool src:addr_none$00
        let flags = 0b010000 | ((self.bounce as u8) << 3);
        ok!(builder.store_small_uint(flags, 6));
        ok!(self.dst.store_into(builder, context));
        ok!(self.amount.store_into(builder, context));
        ok!(builder.store_bit_zero()); // no extra currencies
        ok!(Tokens::ZERO.store_into(builder, context)); // ihr_fee
        ok!(Tokens::ZERO.store_into(builder, context)); // fwd_fee
        ok!(builder.store_u64(0)); // created_lt
        ok!(builder.store_u32(0)); // created_at

        ok!(store_init(builder, self.init.as_ref(), context));
        store_body(builder, self.body.as_ref())
    }
}

impl<'a> Load<'a> for InternalMessage {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        if unlikely(ok!(slice.load_bit())) {
            return Err(Error::InvalidTag);
        }

        let _ihr_disabled = ok!(slice.load_bit());
        let bounce = ok!(slice.load_bit());
        let _bounced = ok!(slice.load_bit());

        // Source is always filled by the node
        if unlikely(ok!(slice.load_small_uint(2)) != 0b00) {
            return Err(Error::InvalidData);
        }

        let dst = ok!(Address::load_from(slice));
        let amount = ok!(Tokens::load_from(slice));
        if unlikely(ok!(slice.load_bit())) {
            // Extra currencies are not supported
            return Err(Error::InvalidData);
        }
        let _ihr_fee = ok!(Tokens::load_from(slice));
        let _fwd_fee = ok!(Tokens::load_from(slice));
        let _created_lt = ok!(slice.load_u64());
        let _created_at = ok!(slice.load_u32());

        Ok(Self {
            bounce,
            dst,
            amount,
            init: ok!(load_init(slice)),
            body: ok!(load_body(slice)),
        })
    }
}

/// Incoming external message, the envelope of a signed wallet body.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExternalMessage {
    /// Destination wallet address.
    pub dst: Address,
    /// State init, only for the first deployment message.
    pub init: Option<StateInit>,
    /// Signed body.
    pub body: Cell,
}

impl ExternalMessage {
    /// Returns the number of data bits and references this message occupies.
    pub fn compute_size(&self) -> (u16, u8) {
        let bits = 2 + 2 // ext_in_msg_info$10, src:addr_none
            + Address::BITS
            + 4 // import_fee
            + if self.init.is_some() { 2 } else { 1 }
            + 1; // body
        let refs = self.init.is_some() as u8 + 1;
        (bits, refs)
    }
}

impl Store for ExternalMessage {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        let (bits, refs) = self.compute_size();
        if !builder.has_capacity(bits, refs) {
            return Err(Error::CellOverflow);
        }

        // ext_in_msg_info$10 src:addr_none$00
        ok!(builder.store_small_uint(0b1000, 4));
        ok!(self.dst.store_into(builder, context));
        ok!(Tokens::ZERO.store_into(builder, context)); // import_fee

        ok!(store_init(builder, self.init.as_ref(), context));
        store_body(builder, Some(&self.body))
    }
}

impl<'a> Load<'a> for ExternalMessage {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        if unlikely(ok!(slice.load_small_uint(2)) != 0b10) {
            return Err(Error::InvalidTag);
        }
        if unlikely(ok!(slice.load_small_uint(2)) != 0b00) {
            return Err(Error::InvalidData);
        }

        let dst = ok!(Address::load_from(slice));
        let _import_fee = ok!(Tokens::load_from(slice));
        let init = ok!(load_init(slice));
        match ok!(load_body(slice)) {
            Some(body) => Ok(Self { dst, init, body }),
            None => Err(Error::InvalidData),
        }
    }
}

/// Returns the number of bits of the `VarUInteger 16` encoding.
pub(crate) fn coins_bit_len(amount: &Tokens) -> u16 {
    let value = amount.into_inner();
    let bytes = (128 - value.leading_zeros() as u16 + 7) / 8;
    4 + bytes * 8
}

fn store_init(
    builder: &mut CellBuilder,
    init: Option<&StateInit>,
    context: &mut dyn CellContext,
) -> Result<(), Error> {
    match init {
        Some(init) => {
            let cell = {
                let mut builder = CellBuilder::new();
                ok!(init.store_into(&mut builder, context));
                ok!(builder.build_ext(context))
            };
            ok!(builder.store_small_uint(0b11, 2)); // just$1 right$1
            builder.store_reference(cell)
        }
        None => builder.store_bit_zero(), // nothing$0
    }
}

fn store_body(builder: &mut CellBuilder, body: Option<&Cell>) -> Result<(), Error> {
    match body {
        Some(body) => {
            ok!(builder.store_bit_one()); // right$1
            builder.store_reference(body.clone())
        }
        None => builder.store_bit_zero(),
    }
}

fn load_init(slice: &mut CellSlice<'_>) -> Result<Option<StateInit>, Error> {
    if !ok!(slice.load_bit()) {
        return Ok(None);
    }
    // Only `^StateInit` is produced by this crate
    if unlikely(!ok!(slice.load_bit())) {
        return Err(Error::InvalidData);
    }
    let cell = ok!(slice.load_reference());
    cell.parse::<StateInit>().map(Some)
}

fn load_body(slice: &mut CellSlice<'_>) -> Result<Option<Cell>, Error> {
    if !ok!(slice.load_bit()) {
        return if slice.is_data_empty() && slice.is_refs_empty() {
            Ok(None)
        } else {
            Err(Error::InvalidData)
        };
    }
    slice.load_reference_cloned().map(Some)
}
