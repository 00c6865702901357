use everscale_types::cell::*;
use everscale_types::error::Error;
use everscale_types::num::Tokens;

use super::coins_bit_len;
use crate::models::address::Address;
use crate::util::unlikely;

/// Request to an NFT item to change its owner.
///
/// Layout: `transfer#5fcc3d14 query_id:u64 new_owner:MsgAddress
/// response_destination:MsgAddress custom_payload:(Maybe ^Cell)
/// forward_amount:Coins forward_payload:(Either Cell ^Cell)`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NftTransfer {
    /// Arbitrary request id.
    pub query_id: u64,
    /// Address of the new owner.
    pub new_owner: Address,
    /// Receiver of the excess funds, `addr_none` if absent.
    pub response_destination: Option<Address>,
    /// Collection specific payload.
    pub custom_payload: Option<Cell>,
    /// Amount sent to the new owner with the ownership notification.
    pub forward_amount: Tokens,
    /// Payload of the ownership notification.
    pub forward_payload: Option<Cell>,
}

impl NftTransfer {
    /// Operation code of the transfer request.
    pub const OPCODE: u32 = 0x5fcc3d14;

    /// Creates a transfer which returns the excess funds to `response_destination`.
    pub fn new(new_owner: Address, response_destination: Address) -> Self {
        Self {
            query_id: 0,
            new_owner,
            response_destination: Some(response_destination),
            custom_payload: None,
            forward_amount: Tokens::ZERO,
            forward_payload: None,
        }
    }

    /// Sets the ownership notification sent to the new owner.
    pub fn with_forward(mut self, amount: Tokens, payload: Option<Cell>) -> Self {
        self.forward_amount = amount;
        self.forward_payload = payload;
        self
    }

    /// Sets the ownership notification with a text comment.
    pub fn with_forward_comment(
        self,
        amount: Tokens,
        comment: &str,
    ) -> Result<Self, crate::error::Error> {
        let payload = ok!(super::build_comment(comment));
        Ok(self.with_forward(amount, Some(payload)))
    }

    /// Returns the number of data bits and references this body occupies.
    pub fn compute_size(&self) -> (u16, u8) {
        let response_bits = match self.response_destination {
            Some(_) => Address::BITS,
            None => 2,
        };
        let bits = 32 + 64 // op, query_id
            + Address::BITS
            + response_bits
            + 1 // custom_payload
            + coins_bit_len(&self.forward_amount)
            + 1; // forward_payload
        let refs = self.custom_payload.is_some() as u8 + self.forward_payload.is_some() as u8;
        (bits, refs)
    }
}

impl Store for NftTransfer {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        let (bits, refs) = self.compute_size();
        if !builder.has_capacity(bits, refs) {
            return Err(Error::CellOverflow);
        }

        ok!(builder.store_u32(Self::OPCODE));
        ok!(builder.store_u64(self.query_id));
        ok!(self.new_owner.store_into(builder, context));
        match &self.response_destination {
            Some(address) => ok!(address.store_into(builder, context)),
            None => ok!(builder.store_small_uint(0b00, 2)), // addr_none$00
        }
        ok!(store_maybe_ref(builder, self.custom_payload.as_ref()));
        ok!(self.forward_amount.store_into(builder, context));
        // Either Cell ^Cell, the payload is always stored by reference
        store_maybe_ref(builder, self.forward_payload.as_ref())
    }
}

impl<'a> Load<'a> for NftTransfer {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        if unlikely(ok!(slice.load_u32()) != Self::OPCODE) {
            return Err(Error::InvalidTag);
        }

        let query_id = ok!(slice.load_u64());
        let new_owner = ok!(Address::load_from(slice));
        let response_destination = match ok!(slice.load_small_uint(2)) {
            0b00 => None,
            0b10 => {
                // Anycast is not supported
                if unlikely(ok!(slice.load_bit())) {
                    return Err(Error::InvalidData);
                }
                Some(Address::new(
                    ok!(slice.load_u8()) as i8,
                    ok!(slice.load_u256()),
                ))
            }
            _ => return Err(Error::InvalidTag),
        };
        let custom_payload = match ok!(slice.load_bit()) {
            true => Some(ok!(slice.load_reference_cloned())),
            false => None,
        };
        let forward_amount = ok!(Tokens::load_from(slice));
        let forward_payload = match ok!(slice.load_bit()) {
            true => Some(ok!(slice.load_reference_cloned())),
            false if slice.is_data_empty() && slice.is_refs_empty() => None,
            // Inline payloads are not produced by this crate
            false => return Err(Error::InvalidData),
        };

        Ok(Self {
            query_id,
            new_owner,
            response_destination,
            custom_payload,
            forward_amount,
            forward_payload,
        })
    }
}

fn store_maybe_ref(builder: &mut CellBuilder, cell: Option<&Cell>) -> Result<(), Error> {
    match cell {
        Some(cell) => {
            ok!(builder.store_bit_one());
            builder.store_reference(cell.clone())
        }
        None => builder.store_bit_zero(),
    }
}
