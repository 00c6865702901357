use everscale_types::cell::*;
use everscale_types::error::Error;

use crate::models::address::Address;
use crate::util::unlikely;

/// Deployment data of a contract: code and initial data.
///
/// Split depth, tick-tock and libraries are always absent.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StateInit {
    /// Contract code.
    pub code: Cell,
    /// Initial contract data.
    pub data: Cell,
}

impl StateInit {
    /// The number of data bits that this struct occupies.
    pub const BITS: u16 = 5;

    /// Creates a new state init.
    #[inline]
    pub const fn new(code: Cell, data: Cell) -> Self {
        Self { code, data }
    }

    /// Computes the address of the contract in the specified workchain.
    ///
    /// The account id is the representation hash of the state init cell,
    /// so the address is known before the contract is deployed.
    pub fn compute_address(&self, workchain: i8) -> Result<Address, Error> {
        let cell = ok!(CellBuilder::build_from(self));
        Ok(Address::new(workchain, *cell.repr_hash()))
    }
}

impl Store for StateInit {
    fn store_into(&self, builder: &mut CellBuilder, _: &mut dyn CellContext) -> Result<(), Error> {
        if !builder.has_capacity(Self::BITS, 2) {
            return Err(Error::CellOverflow);
        }
        ok!(builder.store_bit_zero()); // split_depth:nothing$0
        ok!(builder.store_bit_zero()); // special:nothing$0
        ok!(builder.store_bit_one()); // code:just$1
        ok!(builder.store_reference(self.code.clone()));
        ok!(builder.store_bit_one()); // data:just$1
        ok!(builder.store_reference(self.data.clone()));
        builder.store_bit_zero() // library:hme_empty$0
    }
}

impl<'a> Load<'a> for StateInit {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        // split_depth and special must be absent
        if unlikely(ok!(slice.load_bit()) || ok!(slice.load_bit())) {
            return Err(Error::InvalidData);
        }

        if unlikely(!ok!(slice.load_bit())) {
            return Err(Error::InvalidData);
        }
        let code = ok!(slice.load_reference_cloned());

        if unlikely(!ok!(slice.load_bit())) {
            return Err(Error::InvalidData);
        }
        let data = ok!(slice.load_reference_cloned());

        if unlikely(ok!(slice.load_bit())) {
            return Err(Error::InvalidData);
        }

        Ok(Self { code, data })
    }
}
