use std::str::FromStr;

use everscale_types::cell::*;
use everscale_types::error::Error;

use crate::error::ParseAddrError;
use crate::util::unlikely;

/// Workchain id of the basechain.
pub const BASECHAIN: i8 = 0;
/// Workchain id of the masterchain.
pub const MASTERCHAIN: i8 = -1;

/// Standard internal address without anycast.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Address {
    /// Workchain id (one-byte range).
    pub workchain: i8,
    /// Account id.
    pub account: HashBytes,
}

impl Address {
    /// The number of data bits that address occupies.
    ///
    /// - 2 bits id (`0b10`)
    /// - 1 bit Maybe None
    /// - 8 bits workchain
    /// - 256 bits address
    pub const BITS: u16 = 2 + 1 + 8 + 256;

    /// Constructs a new address.
    #[inline]
    pub const fn new(workchain: i8, account: HashBytes) -> Self {
        Self { workchain, account }
    }

    /// Returns `true` if this address is in the masterchain.
    #[inline]
    pub const fn is_masterchain(&self) -> bool {
        self.workchain == MASTERCHAIN
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.workchain, self.account)
    }
}

impl FromStr for Address {
    type Err = ParseAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseAddrError::Empty);
        }

        let mut result = Self::default();

        let mut parts = s.split(':');
        match parts.next() {
            Some(part) => match part.parse() {
                Ok(workchain) => result.workchain = workchain,
                Err(_) => return Err(ParseAddrError::InvalidWorkchain),
            },
            None => return Err(ParseAddrError::Empty),
        }

        match parts.next() {
            Some(part) => match hex::decode_to_slice(part, &mut result.account.0) {
                Ok(()) => {}
                Err(_) => return Err(ParseAddrError::InvalidAccountId),
            },
            None => return Err(ParseAddrError::InvalidAccountId),
        }

        if parts.next().is_none() {
            Ok(result)
        } else {
            Err(ParseAddrError::UnexpectedPart)
        }
    }
}

impl Store for Address {
    fn store_into(&self, builder: &mut CellBuilder, _: &mut dyn CellContext) -> Result<(), Error> {
        if !builder.has_capacity(Self::BITS, 0) {
            return Err(Error::CellOverflow);
        }
        ok!(builder.store_small_uint(0b100, 3)); // addr_std$10 anycast:nothing$0
        ok!(builder.store_u8(self.workchain as u8));
        builder.store_u256(&self.account)
    }
}

impl<'a> Load<'a> for Address {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        // Only `addr_std` without anycast is allowed
        if unlikely(ok!(slice.load_small_uint(3)) != 0b100) {
            return Err(Error::InvalidTag);
        }

        Ok(Self {
            workchain: ok!(slice.load_u8()) as i8,
            account: ok!(slice.load_u256()),
        })
    }
}

impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(Error::custom)
    }
}
