use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use everscale_types::boc::Boc;
use everscale_types::cell::*;
use everscale_types::dict::Dict;

use super::batch::{HighloadBatch, QueryId, SimpleBatch, Transfer};
use super::highload_v3::HighloadV3Payload;
use super::{Stage, WalletVersion};
use crate::error::{CellError, Error};
use crate::models::{Address, ExternalMessage, StateInit};

/// To-sign payload of a regular wallet.
///
/// Layout: `subwallet_id:u32 valid_until:u32 seqno:u32 [op:u8] (mode:u8 ^msg)*`,
/// where `op` is present only for [`WalletVersion::V4`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WalletPayload {
    /// Wallet generation.
    pub version: WalletVersion,
    /// Subwallet id stored in the contract data.
    pub subwallet_id: u32,
    /// Unix timestamp after which the message is rejected.
    pub valid_until: u32,
    /// Current seqno of the contract.
    pub seqno: u32,
    /// Ordered transfers.
    pub batch: SimpleBatch,
}

impl WalletPayload {
    /// Returns the number of data bits and references this payload occupies.
    pub fn compute_size(&self) -> (u16, u8) {
        let op_bits = if self.version.has_op() { 8 } else { 0 };
        let bits = 32 * 3 + op_bits + 8 * self.batch.len() as u16;
        (bits, self.batch.len() as u8)
    }
}

impl Store for WalletPayload {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        let (bits, refs) = self.compute_size();
        if !builder.has_capacity(bits, refs) {
            return Err(CellError::CellOverflow);
        }

        ok!(builder.store_u32(self.subwallet_id));
        ok!(builder.store_u32(self.valid_until));
        ok!(builder.store_u32(self.seqno));
        if self.version.has_op() {
            ok!(builder.store_u8(WalletVersion::SIMPLE_SEND_OP));
        }
        self.batch.store_into(builder, context)
    }
}

/// To-sign payload of a high-load wallet.
///
/// Layout: `subwallet_id:u32 query_id:u64 messages:(HashmapE 16 Transfer)`.
/// There is no seqno or `valid_until`, the query id carries the expiration time.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HighloadPayload {
    /// Subwallet id stored in the contract data.
    pub subwallet_id: u32,
    /// Unique query id.
    pub query_id: QueryId,
    /// Transfers by index.
    pub messages: Dict<u16, Transfer>,
}

impl HighloadPayload {
    /// Creates a payload from a batch with dense indices.
    pub fn new(
        subwallet_id: u32,
        query_id: QueryId,
        batch: &HighloadBatch,
    ) -> Result<Self, Error> {
        Ok(Self {
            subwallet_id,
            query_id,
            messages: ok!(batch.build_dict()),
        })
    }
}

impl Store for HighloadPayload {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        ok!(builder.store_u32(self.subwallet_id));
        ok!(self.query_id.store_into(builder, context));
        self.messages.store_into(builder, context)
    }
}

/// To-sign payload of any supported wallet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SignerPayload {
    /// Regular wallet payload.
    Wallet(WalletPayload),
    /// High-load wallet payload.
    Highload(HighloadPayload),
    /// High-load wallet v3 payload.
    HighloadV3(HighloadV3Payload),
}

impl SignerPayload {
    /// Returns where the signed body keeps this payload.
    pub fn placement(&self) -> PayloadPlacement {
        match self {
            Self::Wallet(_) | Self::Highload(_) => PayloadPlacement::Inline,
            Self::HighloadV3(_) => PayloadPlacement::Reference,
        }
    }

    /// Builds the payload cell.
    pub fn build(&self) -> Result<Cell, Error> {
        Ok(CellBuilder::build_from(self)?)
    }

    /// Returns the representation hash of the payload cell.
    pub fn hash(&self) -> Result<HashBytes, Error> {
        let cell = ok!(self.build());
        Ok(*cell.repr_hash())
    }
}

impl From<WalletPayload> for SignerPayload {
    #[inline]
    fn from(value: WalletPayload) -> Self {
        Self::Wallet(value)
    }
}

impl From<HighloadPayload> for SignerPayload {
    #[inline]
    fn from(value: HighloadPayload) -> Self {
        Self::Highload(value)
    }
}

impl From<HighloadV3Payload> for SignerPayload {
    #[inline]
    fn from(value: HighloadV3Payload) -> Self {
        Self::HighloadV3(value)
    }
}

impl Store for SignerPayload {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        match self {
            Self::Wallet(payload) => payload.store_into(builder, context),
            Self::Highload(payload) => payload.store_into(builder, context),
            Self::HighloadV3(payload) => payload.store_into(builder, context),
        }
    }
}

/// Position of the payload in a signed body.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PayloadPlacement {
    /// Payload bits and references follow the signature in the same cell.
    #[default]
    Inline,
    /// Payload cell is the only reference after the signature.
    Reference,
}

/// Signed wallet body: the signature followed by the payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SignedBody {
    /// Ed25519 signature of the payload representation hash.
    pub signature: [u8; 64],
    /// Payload cell.
    pub payload: Cell,
    /// Position of the payload.
    pub placement: PayloadPlacement,
}

impl SignedBody {
    /// Signs the payload hash with the key, the payload follows inline.
    pub fn sign(payload: Cell, key: &SigningKey) -> Self {
        Self::sign_with_placement(payload, PayloadPlacement::Inline, key)
    }

    /// Signs the payload hash with the key.
    pub fn sign_with_placement(
        payload: Cell,
        placement: PayloadPlacement,
        key: &SigningKey,
    ) -> Self {
        let signature = key.sign(payload.repr_hash().as_slice());
        Self {
            signature: signature.to_bytes(),
            payload,
            placement,
        }
    }

    /// Checks the signature against the payload hash.
    pub fn verify(&self, key: &VerifyingKey) -> Result<(), Error> {
        let signature = Signature::from_bytes(&self.signature);
        key.verify_strict(self.payload.repr_hash().as_slice(), &signature)
            .map_err(|_| Error::InvalidSignature)
    }

    /// Splits the body cell into the signature and the payload.
    ///
    /// A body with nothing but a single reference after the signature
    /// keeps the payload by reference.
    pub fn parse(cell: &DynCell) -> Result<Self, CellError> {
        let mut slice = ok!(cell.as_slice());
        let mut signature = [0u8; 64];
        ok!(slice.load_raw(&mut signature, 512));

        if slice.size_bits() == 0 && slice.size_refs() == 1 {
            return Ok(Self {
                signature,
                payload: ok!(slice.load_reference_cloned()),
                placement: PayloadPlacement::Reference,
            });
        }

        let mut builder = CellBuilder::new();
        ok!(builder.store_slice(slice));
        Ok(Self {
            signature,
            payload: ok!(builder.build()),
            placement: PayloadPlacement::Inline,
        })
    }

    /// Builds the body cell.
    pub fn build(&self) -> Result<Cell, CellError> {
        CellBuilder::build_from(self)
    }
}

impl Store for SignedBody {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        _: &mut dyn CellContext,
    ) -> Result<(), CellError> {
        match self.placement {
            PayloadPlacement::Inline => {
                let payload = ok!(self.payload.as_slice());
                if !builder.has_capacity(512 + payload.size_bits(), payload.size_refs()) {
                    return Err(CellError::CellOverflow);
                }
                ok!(builder.store_raw(&self.signature, 512));
                builder.store_slice(payload)
            }
            PayloadPlacement::Reference => {
                if !builder.has_capacity(512, 1) {
                    return Err(CellError::CellOverflow);
                }
                ok!(builder.store_raw(&self.signature, 512));
                builder.store_reference(self.payload.clone())
            }
        }
    }
}

/// Signed external message, ready for submission.
#[derive(Debug, Clone)]
pub struct PreparedMessage {
    /// Message fields.
    pub message: ExternalMessage,
    /// Message cell.
    pub cell: Cell,
    /// Representation hash of the signed payload.
    pub payload_hash: HashBytes,
}

impl PreparedMessage {
    /// Returns the message hash, which identifies it on the network.
    #[inline]
    pub fn hash(&self) -> &HashBytes {
        self.cell.repr_hash()
    }

    /// Returns the destination wallet address.
    #[inline]
    pub fn dst(&self) -> &Address {
        &self.message.dst
    }

    /// Encodes the message into BOC bytes.
    pub fn to_boc(&self) -> Vec<u8> {
        Boc::encode(&self.cell)
    }

    /// Encodes the message into a base64 BOC string, the format accepted
    /// by the network endpoints.
    pub fn to_base64(&self) -> String {
        Boc::encode_base64(&self.cell)
    }
}

/// Builds, hashes and signs the payload, then wraps it into an external message.
///
/// Any failure aborts the attempt with [`Error::Aborted`] at the stage it happened.
pub fn prepare_external(
    dst: Address,
    init: Option<StateInit>,
    payload: &SignerPayload,
    key: &SigningKey,
) -> Result<PreparedMessage, Error> {
    let placement = payload.placement();
    let payload = match payload.build() {
        Ok(cell) => cell,
        Err(e) => return Err(e.at(Stage::BuildPayload)),
    };
    tracing::debug!(
        stage = %Stage::BuildPayload,
        bits = payload.bit_len(),
        refs = payload.reference_count(),
        "payload built"
    );

    let payload_hash = *payload.repr_hash();
    tracing::debug!(stage = %Stage::Hash, hash = %payload_hash, "payload hashed");

    let body = SignedBody::sign_with_placement(payload, placement, key);
    tracing::debug!(stage = %Stage::Sign, "payload signed");

    let (message, cell) = ok!(wrap_envelope(dst, init, &body));
    Ok(PreparedMessage {
        message,
        cell,
        payload_hash,
    })
}

/// Wraps the signed body into an external message to the wallet.
pub fn wrap_envelope(
    dst: Address,
    init: Option<StateInit>,
    body: &SignedBody,
) -> Result<(ExternalMessage, Cell), Error> {
    let message = ExternalMessage {
        dst,
        init,
        body: match body.build() {
            Ok(cell) => cell,
            Err(e) => return Err(Error::from(e).at(Stage::WrapEnvelope)),
        },
    };
    let cell = match CellBuilder::build_from(&message) {
        Ok(cell) => cell,
        Err(e) => return Err(Error::from(e).at(Stage::WrapEnvelope)),
    };
    tracing::debug!(
        stage = %Stage::WrapEnvelope,
        %dst,
        hash = %cell.repr_hash(),
        with_init = message.init.is_some(),
        "external message wrapped"
    );
    Ok((message, cell))
}
