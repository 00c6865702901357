use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use ed25519_dalek::SigningKey;
use everscale_types::boc::Boc;
use everscale_types::cell::*;
use everscale_types::num::Tokens;
use num_bigint::BigInt;
use rand::SeedableRng;

use super::*;
use crate::config::{
    HighloadConfig, HighloadV3Config, WalletConfig, DEFAULT_HIGHLOAD_V3_SUBWALLET_ID,
    DEFAULT_SUBWALLET_ID,
};
use crate::error::{Error, RejectReason, SendError, TransportError};
use crate::models::{parse_comment, Address, ExternalMessage, InternalMessage, SendMode};
use crate::transport::{BlockRef, SendStatus, StackEntry, Transport};

const V3R2_CODE: &str = "te6cckEBAQEAcQAA3v8AIN0gggFMl7ohggEznLqxn3Gw7UTQ0x/THzHXC//jBOCk8mCDCNcYINMf0x/TH/gjE7vyY+1E0NMf0x/T/9FRMrryoVFEuvKiBPkBVBBV+RDyo/gAkyDXSpbTB9QC+wDo0QGkyMsfyx/L/8ntVBC9ba0=";
const HIGHLOAD_V2_CODE: &str = "te6ccgEBCQEA5QABFP8A9KQT9LzyyAsBAgEgAgMCAUgEBQHq8oMI1xgg0x/TP/gjqh9TILnyY+1E0NMf0z/T//QE0VNggED0Dm+hMfJgUXO68qIH+QFUEIf5EPKjAvQE0fgAf44WIYAQ9HhvpSCYAtMH1DAB+wCRMuIBs+ZbgyWhyEA0gED0Q4rmMQHIyx8Tyz/L//QAye1UCAAE0DACASAGBwAXvZznaiaGmvmOuF/8AEG+X5dqJoaY+Y6Z/p/5j6AmipEEAgegc30JjJLb/JXdHxQANCCAQPSWb6VsEiCUMFMDud4gkzM2AZJsIeKz";
const HIGHLOAD_V3_CODE: &str = "te6cckECEAEAAigAART/APSkE/S88sgLAQIBIAINAgFIAwQAeNAg10vAAQHAYLCRW+EB0NMDAXGwkVvg+kAw+CjHBbORMODTHwGCEK5C5aS6nYBA1yHXTPgqAe1V+wTgMAIBIAUKAgJzBgcAEa3OdqJoa4X/wAIBIAgJABqrtu1E0IEBItch1ws/ABiqO+1E0IMH1yHXCx8CASALDAAbuabu1E0IEBYtch1wsVgA5bi/Ltou37IasJAoQJsO1E0IEBINch9AT0BNM/0xXRBY4b+CMloVIQuZ8ybfgjBaoAFaESuZIwbd6SMDPikjAz4lIwgA30D2+hntAh1yHXCgCVXwN/2zHgkTDiWYAN9A9voZzQAdch1woAk3/bMeCRW+JwgB9vLUgwjXGNEh+QDtRNDT/9Mf9AT0BNM/0xXR+CMhoVIguY4SM234IySqAKESuZJtMt5Y+CMB3lQWdfkQ8qEG0NMf1NMH0wzTCdM/0xXRUWi68qJRWrrypvgjKqFSULzyowT4I7vyo1MEgA30D2+hmdAk1yHXCgDyZJEw4g4B/lMJgA30D2+hjhPQUATXGNIAAfJkyFjPFs+DAc8WjhAwyCTPQM+DhAlQBaGlFM9A4vgAyUA5gA30FwTIy/8Tyx/0ABL0ABLLPxLLFcntVPgPIdDTAAHyZdMCAXGwkl8D4PpAAdcLAcAA8qX6QDH6ADH0AfoAMfoAMYBg1yHTAAEPACDyZdIAAZPUMdGRMOJysfsAtYW/Aw==";

const DST: &str = "0:8c8d0cc80ae34b93fe189fdefc0536745e40fab2a9179b37c24a419f04cd8e21";
const VALID_UNTIL: u32 = 1_700_000_000;

fn v3r2_code() -> Cell {
    Boc::decode_base64(V3R2_CODE).unwrap()
}

fn highload_code() -> Cell {
    Boc::decode_base64(HIGHLOAD_V2_CODE).unwrap()
}

fn highload_v3_code() -> Cell {
    Boc::decode_base64(HIGHLOAD_V3_CODE).unwrap()
}

fn key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

fn dst() -> Address {
    DST.parse().unwrap()
}

fn hello_transfer() -> InternalMessage {
    InternalMessage::transfer(dst(), Tokens::new(200_000_000), true)
        .with_comment("Hello, TON!")
        .unwrap()
}

fn numbered_transfer(i: usize) -> InternalMessage {
    InternalMessage::transfer(dst(), Tokens::new(1_000_000), true)
        .with_comment(&format!("Hello, TON! #{i}"))
        .unwrap()
}

fn v3_wallet(seed: u8) -> Wallet {
    Wallet::new(
        WalletVersion::V3,
        v3r2_code(),
        DEFAULT_SUBWALLET_ID,
        0,
        key(seed),
    )
    .unwrap()
}

fn payload(valid_until: u32, seqno: u32) -> WalletPayload {
    WalletPayload {
        version: WalletVersion::V3,
        subwallet_id: DEFAULT_SUBWALLET_ID,
        valid_until,
        seqno,
        batch: SimpleBatch::single(SendMode::REGULAR, hello_transfer()),
    }
}

#[test]
fn v3_deployment_address() {
    let code = v3r2_code();
    assert_eq!(
        code.repr_hash().to_string(),
        "84dafa449f98a6987789ba232358072bc0f76dc4524002a5d0918b9a75d2d599"
    );

    let public_key = key(1).verifying_key();
    assert_eq!(
        hex::encode(public_key.as_bytes()),
        "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c"
    );

    let wallet = v3_wallet(1);
    assert_eq!(
        wallet.address().to_string(),
        "0:8dca78972eab4a8e2b1d3f2a7e43c1c563e696f65bb9c5ae0845684cee138384"
    );

    let data = WalletData::new(
        WalletVersion::V3,
        DEFAULT_SUBWALLET_ID,
        HashBytes(public_key.to_bytes()),
    );
    let first = Deployment::with_data(code.clone(), &data, 0).unwrap();
    let second = Deployment::with_data(code, &data, 0).unwrap();
    assert_eq!(first, second);
    assert_eq!(&first.address, wallet.address());
}

#[test]
fn deployment_address_depends_on_key_and_subwallet() {
    assert_eq!(
        v3_wallet(2).address().to_string(),
        "0:bdacd8b07039b578d088b3e8629937a3020063bd9d1cb706afaeea49a917cadc"
    );

    let wallet = Wallet::new(WalletVersion::V3, v3r2_code(), 3, 0, key(1)).unwrap();
    assert_eq!(
        wallet.address().to_string(),
        "0:f6f1525ec01459a9ab2dffd0b403d14682cb98e7cf55be537b6c40ca1b642d93"
    );

    let masterchain = Wallet::new(
        WalletVersion::V3,
        v3r2_code(),
        DEFAULT_SUBWALLET_ID,
        -1,
        key(1),
    )
    .unwrap();
    assert!(masterchain.address().is_masterchain());
    assert_eq!(masterchain.address().account, v3_wallet(1).address().account);
}

#[test]
fn embedded_public_key_changes_address() -> anyhow::Result<()> {
    let first = HashBytes([0xaa; 32]);
    let mut second = first;
    second.0[31] ^= 1;

    let v3 = |key| WalletData::new(WalletVersion::V3, DEFAULT_SUBWALLET_ID, key);
    let a = Deployment::with_data(v3r2_code(), &v3(first), 0)?;
    let b = Deployment::with_data(v3r2_code(), &v3(second), 0)?;
    assert_ne!(a.address, b.address);
    assert_eq!(a.state_init.code, b.state_init.code);

    let highload = |key| HighloadData::new(DEFAULT_SUBWALLET_ID, key);
    let a = Deployment::with_data(highload_code(), &highload(first), 0)?;
    let b = Deployment::with_data(highload_code(), &highload(second), 0)?;
    assert_ne!(a.address, b.address);

    let highload_v3 = |key| HighloadV3Data::new(DEFAULT_HIGHLOAD_V3_SUBWALLET_ID, 3600, key);
    let a = Deployment::with_data(highload_v3_code(), &highload_v3(first), 0)?;
    let b = Deployment::with_data(highload_v3_code(), &highload_v3(second), 0)?;
    assert_ne!(a.address, b.address);
    Ok(())
}

#[test]
fn wallet_data_layouts() -> anyhow::Result<()> {
    let public_key = HashBytes([0xaa; 32]);

    let v3 = CellBuilder::build_from(WalletData::new(WalletVersion::V3, 7, public_key))?;
    assert_eq!(v3.bit_len(), 32 + 32 + 256);
    let mut slice = v3.as_slice()?;
    assert_eq!(slice.load_u32()?, 0);
    assert_eq!(slice.load_u32()?, 7);
    assert_eq!(slice.load_u256()?, public_key);

    let v4 = CellBuilder::build_from(WalletData::new(WalletVersion::V4, 7, public_key))?;
    assert_eq!(v4.bit_len(), 32 + 32 + 256 + 1);
    assert_ne!(v4.repr_hash(), v3.repr_hash());

    let highload = CellBuilder::build_from(HighloadData::new(7, public_key))?;
    assert_eq!(highload.bit_len(), 32 + 64 + 256 + 1);
    let mut slice = highload.as_slice()?;
    assert_eq!(slice.load_u32()?, 7);
    assert_eq!(slice.load_u64()?, 0);
    assert_eq!(slice.load_u256()?, public_key);
    assert!(!slice.load_bit()?);
    Ok(())
}

#[test]
fn v3_payload_golden() -> anyhow::Result<()> {
    let payload = SignerPayload::from(payload(VALID_UNTIL, 5));
    let cell = payload.build()?;
    assert_eq!(cell.bit_len(), 32 * 3 + 8);
    assert_eq!(cell.reference_count(), 1);
    assert_eq!(
        payload.hash()?.to_string(),
        "03d2fff6964beea7a738b2f91a27199c9552d151bc30b0267fff4c02fdfee12e"
    );

    let body = SignedBody::sign(cell.clone(), &key(1));
    assert_eq!(
        hex::encode(body.signature),
        "f1ea75cad3cfbab69c8be164d2cf371f86dea76ad56fd0b55d3a8b533ba625d0\
         96ebcd025525a69fd2b07ab7124faab8228b6dc138ef99e92b85673c783bf408"
    );
    body.verify(&key(1).verifying_key())?;

    let body_cell = body.build()?;
    assert_eq!(body_cell.bit_len(), 512 + cell.bit_len());
    assert_eq!(body_cell.reference_count(), 1);
    assert_eq!(SignedBody::parse(body_cell.as_ref())?, body);
    Ok(())
}

#[test]
fn v4_payload_has_op() -> anyhow::Result<()> {
    let payload = WalletPayload {
        version: WalletVersion::V4,
        ..payload(VALID_UNTIL, 5)
    };
    let cell = CellBuilder::build_from(&payload)?;
    assert_eq!(cell.bit_len(), 32 * 3 + 8 + 8);

    let mut slice = cell.as_slice()?;
    assert_eq!(slice.load_u32()?, DEFAULT_SUBWALLET_ID);
    assert_eq!(slice.load_u32()?, VALID_UNTIL);
    assert_eq!(slice.load_u32()?, 5);
    assert_eq!(slice.load_u8()?, WalletVersion::SIMPLE_SEND_OP);
    assert_eq!(slice.load_u8()?, 3);

    assert_eq!(
        cell.repr_hash().to_string(),
        "3a9bdb7c32f2b32b6550c79474cd2268d6567f8b381277e5185b76d678e1cd56"
    );
    Ok(())
}

#[test]
fn transfer_message_golden() -> anyhow::Result<()> {
    let wallet = v3_wallet(1);
    let batch = SimpleBatch::single(SendMode::REGULAR, hello_transfer());
    let prepared = wallet.prepare_transfer(5, VALID_UNTIL, batch)?;

    assert_eq!(
        prepared.hash().to_string(),
        "16eaaec38c689922f882013a5384e9c05dabda4560921a5424ff4854c950a304"
    );
    assert_eq!(
        prepared.payload_hash.to_string(),
        "03d2fff6964beea7a738b2f91a27199c9552d151bc30b0267fff4c02fdfee12e"
    );
    assert!(prepared.message.init.is_none());

    // The produced artifact decodes back into the same message
    let decoded = Boc::decode_base64(prepared.to_base64())?;
    assert_eq!(decoded.repr_hash(), prepared.hash());
    assert_eq!(Boc::decode(prepared.to_boc())?, decoded);
    let raw = base64::engine::general_purpose::STANDARD.decode(prepared.to_base64())?;
    assert_eq!(raw, prepared.to_boc());

    let message = decoded.parse::<ExternalMessage>()?;
    assert_eq!(&message.dst, wallet.address());
    let body = SignedBody::parse(message.body.as_ref())?;
    body.verify(&wallet.public_key())?;
    Ok(())
}

#[test]
fn deploy_message_golden() -> anyhow::Result<()> {
    let wallet = v3_wallet(1);
    let batch = SimpleBatch::single(SendMode::REGULAR, hello_transfer());
    let prepared = wallet.prepare_deploy(VALID_UNTIL, batch)?;

    assert_eq!(
        prepared.hash().to_string(),
        "c6dc9e4df46c3c8d5d3b5eb9b80cd3d5e7484202c41f41c7dc4991dc96973e34"
    );

    let init = prepared.message.init.as_ref().unwrap();
    assert_eq!(init.compute_address(0)?, *wallet.address());

    let body = SignedBody::parse(prepared.message.body.as_ref())?;
    let mut payload = body.payload.as_slice()?;
    assert_eq!(payload.load_u32()?, DEFAULT_SUBWALLET_ID);
    assert_eq!(payload.load_u32()?, VALID_UNTIL);
    assert_eq!(payload.load_u32()?, 0); // seqno

    // Deployment without transfers is allowed
    let empty = wallet.prepare_deploy(VALID_UNTIL, SimpleBatch::new())?;
    let body = SignedBody::parse(empty.message.body.as_ref())?;
    assert_eq!(body.payload.bit_len(), 32 * 3);
    assert_eq!(body.payload.reference_count(), 0);
    Ok(())
}

#[test]
fn payload_fields_change_hash_and_signature() -> anyhow::Result<()> {
    let base = SignerPayload::from(payload(VALID_UNTIL, 5));
    let base_hash = base.hash()?;
    let signed = SignedBody::sign(base.build()?, &key(1));

    let changed = [
        payload(VALID_UNTIL + 1, 5),
        payload(VALID_UNTIL, 6),
        WalletPayload {
            subwallet_id: DEFAULT_SUBWALLET_ID + 1,
            ..payload(VALID_UNTIL, 5)
        },
        WalletPayload {
            batch: SimpleBatch::single(SendMode::PAY_FEE_SEPARATELY, hello_transfer()),
            ..payload(VALID_UNTIL, 5)
        },
    ];
    for payload in changed {
        let payload = SignerPayload::from(payload);
        let cell = payload.build()?;
        assert_ne!(cell.repr_hash(), &base_hash);

        // The old signature does not match the new payload
        let forged = SignedBody {
            signature: signed.signature,
            payload: cell.clone(),
            placement: PayloadPlacement::Inline,
        };
        assert_eq!(
            forged.verify(&key(1).verifying_key()),
            Err(Error::InvalidSignature)
        );

        let resigned = SignedBody::sign(cell, &key(1));
        assert_ne!(resigned.signature, signed.signature);
    }

    // Wrong key
    assert_eq!(
        signed.verify(&key(2).verifying_key()),
        Err(Error::InvalidSignature)
    );
    Ok(())
}

#[test]
fn past_valid_until_is_accepted_locally() -> anyhow::Result<()> {
    let wallet = v3_wallet(1);
    let batch = SimpleBatch::single(SendMode::REGULAR, hello_transfer());
    let prepared = wallet.prepare_transfer(5, 1, batch)?;

    let body = SignedBody::parse(prepared.message.body.as_ref())?;
    let mut payload = body.payload.as_slice()?;
    payload.load_u32()?;
    assert_eq!(payload.load_u32()?, 1);
    Ok(())
}

#[test]
fn simple_batch_keeps_order() -> anyhow::Result<()> {
    let messages = (0..MAX_MESSAGES).map(numbered_transfer).collect::<Vec<_>>();

    let mut batch = SimpleBatch::new();
    for message in &messages {
        batch.push(SendMode::REGULAR, message.clone())?;
    }
    assert_eq!(
        batch.push(SendMode::REGULAR, numbered_transfer(4)),
        Err(Error::BatchOverflow { max: MAX_MESSAGES })
    );

    let mut reversed = SimpleBatch::new();
    for message in messages.iter().rev() {
        reversed.push(SendMode::REGULAR, message.clone())?;
    }

    let wallet = v3_wallet(1);
    for (batch, expected) in [
        (batch, messages.clone()),
        (reversed, messages.iter().rev().cloned().collect()),
    ] {
        let prepared = wallet.prepare_transfer(1, VALID_UNTIL, batch)?;
        let body = SignedBody::parse(prepared.message.body.as_ref())?;
        let mut payload = body.payload.as_slice()?;
        payload.load_uint(64)?; // subwallet_id, valid_until
        assert_eq!(payload.load_u32()?, 1);

        assert_eq!(payload.size_refs() as usize, expected.len());
        for message in &expected {
            let transfer = Transfer::load_from(&mut payload)?;
            assert_eq!(transfer.mode, SendMode::REGULAR);
            assert_eq!(&transfer.message, message);
        }
        assert!(payload.is_data_empty());
    }

    // Duplicates are kept as is
    let mut duplicates = SimpleBatch::new();
    duplicates.push(SendMode::REGULAR, hello_transfer())?;
    duplicates.push(SendMode::REGULAR, hello_transfer())?;
    assert_eq!(duplicates.len(), 2);

    let too_many = vec![Transfer::new(SendMode::REGULAR, hello_transfer()); MAX_MESSAGES + 1];
    assert!(SimpleBatch::try_from(too_many).is_err());
    Ok(())
}

#[test]
fn empty_transfer_is_rejected() {
    let wallet = v3_wallet(1);
    let err = wallet
        .prepare_transfer(1, VALID_UNTIL, SimpleBatch::new())
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::CollectIntent));
    assert!(matches!(err, Error::Aborted { source, .. } if *source == Error::EmptyBatch));
}

#[test]
fn existing_wallet_cannot_deploy() {
    let address = v3_wallet(1).address().to_owned();
    let wallet = Wallet::existing(address, WalletVersion::V3, DEFAULT_SUBWALLET_ID, key(1));
    assert!(wallet.deployment().is_none());

    let err = wallet.prepare_deploy(VALID_UNTIL, SimpleBatch::new()).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::CollectIntent));

    // Transfers are identical to the ones of a wallet created from code
    let batch = SimpleBatch::single(SendMode::REGULAR, hello_transfer());
    let prepared = wallet.prepare_transfer(5, VALID_UNTIL, batch).unwrap();
    assert_eq!(
        prepared.hash().to_string(),
        "16eaaec38c689922f882013a5384e9c05dabda4560921a5424ff4854c950a304"
    );
}

#[test]
fn payload_overflow_is_reported() {
    let payload = payload(VALID_UNTIL, 1);

    let mut builder = CellBuilder::new();
    builder.store_raw(&[0u8; 125], 1000).unwrap();
    assert_eq!(
        payload.store_into(&mut builder, &mut Cell::empty_context()),
        Err(everscale_types::error::Error::CellOverflow)
    );

    let mut builder = CellBuilder::new();
    builder.store_reference(Cell::empty_cell()).unwrap();
    assert!(payload
        .store_into(&mut builder, &mut Cell::empty_context())
        .is_ok());
}

#[test]
fn oversized_signed_body_aborts_at_wrap_envelope() -> anyhow::Result<()> {
    let payload = {
        let mut builder = CellBuilder::new();
        builder.store_raw(&[0xaa; 75], 600)?;
        builder.build()?
    };

    let inline = SignedBody::sign(payload.clone(), &key(1));
    let err = wrap_envelope(dst(), None, &inline).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::WrapEnvelope));
    assert!(matches!(
        err,
        Error::Aborted { source, .. }
            if *source == Error::Cell(everscale_types::error::Error::CellOverflow)
    ));

    // The same payload fits when it is kept by reference
    let by_ref = SignedBody::sign_with_placement(payload, PayloadPlacement::Reference, &key(1));
    let (message, cell) = wrap_envelope(dst(), None, &by_ref)?;
    assert_eq!(message.body.bit_len(), 512);
    assert_eq!(message.body.reference_count(), 1);
    assert_eq!(SignedBody::parse(message.body.as_ref())?, by_ref);
    assert_eq!(cell.parse::<ExternalMessage>()?, message);
    Ok(())
}

#[test]
fn stages_are_ordered() {
    let mut stage = Stage::CollectIntent;
    let mut visited = vec![stage];
    while let Some(next) = stage.next() {
        assert!(next > stage);
        visited.push(next);
        stage = next;
    }
    assert!(stage.is_terminal());
    assert_eq!(visited.len(), 6);
    assert_eq!(Stage::WrapEnvelope.to_string(), "wrap_envelope");

    let err = Error::EmptyBatch.at(Stage::Sign).at(Stage::Hash);
    assert_eq!(err.stage(), Some(Stage::Sign));
}

#[test]
fn highload_batch_indices() -> anyhow::Result<()> {
    let mut batch = HighloadBatch::new();
    assert_eq!(batch.push(SendMode::REGULAR, numbered_transfer(0))?, 0);
    assert_eq!(batch.push(SendMode::REGULAR, numbered_transfer(1))?, 1);

    // Explicit duplicate assignment must fail instead of overwriting
    assert_eq!(
        batch.insert(1, SendMode::REGULAR, numbered_transfer(2)),
        Err(Error::DuplicateIndex(1))
    );
    let (_, transfer) = batch.iter().nth(1).unwrap();
    assert_eq!(transfer.message, numbered_transfer(1));

    batch.insert(2, SendMode::REGULAR, numbered_transfer(2))?;
    assert_eq!(batch.len(), 3);

    let dict = batch.build_dict()?;
    for i in 0..3u16 {
        let transfer = dict.get(i)?.unwrap();
        assert_eq!(transfer.message, numbered_transfer(i as usize));
    }
    assert!(dict.get(3u16)?.is_none());

    // Gaps are not allowed
    let mut sparse = HighloadBatch::new();
    sparse.insert(0, SendMode::REGULAR, numbered_transfer(0))?;
    sparse.insert(2, SendMode::REGULAR, numbered_transfer(2))?;
    assert_eq!(sparse.build_dict().unwrap_err(), Error::SparseIndex(2));

    assert!(matches!(
        sparse.insert(MAX_HIGHLOAD_MESSAGES as u16, SendMode::REGULAR, numbered_transfer(0)),
        Err(Error::BatchOverflow { .. })
    ));
    Ok(())
}

#[test]
fn highload_batch_overflow() {
    let mut batch = HighloadBatch::new();
    let message = numbered_transfer(0);
    for i in 0..MAX_HIGHLOAD_MESSAGES {
        assert_eq!(
            batch.push(SendMode::REGULAR, message.clone()).unwrap(),
            i as u16
        );
    }
    assert_eq!(
        batch.push(SendMode::REGULAR, message),
        Err(Error::BatchOverflow {
            max: MAX_HIGHLOAD_MESSAGES
        })
    );
}

#[test]
fn query_id_layout() {
    let query_id = QueryId::new(1_700_000_120, 0x12345678);
    assert_eq!(query_id.as_u64(), 7301444918901495416);
    assert_eq!(query_id.expire_at(), 1_700_000_120);
    assert_eq!(query_id.nonce(), 0x12345678);
    assert!(!query_id.is_expired(1_700_000_000));
    assert!(query_id.is_expired(1_700_000_120));

    let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(123);
    let first = QueryId::generate_with_rng(&mut rng, 1_700_000_000, 120);
    let second = QueryId::generate_with_rng(&mut rng, 1_700_000_000, 120);
    assert_eq!(first.expire_at(), 1_700_000_120);
    assert_eq!(second.expire_at(), 1_700_000_120);
    assert_ne!(first, second);

    let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(123);
    assert_eq!(QueryId::generate_with_rng(&mut rng, 1_700_000_000, 120), first);

    assert_eq!(QueryId::generate(u32::MAX, 120).expire_at(), u32::MAX);
}

#[test]
fn highload_golden() -> anyhow::Result<()> {
    let wallet = HighloadWallet::new(highload_code(), DEFAULT_SUBWALLET_ID, 0, key(1))?;
    assert_eq!(
        highload_code().repr_hash().to_string(),
        "9494d1cc8edf12f05671a1a9ba09921096eb50811e1924ec65c3c629fbb80812"
    );
    assert_eq!(
        wallet.address().to_string(),
        "0:8070311e465e0472d8e11e2a653e9235c6e97cf9671e59f6836ba175239ef5bb"
    );

    let mut batch = HighloadBatch::new();
    for i in 0..3 {
        batch.push(SendMode::REGULAR, numbered_transfer(i))?;
    }
    let query_id = QueryId::new(1_700_000_120, 0x12345678);

    let payload = HighloadPayload::new(DEFAULT_SUBWALLET_ID, query_id, &batch)?;
    let cell = CellBuilder::build_from(&payload)?;
    assert_eq!(cell.bit_len(), 32 + 64 + 1);
    assert_eq!(
        cell.reference(0).unwrap().repr_hash().to_string(),
        "93c6f1a47bab74972f9241daefe78f1d69740ec97f64049060b3f5c55adb5ac9"
    );
    assert_eq!(
        cell.repr_hash().to_string(),
        "1eecfff971b1ef14e9aec8effbcd3afedfc8dac304e4f000f31174738121e20f"
    );

    let prepared = wallet.prepare_batch(query_id, &batch)?;
    assert_eq!(
        prepared.hash().to_string(),
        "3d1a79d2ecd46b9407fefdc91f1d3b31cb06b95fe6ec0ceca55bf50df9e19414"
    );
    assert!(prepared.message.init.is_none());

    let body = SignedBody::parse(prepared.message.body.as_ref())?;
    body.verify(&wallet.public_key())?;
    Ok(())
}

#[test]
fn highload_deploy_via_wallet() -> anyhow::Result<()> {
    let wallet = HighloadWallet::new(highload_code(), DEFAULT_SUBWALLET_ID, 0, key(1))?;
    let message = wallet.deploy_via(Tokens::new(1_000_000_000))?;
    assert!(!message.bounce);
    assert!(message.body.is_none());
    assert_eq!(&message.dst, wallet.address());

    let cell = CellBuilder::build_from(&message)?;
    assert_eq!(
        cell.repr_hash().to_string(),
        "2598071a1317ab01d887de896c487f53d90d21badb2a0cc36af72d1003baa2e9"
    );

    let existing = HighloadWallet::existing(*wallet.address(), DEFAULT_SUBWALLET_ID, key(1));
    assert_eq!(
        existing.deploy_via(Tokens::new(1)).unwrap_err().stage(),
        Some(Stage::CollectIntent)
    );
    Ok(())
}

#[test]
fn highload_rejects_bad_batches() -> anyhow::Result<()> {
    let wallet = HighloadWallet::new(highload_code(), DEFAULT_SUBWALLET_ID, 0, key(1))?;
    let query_id = QueryId::new(1_700_000_120, 1);

    let err = wallet.prepare_batch(query_id, &HighloadBatch::new()).unwrap_err();
    assert!(matches!(err, Error::Aborted { source, .. } if *source == Error::EmptyBatch));

    let mut sparse = HighloadBatch::new();
    sparse.insert(1, SendMode::REGULAR, numbered_transfer(1))?;
    let err = wallet.prepare_batch(query_id, &sparse).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::CollectIntent));
    assert!(matches!(err, Error::Aborted { source, .. } if *source == Error::SparseIndex(1)));
    Ok(())
}

#[test]
fn wallets_from_config() -> anyhow::Result<()> {
    let config = WalletConfig::new(WalletVersion::V3, v3r2_code(), 90);
    let wallet = Wallet::from_config(&config, key(1))?;
    assert_eq!(wallet.address(), v3_wallet(1).address());
    assert_eq!(wallet.subwallet_id(), DEFAULT_SUBWALLET_ID);

    let config = HighloadConfig {
        workchain: 0,
        subwallet_id: DEFAULT_SUBWALLET_ID,
        query_timeout: 60,
        code: highload_code(),
    };
    let wallet = HighloadWallet::from_config(&config, key(1))?;
    assert_eq!(
        wallet.address().to_string(),
        "0:8070311e465e0472d8e11e2a653e9235c6e97cf9671e59f6836ba175239ef5bb"
    );
    assert_eq!(wallet.next_query_id(1000).expire_at(), 1060);
    Ok(())
}

fn highload_v3_wallet() -> HighloadV3Wallet {
    HighloadV3Wallet::new(
        highload_v3_code(),
        DEFAULT_HIGHLOAD_V3_SUBWALLET_ID,
        3600,
        0,
        key(1),
    )
    .unwrap()
}

fn out_list_len(list: &DynCell) -> usize {
    let mut len = 0;
    let mut cell = list;
    while let Some(prev) = cell.reference(0) {
        cell = prev;
        len += 1;
    }
    len
}

#[test]
fn highload_v3_golden() -> anyhow::Result<()> {
    assert_eq!(
        highload_v3_code().repr_hash().to_string(),
        "11acad7955844090f283bf238bc1449871f783e7cc0979408d3f4859483e8525"
    );

    let wallet = highload_v3_wallet();
    assert_eq!(
        wallet.address().to_string(),
        "0:a191b4fd56c006700049d0e1442444c5b0cbcaeb921c984430d40cf23ecb64d8"
    );

    let data = wallet.deployment().unwrap().state_init.data.clone();
    assert_eq!(data.bit_len(), 256 + 32 + 2 + 64 + 22);
    let mut slice = data.as_slice()?;
    assert_eq!(slice.load_u256()?.0, key(1).verifying_key().to_bytes());
    assert_eq!(slice.load_u32()?, 0x10ad);
    assert_eq!(slice.load_small_uint(2)?, 0);
    assert_eq!(slice.load_u64()?, 0);
    assert_eq!(slice.load_uint(22)?, 3600);

    let query_id = HighloadQueryId::from_shift_and_bit_number(1, 5)?;
    assert_eq!(query_id.as_raw(), 1029);
    let transfers = [Transfer::new(SendMode::REGULAR, hello_transfer())];
    let value = Tokens::new(10_000_000);

    let message = pack_actions(*wallet.address(), &transfers, value, query_id)?;
    assert!(message.bounce);
    assert_eq!(&message.dst, wallet.address());
    let body = message.body.as_ref().unwrap().parse::<InternalTransfer>()?;
    assert_eq!(body.query_id, 1029);
    assert_eq!(
        body.actions.repr_hash().to_string(),
        "0fcdccfe8a81786c9a36d484b8b079df5685b47c2beed0afc20223fb91681c90"
    );
    assert_eq!(
        CellBuilder::build_from(&message)?.repr_hash().to_string(),
        "6a474590806ee6b966e7d7a96b49d79b1d1fca2908bb91577d5a2dfd63e95d47"
    );

    let prepared = wallet.prepare_batch(query_id, 1_700_000_000, &transfers, value)?;
    assert!(prepared.message.init.is_none());
    assert_eq!(
        prepared.payload_hash.to_string(),
        "c2f989272b7fdd9b248b1c9282bbb354dd4711967ffde5792d1e76915cd0151f"
    );
    assert_eq!(
        prepared.hash().to_string(),
        "0039b6d80711581cd24fd1987caf9f713925587202de7cd887af8c48bd6712b9"
    );

    let signed = SignedBody::parse(prepared.message.body.as_ref())?;
    assert_eq!(signed.placement, PayloadPlacement::Reference);
    signed.verify(&wallet.public_key())?;

    let payload = signed.payload;
    assert_eq!(payload.bit_len(), HighloadV3Payload::BITS);
    let mut slice = payload.as_slice()?;
    assert_eq!(slice.load_u32()?, 0x10ad);
    assert_eq!(SendMode::load_from(&mut slice)?, SendMode::PAY_FEE_SEPARATELY);
    assert_eq!(HighloadQueryId::load_from(&mut slice)?, query_id);
    assert_eq!(slice.load_u64()?, 1_700_000_000);
    assert_eq!(slice.load_uint(22)?, 3600);
    Ok(())
}

#[test]
fn highload_v3_deploy_via_wallet() -> anyhow::Result<()> {
    let wallet = highload_v3_wallet();
    let message = wallet.deploy_via(Tokens::new(50_000_000))?;
    assert!(!message.bounce);
    assert_eq!(
        CellBuilder::build_from(&message)?.repr_hash().to_string(),
        "4cdc16fa64eda466dc85065ff62108da8893bf1532f475148dc98f2ecbe80a81"
    );

    let config = HighloadV3Config {
        workchain: 0,
        subwallet_id: DEFAULT_HIGHLOAD_V3_SUBWALLET_ID,
        timeout: 3600,
        code: highload_v3_code(),
    };
    let from_config = HighloadV3Wallet::from_config(&config, key(1))?;
    assert_eq!(from_config.address(), wallet.address());

    let existing = HighloadV3Wallet::existing(
        *wallet.address(),
        DEFAULT_HIGHLOAD_V3_SUBWALLET_ID,
        3600,
        key(1),
    )?;
    assert_eq!(
        existing.deploy_via(Tokens::new(1)).unwrap_err().stage(),
        Some(Stage::CollectIntent)
    );
    Ok(())
}

#[test]
fn highload_v3_query_id_sequence() -> anyhow::Result<()> {
    let first = HighloadQueryId::default();
    assert_eq!(first.next()?, HighloadQueryId::from_shift_and_bit_number(0, 1)?);

    let row_end = HighloadQueryId::from_shift_and_bit_number(0, 1022)?;
    assert_eq!(row_end.next()?, HighloadQueryId::from_shift_and_bit_number(1, 0)?);

    let almost = HighloadQueryId::from_shift_and_bit_number(8191, 1020)?;
    let last = almost.next()?;
    assert_eq!(last.bit_number(), 1021);
    assert_eq!(last.next(), Err(Error::QueryIdOverflow));
    assert_eq!(HighloadQueryId::EMERGENCY.as_raw(), (8191 << 10) | 1022);

    assert_eq!(
        HighloadQueryId::from_shift_and_bit_number(0, 1023),
        Err(Error::InvalidQueryId)
    );
    assert_eq!(HighloadQueryId::from_raw(1 << 23), Err(Error::InvalidQueryId));
    assert_eq!(HighloadQueryId::from_raw(1029)?.shift(), 1);
    Ok(())
}

#[test]
fn highload_v3_nested_action_lists() -> anyhow::Result<()> {
    let wallet = highload_v3_wallet();
    let transfers = (0..300)
        .map(|i| Transfer::new(SendMode::REGULAR, numbered_transfer(i)))
        .collect::<Vec<_>>();

    let message = pack_actions(
        *wallet.address(),
        &transfers,
        Tokens::ZERO,
        HighloadQueryId::default(),
    )?;
    let outer = message.body.as_ref().unwrap().parse::<InternalTransfer>()?;
    assert_eq!(out_list_len(outer.actions.as_ref()), MAX_V3_ACTIONS);

    // The first action comes first in the list
    let mut first = outer.actions.as_ref();
    while first.reference(0).unwrap().reference_count() > 0 {
        first = first.reference(0).unwrap();
    }
    let mut slice = first.as_slice()?;
    slice.load_reference()?;
    assert_eq!(slice.load_u32()?, SEND_MSG_ACTION_TAG);
    assert_eq!(Transfer::load_from(&mut slice)?, transfers[0]);

    // The last action carries the rest
    let mut slice = outer.actions.as_slice()?;
    slice.load_reference()?;
    assert_eq!(slice.load_u32()?, SEND_MSG_ACTION_TAG);
    let nested = Transfer::load_from(&mut slice)?;
    assert_eq!(nested.mode, SendMode::CARRY_ALL_BALANCE);
    assert_eq!(&nested.message.dst, wallet.address());
    let inner = nested.message.body.unwrap().parse::<InternalTransfer>()?;
    assert_eq!(out_list_len(inner.actions.as_ref()), 300 - (MAX_V3_ACTIONS - 1));

    let exact = pack_actions(
        *wallet.address(),
        &transfers[..MAX_V3_ACTIONS],
        Tokens::ZERO,
        HighloadQueryId::default(),
    )?;
    let exact = exact.body.unwrap().parse::<InternalTransfer>()?;
    assert_eq!(out_list_len(exact.actions.as_ref()), MAX_V3_ACTIONS);
    Ok(())
}

#[test]
fn highload_v3_rejects_bad_input() {
    let err = HighloadV3Wallet::new(highload_v3_code(), 1, 1 << 22, 0, key(1)).unwrap_err();
    assert_eq!(err, Error::InvalidTimeout(1 << 22));
    assert!(HighloadV3Wallet::existing(dst(), 1, u32::MAX, key(1)).is_err());

    let err = highload_v3_wallet()
        .prepare_batch(HighloadQueryId::default(), 1, &[], Tokens::ZERO)
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::CollectIntent));
    assert!(matches!(err, Error::Aborted { source, .. } if *source == Error::EmptyBatch));

    let data = HighloadV3Data::new(1, 1 << 22, HashBytes::ZERO);
    assert!(CellBuilder::build_from(data).is_err());
}

struct MockTransport {
    seqno: Option<u32>,
    status: SendStatus,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    fn new(seqno: Option<u32>, status: SendStatus) -> Self {
        Self {
            seqno,
            status,
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_latest_block(&self) -> Result<BlockRef, TransportError> {
        Ok(BlockRef::default())
    }

    async fn run_get_method(
        &self,
        _: &BlockRef,
        _: &Address,
        method: &str,
        _: &[StackEntry],
    ) -> Result<Vec<StackEntry>, TransportError> {
        assert_eq!(method, "seqno");
        match self.seqno {
            Some(seqno) => Ok(vec![StackEntry::Int(BigInt::from(seqno))]),
            None => Err(TransportError::Unavailable("timeout".to_owned())),
        }
    }

    async fn send_message(&self, boc: &[u8]) -> Result<SendStatus, TransportError> {
        self.sent.lock().unwrap().push(boc.to_vec());
        Ok(self.status.clone())
    }
}

#[tokio::test]
async fn send_reads_seqno_and_submits() -> anyhow::Result<()> {
    let transport = MockTransport::new(Some(5), SendStatus::Accepted);
    let wallet = v3_wallet(1).with_message_ttl(60);
    let batch = SimpleBatch::single(SendMode::REGULAR, hello_transfer());

    let prepared = wallet
        .send(&transport, VALID_UNTIL - 60, batch)
        .await?;
    assert_eq!(
        prepared.hash().to_string(),
        "16eaaec38c689922f882013a5384e9c05dabda4560921a5424ff4854c950a304"
    );

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(Boc::decode(&sent[0])?.repr_hash(), prepared.hash());
    Ok(())
}

#[tokio::test]
async fn send_outcomes_are_distinct() {
    let batch = SimpleBatch::single(SendMode::REGULAR, hello_transfer());
    let wallet = v3_wallet(1);

    let transport = MockTransport::new(None, SendStatus::Accepted);
    let err = wallet.send(&transport, 0, batch.clone()).await.unwrap_err();
    assert!(matches!(err, SendError::Transport(TransportError::Unavailable(_))));
    assert!(transport.sent.lock().unwrap().is_empty());

    let transport = MockTransport::new(
        Some(4),
        SendStatus::Rejected(RejectReason::SeqnoMismatch),
    );
    let err = wallet.send(&transport, 0, batch).await.unwrap_err();
    assert_eq!(err, SendError::Rejected(RejectReason::SeqnoMismatch));
    assert_eq!(transport.sent.lock().unwrap().len(), 1);

    let transport = MockTransport::new(Some(4), SendStatus::Accepted);
    let err = wallet
        .send(&transport, 0, SimpleBatch::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SendError::Build(Error::Aborted { .. })));
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn deploy_and_highload_submission() -> anyhow::Result<()> {
    let transport = MockTransport::new(None, SendStatus::Accepted);
    let wallet = v3_wallet(1);
    let prepared = wallet
        .deploy(
            &transport,
            VALID_UNTIL - DEFAULT_MESSAGE_TTL,
            SimpleBatch::single(SendMode::REGULAR, hello_transfer()),
        )
        .await?;
    assert_eq!(
        prepared.hash().to_string(),
        "c6dc9e4df46c3c8d5d3b5eb9b80cd3d5e7484202c41f41c7dc4991dc96973e34"
    );

    let transport = MockTransport::new(
        None,
        SendStatus::Rejected(RejectReason::AlreadyProcessed),
    );
    let wallet = HighloadWallet::new(highload_code(), DEFAULT_SUBWALLET_ID, 0, key(1))?;
    let mut batch = HighloadBatch::new();
    batch.push(SendMode::REGULAR, numbered_transfer(0))?;
    let err = wallet
        .send(&transport, QueryId::new(1, 1), &batch)
        .await
        .unwrap_err();
    assert_eq!(err, SendError::Rejected(RejectReason::AlreadyProcessed));

    let body = parse_comment(numbered_transfer(7).body.unwrap().as_ref())?;
    assert_eq!(body, "Hello, TON! #7");
    Ok(())
}

#[tokio::test]
async fn highload_v3_submission() -> anyhow::Result<()> {
    let transport = MockTransport::new(None, SendStatus::Accepted);
    let wallet = highload_v3_wallet();
    let transfers = [Transfer::new(SendMode::REGULAR, hello_transfer())];

    let prepared = wallet
        .send(
            &transport,
            HighloadQueryId::from_shift_and_bit_number(1, 5)?,
            1_700_000_000,
            &transfers,
            Tokens::new(10_000_000),
        )
        .await?;
    assert_eq!(
        prepared.hash().to_string(),
        "0039b6d80711581cd24fd1987caf9f713925587202de7cd887af8c48bd6712b9"
    );

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(Boc::decode(&sent[0])?.repr_hash(), prepared.hash());
    Ok(())
}
