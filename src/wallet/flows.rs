use ed25519_dalek::{SigningKey, VerifyingKey};
use everscale_types::cell::{Cell, HashBytes};
use everscale_types::num::Tokens;

use super::batch::{HighloadBatch, QueryId, SimpleBatch};
use super::batch::Transfer;
use super::deploy::{Deployment, HighloadData, HighloadV3Data, WalletData};
use super::highload_v3::{
    check_timeout, pack_actions, self_transfer_mode, HighloadQueryId, HighloadV3Payload,
};
use super::signer::{
    prepare_external, HighloadPayload, PreparedMessage, SignerPayload, WalletPayload,
};
use super::{Stage, WalletVersion};
use crate::config::{HighloadConfig, HighloadV3Config, WalletConfig};
use crate::error::{Error, SendError};
use crate::models::{Address, InternalMessage, StateInit};
use crate::transport::{get_seqno, SendStatus, Transport};

/// Default lifetime of a signed message in seconds.
pub const DEFAULT_MESSAGE_TTL: u32 = 60;

/// Default lifetime of a high-load query id in seconds.
pub const DEFAULT_QUERY_TIMEOUT: u32 = 120;

/// Regular (v3/v4) wallet.
pub struct Wallet {
    version: WalletVersion,
    subwallet_id: u32,
    address: Address,
    deployment: Option<Deployment>,
    message_ttl: u32,
    signing_key: SigningKey,
}

impl Wallet {
    /// Creates a wallet from its code, deriving the address.
    pub fn new(
        version: WalletVersion,
        code: Cell,
        subwallet_id: u32,
        workchain: i8,
        signing_key: SigningKey,
    ) -> Result<Self, Error> {
        let public_key = HashBytes(signing_key.verifying_key().to_bytes());
        let data = WalletData::new(version, subwallet_id, public_key);
        let deployment = ok!(Deployment::with_data(code, &data, workchain));

        tracing::debug!(
            ?version,
            subwallet_id,
            address = %deployment.address,
            "wallet address derived"
        );

        Ok(Self {
            version,
            subwallet_id,
            address: deployment.address,
            deployment: Some(deployment),
            message_ttl: DEFAULT_MESSAGE_TTL,
            signing_key,
        })
    }

    /// Creates a wallet from the config.
    pub fn from_config(config: &WalletConfig, signing_key: SigningKey) -> Result<Self, Error> {
        let mut wallet = ok!(Self::new(
            config.version,
            config.code.clone(),
            config.subwallet_id,
            config.workchain,
            signing_key,
        ));
        wallet.message_ttl = config.message_ttl;
        Ok(wallet)
    }

    /// Creates an already deployed wallet with a known address.
    ///
    /// Such a wallet cannot produce a deployment message.
    pub fn existing(
        address: Address,
        version: WalletVersion,
        subwallet_id: u32,
        signing_key: SigningKey,
    ) -> Self {
        Self {
            version,
            subwallet_id,
            address,
            deployment: None,
            message_ttl: DEFAULT_MESSAGE_TTL,
            signing_key,
        }
    }

    /// Sets the lifetime of signed messages.
    pub fn with_message_ttl(mut self, message_ttl: u32) -> Self {
        self.message_ttl = message_ttl;
        self
    }

    /// Wallet address.
    #[inline]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Wallet generation.
    #[inline]
    pub fn version(&self) -> WalletVersion {
        self.version
    }

    /// Subwallet id.
    #[inline]
    pub fn subwallet_id(&self) -> u32 {
        self.subwallet_id
    }

    /// Owner public key.
    #[inline]
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Code and initial data, if the wallet was created from code.
    #[inline]
    pub fn deployment(&self) -> Option<&Deployment> {
        self.deployment.as_ref()
    }

    /// Builds the first message of the wallet: seqno is zero
    /// and the state init is attached.
    ///
    /// The batch may be empty, the contract is deployed anyway.
    pub fn prepare_deploy(
        &self,
        valid_until: u32,
        batch: SimpleBatch,
    ) -> Result<PreparedMessage, Error> {
        let Some(deployment) = &self.deployment else {
            return Err(Error::MissingStateInit.at(Stage::CollectIntent));
        };
        self.prepare(0, valid_until, batch, Some(deployment.state_init.clone()))
    }

    /// Builds a transfer from the deployed wallet.
    pub fn prepare_transfer(
        &self,
        seqno: u32,
        valid_until: u32,
        batch: SimpleBatch,
    ) -> Result<PreparedMessage, Error> {
        if batch.is_empty() {
            return Err(Error::EmptyBatch.at(Stage::CollectIntent));
        }
        self.prepare(seqno, valid_until, batch, None)
    }

    /// Reads the current seqno, builds a transfer and submits it.
    pub async fn send<T>(
        &self,
        transport: &T,
        now: u32,
        batch: SimpleBatch,
    ) -> Result<PreparedMessage, SendError>
    where
        T: Transport + ?Sized,
    {
        let seqno = get_seqno(transport, &self.address).await?;
        let valid_until = now.saturating_add(self.message_ttl);
        let prepared = self.prepare_transfer(seqno, valid_until, batch)?;
        submit(transport, &prepared).await?;
        Ok(prepared)
    }

    /// Builds the deployment message and submits it.
    pub async fn deploy<T>(
        &self,
        transport: &T,
        now: u32,
        batch: SimpleBatch,
    ) -> Result<PreparedMessage, SendError>
    where
        T: Transport + ?Sized,
    {
        let valid_until = now.saturating_add(self.message_ttl);
        let prepared = self.prepare_deploy(valid_until, batch)?;
        submit(transport, &prepared).await?;
        Ok(prepared)
    }

    fn prepare(
        &self,
        seqno: u32,
        valid_until: u32,
        batch: SimpleBatch,
        init: Option<StateInit>,
    ) -> Result<PreparedMessage, Error> {
        tracing::debug!(
            stage = %Stage::CollectIntent,
            address = %self.address,
            seqno,
            valid_until,
            messages = batch.len(),
            "collected transfers"
        );

        let payload = SignerPayload::Wallet(WalletPayload {
            version: self.version,
            subwallet_id: self.subwallet_id,
            valid_until,
            seqno,
            batch,
        });
        prepare_external(self.address, init, &payload, &self.signing_key)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("version", &self.version)
            .field("subwallet_id", &self.subwallet_id)
            .field("address", &self.address)
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// High-load wallet v2.
///
/// Replay protection relies only on unique query ids, see [`QueryId`].
pub struct HighloadWallet {
    subwallet_id: u32,
    address: Address,
    deployment: Option<Deployment>,
    query_timeout: u32,
    signing_key: SigningKey,
}

impl HighloadWallet {
    /// Creates a wallet from its code, deriving the address.
    pub fn new(
        code: Cell,
        subwallet_id: u32,
        workchain: i8,
        signing_key: SigningKey,
    ) -> Result<Self, Error> {
        let public_key = HashBytes(signing_key.verifying_key().to_bytes());
        let data = HighloadData::new(subwallet_id, public_key);
        let deployment = ok!(Deployment::with_data(code, &data, workchain));

        tracing::debug!(
            subwallet_id,
            address = %deployment.address,
            "highload wallet address derived"
        );

        Ok(Self {
            subwallet_id,
            address: deployment.address,
            deployment: Some(deployment),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            signing_key,
        })
    }

    /// Creates a wallet from the config.
    pub fn from_config(config: &HighloadConfig, signing_key: SigningKey) -> Result<Self, Error> {
        let mut wallet = ok!(Self::new(
            config.code.clone(),
            config.subwallet_id,
            config.workchain,
            signing_key,
        ));
        wallet.query_timeout = config.query_timeout;
        Ok(wallet)
    }

    /// Creates an already deployed wallet with a known address.
    pub fn existing(address: Address, subwallet_id: u32, signing_key: SigningKey) -> Self {
        Self {
            subwallet_id,
            address,
            deployment: None,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            signing_key,
        }
    }

    /// Wallet address.
    #[inline]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Subwallet id.
    #[inline]
    pub fn subwallet_id(&self) -> u32 {
        self.subwallet_id
    }

    /// Owner public key.
    #[inline]
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Code and initial data, if the wallet was created from code.
    #[inline]
    pub fn deployment(&self) -> Option<&Deployment> {
        self.deployment.as_ref()
    }

    /// Generates a fresh query id which expires after the configured timeout.
    pub fn next_query_id(&self, now: u32) -> QueryId {
        QueryId::generate(now, self.query_timeout)
    }

    /// Creates an internal message which deploys this wallet when sent
    /// from another, already deployed wallet.
    pub fn deploy_via(&self, amount: Tokens) -> Result<InternalMessage, Error> {
        match &self.deployment {
            Some(deployment) => Ok(deployment.internal_message(amount, None)),
            None => Err(Error::MissingStateInit.at(Stage::CollectIntent)),
        }
    }

    /// Builds a batch message of the deployed wallet.
    pub fn prepare_batch(
        &self,
        query_id: QueryId,
        batch: &HighloadBatch,
    ) -> Result<PreparedMessage, Error> {
        tracing::debug!(
            stage = %Stage::CollectIntent,
            address = %self.address,
            %query_id,
            expire_at = query_id.expire_at(),
            messages = batch.len(),
            "collected transfers"
        );

        if batch.is_empty() {
            return Err(Error::EmptyBatch.at(Stage::CollectIntent));
        }
        let payload = match HighloadPayload::new(self.subwallet_id, query_id, batch) {
            Ok(payload) => SignerPayload::Highload(payload),
            Err(e) => return Err(e.at(Stage::CollectIntent)),
        };
        prepare_external(self.address, None, &payload, &self.signing_key)
    }

    /// Builds a batch message and submits it.
    pub async fn send<T>(
        &self,
        transport: &T,
        query_id: QueryId,
        batch: &HighloadBatch,
    ) -> Result<PreparedMessage, SendError>
    where
        T: Transport + ?Sized,
    {
        let prepared = self.prepare_batch(query_id, batch)?;
        submit(transport, &prepared).await?;
        Ok(prepared)
    }
}

impl std::fmt::Debug for HighloadWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighloadWallet")
            .field("subwallet_id", &self.subwallet_id)
            .field("address", &self.address)
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// High-load wallet v3.
///
/// Replay protection relies on query ids which are unique within
/// the timeout window, see [`HighloadQueryId`].
pub struct HighloadV3Wallet {
    subwallet_id: u32,
    timeout: u32,
    address: Address,
    deployment: Option<Deployment>,
    signing_key: SigningKey,
}

impl HighloadV3Wallet {
    /// Creates a wallet from its code, deriving the address.
    pub fn new(
        code: Cell,
        subwallet_id: u32,
        timeout: u32,
        workchain: i8,
        signing_key: SigningKey,
    ) -> Result<Self, Error> {
        let timeout = ok!(check_timeout(timeout));
        let public_key = HashBytes(signing_key.verifying_key().to_bytes());
        let data = HighloadV3Data::new(subwallet_id, timeout, public_key);
        let deployment = ok!(Deployment::with_data(code, &data, workchain));

        tracing::debug!(
            subwallet_id,
            timeout,
            address = %deployment.address,
            "highload v3 wallet address derived"
        );

        Ok(Self {
            subwallet_id,
            timeout,
            address: deployment.address,
            deployment: Some(deployment),
            signing_key,
        })
    }

    /// Creates a wallet from the config.
    pub fn from_config(config: &HighloadV3Config, signing_key: SigningKey) -> Result<Self, Error> {
        Self::new(
            config.code.clone(),
            config.subwallet_id,
            config.timeout,
            config.workchain,
            signing_key,
        )
    }

    /// Creates an already deployed wallet with a known address.
    ///
    /// The timeout must be the one stored in the contract data.
    pub fn existing(
        address: Address,
        subwallet_id: u32,
        timeout: u32,
        signing_key: SigningKey,
    ) -> Result<Self, Error> {
        Ok(Self {
            subwallet_id,
            timeout: ok!(check_timeout(timeout)),
            address,
            deployment: None,
            signing_key,
        })
    }

    /// Wallet address.
    #[inline]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Subwallet id.
    #[inline]
    pub fn subwallet_id(&self) -> u32 {
        self.subwallet_id
    }

    /// Lifetime of a query in seconds.
    #[inline]
    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    /// Owner public key.
    #[inline]
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Code and initial data, if the wallet was created from code.
    #[inline]
    pub fn deployment(&self) -> Option<&Deployment> {
        self.deployment.as_ref()
    }

    /// Creates an internal message which deploys this wallet when sent
    /// from another, already deployed wallet.
    pub fn deploy_via(&self, amount: Tokens) -> Result<InternalMessage, Error> {
        match &self.deployment {
            Some(deployment) => Ok(deployment.internal_message(amount, None)),
            None => Err(Error::MissingStateInit.at(Stage::CollectIntent)),
        }
    }

    /// Builds a batch message of the deployed wallet.
    ///
    /// The wallet sends `value` to itself together with the action list.
    /// `created_at` must not be in the future for the contract, and the
    /// message expires `timeout` seconds after it.
    pub fn prepare_batch(
        &self,
        query_id: HighloadQueryId,
        created_at: u64,
        transfers: &[Transfer],
        value: Tokens,
    ) -> Result<PreparedMessage, Error> {
        tracing::debug!(
            stage = %Stage::CollectIntent,
            address = %self.address,
            %query_id,
            created_at,
            messages = transfers.len(),
            "collected transfers"
        );

        if transfers.is_empty() {
            return Err(Error::EmptyBatch.at(Stage::CollectIntent));
        }
        let message = match pack_actions(self.address, transfers, value, query_id) {
            Ok(message) => message,
            Err(e) => return Err(e.at(Stage::BuildPayload)),
        };

        let payload = SignerPayload::HighloadV3(HighloadV3Payload {
            subwallet_id: self.subwallet_id,
            message,
            mode: self_transfer_mode(value),
            query_id,
            created_at,
            timeout: self.timeout,
        });
        prepare_external(self.address, None, &payload, &self.signing_key)
    }

    /// Builds a batch message and submits it.
    pub async fn send<T>(
        &self,
        transport: &T,
        query_id: HighloadQueryId,
        created_at: u64,
        transfers: &[Transfer],
        value: Tokens,
    ) -> Result<PreparedMessage, SendError>
    where
        T: Transport + ?Sized,
    {
        let prepared = self.prepare_batch(query_id, created_at, transfers, value)?;
        submit(transport, &prepared).await?;
        Ok(prepared)
    }
}

impl std::fmt::Debug for HighloadV3Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighloadV3Wallet")
            .field("subwallet_id", &self.subwallet_id)
            .field("timeout", &self.timeout)
            .field("address", &self.address)
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// Submits a prepared message.
///
/// A refusal of the wallet contract is reported as [`SendError::Rejected`],
/// a failed delivery as [`SendError::Transport`].
pub async fn submit<T>(transport: &T, prepared: &PreparedMessage) -> Result<(), SendError>
where
    T: Transport + ?Sized,
{
    match transport.send_message(&prepared.to_boc()).await? {
        SendStatus::Accepted => {
            tracing::info!(
                stage = %Stage::Submitted,
                dst = %prepared.dst(),
                hash = %prepared.hash(),
                "external message submitted"
            );
            Ok(())
        }
        SendStatus::Rejected(reason) => {
            tracing::warn!(
                dst = %prepared.dst(),
                hash = %prepared.hash(),
                %reason,
                "external message rejected"
            );
            Err(SendError::Rejected(reason))
        }
    }
}
