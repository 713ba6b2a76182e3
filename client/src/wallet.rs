//! Wallet provider abstraction and the connect/sign bridge.
//!
//! Providers surface their own numeric codes and message strings; those are
//! normalized here into the stable [`ClientError`] taxonomy so nothing
//! upstream ever branches on provider wire errors.

use std::path::Path;
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

use crate::context::AppContext;
use crate::error::{ClientError, Result};

/// Provider error code for a user-rejected request.
const CODE_USER_REJECTED: i64 = 4001;
/// Provider error code for an already-pending request.
const CODE_REQUEST_PENDING: i64 = -32002;

/// Raw error surfaced by a wallet provider.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn matches(&self, code: i64, needle: &str) -> bool {
        self.code == Some(code) || self.message.to_lowercase().contains(needle)
    }
}

/// One installed wallet capability set: connect, sign message, sign
/// transaction.
#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
    /// Brand flag the registry matches on.
    fn brand(&self) -> &str;

    /// Key of an already-connected session, if any.
    fn connected_key(&self) -> Option<Pubkey>;

    /// `only_if_trusted` must never prompt; it fails for untrusted origins.
    async fn connect(&self, only_if_trusted: bool)
        -> std::result::Result<Pubkey, ProviderError>;

    /// Detached signature over opaque bytes.
    async fn sign_message(&self, message: &[u8])
        -> std::result::Result<Vec<u8>, ProviderError>;

    async fn sign_transaction(
        &self,
        tx: Transaction,
    ) -> std::result::Result<Transaction, ProviderError>;
}

/// Set of injected providers, searched by brand flag.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn WalletProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn WalletProvider>) {
        self.providers.push(provider);
    }

    /// First provider matching the brand. Absence is a normal condition,
    /// not an error.
    pub fn locate(&self, brand: &str) -> Option<Arc<dyn WalletProvider>> {
        self.providers.iter().find(|p| p.brand() == brand).cloned()
    }
}

/// Connect request mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Never prompts; yields no key unless the origin is already trusted.
    Silent,
    /// May prompt. Must run inside the originating user gesture, with no
    /// network round trip in between, or the popup gets blocked.
    Interactive,
}

/// Provider handle plus the key it connected with.
///
/// Sign calls reuse this exact handle rather than re-resolving the
/// provider; re-resolving triggers a second wallet popup.
#[derive(Clone)]
pub struct WalletSession {
    pub provider: Arc<dyn WalletProvider>,
    pub public_key: Pubkey,
}

/// Connect/sign lifecycle over one wallet brand.
pub struct WalletBridge {
    registry: ProviderRegistry,
    brand: String,
}

impl WalletBridge {
    pub fn new(registry: ProviderRegistry, brand: impl Into<String>) -> Self {
        Self {
            registry,
            brand: brand.into(),
        }
    }

    pub fn locate(&self) -> Option<Arc<dyn WalletProvider>> {
        self.registry.locate(&self.brand)
    }

    /// Interactive connect. Fails fast if another wallet request is in
    /// flight.
    pub async fn connect(&self, ctx: &AppContext, mode: ConnectMode) -> Result<WalletSession> {
        let provider = self.locate().ok_or(ClientError::ProviderNotFound)?;
        let _permit = ctx.wallet_flight.acquire()?;
        let public_key = provider
            .connect(mode == ConnectMode::Silent)
            .await
            .map_err(map_connect_error)?;
        tracing::debug!(wallet = %public_key, ?mode, "wallet connected");
        Ok(WalletSession {
            provider,
            public_key,
        })
    }

    /// Silent connect; `None` when the origin is not yet trusted.
    pub async fn connect_silent(&self, ctx: &AppContext) -> Result<Option<WalletSession>> {
        match self.connect(ctx, ConnectMode::Silent).await {
            Ok(session) => Ok(Some(session)),
            Err(ClientError::ConnectionRejected) => Ok(None),
            Err(other) => Err(other),
        }
    }

    pub async fn sign_message(
        &self,
        ctx: &AppContext,
        session: &WalletSession,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        let _permit = ctx.wallet_flight.acquire()?;
        session
            .provider
            .sign_message(message)
            .await
            .map_err(map_sign_error)
    }

    pub async fn sign_transaction(
        &self,
        ctx: &AppContext,
        session: &WalletSession,
        tx: Transaction,
    ) -> Result<Transaction> {
        let _permit = ctx.wallet_flight.acquire()?;
        session
            .provider
            .sign_transaction(tx)
            .await
            .map_err(map_sign_error)
    }
}

fn map_connect_error(err: ProviderError) -> ClientError {
    if err.matches(CODE_USER_REJECTED, "rejected") {
        ClientError::ConnectionRejected
    } else if err.matches(CODE_REQUEST_PENDING, "pending") {
        ClientError::RequestAlreadyPending
    } else {
        ClientError::Provider(err.message)
    }
}

pub(crate) fn map_sign_error(err: ProviderError) -> ClientError {
    if err.matches(CODE_USER_REJECTED, "rejected") {
        ClientError::SignatureRejected
    } else if err.matches(CODE_REQUEST_PENDING, "pending") {
        ClientError::RequestAlreadyPending
    } else if err.message.to_lowercase().contains("not supported") {
        ClientError::SignatureUnsupported
    } else {
        ClientError::Provider(err.message)
    }
}

/// Local-keypair provider used by the CLI; signs without any prompt.
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub const BRAND: &'static str = "keypair";

    pub fn from_file(path: &Path) -> Result<Self> {
        let keypair =
            read_keypair_file(path).map_err(|e| ClientError::Keypair(e.to_string()))?;
        Ok(Self { keypair })
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

#[async_trait::async_trait]
impl WalletProvider for KeypairWallet {
    fn brand(&self) -> &str {
        Self::BRAND
    }

    fn connected_key(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    async fn connect(
        &self,
        _only_if_trusted: bool,
    ) -> std::result::Result<Pubkey, ProviderError> {
        Ok(self.keypair.pubkey())
    }

    async fn sign_message(
        &self,
        message: &[u8],
    ) -> std::result::Result<Vec<u8>, ProviderError> {
        Ok(self.keypair.sign_message(message).as_ref().to_vec())
    }

    async fn sign_transaction(
        &self,
        mut tx: Transaction,
    ) -> std::result::Result<Transaction, ProviderError> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_sign(&[&self.keypair], blockhash)
            .map_err(|e| ProviderError::new(None, e.to_string()))?;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_errors_normalize() {
        assert!(matches!(
            map_connect_error(ProviderError::new(Some(4001), "User rejected the request.")),
            ClientError::ConnectionRejected
        ));
        assert!(matches!(
            map_connect_error(ProviderError::new(None, "Connection rejected")),
            ClientError::ConnectionRejected
        ));
        assert!(matches!(
            map_connect_error(ProviderError::new(Some(-32002), "resource unavailable")),
            ClientError::RequestAlreadyPending
        ));
        assert!(matches!(
            map_connect_error(ProviderError::new(None, "request already pending")),
            ClientError::RequestAlreadyPending
        ));
        assert!(matches!(
            map_connect_error(ProviderError::new(Some(-1), "boom")),
            ClientError::Provider(_)
        ));
    }

    #[test]
    fn sign_errors_normalize() {
        assert!(matches!(
            map_sign_error(ProviderError::new(Some(4001), "User rejected")),
            ClientError::SignatureRejected
        ));
        assert!(matches!(
            map_sign_error(ProviderError::new(None, "signMessage not supported")),
            ClientError::SignatureUnsupported
        ));
    }
}
