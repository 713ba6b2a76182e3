//! Wallet configuration blob and client settings.
//!
//! The backend publishes one public configuration document per deployment
//! carrying every immutable parameter the transaction builder needs. It is
//! fetched once per session and cached with a freshness window.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::backend::MarketplaceApi;
use crate::error::{ClientError, Result};

/// Circle's mainnet USDC mint; pairing it with a devnet label is a
/// misconfiguration that must abort before any signing.
pub const MAINNET_USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Public per-deployment configuration served by `GET /wallet/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    pub chain: String,
    #[serde(alias = "rpc_url")]
    pub rpc_url: String,
    #[serde(alias = "program_id")]
    pub program_id: String,
    #[serde(alias = "usdc_mint")]
    pub usdc_mint: String,
    #[serde(alias = "fee_bps")]
    pub fee_bps: u32,
    #[serde(alias = "fee_wallet")]
    pub fee_wallet: String,
    pub admin1: String,
    pub admin2: String,
}

impl WalletConfig {
    /// Network-consistency and shape checks, run before anything is signed.
    pub fn validate(&self) -> Result<()> {
        let devnet = self.chain.contains("devnet");
        let mainnet = self.chain.contains("mainnet");
        if devnet && self.usdc_mint == MAINNET_USDC_MINT {
            return Err(ClientError::ChainMismatch(format!(
                "chain `{}` paired with the mainnet USDC mint",
                self.chain
            )));
        }
        if devnet && self.rpc_url.contains("mainnet") {
            return Err(ClientError::ChainMismatch(format!(
                "chain `{}` paired with RPC endpoint {}",
                self.chain, self.rpc_url
            )));
        }
        if mainnet && self.rpc_url.contains("devnet") {
            return Err(ClientError::ChainMismatch(format!(
                "chain `{}` paired with RPC endpoint {}",
                self.chain, self.rpc_url
            )));
        }
        paylance_core::amount::validate_fee_bps(self.fee_bps)?;
        // Parse every address once up front so a typo fails here, not
        // mid-submission.
        self.program_id()?;
        self.usdc_mint()?;
        self.fee_wallet()?;
        self.admin1()?;
        self.admin2()?;
        Ok(())
    }

    pub fn program_id(&self) -> Result<Pubkey> {
        Ok(Pubkey::from_str(&self.program_id)?)
    }

    pub fn usdc_mint(&self) -> Result<Pubkey> {
        Ok(Pubkey::from_str(&self.usdc_mint)?)
    }

    pub fn fee_wallet(&self) -> Result<Pubkey> {
        Ok(Pubkey::from_str(&self.fee_wallet)?)
    }

    pub fn admin1(&self) -> Result<Pubkey> {
        Ok(Pubkey::from_str(&self.admin1)?)
    }

    pub fn admin2(&self) -> Result<Pubkey> {
        Ok(Pubkey::from_str(&self.admin2)?)
    }
}

/// Caches the wallet configuration for a freshness window.
pub struct ConfigCache {
    ttl: Duration,
    slot: Mutex<Option<(Instant, WalletConfig)>>,
}

impl ConfigCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached config while fresh, refetching otherwise.
    pub async fn get(&self, api: &dyn MarketplaceApi) -> Result<WalletConfig> {
        if let Some((fetched_at, config)) = self.lock_slot().clone() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(config);
            }
        }
        let config = api.wallet_config().await?;
        config.validate()?;
        *self.lock_slot() = Some((Instant::now(), config.clone()));
        Ok(config)
    }

    pub fn invalidate(&self) {
        *self.lock_slot() = None;
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<(Instant, WalletConfig)>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

/// Local CLI settings, loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(alias = "api_base_url")]
    pub api_base_url: String,
    #[serde(alias = "keypair_path")]
    pub keypair_path: PathBuf,
}

impl ClientSettings {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Settings(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ClientError::Settings(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::backend::{
        ContractDraft, ContractRecord, FundingNotice, NonceResponse, VerifyRequest,
        VerifyResponse,
    };

    fn devnet_config() -> WalletConfig {
        WalletConfig {
            chain: "devnet".into(),
            rpc_url: "https://api.devnet.solana.com".into(),
            program_id: "7ztZfuYcFzPF4tgy1iFkHhTNSowKFPGdUx3QNoGg12Re".into(),
            usdc_mint: "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".into(),
            fee_bps: 250,
            fee_wallet: "11111111111111111111111111111112".into(),
            admin1: "11111111111111111111111111111113".into(),
            admin2: "11111111111111111111111111111114".into(),
        }
    }

    #[test]
    fn accepts_consistent_devnet() {
        assert!(devnet_config().validate().is_ok());
    }

    #[test]
    fn rejects_mainnet_mint_on_devnet() {
        let mut config = devnet_config();
        config.usdc_mint = MAINNET_USDC_MINT.into();
        assert!(matches!(
            config.validate(),
            Err(ClientError::ChainMismatch(_))
        ));
    }

    #[test]
    fn rejects_cross_network_rpc() {
        let mut config = devnet_config();
        config.rpc_url = "https://api.mainnet-beta.solana.com".into();
        assert!(matches!(
            config.validate(),
            Err(ClientError::ChainMismatch(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_fee() {
        let mut config = devnet_config();
        config.fee_bps = 10_001;
        assert!(config.validate().is_err());
    }

    struct CountingApi {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MarketplaceApi for CountingApi {
        async fn auth_nonce(&self, _w: &str, _c: &str) -> Result<NonceResponse> {
            unreachable!()
        }
        async fn auth_verify(&self, _r: &VerifyRequest) -> Result<VerifyResponse> {
            unreachable!()
        }
        async fn wallet_config(&self) -> Result<WalletConfig> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(devnet_config())
        }
        async fn create_contract(&self, _t: &str, _d: &ContractDraft) -> Result<ContractRecord> {
            unreachable!()
        }
        async fn fund_contract(
            &self,
            _t: &str,
            _u: &str,
            _n: &FundingNotice,
        ) -> Result<ContractRecord> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn cache_fetches_once_within_ttl() {
        let api = CountingApi {
            calls: AtomicUsize::new(0),
        };
        let cache = ConfigCache::new(Duration::from_secs(60));
        let first = cache.get(&api).await.unwrap();
        let second = cache.get(&api).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);

        cache.invalidate();
        cache.get(&api).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn accepts_both_field_casings() {
        let camel: WalletConfig = serde_json::from_str(
            r#"{"chain":"devnet","rpcUrl":"https://api.devnet.solana.com",
                "programId":"7ztZfuYcFzPF4tgy1iFkHhTNSowKFPGdUx3QNoGg12Re",
                "usdcMint":"4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
                "feeBps":250,"feeWallet":"11111111111111111111111111111112",
                "admin1":"11111111111111111111111111111113",
                "admin2":"11111111111111111111111111111114"}"#,
        )
        .unwrap();
        let snake: WalletConfig = serde_json::from_str(
            r#"{"chain":"devnet","rpc_url":"https://api.devnet.solana.com",
                "program_id":"7ztZfuYcFzPF4tgy1iFkHhTNSowKFPGdUx3QNoGg12Re",
                "usdc_mint":"4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
                "fee_bps":250,"fee_wallet":"11111111111111111111111111111112",
                "admin1":"11111111111111111111111111111113",
                "admin2":"11111111111111111111111111111114"}"#,
        )
        .unwrap();
        assert_eq!(camel, snake);
    }
}
