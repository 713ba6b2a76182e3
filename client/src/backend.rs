//! REST collaborator: auth challenge endpoints, contract drafts, funding
//! confirmation, and the public wallet configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::WalletConfig;
use crate::error::{ClientError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NonceRequest<'a> {
    wallet_address: &'a str,
    chain: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub nonce: String,
    pub account_exists: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub wallet_address: String,
    /// Base58-encoded detached signature over the login message.
    pub signature: String,
    pub nonce: String,
    pub chain: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    /// Absent token in a 2xx response is a failure, never a success.
    pub token: Option<String>,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub uuid: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Pre-chain draft of a contract, stored backend-side before any signing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDraft {
    pub freelancer_user_uuid: String,
    pub amount_total_usdc: String,
    pub title: String,
    pub description: String,
    pub checkpoints: Vec<String>,
    pub start_at: String,
    pub end_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    pub uuid: String,
    #[serde(default, alias = "contractId32Hex")]
    pub contract_id32_hex: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContractEnvelope {
    contract: ContractRecord,
}

/// Funding confirmation sent after on-chain initialization lands.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingNotice {
    pub escrow_state_pda: String,
    pub vault_pda: String,
    pub tx_sig: String,
}

/// Marketplace backend surface the escrow flows depend on.
#[async_trait::async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn auth_nonce(&self, wallet_address: &str, chain: &str) -> Result<NonceResponse>;
    async fn auth_verify(&self, request: &VerifyRequest) -> Result<VerifyResponse>;
    async fn wallet_config(&self) -> Result<WalletConfig>;
    async fn create_contract(&self, token: &str, draft: &ContractDraft)
        -> Result<ContractRecord>;
    async fn fund_contract(
        &self,
        token: &str,
        uuid: &str,
        notice: &FundingNotice,
    ) -> Result<ContractRecord>;
}

/// `reqwest`-backed implementation of [`MarketplaceApi`].
pub struct HttpApi {
    base: Url,
    http: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self> {
        // Url::join drops the last path segment without a trailing slash.
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        Ok(Self {
            base,
            http: reqwest::Client::new(),
        })
    }

    async fn post<B, T>(&self, path: &str, token: Option<&str>, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = self.base.join(path)?;
        let mut request = self.http.post(url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        decode_response(request.send().await?).await
    }

    async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.base.join(path)?;
        decode_response(self.http.get(url).send().await?).await
    }
}

#[async_trait::async_trait]
impl MarketplaceApi for HttpApi {
    async fn auth_nonce(&self, wallet_address: &str, chain: &str) -> Result<NonceResponse> {
        self.post(
            "auth/nonce",
            None,
            &NonceRequest {
                wallet_address,
                chain,
            },
        )
        .await
    }

    async fn auth_verify(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        self.post("auth/verify", None, request).await
    }

    async fn wallet_config(&self) -> Result<WalletConfig> {
        self.get("wallet/config").await
    }

    async fn create_contract(
        &self,
        token: &str,
        draft: &ContractDraft,
    ) -> Result<ContractRecord> {
        let envelope: ContractEnvelope = self.post("contracts", Some(token), draft).await?;
        Ok(envelope.contract)
    }

    async fn fund_contract(
        &self,
        token: &str,
        uuid: &str,
        notice: &FundingNotice,
    ) -> Result<ContractRecord> {
        let envelope: ContractEnvelope = self
            .post(&format!("contracts/{uuid}/fund"), Some(token), notice)
            .await?;
        Ok(envelope.contract)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: Option<String>,
}

/// A 401 anywhere, or an "expired" message, means the session is dead.
async fn decode_response<T>(response: reqwest::Response) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message.unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
    };
    if status.as_u16() == 401 || message.to_lowercase().contains("expired") {
        return Err(ClientError::SessionExpired);
    }
    Err(ClientError::Backend {
        status: status.as_u16(),
        message,
    })
}
