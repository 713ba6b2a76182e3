//! Challenge/response sign-in: connect, fetch nonce, sign, verify.
//!
//! The flow is single-flight end to end, one layer above the wallet
//! bridge's own guard, so a second login attempt cannot raise a duplicate
//! popup. The mode gate runs before signing; a doomed flow must not cost
//! the user a signature.

use crate::backend::{MarketplaceApi, VerifyRequest};
use crate::context::{AppContext, AuthSession};
use crate::error::{ClientError, Result};
use crate::wallet::{ConnectMode, WalletBridge};

/// Fixed human-readable message the wallet signs; the nonce is the only
/// variable part.
pub fn login_message(nonce: &str) -> String {
    format!("Login nonce: {nonce}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }
}

pub struct AuthProtocol<'a> {
    bridge: &'a WalletBridge,
    api: &'a dyn MarketplaceApi,
    chain: String,
}

impl<'a> AuthProtocol<'a> {
    pub fn new(bridge: &'a WalletBridge, api: &'a dyn MarketplaceApi, chain: impl Into<String>) -> Self {
        Self {
            bridge,
            api,
            chain: chain.into(),
        }
    }

    /// Runs the full flow and, on success, installs the session in `ctx`.
    ///
    /// A failed attempt never touches an existing session; logout is the
    /// only path out of a verified one.
    pub async fn login(
        &self,
        ctx: &AppContext,
        mode: AuthMode,
        username: Option<String>,
    ) -> Result<AuthSession> {
        let _flight = ctx.login_flight.acquire()?;

        let wallet = self.bridge.connect(ctx, ConnectMode::Interactive).await?;
        let wallet_address = wallet.public_key.to_string();

        let challenge = self.api.auth_nonce(&wallet_address, &self.chain).await?;
        match mode {
            AuthMode::Register if challenge.account_exists => {
                return Err(ClientError::AccountExists)
            }
            AuthMode::Login if !challenge.account_exists => {
                return Err(ClientError::AccountNotFound)
            }
            _ => {}
        }

        // Reuses the provider handle from connect; re-resolving would open
        // a second popup.
        let message = login_message(&challenge.nonce);
        let signature = self
            .bridge
            .sign_message(ctx, &wallet, message.as_bytes())
            .await?;

        let request = VerifyRequest {
            wallet_address: wallet_address.clone(),
            signature: bs58::encode(signature).into_string(),
            nonce: challenge.nonce,
            chain: self.chain.clone(),
            mode: mode.as_str().to_string(),
            username,
        };
        let response = self.api.auth_verify(&request).await?;
        let token = response.token.ok_or(ClientError::TokenMissing)?;

        let session = AuthSession {
            wallet_address,
            chain: self.chain.clone(),
            token,
            user_uuid: response.user.uuid,
        };
        ctx.set_session(session.clone());
        tracing::info!(wallet = %session.wallet_address, "authenticated");
        Ok(session)
    }

    pub fn logout(&self, ctx: &AppContext) {
        ctx.clear_session();
        tracing::info!("logged out");
    }
}
