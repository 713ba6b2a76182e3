//! Read and submit surface against a Solana node.

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use paylance_core::EscrowContract;

use crate::error::{ClientError, Result};
use crate::state::decode_escrow_state;

/// The slice of an SPL token account the validations need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountInfo {
    pub owner: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
}

/// Chain access behind a trait so workflows are testable without a node.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    async fn mint_decimals(&self, mint: &Pubkey) -> Result<u8>;
    async fn token_account(&self, address: &Pubkey) -> Result<Option<TokenAccountInfo>>;
    async fn escrow_state(&self, address: &Pubkey) -> Result<Option<EscrowContract>>;
    async fn latest_blockhash(&self) -> Result<Hash>;
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature>;
}

pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(owner, mint)
}

/// Get-or-create for an associated token account. Returns the derived
/// address plus, when the account does not exist yet, the idempotent
/// create instruction to prepend.
pub async fn ensure_associated_token_account(
    reader: &dyn ChainReader,
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<(Pubkey, Option<Instruction>)> {
    let address = associated_token_address(owner, mint);
    if reader.token_account(&address).await?.is_some() {
        return Ok((address, None));
    }
    let ix = spl_associated_token_account::instruction::create_associated_token_account_idempotent(
        payer,
        owner,
        mint,
        &spl_token::ID,
    );
    Ok((address, Some(ix)))
}

/// JSON-RPC implementation of [`ChainReader`].
pub struct RpcReader {
    rpc: RpcClient,
}

impl RpcReader {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(
                rpc_url.to_string(),
                CommitmentConfig::confirmed(),
            ),
        }
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.rpc.commitment())
            .await?;
        Ok(response.value.map(|account| account.data))
    }
}

#[async_trait::async_trait]
impl ChainReader for RpcReader {
    async fn mint_decimals(&self, mint: &Pubkey) -> Result<u8> {
        let data = self
            .account_data(mint)
            .await?
            .ok_or_else(|| ClientError::AccountMissing(mint.to_string()))?;
        let state = spl_token::state::Mint::unpack(&data)
            .map_err(|e| ClientError::Decode(format!("mint {mint}: {e}")))?;
        Ok(state.decimals)
    }

    async fn token_account(&self, address: &Pubkey) -> Result<Option<TokenAccountInfo>> {
        let Some(data) = self.account_data(address).await? else {
            return Ok(None);
        };
        let account = spl_token::state::Account::unpack(&data)
            .map_err(|e| ClientError::Decode(format!("token account {address}: {e}")))?;
        Ok(Some(TokenAccountInfo {
            owner: account.owner,
            mint: account.mint,
            amount: account.amount,
        }))
    }

    async fn escrow_state(&self, address: &Pubkey) -> Result<Option<EscrowContract>> {
        match self.account_data(address).await? {
            Some(data) => Ok(Some(decode_escrow_state(&data)?)),
            None => Ok(None),
        }
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        Ok(self.rpc.get_latest_blockhash().await?)
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature> {
        let signature = self.rpc.send_and_confirm_transaction(tx).await?;
        tracing::info!(%signature, "transaction confirmed");
        Ok(signature)
    }
}
