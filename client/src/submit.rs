//! Top-level contract submission workflow.
//!
//! Five steps in strict program order, each consuming the previous step's
//! output: resolve wallet, validate terms, create the backend draft,
//! initialize on chain, confirm funding. A failure aborts every later step
//! and reports which stage died plus the underlying error. Nothing is
//! retried automatically; retrying a financial transaction risks double
//! submission, so every retry is a fresh user action.

use rand::rngs::OsRng;
use rand::RngCore;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use paylance_core::amount::to_base_units;
use paylance_core::error::ValidationError;
use paylance_core::ContractId;

use crate::backend::{ContractDraft, FundingNotice, MarketplaceApi};
use crate::builder::{sign_and_submit, EscrowTransactionBuilder, InitializeTerms};
use crate::chain::{associated_token_address, ChainReader};
use crate::config::WalletConfig;
use crate::context::AppContext;
use crate::error::{ClientError, Result};
use crate::pda::EscrowAddresses;
use crate::wallet::{ConnectMode, WalletBridge};

/// Business fields collected from the user before submission.
#[derive(Debug, Clone)]
pub struct ContractForm {
    pub freelancer_user_uuid: String,
    /// The worker's wallet, the counterparty key in the derivation.
    pub freelancer_wallet: Pubkey,
    /// Human-readable decimal amount, e.g. `"250.50"`.
    pub amount_usdc: String,
    pub title: String,
    pub description: String,
    pub checkpoints: Vec<String>,
    pub start_at: String,
    pub end_at: String,
    pub job_id: Option<String>,
}

impl ContractForm {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("freelancerUserUuid", &self.freelancer_user_uuid),
            ("title", &self.title),
            ("startAt", &self.start_at),
            ("endAt", &self.end_at),
        ] {
            if value.trim().is_empty() {
                return Err(ClientError::Settings(format!("missing field: {field}")));
            }
        }
        if self.amount_usdc.trim().is_empty() {
            return Err(ValidationError::MalformedAmount(self.amount_usdc.clone()).into());
        }
        Ok(())
    }

    fn draft(&self) -> ContractDraft {
        ContractDraft {
            freelancer_user_uuid: self.freelancer_user_uuid.clone(),
            amount_total_usdc: self.amount_usdc.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            checkpoints: self.checkpoints.clone(),
            start_at: self.start_at.clone(),
            end_at: self.end_at.clone(),
            job_id: self.job_id.clone(),
        }
    }
}

/// Workflow stage, used to label failures for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    ResolveWallet,
    ValidateTerms,
    CreateDraft,
    SubmitOnChain,
    ConfirmFunding,
}

impl SubmitStage {
    /// User-facing status line for a failure at this stage.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ResolveWallet => "wallet connection failed",
            Self::ValidateTerms => "contract terms are invalid",
            Self::CreateDraft => "could not create the contract draft",
            Self::SubmitOnChain => "on-chain escrow initialization failed",
            Self::ConfirmFunding => "funding confirmation failed",
        }
    }
}

/// Which stage failed, plus the draft left behind if one was created.
///
/// A draft orphaned by a later on-chain failure is an accepted
/// inconsistency: the user re-attempts initialization against the same
/// draft. There is no safe automatic compensation for an abandoned wallet
/// prompt.
#[derive(Debug, thiserror::Error)]
#[error("{}: {source}", stage.user_message())]
pub struct SubmitError {
    pub stage: SubmitStage,
    pub draft_uuid: Option<String>,
    #[source]
    pub source: ClientError,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub contract_uuid: String,
    pub signature: Signature,
    pub addresses: EscrowAddresses,
}

/// Fresh random identifier, used when the backend draft does not assign
/// one.
pub fn generate_contract_id() -> ContractId {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    ContractId::new(bytes)
}

pub struct ContractSubmissionOrchestrator<'a> {
    ctx: &'a AppContext,
    api: &'a dyn MarketplaceApi,
    reader: &'a dyn ChainReader,
    bridge: &'a WalletBridge,
}

impl<'a> ContractSubmissionOrchestrator<'a> {
    pub fn new(
        ctx: &'a AppContext,
        api: &'a dyn MarketplaceApi,
        reader: &'a dyn ChainReader,
        bridge: &'a WalletBridge,
    ) -> Self {
        Self {
            ctx,
            api,
            reader,
            bridge,
        }
    }

    pub async fn submit(
        &self,
        config: &WalletConfig,
        form: &ContractForm,
    ) -> std::result::Result<SubmitOutcome, SubmitError> {
        let fail = |stage: SubmitStage, source: ClientError| SubmitError {
            stage,
            draft_uuid: None,
            source,
        };

        // Step 1: the connected wallet must be the authenticated one. A
        // different key means the user switched accounts in the extension;
        // proceeding would fund the escrow from the wrong identity.
        let session = self
            .ctx
            .session()
            .ok_or_else(|| fail(SubmitStage::ResolveWallet, ClientError::NotAuthenticated))?;
        let wallet = self
            .bridge
            .connect(self.ctx, ConnectMode::Interactive)
            .await
            .map_err(|e| fail(SubmitStage::ResolveWallet, e))?;
        if wallet.public_key.to_string() != session.wallet_address {
            return Err(fail(
                SubmitStage::ResolveWallet,
                ClientError::WalletMismatch {
                    connected: wallet.public_key.to_string(),
                    session: session.wallet_address,
                },
            ));
        }

        // Step 2: local validation, no further network or wallet calls.
        let validated = (|| -> Result<(Pubkey, u16)> {
            form.validate()?;
            config.validate()?;
            let mint = config.usdc_mint()?;
            let fee_bps = paylance_core::amount::validate_fee_bps(config.fee_bps)?;
            Ok((mint, fee_bps))
        })()
        .map_err(|e| fail(SubmitStage::ValidateTerms, e))?;
        let (mint, fee_bps) = validated;

        // Step 3: backend draft, the durable identifier the on-chain
        // record is bound to.
        let record = self
            .ctx
            .guard_session(self.api.create_contract(&session.token, &form.draft()).await)
            .map_err(|e| fail(SubmitStage::CreateDraft, e))?;
        let contract_id = match record.contract_id32_hex.as_deref() {
            Some(hex) => ContractId::from_hex(hex)
                .map_err(|e| fail(SubmitStage::CreateDraft, e.into()))?,
            None => generate_contract_id(),
        };
        let draft_uuid = record.uuid.clone();
        tracing::debug!(uuid = %draft_uuid, id = %contract_id, "draft created");

        let fail_chain = |source: ClientError| SubmitError {
            stage: SubmitStage::SubmitOnChain,
            draft_uuid: Some(draft_uuid.clone()),
            source,
        };

        // Step 4: preflight the funding source, then build and submit the
        // initialize instruction with the validated terms.
        let outcome = async {
            let decimals = self.reader.mint_decimals(&mint).await?;
            let amount = to_base_units(&form.amount_usdc, decimals)?;
            let source = associated_token_address(&wallet.public_key, &mint);
            let builder = EscrowTransactionBuilder::embedded(config.program_id()?)?;
            builder
                .preflight_funding(self.reader, &wallet.public_key, &mint, &source, amount)
                .await?;

            let terms = InitializeTerms {
                initializer: wallet.public_key,
                worker: form.freelancer_wallet,
                contract_id,
                amount,
                fee_bps,
                admin1: config.admin1()?,
                admin2: config.admin2()?,
                usdc_mint: mint,
                initializer_usdc_ata: source,
            };
            let (instruction, addresses) = builder.initialize_escrow(&terms)?;
            let signature =
                sign_and_submit(self.ctx, self.reader, &wallet, &[instruction]).await?;
            Ok::<_, ClientError>((signature, addresses))
        }
        .await
        .map_err(fail_chain)?;
        let (signature, addresses) = outcome;

        // Step 5: report the landed transaction so the backend marks the
        // contract funded.
        let notice = FundingNotice {
            escrow_state_pda: addresses.escrow_state.to_string(),
            vault_pda: addresses.vault.to_string(),
            tx_sig: signature.to_string(),
        };
        self.ctx
            .guard_session(
                self.api
                    .fund_contract(&session.token, &draft_uuid, &notice)
                    .await,
            )
            .map_err(|e| SubmitError {
                stage: SubmitStage::ConfirmFunding,
                draft_uuid: Some(draft_uuid.clone()),
                source: e,
            })?;

        tracing::info!(uuid = %draft_uuid, %signature, "contract funded");
        Ok(SubmitOutcome {
            contract_uuid: draft_uuid,
            signature,
            addresses,
        })
    }
}
