use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use solana_sdk::pubkey::Pubkey;

use paylance_client::auth::{AuthMode, AuthProtocol};
use paylance_client::backend::{HttpApi, MarketplaceApi};
use paylance_client::builder::{sign_and_submit, EscrowTransactionBuilder};
use paylance_client::chain::{ensure_associated_token_account, ChainReader, RpcReader};
use paylance_client::config::{ClientSettings, WalletConfig};
use paylance_client::context::AppContext;
use paylance_client::error::ClientError;
use paylance_client::submit::{ContractForm, ContractSubmissionOrchestrator};
use paylance_client::wallet::{
    ConnectMode, KeypairWallet, ProviderRegistry, WalletBridge, WalletSession,
};

const DEFAULT_SETTINGS_PATH: &str = "./paylance.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let cli = Cli::parse();
    let settings = ClientSettings::load(&cli.settings)?;
    let api = HttpApi::new(&settings.api_base_url)?;
    let config = api.wallet_config().await?;
    config.validate()?;

    let reader = RpcReader::new(&config.rpc_url);
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(KeypairWallet::from_file(&settings.keypair_path)?));
    let bridge = WalletBridge::new(registry, KeypairWallet::BRAND);
    let ctx = AppContext::new();
    let auth = AuthProtocol::new(&bridge, &api, config.chain.clone());

    match cli.command {
        Commands::Login { mode, username } => {
            let session = auth.login(&ctx, mode.into(), username).await?;
            tracing::info!(wallet = %session.wallet_address, user = %session.user_uuid, "signed in");
        }
        Commands::Create {
            freelancer_uuid,
            freelancer_wallet,
            amount,
            title,
            description,
            checkpoint,
            start,
            end,
            job_id,
        } => {
            auth.login(&ctx, AuthMode::Login, None).await?;
            let form = ContractForm {
                freelancer_user_uuid: freelancer_uuid,
                freelancer_wallet: Pubkey::from_str(&freelancer_wallet)
                    .map_err(ClientError::from)?,
                amount_usdc: amount,
                title,
                description,
                checkpoints: checkpoint,
                start_at: start,
                end_at: end,
                job_id,
            };
            let orchestrator = ContractSubmissionOrchestrator::new(&ctx, &api, &reader, &bridge);
            let outcome = orchestrator.submit(&config, &form).await?;
            tracing::info!(
                uuid = %outcome.contract_uuid,
                escrow_state = %outcome.addresses.escrow_state,
                vault = %outcome.addresses.vault,
                signature = %outcome.signature,
                "contract created and funded"
            );
        }
        Commands::Accept { escrow_state } => {
            let (contract, builder, wallet) =
                prepare(&config, &reader, &bridge, &ctx, &escrow_state).await?;
            let ix = builder.worker_accept(&contract, wallet.public_key)?;
            let sig = sign_and_submit(&ctx, &reader, &wallet, &[ix]).await?;
            tracing::info!(%sig, "escrow accepted");
        }
        Commands::Approve { escrow_state, side } => {
            let (contract, builder, wallet) =
                prepare(&config, &reader, &bridge, &ctx, &escrow_state).await?;
            let ix = match side {
                Side::Employer => {
                    builder.employer_approve_completion(&contract, wallet.public_key)?
                }
                Side::Worker => builder.worker_approve_completion(&contract, wallet.public_key)?,
            };
            let sig = sign_and_submit(&ctx, &reader, &wallet, &[ix]).await?;
            tracing::info!(%sig, "completion approved");
        }
        Commands::Dispute { escrow_state } => {
            let (contract, builder, wallet) =
                prepare(&config, &reader, &bridge, &ctx, &escrow_state).await?;
            let ix = builder.open_dispute(&contract, wallet.public_key)?;
            let sig = sign_and_submit(&ctx, &reader, &wallet, &[ix]).await?;
            tracing::info!(%sig, "dispute opened");
        }
        Commands::Vote {
            escrow_state,
            for_worker,
        } => {
            let (contract, builder, wallet) =
                prepare(&config, &reader, &bridge, &ctx, &escrow_state).await?;
            let ix = builder.admin_vote(&contract, wallet.public_key, for_worker)?;
            let sig = sign_and_submit(&ctx, &reader, &wallet, &[ix]).await?;
            tracing::info!(%sig, for_worker, "vote cast");
        }
        Commands::Release { escrow_state, via } => {
            let (contract, builder, wallet) =
                prepare(&config, &reader, &bridge, &ctx, &escrow_state).await?;
            let release = match via {
                ReleasePath::Mutual => {
                    builder.release_if_both_approved(&contract, wallet.public_key)?
                }
                ReleasePath::Admin => builder.release_to_worker(&contract, wallet.public_key)?,
            };
            // The worker and fee destinations may not exist yet; create
            // them in the same transaction.
            let mint = Pubkey::new_from_array(contract.usdc_mint);
            let mut instructions = Vec::new();
            for owner in [
                Pubkey::new_from_array(contract.worker),
                Pubkey::new_from_array(contract.fee_wallet),
            ] {
                let (_, create) =
                    ensure_associated_token_account(&reader, &wallet.public_key, &owner, &mint)
                        .await?;
                instructions.extend(create);
            }
            instructions.push(release);
            let sig = sign_and_submit(&ctx, &reader, &wallet, &instructions).await?;
            tracing::info!(%sig, "funds released to worker");
        }
        Commands::Refund { escrow_state } => {
            let (contract, builder, wallet) =
                prepare(&config, &reader, &bridge, &ctx, &escrow_state).await?;
            let refund = builder.refund_to_employer(&contract, wallet.public_key)?;
            let mint = Pubkey::new_from_array(contract.usdc_mint);
            let (_, create) = ensure_associated_token_account(
                &reader,
                &wallet.public_key,
                &Pubkey::new_from_array(contract.initializer),
                &mint,
            )
            .await?;
            let mut instructions: Vec<_> = create.into_iter().collect();
            instructions.push(refund);
            let sig = sign_and_submit(&ctx, &reader, &wallet, &instructions).await?;
            tracing::info!(%sig, "funds refunded to employer");
        }
        Commands::Show { escrow_state } => {
            let address = Pubkey::from_str(&escrow_state).map_err(ClientError::from)?;
            let contract = reader
                .escrow_state(&address)
                .await?
                .ok_or_else(|| ClientError::AccountMissing(escrow_state.clone()))?;
            let mint = Pubkey::new_from_array(contract.usdc_mint);
            let decimals = reader.mint_decimals(&mint).await?;
            let amount = paylance_core::amount::format_base_units(contract.amount, decimals)
                .map_err(ClientError::from)?;
            println!("status:    {}", contract.status);
            println!("amount:    {amount} USDC");
            println!("fee:       {} bps", contract.fee_bps);
            println!("employer:  {}", Pubkey::new_from_array(contract.initializer));
            println!("worker:    {}", Pubkey::new_from_array(contract.worker));
            println!("vault:     {}", Pubkey::new_from_array(contract.vault));
            println!(
                "approvals: employer={} worker={}",
                contract.employer_approved, contract.worker_approved
            );
            println!(
                "votes:     worker={} employer={} finalized={}",
                contract.votes_for_worker, contract.votes_for_employer, contract.finalized
            );
        }
    }

    Ok(())
}

/// Fetches the escrow record and connects the wallet for a lifecycle call.
async fn prepare(
    config: &WalletConfig,
    reader: &RpcReader,
    bridge: &WalletBridge,
    ctx: &AppContext,
    escrow_state: &str,
) -> anyhow::Result<(
    paylance_core::EscrowContract,
    EscrowTransactionBuilder,
    WalletSession,
)> {
    let address = Pubkey::from_str(escrow_state).map_err(ClientError::from)?;
    let contract = reader
        .escrow_state(&address)
        .await?
        .ok_or_else(|| ClientError::AccountMissing(escrow_state.to_string()))?;
    let builder = EscrowTransactionBuilder::embedded(config.program_id()?)?;
    let wallet = bridge.connect(ctx, ConnectMode::Interactive).await?;
    Ok((contract, builder, wallet))
}

#[derive(Parser)]
#[command(name = "paylance-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local settings file (API base URL, keypair path).
    #[arg(short, long,
        value_parser,
        default_value = DEFAULT_SETTINGS_PATH,
        value_hint = ValueHint::FilePath)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Login,
    Register,
}

impl From<Mode> for AuthMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Login => AuthMode::Login,
            Mode::Register => AuthMode::Register,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    Employer,
    Worker,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReleasePath {
    /// Both parties approved; either may trigger the release.
    Mutual,
    /// Post-dispute release by an admin, per the vote tally.
    Admin,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in (or register) with the configured keypair.
    Login {
        #[arg(short, long, value_enum, default_value = "login")]
        mode: Mode,

        /// Username for registration.
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Create a contract draft and initialize its escrow on chain.
    Create {
        #[arg(long)]
        freelancer_uuid: String,

        #[arg(long)]
        freelancer_wallet: String,

        /// Decimal USDC amount, e.g. "250.50".
        #[arg(short, long)]
        amount: String,

        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Repeatable delivery checkpoint.
        #[arg(short, long)]
        checkpoint: Vec<String>,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        #[arg(long)]
        job_id: Option<String>,
    },
    /// Accept an escrow as the worker.
    Accept {
        #[arg(short, long)]
        escrow_state: String,
    },
    /// Approve completion as employer or worker.
    Approve {
        #[arg(short, long)]
        escrow_state: String,

        #[arg(long, value_enum)]
        side: Side,
    },
    /// Open a dispute.
    Dispute {
        #[arg(short, long)]
        escrow_state: String,
    },
    /// Cast an admin vote on a disputed escrow.
    Vote {
        #[arg(short, long)]
        escrow_state: String,

        /// Vote for the worker; omit to vote for the employer.
        #[arg(long)]
        for_worker: bool,
    },
    /// Release escrowed funds to the worker.
    Release {
        #[arg(short, long)]
        escrow_state: String,

        #[arg(long, value_enum, default_value = "mutual")]
        via: ReleasePath,
    },
    /// Refund escrowed funds to the employer after a dispute.
    Refund {
        #[arg(short, long)]
        escrow_state: String,
    },
    /// Decode and print an escrow record.
    Show {
        #[arg(short, long)]
        escrow_state: String,
    },
}
