use clap::{Parser, Subcommand};

use nano_engine::config::{RpcConfig, DEFAULT_REPRESENTATIVE};
use nano_engine::crypto::keys::{
    account_from_private_key, deterministic_key, generate_seed, pub_key, public_key_from_account, RawKey,
};
use nano_engine::crypto::{decrypt, encrypt};
use nano_engine::numbers::units::{nano_to_raw, raw_to_nano};
use nano_engine::numbers::{Amount, Uint256};
use nano_engine::observability::logging;
use nano_engine::rpc::{HttpLedgerClient, LedgerClient};

#[derive(Parser)]
#[command(name = "nano-cli")]
#[command(about = "Key, amount and account utilities for the Nano ledger", long_about = None)]
struct Cli {
    /// Node RPC endpoint for commands that query the ledger.
    #[arg(short, long, default_value = "http://127.0.0.1:7076")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random seed
    CreateSeed,
    /// Derive the private key, public key and account at a seed index
    Derive {
        seed: String,
        #[arg(default_value_t = 0)]
        index: u32,
    },
    /// Print the public key behind an account
    AccountKey { account: String },
    /// Convert a Nano amount to raw
    ToRaw { amount: String },
    /// Convert a raw amount to Nano
    ToNano { raw: String },
    /// Confirmed and receivable balance of an account
    Balance { account: String },
    /// Receivable blocks of an account
    Pending {
        account: String,
        /// Smallest amount (raw) to list.
        #[arg(short, long, default_value = "0")]
        threshold: String,
    },
    /// Encrypt a seed with a password
    Encrypt { seed: String, password: String },
    /// Decrypt a seed encrypted with `encrypt`
    Decrypt { cipher: String, password: String },
}

fn ledger(url: &str) -> Result<HttpLedgerClient, Box<dyn std::error::Error>> {
    let config = RpcConfig {
        url: url.to_string(),
        ..RpcConfig::default()
    };
    let representative = Uint256::from_account(DEFAULT_REPRESENTATIVE)?;
    Ok(HttpLedgerClient::new(&config, representative, 100)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("warn");
    let cli = Cli::parse();

    match cli.command {
        Commands::CreateSeed => {
            println!("{}", generate_seed().to_hex());
        }
        Commands::Derive { seed, index } => {
            let private = deterministic_key(&RawKey::from_hex(&seed)?, index);
            println!("private: {}", private.to_hex());
            println!("public:  {}", pub_key(&private).to_hex());
            println!("account: {}", account_from_private_key(&private));
        }
        Commands::AccountKey { account } => {
            println!("{}", public_key_from_account(&account)?.to_hex());
        }
        Commands::ToRaw { amount } => {
            println!("{}", nano_to_raw(&amount)?);
        }
        Commands::ToNano { raw } => {
            println!("{}", raw_to_nano(Amount::from_dec_str(&raw)?));
        }
        Commands::Balance { account } => {
            let public = public_key_from_account(&account)?;
            let balance = ledger(&cli.url)?.wallet_balance(&public).await?;
            println!("balance: {} ({} raw)", raw_to_nano(balance.balance), balance.balance);
            println!("pending: {} ({} raw)", raw_to_nano(balance.pending), balance.pending);
        }
        Commands::Pending { account, threshold } => {
            let public = public_key_from_account(&account)?;
            let threshold = Amount::from_dec_str(&threshold)?;
            let blocks = ledger(&cli.url)?.pending(&public, threshold).await?;
            if blocks.is_empty() {
                println!("nothing pending");
            }
            for block in blocks {
                println!("{} {} from {}", block.hash, raw_to_nano(block.amount), block.source);
            }
        }
        Commands::Encrypt { seed, password } => {
            println!("{}", encrypt(&RawKey::from_hex(&seed)?, &password));
        }
        Commands::Decrypt { cipher, password } => {
            println!("{}", decrypt(&cipher, &password)?.to_hex());
        }
    }

    Ok(())
}
