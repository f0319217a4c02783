//! Payout CLI - compile recipient lists into Safe batches and disperse lists
//!
//! # Main Commands
//!
//! ```bash
//! payout serve                                   # Start HTTP server (port 3008)
//! payout batch list.csv --tenant T --chain 137 \
//!     --token 0x... --safe 0x...                 # Compile a Safe batch
//! payout disperse list.csv --tenant T --chain 1  # Compile a disperse list
//! payout verify batch.json                       # Check an embedded checksum
//! ```
//!
//! # Registry Commands
//!
//! ```bash
//! payout address set <tenant> <account> <chain> <address>
//! payout address get <tenant> <account> <chain>
//! payout address list <tenant> [--account A] [--chain C]
//! payout address export <tenant> [--chain C]
//! payout address missing <tenant> <chain>
//! payout networks
//! ```

use clap::{Parser, Subcommand};
use payout::{
    compile_batch, compile_disperse, network_label, parse_address, read_payout_file, validate_batch,
    verify_checksum, AddressRegistry, AnyStore, AnyTokenSource, BatchRequest, ChecksumStatus, Config,
    DisperseRequest, MemberDirectory, StaticTokenSource, StoreKind, TokenDescriptor, TokenSource, NETWORKS,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "payout")]
#[command(about = "Compile payout lists into checksum-stamped Safe batches", long_about = None)]
struct Cli {
    /// Ledger backend (memory, file, remote); overrides PAYOUT_STORE
    #[arg(long, global = true)]
    store: Option<String>,

    /// Snapshot path for the file backend; overrides PAYOUT_STORE_PATH
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (default: PORT or 3008)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Compile a payout list into a Safe transaction batch
    Batch {
        /// Input file, one `recipient amount` per line
        input: PathBuf,

        #[arg(long)]
        tenant: String,

        /// Chain id
        #[arg(long)]
        chain: u64,

        /// ERC20 contract address
        #[arg(long)]
        token: String,

        /// Safe the batch is created from
        #[arg(long)]
        safe: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Donation amount appended as a last transfer
        #[arg(long)]
        donation: Option<String>,

        /// Donation destination (default: PAYOUT_DONATION_ADDRESS)
        #[arg(long)]
        donation_address: Option<String>,

        /// Creation instant in milliseconds (default: now)
        #[arg(long)]
        created_at: Option<i64>,

        /// Token decimals; skips the on-chain metadata lookup
        #[arg(long)]
        decimals: Option<u8>,

        /// Token symbol, with --decimals
        #[arg(long, requires = "decimals")]
        symbol: Option<String>,

        /// Token name, with --decimals
        #[arg(long, requires = "decimals")]
        name: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile a payout list into a disperse CSV
    Disperse {
        input: PathBuf,

        #[arg(long)]
        tenant: String,

        #[arg(long)]
        chain: u64,

        #[arg(long)]
        donation: Option<String>,

        #[arg(long)]
        donation_address: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify the checksum and schema of a batch file
    Verify {
        /// Batch JSON file
        input: PathBuf,
    },

    /// List supported networks
    Networks,

    /// Manage registered addresses
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
}

#[derive(Subcommand)]
enum AddressAction {
    /// Register (or replace) an address
    Set {
        tenant: String,
        account: String,
        chain: u64,
        address: String,
    },

    /// Show a registered address
    Get {
        tenant: String,
        account: String,
        chain: u64,
    },

    /// Remove a registered address
    Remove {
        tenant: String,
        account: String,
        chain: u64,
    },

    /// List registered addresses of a tenant
    List {
        tenant: String,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        chain: Option<u64>,
    },

    /// Export registered addresses as CSV
    Export {
        tenant: String,
        #[arg(long)]
        chain: Option<u64>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Members without an address on a network
    Missing { tenant: String, chain: u64 },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match load_config(cli.store.as_deref(), cli.store_path) {
        Ok(config) => run(config, cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn load_config(store: Option<&str>, store_path: Option<PathBuf>) -> CliResult<Config> {
    let mut config = Config::from_env()?;
    if let Some(kind) = store {
        config.store = kind.parse::<StoreKind>()?;
    }
    if let Some(path) = store_path {
        config.store_path = path;
    }
    Ok(config)
}

async fn run(config: Config, command: Commands) -> CliResult<()> {
    match command {
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.port = port;
            }
            payout::server::start_server(config).await
        }

        Commands::Batch {
            input,
            tenant,
            chain,
            token,
            safe,
            description,
            donation,
            donation_address,
            created_at,
            decimals,
            symbol,
            name,
            output,
        } => {
            let contract = parse_address(&token)?;
            let source = match decimals {
                Some(decimals) => {
                    let symbol = symbol.unwrap_or_else(|| "TOKEN".to_string());
                    AnyTokenSource::Static(StaticTokenSource::new().with_token(TokenDescriptor {
                        chain_id: chain,
                        address: contract,
                        name: name.unwrap_or_else(|| symbol.clone()),
                        symbol,
                        decimals,
                    }))
                }
                None => AnyTokenSource::Rpc(config.token_source()),
            };
            let token = source.fetch_token(chain, contract).await?;
            eprintln!("🪙 {} ({}, {} decimals) on {}", token.name, token.symbol, token.decimals, network_label(chain));

            let request = BatchRequest {
                tenant,
                chain_id: chain,
                token: Some(token),
                safe_address: safe,
                description,
                donation: config.donation(donation.as_deref(), donation_address.as_deref())?,
                created_at,
            };
            cmd_batch(&config, &input, &request, output.as_deref()).await
        }

        Commands::Disperse {
            input,
            tenant,
            chain,
            donation,
            donation_address,
            output,
        } => {
            let request = DisperseRequest {
                tenant,
                chain_id: chain,
                donation: config.donation(donation.as_deref(), donation_address.as_deref())?,
            };
            cmd_disperse(&config, &input, &request, output.as_deref()).await
        }

        Commands::Verify { input } => cmd_verify(&input),

        Commands::Networks => {
            for network in NETWORKS {
                println!("{:>6}  {} ({})", network.chain_id, network.name, network.currency);
            }
            Ok(())
        }

        Commands::Address { action } => cmd_address(&config, action).await,
    }
}

fn print_row_errors(errors: &[impl std::fmt::Display]) {
    if errors.is_empty() {
        return;
    }
    eprintln!("\n⚠️  {} row(s) skipped:", errors.len());
    for error in errors {
        eprintln!("   - {}", error);
    }
}

async fn cmd_batch(config: &Config, input: &Path, request: &BatchRequest, output: Option<&Path>) -> CliResult<()> {
    eprintln!("📄 Processing: {}", input.display());
    let text = read_payout_file(input)?;

    let registry = AddressRegistry::new(config.open_store()?);
    let directory = config.open_directory()?;
    let outcome = compile_batch(&registry, &directory, request, &text).await?;

    print_row_errors(&outcome.errors);
    let symbol = request.token.as_ref().map(|t| t.symbol.as_str()).unwrap_or_default();
    eprintln!(
        "\n📊 {} transfers, total {} {}",
        outcome.document.transactions.len(),
        outcome.total_amount_formatted,
        symbol
    );
    if let Some(checksum) = &outcome.document.meta.checksum {
        eprintln!("   Checksum: {}", checksum);
    }

    let json = serde_json::to_string_pretty(&outcome.document)?;
    write_output(&json, output)
}

async fn cmd_disperse(
    config: &Config,
    input: &Path,
    request: &DisperseRequest,
    output: Option<&Path>,
) -> CliResult<()> {
    eprintln!("📄 Processing: {}", input.display());
    let text = read_payout_file(input)?;

    let registry = AddressRegistry::new(config.open_store()?);
    let directory = config.open_directory()?;
    let outcome = compile_disperse(&registry, &directory, request, &text).await?;

    print_row_errors(&outcome.errors);
    eprintln!("\n📊 {} transfers, total {}", outcome.transfers, outcome.total_amount_formatted);
    write_output(outcome.csv.trim_end(), output)
}

fn cmd_verify(input: &Path) -> CliResult<()> {
    eprintln!("✔️  Verifying: {}", input.display());

    let content = fs::read_to_string(input)?;
    let document: Value = serde_json::from_str(&content)?;

    let mut failed = false;
    match verify_checksum(&document) {
        ChecksumStatus::Valid => eprintln!("   ✅ Checksum valid"),
        ChecksumStatus::Missing => {
            eprintln!("   ❌ No checksum in meta.checksum");
            failed = true;
        }
        ChecksumStatus::Mismatch { embedded, computed } => {
            eprintln!("   ❌ Checksum mismatch");
            eprintln!("      embedded: {}", embedded);
            eprintln!("      computed: {}", computed);
            failed = true;
        }
    }

    match validate_batch(&document) {
        Ok(()) => eprintln!("   ✅ Schema valid"),
        Err(errors) => {
            eprintln!("   ❌ Schema invalid:");
            for err in errors.iter().take(5) {
                eprintln!("      - {}", err);
            }
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_address(config: &Config, action: AddressAction) -> CliResult<()> {
    let registry: AddressRegistry<AnyStore> = AddressRegistry::new(config.open_store()?);

    match action {
        AddressAction::Set {
            tenant,
            account,
            chain,
            address,
        } => {
            if payout::network_by_id(chain).is_none() {
                return Err(format!("Unsupported chain id {}", chain).into());
            }
            let stored = registry.set_address(&tenant, &account, chain, &address).await?;
            eprintln!("✅ {} on {}: {}", account, network_label(chain), stored);
        }

        AddressAction::Get { tenant, account, chain } => {
            match registry.get_address(&tenant, &account, chain).await? {
                Some(address) => println!("{}", address),
                None => {
                    return Err(format!("{} has no address on {}", account, network_label(chain)).into());
                }
            }
        }

        AddressAction::Remove { tenant, account, chain } => {
            if registry.remove_address(&tenant, &account, chain).await? {
                eprintln!("🗑️  Removed {} on {}", account, network_label(chain));
            } else {
                eprintln!("   {} had no address on {}", account, network_label(chain));
            }
        }

        AddressAction::List { tenant, account, chain } => {
            let mut records = match &account {
                Some(account) => registry.addresses_for_account(&tenant, account).await?,
                None => registry.records(&tenant).await?,
            };
            if let Some(chain) = chain {
                records.retain(|r| r.chain_id == chain);
            }
            if records.is_empty() {
                eprintln!("📋 No addresses registered.");
                return Ok(());
            }
            for r in records {
                println!("{:<20} {:<44} {}", r.account_id, r.address, network_label(r.chain_id));
            }
        }

        AddressAction::Export { tenant, chain, output } => {
            let directory = config.open_directory()?;
            let members = directory.list_members(&tenant).await?;
            let csv = registry.export_csv(&tenant, chain, &members).await?;
            write_output(csv.trim_end(), output.as_deref())?;
        }

        AddressAction::Missing { tenant, chain } => {
            let directory = config.open_directory()?;
            let members = directory.list_members(&tenant).await?;
            let missing = registry.missing_accounts(&tenant, chain, &members).await?;
            eprintln!("📋 {} member(s) without an address on {}:", missing.len(), network_label(chain));
            for member in missing {
                println!("{:<20} {}", member.account.id, member.display_name());
            }
        }
    }

    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(p) => {
            fs::write(p, format!("{}\n", content))?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
