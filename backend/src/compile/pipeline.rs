//! Compilation entry points.
//!
//! ```text
//! text ──▶ split_rows ──▶ resolve_identity ──▶ registry lookup ──▶ amount ──▶ batch / disperse
//!              │                 │                    │               │
//!              └─────────────────┴──── RowError ──────┴───────────────┘
//! ```
//!
//! Rows are processed one at a time in input order, so errors come out in
//! row order. Only structural problems (missing parameters, unusable
//! donation, store failures) abort a compilation.

use alloy_primitives::{Address, U256};

use super::batch::{BatchBuilder, BatchDocument};
use super::disperse::{DisperseBuilder, TOTAL_UNAVAILABLE};
use super::{RowError, RowErrorKind};
use crate::amount::{format_units, normalize, DecimalAmount};
use crate::api::logs::{log_info, log_success, log_warning, log_warning_indent};
use crate::error::{PipelineError, PipelineResult};
use crate::identity::{resolve_identity, MemberDirectory};
use crate::ledger::{AddressRegistry, KvStore, KEY_DELIMITER};
use crate::models::{network_by_id, network_label, parse_address, Donation, TokenDescriptor};
use crate::parser::{split_rows, CsvError, PayoutRow};
use crate::validation::validate_batch;

/// Parameters of a batch compilation.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub tenant: String,
    pub chain_id: u64,
    pub token: Option<TokenDescriptor>,
    pub safe_address: String,
    pub description: String,
    pub donation: Option<Donation>,
    /// Fixed creation instant (ms); the clock is read when absent.
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub document: BatchDocument,
    /// Exact total in the token's smallest unit.
    pub total_amount: U256,
    pub total_amount_formatted: String,
    pub errors: Vec<RowError>,
}

/// Parameters of a disperse compilation.
#[derive(Debug, Clone, Default)]
pub struct DisperseRequest {
    pub tenant: String,
    pub chain_id: u64,
    pub donation: Option<Donation>,
}

#[derive(Debug, Clone)]
pub struct DisperseOutcome {
    /// Headerless `address,amount` CSV.
    pub csv: String,
    pub transfers: usize,
    pub total_amount_formatted: String,
    pub errors: Vec<RowError>,
}

type ResolvedRow = Result<(PayoutRow, Address), RowError>;

fn require_tenant(tenant: &str) -> PipelineResult<()> {
    if tenant.trim().is_empty() {
        return Err(PipelineError::MissingParameter("tenant"));
    }
    if tenant.contains(KEY_DELIMITER) {
        return Err(PipelineError::InvalidParameter {
            name: "tenant",
            message: format!("must not contain '{}'", KEY_DELIMITER),
        });
    }
    Ok(())
}

fn require_network(chain_id: u64) -> PipelineResult<()> {
    if network_by_id(chain_id).is_none() {
        return Err(PipelineError::InvalidParameter {
            name: "network",
            message: format!("unsupported chain id {}", chain_id),
        });
    }
    Ok(())
}

fn donation_address(donation: &Donation) -> PipelineResult<Address> {
    parse_address(&donation.address).map_err(|e| PipelineError::InvalidParameter {
        name: "donation",
        message: e.to_string(),
    })
}

/// Identity, then registered address, for one row.
async fn resolve_row<S, D>(
    registry: &AddressRegistry<S>,
    directory: &D,
    tenant: &str,
    chain_id: u64,
    row: &PayoutRow,
) -> PipelineResult<Result<Address, RowErrorKind>>
where
    S: KvStore,
    D: MemberDirectory,
{
    let Some(member) = resolve_identity(directory, tenant, &row.identity).await else {
        return Ok(Err(RowErrorKind::UnresolvedIdentity {
            token: row.identity.clone(),
        }));
    };

    let account_id = member.account.id.clone();
    let Some(stored) = registry.get_address(tenant, &account_id, chain_id).await? else {
        return Ok(Err(RowErrorKind::MissingAddress {
            display_name: member.display_name().to_string(),
            account_id,
            network: network_label(chain_id),
        }));
    };

    Ok(parse_address(&stored).map_err(|_| RowErrorKind::InvalidStoredAddress {
        display_name: member.display_name().to_string(),
        account_id,
        address: stored,
    }))
}

/// Split and resolve every row, in input order.
async fn resolve_rows<S, D>(
    registry: &AddressRegistry<S>,
    directory: &D,
    tenant: &str,
    chain_id: u64,
    text: &str,
) -> PipelineResult<Vec<ResolvedRow>>
where
    S: KvStore,
    D: MemberDirectory,
{
    let mut resolved = Vec::new();
    for row in split_rows(text) {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                resolved.push(Err(RowError::new(e.line, RowErrorKind::Malformed(e.message))));
                continue;
            }
        };
        let entry = match resolve_row(registry, directory, tenant, chain_id, &row).await? {
            Ok(address) => Ok((row, address)),
            Err(kind) => Err(RowError::new(row.line, kind)),
        };
        resolved.push(entry);
    }
    Ok(resolved)
}

fn report(errors: &[RowError]) {
    for error in errors {
        log_warning_indent(error.to_string(), 1);
    }
}

/// Compile a payout list into a checksum-stamped Safe batch.
///
/// Every row is resolved independently; failed rows are returned in
/// `errors` and left out of the document. The donation, when present, is
/// appended last and counts towards the total.
pub async fn compile_batch<S, D>(
    registry: &AddressRegistry<S>,
    directory: &D,
    request: &BatchRequest,
    text: &str,
) -> PipelineResult<BatchOutcome>
where
    S: KvStore,
    D: MemberDirectory,
{
    require_tenant(&request.tenant)?;
    let token = request
        .token
        .as_ref()
        .ok_or(PipelineError::MissingParameter("token"))?;
    require_network(request.chain_id)?;
    if token.chain_id != request.chain_id {
        return Err(PipelineError::InvalidParameter {
            name: "token",
            message: format!(
                "token is on chain {}, batch targets chain {}",
                token.chain_id, request.chain_id
            ),
        });
    }
    if request.safe_address.trim().is_empty() {
        return Err(PipelineError::MissingParameter("safe_address"));
    }
    let safe = parse_address(&request.safe_address).map_err(|e| PipelineError::InvalidParameter {
        name: "safe_address",
        message: e.to_string(),
    })?;

    let donation = match &request.donation {
        Some(d) => {
            let address = donation_address(d)?;
            let value = normalize(&d.amount, token.decimals).map_err(|e| {
                PipelineError::InvalidParameter {
                    name: "donation",
                    message: format!("amount \"{}\": {}", d.amount, e),
                }
            })?;
            Some((address, value))
        }
        None => None,
    };

    log_info(format!(
        "Compiling {} batch for tenant {} on {}",
        token.symbol,
        request.tenant,
        network_label(request.chain_id)
    ));

    let mut builder = BatchBuilder::new(request.chain_id, token.address, safe)
        .description(request.description.clone());
    if let Some(created_at) = request.created_at {
        builder = builder.created_at(created_at);
    }

    let mut errors = Vec::new();
    for entry in resolve_rows(registry, directory, &request.tenant, request.chain_id, text).await? {
        let (row, address) = match entry {
            Ok(resolved) => resolved,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        let pushed = normalize(&row.amount, token.decimals)
            .and_then(|value| builder.push_transfer(&address, value));
        if let Err(reason) = pushed {
            errors.push(RowError::new(
                row.line,
                RowErrorKind::InvalidAmount {
                    amount: row.amount,
                    reason,
                },
            ));
        }
    }

    if let Some((address, value)) = donation {
        builder
            .push_transfer(&address, value)
            .map_err(|e| PipelineError::InvalidParameter {
                name: "donation",
                message: e.to_string(),
            })?;
    }

    let transfers = builder.len();
    let total_amount = builder.total();
    let document = builder.build()?;
    validate_batch(&serde_json::to_value(&document)?).map_err(PipelineError::Validation)?;

    report(&errors);
    log_success(format!(
        "Batch ready: {} transfers, {} row errors",
        transfers,
        errors.len()
    ));

    Ok(BatchOutcome {
        document,
        total_amount,
        total_amount_formatted: format_units(total_amount, token.decimals),
        errors,
    })
}

/// Compile a payout list into a disperse CSV.
///
/// Same row handling as [`compile_batch`]; amounts are kept as typed and
/// the total is an exact decimal sum.
pub async fn compile_disperse<S, D>(
    registry: &AddressRegistry<S>,
    directory: &D,
    request: &DisperseRequest,
    text: &str,
) -> PipelineResult<DisperseOutcome>
where
    S: KvStore,
    D: MemberDirectory,
{
    require_tenant(&request.tenant)?;
    require_network(request.chain_id)?;

    let donation = match &request.donation {
        Some(d) => {
            DecimalAmount::parse(&d.amount).map_err(|e| PipelineError::InvalidParameter {
                name: "donation",
                message: format!("amount \"{}\": {}", d.amount, e),
            })?;
            Some((donation_address(d)?, d.amount.as_str()))
        }
        None => None,
    };

    log_info(format!(
        "Compiling disperse list for tenant {} on {}",
        request.tenant,
        network_label(request.chain_id)
    ));

    let mut builder = DisperseBuilder::new();
    let mut errors = Vec::new();
    for entry in resolve_rows(registry, directory, &request.tenant, request.chain_id, text).await? {
        let (row, address) = match entry {
            Ok(resolved) => resolved,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        if let Err(reason) = builder.push(&address, &row.amount) {
            errors.push(RowError::new(
                row.line,
                RowErrorKind::InvalidAmount {
                    amount: row.amount,
                    reason,
                },
            ));
        }
    }

    if let Some((address, amount)) = donation {
        builder
            .push(&address, amount)
            .map_err(|e| PipelineError::InvalidParameter {
                name: "donation",
                message: e.to_string(),
            })?;
    }

    let csv = builder
        .to_csv()
        .map_err(|e| PipelineError::Csv(CsvError::new(0, e.to_string())))?;

    let total_amount_formatted = builder.total_formatted().unwrap_or_else(|| {
        log_warning("Disperse total exceeds 256 bits, total unavailable");
        TOTAL_UNAVAILABLE.to_string()
    });

    report(&errors);
    log_success(format!(
        "Disperse list ready: {} transfers, {} row errors",
        builder.len(),
        errors.len()
    ));

    Ok(DisperseOutcome {
        csv,
        transfers: builder.len(),
        total_amount_formatted,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::identity::StaticDirectory;
    use crate::ledger::MemoryStore;
    use crate::models::{Account, Member};

    const TENANT: &str = "1035162791302139935";
    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
    const SAFE: &str = "0x7eC991e1648B7F1d5fa91ae3688C9f36a5CA6C8B";
    const ALICE: &str = "743854752713932923";
    const ALICE_ADDR: &str = "0x116Da30d890533516f2683731F9Bd167807448b8";

    fn member(id: &str, username: &str, nickname: Option<&str>) -> Member {
        Member {
            account: Account {
                id: id.into(),
                username: username.into(),
                discriminator: None,
                global_name: None,
                bot: false,
            },
            nickname: nickname.map(String::from),
        }
    }

    fn numbered_address(n: u8) -> String {
        format!("0x{:040}", n)
    }

    async fn fixture() -> (AddressRegistry<MemoryStore>, StaticDirectory) {
        let registry = AddressRegistry::new(MemoryStore::new());
        registry.set_address(TENANT, ALICE, 1, ALICE_ADDR).await.unwrap();

        let mut directory = StaticDirectory::new().with_member(TENANT, member(ALICE, "alice", Some("Ally")));
        for (i, name) in ["bob", "carol", "dave", "erin"].iter().enumerate() {
            let id = format!("10000000000000000{}", i);
            directory = directory.with_member(TENANT, member(&id, name, None));
            registry
                .set_address(TENANT, &id, 1, &numbered_address(i as u8 + 1))
                .await
                .unwrap();
        }
        // Known member without any address.
        directory = directory.with_member(TENANT, member("200000000000000000", "frank", Some("Frankie")));
        (registry, directory)
    }

    fn usdc() -> TokenDescriptor {
        TokenDescriptor {
            chain_id: 1,
            address: parse_address(USDC).unwrap(),
            name: "USD Coin".into(),
            symbol: "USDC".into(),
            decimals: 6,
        }
    }

    fn request() -> BatchRequest {
        BatchRequest {
            tenant: TENANT.into(),
            chain_id: 1,
            token: Some(usdc()),
            safe_address: SAFE.into(),
            description: String::new(),
            donation: None,
            created_at: Some(1750255509666),
        }
    }

    #[tokio::test]
    async fn test_golden_checksum() {
        let (registry, directory) = fixture().await;
        let outcome = compile_batch(&registry, &directory, &request(), "alice,1").await.unwrap();

        assert!(outcome.errors.is_empty());
        assert_eq!(
            outcome.document.meta.checksum.as_deref(),
            Some("0xf1966baf2cdc7c68774e5be291e81549cc7438efbceccaad0003bb12f8d30baf")
        );
        assert_eq!(outcome.total_amount, U256::from(1_000_000u64));
        assert_eq!(outcome.total_amount_formatted, "1.000000");
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let (registry, directory) = fixture().await;
        let text = "bob,1\ncarol,2\nnobody-at-all,3\ndave,4\nerin,5";
        let outcome = compile_batch(&registry, &directory, &request(), text).await.unwrap();

        assert_eq!(outcome.document.transactions.len(), 4);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line, 3);
        assert_eq!(
            outcome.errors[0].to_string(),
            "Line 3: Could not find user \"nobody-at-all\""
        );
        assert_eq!(outcome.total_amount_formatted, "12.000000");
    }

    #[tokio::test]
    async fn test_errors_follow_row_order() {
        let (registry, directory) = fixture().await;
        let text = "# payouts\nFrankie,1\nbob\n\ncarol,abc\nalice,-2\ndave,0.5";
        let outcome = compile_batch(&registry, &directory, &request(), text).await.unwrap();

        let messages: Vec<String> = outcome.errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "Line 2: Frankie (200000000000000000) has no address registered on Ethereum Mainnet (1)".to_string(),
                "Line 3: Missing 'amount'".to_string(),
                "Line 5: Error parsing amount \"abc\": 'abc' is not a decimal number".to_string(),
                "Line 6: Error parsing amount \"-2\": amount is negative".to_string(),
            ]
        );
        assert_eq!(outcome.document.transactions.len(), 1);
        assert_eq!(outcome.document.transactions[0].contract_inputs_values.value, "500000");
    }

    #[tokio::test]
    async fn test_donation_appended_and_counted() {
        let (registry, directory) = fixture().await;
        let mut req = request();
        req.donation = Some(Donation {
            address: numbered_address(9),
            amount: "0.25".into(),
        });
        let outcome = compile_batch(&registry, &directory, &req, "alice,1").await.unwrap();

        let last = outcome.document.transactions.last().unwrap();
        assert_eq!(last.contract_inputs_values.to, numbered_address(9));
        assert_eq!(last.contract_inputs_values.value, "250000");
        assert_eq!(outcome.total_amount_formatted, "1.250000");
    }

    #[tokio::test]
    async fn test_structural_errors() {
        let (registry, directory) = fixture().await;

        let mut req = request();
        req.token = None;
        let err = compile_batch(&registry, &directory, &req, "alice,1").await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingParameter("token")));

        let mut req = request();
        req.chain_id = 5;
        let err = compile_batch(&registry, &directory, &req, "alice,1").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { name: "network", .. }));

        let mut req = request();
        req.safe_address = "0xnot-a-safe".into();
        let err = compile_batch(&registry, &directory, &req, "alice,1").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { name: "safe_address", .. }));

        let mut req = request();
        req.donation = Some(Donation { address: numbered_address(9), amount: "lots".into() });
        let err = compile_batch(&registry, &directory, &req, "alice,1").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { name: "donation", .. }));
    }

    /// Store whose backend is always down.
    struct Down;

    impl KvStore for Down {
        async fn set(&self, _: &str, _: &str) -> StoreResult<()> {
            Err(StoreError::Backend("unavailable".into()))
        }
        async fn get(&self, _: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Backend("unavailable".into()))
        }
        async fn delete(&self, _: &str) -> StoreResult<bool> {
            Err(StoreError::Backend("unavailable".into()))
        }
        async fn entries(&self) -> StoreResult<Vec<(String, String)>> {
            Err(StoreError::Backend("unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let (_, directory) = fixture().await;
        let registry = AddressRegistry::new(Down);
        let err = compile_batch(&registry, &directory, &request(), "alice,1").await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_compile_disperse() {
        let (registry, directory) = fixture().await;
        let req = DisperseRequest {
            tenant: TENANT.into(),
            chain_id: 1,
            donation: Some(Donation {
                address: numbered_address(9),
                amount: "0.05".into(),
            }),
        };
        let text = "alice,12.50\nghost,1\nbob=0.1";
        let outcome = compile_disperse(&registry, &directory, &req, text).await.unwrap();

        assert_eq!(
            outcome.csv,
            format!(
                "{},12.50\n{},0.1\n{},0.05\n",
                ALICE_ADDR,
                numbered_address(1),
                numbered_address(9)
            )
        );
        assert_eq!(outcome.transfers, 3);
        assert_eq!(outcome.total_amount_formatted, "12.65");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line, 2);
    }

    #[tokio::test]
    async fn test_other_network_has_no_addresses() {
        let (registry, directory) = fixture().await;
        let req = DisperseRequest {
            tenant: TENANT.into(),
            chain_id: 10,
            donation: None,
        };
        let outcome = compile_disperse(&registry, &directory, &req, "alice,1").await.unwrap();
        assert_eq!(outcome.transfers, 0);
        assert_eq!(
            outcome.errors[0].to_string(),
            "Line 1: Ally (743854752713932923) has no address registered on Optimism (10)"
        );
    }

    #[tokio::test]
    async fn test_tenant_with_key_delimiter_rejected() {
        let (registry, directory) = fixture().await;

        let mut req = request();
        req.tenant = "guild!1".into();
        let err = compile_batch(&registry, &directory, &req, "alice,1").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { name: "tenant", .. }));

        let req = DisperseRequest {
            tenant: "guild!1".into(),
            chain_id: 1,
            donation: None,
        };
        let err = compile_disperse(&registry, &directory, &req, "alice,1").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { name: "tenant", .. }));
    }

    #[tokio::test]
    async fn test_disperse_total_overflow_keeps_rows() {
        let (registry, directory) = fixture().await;
        let req = DisperseRequest {
            tenant: TENANT.into(),
            chain_id: 1,
            donation: None,
        };
        let text = format!("alice,0.{}1\nbob,1000", "0".repeat(74));
        let outcome = compile_disperse(&registry, &directory, &req, &text).await.unwrap();

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.transfers, 2);
        assert_eq!(outcome.total_amount_formatted, TOTAL_UNAVAILABLE);
    }
}
