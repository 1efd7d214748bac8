//! Database seeder for Coffer development and testing.
//!
//! Seeds the default chart of accounts, the current financial period and a
//! funded demo customer wallet for one tenant.
//!
//! Usage: cargo run --bin seeder [tenant-uuid]

use coffer_core::wallet::{MovementInput, WalletEntryType, WalletType};
use coffer_db::{JournalRepository, PeriodRepository, WalletRepository};
use coffer_shared::AppConfig;
use coffer_shared::types::TenantId;
use rust_decimal_macros::dec;

/// Tenant used when none is given on the command line.
const DEMO_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Customer id of the demo wallet.
const DEMO_CUSTOMER_ID: &str = "demo-customer";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    let tenant_id: TenantId = std::env::args()
        .nth(1)
        .as_deref()
        .unwrap_or(DEMO_TENANT_ID)
        .parse()?;

    println!("Connecting to database...");
    let db = coffer_db::connect(&config.database).await?;

    println!("Seeding chart of accounts for tenant {tenant_id}...");
    let journal = JournalRepository::new(db.clone(), config.ledger.clone());
    let accounts = journal.seed_chart_of_accounts(tenant_id).await?;
    println!("  {} accounts present", accounts.len());

    println!("Opening current period...");
    let periods = PeriodRepository::new(db.clone(), config.ledger.clone());
    let period = periods.current_period(tenant_id).await?;
    println!("  {} is {}", period.code, period.status);

    println!("Seeding demo wallet...");
    let wallets = WalletRepository::new(db);
    let (wallet, created) = wallets
        .get_or_create_wallet(
            tenant_id,
            WalletType::Customer,
            Some(DEMO_CUSTOMER_ID),
            None,
            &config.ledger.default_currency,
        )
        .await?;
    if created {
        wallets
            .credit(
                tenant_id,
                wallet.id,
                MovementInput {
                    amount: dec!(1000.00),
                    entry_type: WalletEntryType::CreditAdjustment,
                    idempotency_key: "seed-opening-balance".to_string(),
                    description: Some("Opening balance".to_string()),
                    reference_type: None,
                    reference_id: None,
                },
            )
            .await?;
        println!("  Created wallet {}", wallet.id);
    } else {
        println!("  Wallet {} already exists, skipping...", wallet.id);
    }

    println!("Seeding complete!");
    Ok(())
}
