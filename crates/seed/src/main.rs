mod sample;

use anyhow::Context;

use stockledger_infra::{
    DatabaseConfig, InMemoryLedgerStore, LedgerConfig, PostgresLedgerStore, StockLedger,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();

    let ledger_config = LedgerConfig::from_env().context("invalid ledger configuration")?;
    let database = DatabaseConfig::from_env().context("invalid database configuration")?;

    let report = match database.url {
        Some(url) => {
            let store = PostgresLedgerStore::connect(&url, database.max_connections)
                .await
                .context("failed to connect to DATABASE_URL")?;
            store.migrate().await.context("failed to apply schema")?;
            sample::seed(&StockLedger::with_config(store, ledger_config)).await?
        }
        None => {
            tracing::warn!("DATABASE_URL not set; seeding a throwaway in-memory store");
            sample::seed(&StockLedger::with_config(InMemoryLedgerStore::new(), ledger_config)).await?
        }
    };

    tracing::info!(
        seeded = report.seeded,
        total_products = report.summary.total_products,
        "seed finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
