//! Sample catalog and a deterministic batch of stock movements.

use anyhow::Context;
use serde::Serialize;

use stockledger_core::Money;
use stockledger_infra::{LedgerError, LedgerStore, StockLedger};
use stockledger_inventory::{
    ContactInfo, Direction, InventorySummary, NewProduct, NewSupplier, NewUser, Role,
};

struct SampleSupplier {
    name: &'static str,
    phone: &'static str,
    email: &'static str,
    address: &'static str,
}

const SUPPLIERS: [SampleSupplier; 4] = [
    SampleSupplier {
        name: "Tech Solutions Inc.",
        phone: "+1-555-0101",
        email: "contact@techsolutions.com",
        address: "123 Tech Street, Silicon Valley, CA",
    },
    SampleSupplier {
        name: "Office Supplies Co.",
        phone: "+1-555-0102",
        email: "sales@officesupplies.com",
        address: "456 Business Ave, New York, NY",
    },
    SampleSupplier {
        name: "Electronics Wholesale",
        phone: "+1-555-0103",
        email: "info@electronicswholesale.com",
        address: "789 Electronics Blvd, Austin, TX",
    },
    SampleSupplier {
        name: "Furniture Direct",
        phone: "+1-555-0104",
        email: "orders@furnituredirect.com",
        address: "321 Furniture Lane, Chicago, IL",
    },
];

struct SampleProduct {
    name: &'static str,
    category: &'static str,
    description: &'static str,
    price_minor: u64,
    quantity: i64,
    min_stock_level: i64,
    sku: &'static str,
}

const PRODUCTS: [SampleProduct; 7] = [
    SampleProduct {
        name: "Laptop Dell XPS 13",
        category: "Electronics",
        description: "High-performance ultrabook",
        price_minor: 99_999,
        quantity: 25,
        min_stock_level: 5,
        sku: "DELL-XPS13-001",
    },
    SampleProduct {
        name: "Office Chair Ergonomic",
        category: "Furniture",
        description: "Comfortable ergonomic office chair",
        price_minor: 29_999,
        quantity: 15,
        min_stock_level: 3,
        sku: "CHAIR-ERG-001",
    },
    SampleProduct {
        name: "Wireless Mouse",
        category: "Electronics",
        description: "Bluetooth wireless mouse",
        price_minor: 2_999,
        quantity: 50,
        min_stock_level: 10,
        sku: "MOUSE-WL-001",
    },
    SampleProduct {
        name: "A4 Paper Ream",
        category: "Office Supplies",
        description: "500 sheets of A4 paper",
        price_minor: 899,
        quantity: 100,
        min_stock_level: 20,
        sku: "PAPER-A4-001",
    },
    SampleProduct {
        name: "Monitor 24 inch",
        category: "Electronics",
        description: "24-inch LED monitor",
        price_minor: 19_999,
        quantity: 8,
        min_stock_level: 5,
        sku: "MON-24-001",
    },
    SampleProduct {
        name: "Desk Lamp LED",
        category: "Office Supplies",
        description: "Adjustable LED desk lamp",
        price_minor: 4_599,
        quantity: 2,
        min_stock_level: 5,
        sku: "LAMP-LED-001",
    },
    SampleProduct {
        name: "Keyboard Mechanical",
        category: "Electronics",
        description: "Mechanical gaming keyboard",
        price_minor: 8_999,
        quantity: 0,
        min_stock_level: 3,
        sku: "KB-MECH-001",
    },
];

/// Number of sample movements recorded after the catalog is in place.
const MOVEMENTS: usize = 20;

#[derive(Debug, Serialize)]
pub struct SeedReport {
    /// False when the store already had products and nothing was written.
    pub seeded: bool,
    pub movements_recorded: usize,
    pub movements_rejected: usize,
    pub summary: InventorySummary,
}

/// Populate an empty store with the sample catalog and movements.
///
/// Running it against a store that already holds products only reports the
/// current summary.
pub async fn seed<S: LedgerStore>(ledger: &StockLedger<S>) -> anyhow::Result<SeedReport> {
    if !ledger.products().await?.is_empty() {
        tracing::info!("store already has products; skipping sample data");
        return Ok(SeedReport {
            seeded: false,
            movements_recorded: 0,
            movements_rejected: 0,
            summary: ledger.inventory_summary().await?,
        });
    }

    let admin = ledger
        .register_user(NewUser {
            username: "admin".to_string(),
            email: "admin@inventory.com".to_string(),
            role: Role::Admin,
        })
        .await
        .context("registering admin user")?;
    let staff = ledger
        .register_user(NewUser {
            username: "staff".to_string(),
            email: "staff@inventory.com".to_string(),
            role: Role::Staff,
        })
        .await
        .context("registering staff user")?;

    let mut suppliers = Vec::with_capacity(SUPPLIERS.len());
    for s in &SUPPLIERS {
        let supplier = ledger
            .register_supplier(NewSupplier {
                name: s.name.to_string(),
                contact: ContactInfo {
                    phone: Some(s.phone.to_string()),
                    email: Some(s.email.to_string()),
                    address: Some(s.address.to_string()),
                },
            })
            .await
            .with_context(|| format!("registering supplier '{}'", s.name))?;
        suppliers.push(supplier.id);
    }

    let mut products = Vec::with_capacity(PRODUCTS.len());
    for (i, p) in PRODUCTS.iter().enumerate() {
        let (product, _) = ledger
            .register_product(
                NewProduct {
                    name: p.name.to_string(),
                    category: p.category.to_string(),
                    description: Some(p.description.to_string()),
                    price: Money::from_minor(p.price_minor),
                    initial_quantity: p.quantity,
                    min_stock_level: Some(p.min_stock_level),
                    sku: Some(p.sku.to_string()),
                    supplier_id: Some(suppliers[i % suppliers.len()]),
                },
                admin.id,
            )
            .await
            .with_context(|| format!("registering product '{}'", p.name))?;
        products.push(product.id_typed());
    }

    let actors = [admin.id, staff.id];
    let mut recorded = 0;
    let mut rejected = 0;
    for i in 0..MOVEMENTS {
        let product = products[(i * 3) % products.len()];
        let actor = actors[i % actors.len()];
        let direction = if i % 3 == 0 { Direction::Add } else { Direction::Remove };
        let magnitude = (i % 10) as i64 + 1;

        match ledger
            .apply(
                product,
                direction,
                magnitude,
                actor,
                Some(format!("Sample {direction} transaction")),
            )
            .await
        {
            Ok(_) => recorded += 1,
            Err(LedgerError::InsufficientStock { .. }) => rejected += 1,
            Err(e) => return Err(e).context("recording sample movement"),
        }
    }

    tracing::info!(recorded, rejected, "sample movements applied");
    Ok(SeedReport {
        seeded: true,
        movements_recorded: recorded,
        movements_rejected: rejected,
        summary: ledger.inventory_summary().await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_inventory::StockTransaction;
    use stockledger_infra::InMemoryLedgerStore;

    #[tokio::test]
    async fn seeds_catalog_once() {
        let ledger = StockLedger::new(InMemoryLedgerStore::new());

        let report = seed(&ledger).await.unwrap();
        assert!(report.seeded);
        assert_eq!(report.movements_recorded + report.movements_rejected, MOVEMENTS);
        assert_eq!(report.summary.total_products, PRODUCTS.len());
        assert_eq!(report.summary.total_suppliers, SUPPLIERS.len());

        for product in ledger.products().await.unwrap() {
            let history = ledger.history(product.id_typed(), Some(1_000)).await.unwrap();
            let sum: i64 = history.iter().map(StockTransaction::signed_delta).sum();
            assert_eq!(product.quantity(), sum);
        }

        let again = seed(&ledger).await.unwrap();
        assert!(!again.seeded);
        assert_eq!(again.summary, report.summary);
    }
}
