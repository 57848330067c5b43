use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockledger_core::{AggregateRoot, ExpectedVersion, ProductId, SupplierId, UserId};
use stockledger_inventory::{Product, ProductSnapshot, StockTransaction, Supplier, User};

use super::r#trait::{LedgerStore, StoreError, validate_movement};

/// A ledger entry plus its global append position.
#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    transaction: StockTransaction,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    suppliers: HashMap<SupplierId, Supplier>,
    products: HashMap<ProductId, ProductSnapshot>,
    skus: HashMap<String, ProductId>,
    entries: Vec<Entry>,
    next_seq: u64,
}

impl Tables {
    fn ensure_user(&self, id: UserId) -> Result<(), StoreError> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::MissingReference(format!("user {id}")))
        }
    }

    fn ensure_supplier(&self, id: Option<SupplierId>) -> Result<(), StoreError> {
        match id {
            Some(id) if !self.suppliers.contains_key(&id) => {
                Err(StoreError::MissingReference(format!("supplier {id}")))
            }
            _ => Ok(()),
        }
    }

    fn ensure_active_supplier(&self, id: Option<SupplierId>) -> Result<(), StoreError> {
        self.ensure_supplier(id)?;
        match id.and_then(|id| self.suppliers.get(&id)) {
            Some(supplier) if !supplier.is_active => {
                Err(StoreError::InvalidWrite(format!("supplier {} is inactive", supplier.id)))
            }
            _ => Ok(()),
        }
    }

    fn ensure_unique_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        if !supplier.is_active {
            return Ok(());
        }
        match self
            .suppliers
            .values()
            .filter(|other| other.is_active)
            .find_map(|other| supplier.clashes_with(other))
        {
            Some(clash) => Err(StoreError::Duplicate(clash)),
            None => Ok(()),
        }
    }

    fn active_products_of(&self, supplier_id: SupplierId) -> usize {
        self.products
            .values()
            .filter(|p| p.is_active && p.supplier_id == Some(supplier_id))
            .count()
    }

    fn push_entry(&mut self, transaction: &StockTransaction) {
        self.next_seq += 1;
        self.entries.push(Entry {
            seq: self.next_seq,
            transaction: transaction.clone(),
        });
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. One lock guards every table, so each write is
/// trivially all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tables: RwLock<Tables>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

/// Newest first: by timestamp, then by append position.
fn newest_first(entries: &mut [&Entry]) {
    entries.sort_by(|a, b| {
        b.transaction
            .created_at
            .cmp(&a.transaction.created_at)
            .then_with(|| b.seq.cmp(&a.seq))
    });
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.id)));
        }
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate(format!("username '{}'", user.username)));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.suppliers.contains_key(&supplier.id) {
            return Err(StoreError::Duplicate(format!("supplier {}", supplier.id)));
        }
        tables.ensure_unique_supplier(supplier)?;
        tables.suppliers.insert(supplier.id, supplier.clone());
        Ok(())
    }

    async fn update_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let Some(existing) = tables.suppliers.get(&supplier.id) else {
            return Err(StoreError::MissingReference(format!("supplier {}", supplier.id)));
        };
        if existing.is_active && !supplier.is_active {
            let in_use = tables.active_products_of(supplier.id);
            if in_use > 0 {
                return Err(StoreError::InUse(format!(
                    "supplier {} has {in_use} active products",
                    supplier.id
                )));
            }
        }
        tables.ensure_unique_supplier(supplier)?;
        tables.suppliers.insert(supplier.id, supplier.clone());
        Ok(())
    }

    async fn load_supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        Ok(self.read()?.suppliers.get(&id).cloned())
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        let mut suppliers: Vec<Supplier> = self.read()?.suppliers.values().cloned().collect();
        suppliers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(suppliers)
    }

    async fn insert_product(
        &self,
        product: &Product,
        opening: Option<&StockTransaction>,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let id = product.id_typed();

        if tables.products.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("product {id}")));
        }
        if let Some(sku) = product.sku() {
            if tables.skus.contains_key(sku) {
                return Err(StoreError::Duplicate(format!("sku '{sku}'")));
            }
        }
        if product.is_active() {
            tables.ensure_active_supplier(product.supplier_id())?;
        } else {
            tables.ensure_supplier(product.supplier_id())?;
        }

        match opening {
            Some(t) => {
                validate_movement(product, t)?;
                tables.ensure_user(t.user_id)?;
            }
            None if product.quantity() != 0 => {
                return Err(StoreError::InvalidWrite(format!(
                    "product {id} has quantity {} without an opening entry",
                    product.quantity()
                )));
            }
            None => {}
        }

        // All checks passed: write.
        if let Some(sku) = product.sku() {
            tables.skus.insert(sku.to_string(), id);
        }
        tables.products.insert(id, product.snapshot());
        if let Some(t) = opening {
            tables.push_entry(t);
        }
        Ok(())
    }

    async fn load_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned().map(Product::restore))
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self
            .read()?
            .products
            .values()
            .cloned()
            .map(Product::restore)
            .collect();
        products.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id_typed().cmp(&b.id_typed())));
        Ok(products)
    }

    async fn commit(
        &self,
        product: &Product,
        expected_version: ExpectedVersion,
        movement: Option<&StockTransaction>,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let id = product.id_typed();

        let stored = tables
            .products
            .get(&id)
            .ok_or_else(|| StoreError::MissingReference(format!("product {id}")))?;
        if !expected_version.matches(stored.version) {
            return Err(StoreError::Concurrency(format!(
                "product {id}: expected {expected_version:?}, found {}",
                stored.version
            )));
        }
        if stored.sku.as_deref() != product.sku() {
            return Err(StoreError::InvalidWrite(format!("product {id}: sku is immutable")));
        }

        match movement {
            Some(t) => {
                validate_movement(product, t)?;
                if t.quantity_before != stored.quantity {
                    return Err(StoreError::InvalidWrite(format!(
                        "movement {} starts at {}, stored quantity is {}",
                        t.id, t.quantity_before, stored.quantity
                    )));
                }
                tables.ensure_user(t.user_id)?;
            }
            None if product.quantity() != stored.quantity => {
                return Err(StoreError::InvalidWrite(format!(
                    "product {id}: quantity changed without a ledger entry"
                )));
            }
            None => {}
        }
        if product.is_active() && product.supplier_id() != stored.supplier_id {
            tables.ensure_active_supplier(product.supplier_id())?;
        } else {
            tables.ensure_supplier(product.supplier_id())?;
        }

        tables.products.insert(id, product.snapshot());
        if let Some(t) = movement {
            tables.push_entry(t);
        }
        tracing::trace!(product_id = %id, version = product.version(), "committed product");
        Ok(())
    }

    async fn history(
        &self,
        product_id: ProductId,
        limit: Option<usize>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let tables = self.read()?;
        let mut entries: Vec<&Entry> = tables
            .entries
            .iter()
            .filter(|e| e.transaction.product_id == product_id)
            .collect();
        newest_first(&mut entries);
        Ok(entries
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|e| e.transaction.clone())
            .collect())
    }

    async fn recent_transactions(&self, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        let tables = self.read()?;
        let mut entries: Vec<&Entry> = tables.entries.iter().collect();
        newest_first(&mut entries);
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|e| e.transaction.clone())
            .collect())
    }

    async fn transactions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let tables = self.read()?;
        let mut entries: Vec<&Entry> = tables
            .entries
            .iter()
            .filter(|e| e.transaction.created_at >= from && e.transaction.created_at <= to)
            .collect();
        entries.sort_by(|a, b| {
            a.transaction
                .created_at
                .cmp(&b.transaction.created_at)
                .then_with(|| a.seq.cmp(&b.seq))
        });
        Ok(entries.into_iter().map(|e| e.transaction.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::{Aggregate, Money, TransactionId};
    use stockledger_inventory::{
        AdjustStock, ContactInfo, Direction, NewProduct, NewSupplier, NewUser, ProductCommand, Role,
    };

    fn user() -> User {
        User::register(
            UserId::new(),
            NewUser {
                username: "staff".to_string(),
                email: "staff@inventory.com".to_string(),
                role: Role::Staff,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn product(actor: UserId, sku: &str, quantity: i64) -> (Product, Option<StockTransaction>) {
        Product::register(
            ProductId::new(),
            NewProduct {
                name: "Stapler".to_string(),
                category: "Office Supplies".to_string(),
                description: None,
                price: Money::from_minor(1299),
                initial_quantity: quantity,
                min_stock_level: None,
                sku: Some(sku.to_string()),
                supplier_id: None,
            },
            actor,
            Utc::now(),
        )
        .unwrap()
    }

    fn moved(product: &Product, actor: UserId, direction: Direction, magnitude: i64) -> (Product, StockTransaction) {
        let mut next = product.clone();
        let events = next
            .execute(&ProductCommand::AdjustStock(AdjustStock {
                transaction_id: TransactionId::new(),
                product_id: product.id_typed(),
                direction,
                magnitude,
                actor,
                note: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        (next, events[0].as_stock_movement().cloned().unwrap())
    }

    #[tokio::test]
    async fn insert_product_with_opening_entry() {
        let store = InMemoryLedgerStore::new();
        let actor = user();
        store.insert_user(&actor).await.unwrap();

        let (p, opening) = product(actor.id, "STAPLER-01", 12);
        store.insert_product(&p, opening.as_ref()).await.unwrap();

        let loaded = store.load_product(p.id_typed()).await.unwrap().unwrap();
        assert_eq!(loaded, p);
        assert_eq!(store.history(p.id_typed(), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_sku_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let actor = user();
        store.insert_user(&actor).await.unwrap();

        let (a, _) = product(actor.id, "DUP", 0);
        let (b, _) = product(actor.id, "DUP", 0);
        store.insert_product(&a, None).await.unwrap();
        assert!(matches!(
            store.insert_product(&b, None).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn stale_commit_is_rejected_without_writing() {
        let store = InMemoryLedgerStore::new();
        let actor = user();
        store.insert_user(&actor).await.unwrap();
        let (p, opening) = product(actor.id, "S-1", 10);
        store.insert_product(&p, opening.as_ref()).await.unwrap();

        let (first, t1) = moved(&p, actor.id, Direction::Remove, 4);
        store
            .commit(&first, ExpectedVersion::Exact(p.version()), Some(&t1))
            .await
            .unwrap();

        // Second writer decided against the same stale version.
        let (second, t2) = moved(&p, actor.id, Direction::Remove, 8);
        let err = store
            .commit(&second, ExpectedVersion::Exact(p.version()), Some(&t2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        let loaded = store.load_product(p.id_typed()).await.unwrap().unwrap();
        assert_eq!(loaded.quantity(), 6);
        assert_eq!(store.history(p.id_typed(), None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn movement_by_unknown_user_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let actor = user();
        store.insert_user(&actor).await.unwrap();
        let (p, _) = product(actor.id, "S-2", 0);
        store.insert_product(&p, None).await.unwrap();

        let (next, t) = moved(&p, UserId::new(), Direction::Add, 1);
        assert!(matches!(
            store.commit(&next, ExpectedVersion::Exact(0), Some(&t)).await,
            Err(StoreError::MissingReference(_))
        ));
        assert!(store.history(p.id_typed(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let store = InMemoryLedgerStore::new();
        let actor = user();
        store.insert_user(&actor).await.unwrap();
        let (mut p, opening) = product(actor.id, "S-3", 1);
        store.insert_product(&p, opening.as_ref()).await.unwrap();

        for magnitude in 1..=3 {
            let (next, t) = moved(&p, actor.id, Direction::Add, magnitude);
            store
                .commit(&next, ExpectedVersion::Exact(p.version()), Some(&t))
                .await
                .unwrap();
            p = next;
        }

        let history = store.history(p.id_typed(), Some(2)).await.unwrap();
        let magnitudes: Vec<i64> = history.iter().map(|t| t.magnitude).collect();
        assert_eq!(magnitudes, vec![3, 2]);
    }

    fn supplier(name: &str, email: &str) -> Supplier {
        Supplier::register(
            SupplierId::new(),
            NewSupplier {
                name: name.to_string(),
                contact: ContactInfo {
                    email: Some(email.to_string()),
                    ..ContactInfo::default()
                },
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn supplier_with_active_products_cannot_be_deactivated() {
        let store = InMemoryLedgerStore::new();
        let actor = user();
        store.insert_user(&actor).await.unwrap();
        let s = supplier("Furniture Direct", "orders@furnituredirect.com");
        store.insert_supplier(&s).await.unwrap();

        let (p, _) = product(actor.id, "DESK-001", 0);
        let mut snapshot = p.snapshot();
        snapshot.supplier_id = Some(s.id);
        let p = Product::restore(snapshot);
        store.insert_product(&p, None).await.unwrap();

        let mut inactive = s.clone();
        inactive.deactivate(Utc::now()).unwrap();
        assert!(matches!(
            store.update_supplier(&inactive).await,
            Err(StoreError::InUse(_))
        ));
        assert!(store.load_supplier(s.id).await.unwrap().unwrap().is_active);

        // Inactive suppliers cannot be attached to new products either.
        let other = supplier("Office Supplies Co.", "sales@officesupplies.com");
        store.insert_supplier(&other).await.unwrap();
        let mut retired = other.clone();
        retired.deactivate(Utc::now()).unwrap();
        store.update_supplier(&retired).await.unwrap();
        let (q, _) = product(actor.id, "DESK-002", 0);
        let mut snapshot = q.snapshot();
        snapshot.supplier_id = Some(other.id);
        assert!(matches!(
            store.insert_product(&Product::restore(snapshot), None).await,
            Err(StoreError::InvalidWrite(_))
        ));
    }

    #[tokio::test]
    async fn active_supplier_names_and_emails_are_unique() {
        let store = InMemoryLedgerStore::new();
        let first = supplier("Tech Solutions Inc.", "contact@techsolutions.com");
        store.insert_supplier(&first).await.unwrap();

        assert!(matches!(
            store.insert_supplier(&supplier("Tech Solutions Inc.", "other@techsolutions.com")).await,
            Err(StoreError::Duplicate(_))
        ));
        assert!(matches!(
            store.insert_supplier(&supplier("Tech Solutions West", "contact@techsolutions.com")).await,
            Err(StoreError::Duplicate(_))
        ));

        // Editing a supplier into a clash is rejected the same way.
        let mut second = supplier("Electronics Wholesale", "info@electronicswholesale.com");
        store.insert_supplier(&second).await.unwrap();
        second.name = first.name.clone();
        assert!(matches!(
            store.update_supplier(&second).await,
            Err(StoreError::Duplicate(_))
        ));

        // Once the first one is retired its name is free again.
        let mut retired = first.clone();
        retired.deactivate(Utc::now()).unwrap();
        store.update_supplier(&retired).await.unwrap();
        store.update_supplier(&second).await.unwrap();
        assert_eq!(store.list_suppliers().await.unwrap().len(), 2);
    }
}
