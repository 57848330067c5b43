//! Postgres-backed ledger store.
//!
//! Products live in `products` (current state + version), ledger entries in the
//! append-only `stock_transactions` table. Every product write runs in one
//! database transaction that locks the product row, checks the expected version,
//! updates the row and appends the entry.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Duplicate id, SKU, username, or active supplier name/email |
//! | Database (foreign key violation) | `23503` | `MissingReference` | Unknown user, supplier or product |
//! | Database (check constraint violation) | `23514` | `InvalidWrite` | Negative quantity, inconsistent entry |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use stockledger_core::{
    AggregateRoot, ExpectedVersion, Money, ProductId, SupplierId, TransactionId, UserId,
};
use stockledger_inventory::{
    ContactInfo, Direction, Product, ProductSnapshot, Role, StockTransaction, Supplier, User,
};

use super::r#trait::{LedgerStore, StoreError, validate_movement};

const SCHEMA: &str = include_str!("../../migrations/0001_stock_ledger.sql");

const PRODUCT_COLUMNS: &str = "id, name, category, description, price_minor, quantity, \
     min_stock_level, sku, supplier_id, is_active, version, last_movement_at, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, product_id, user_id, direction, magnitude, \
     quantity_before, quantity_after, unit_price_minor, note, created_at";

/// Postgres-backed ledger store.
///
/// `Send + Sync`; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a connection pool against `url`.
    #[instrument(skip(url), err)]
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the ledger tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        tracing::info!("stock ledger schema is up to date");
        Ok(())
    }

    async fn fetch_transactions(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter()
            .map(|row| -> Result<StockTransaction, StoreError> {
                TransactionRow::from_row(row)
                    .map_err(|e| StoreError::Backend(format!("failed to read transaction row: {e}")))?
                    .try_into()
            })
            .collect()
    }
}

async fn rollback(tx: Transaction<'_, Postgres>) -> Result<(), StoreError> {
    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))
}

/// Share-lock the referenced supplier and require it to be active.
async fn ensure_active_supplier(
    tx: &mut Transaction<'_, Postgres>,
    supplier_id: Option<uuid::Uuid>,
) -> Result<(), StoreError> {
    let Some(id) = supplier_id else {
        return Ok(());
    };
    let active: Option<bool> =
        sqlx::query_scalar("SELECT is_active FROM suppliers WHERE id = $1 FOR SHARE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_supplier", e))?;
    match active {
        Some(true) => Ok(()),
        Some(false) => Err(StoreError::InvalidWrite(format!("supplier {id} is inactive"))),
        None => Err(StoreError::MissingReference(format!("supplier {id}"))),
    }
}

async fn insert_transaction(
    tx: &mut Transaction<'_, Postgres>,
    t: &StockTransaction,
) -> Result<(), StoreError> {
    let unit_price = t.unit_price.map(money_to_db).transpose()?;
    sqlx::query(
        r#"
        INSERT INTO stock_transactions (
            id,
            product_id,
            user_id,
            direction,
            magnitude,
            quantity_before,
            quantity_after,
            unit_price_minor,
            note,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(t.id.as_uuid())
    .bind(t.product_id.as_uuid())
    .bind(t.user_id.as_uuid())
    .bind(t.direction.as_str())
    .bind(t.magnitude)
    .bind(t.quantity_before)
    .bind(t.quantity_after)
    .bind(unit_price)
    .bind(&t.note)
    .bind(t.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_transaction", e))?;
    Ok(())
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, role, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, username, email, role, is_active, created_at FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_user", e))?;

        row.map(|row| -> Result<User, StoreError> {
            let role: String = row.try_get("role").map_err(read_err("role"))?;
            Ok(User {
                id: UserId::from_uuid(row.try_get("id").map_err(read_err("id"))?),
                username: row.try_get("username").map_err(read_err("username"))?,
                email: row.try_get("email").map_err(read_err("email"))?,
                role: role
                    .parse::<Role>()
                    .map_err(|e| StoreError::Backend(e.to_string()))?,
                is_active: row.try_get("is_active").map_err(read_err("is_active"))?,
                created_at: row.try_get("created_at").map_err(read_err("created_at"))?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, supplier), fields(supplier_id = %supplier.id), err)]
    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, phone, email, address, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(supplier.id.as_uuid())
        .bind(&supplier.name)
        .bind(&supplier.contact.phone)
        .bind(&supplier.contact.email)
        .bind(&supplier.contact.address)
        .bind(supplier.is_active)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_supplier", e))?;
        Ok(())
    }

    /// The supplier row is locked first; products inserted concurrently with a
    /// reference to it hold a share lock on that row, so the active-product count
    /// below sees every product that could still commit.
    #[instrument(skip(self, supplier), fields(supplier_id = %supplier.id, is_active = supplier.is_active), err)]
    async fn update_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current = sqlx::query("SELECT is_active FROM suppliers WHERE id = $1 FOR UPDATE")
            .bind(supplier.id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_supplier", e))?;
        let Some(current) = current else {
            rollback(tx).await?;
            return Err(StoreError::MissingReference(format!("supplier {}", supplier.id)));
        };
        let was_active: bool = current.try_get("is_active").map_err(read_err("is_active"))?;

        if was_active && !supplier.is_active {
            let in_use: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM products WHERE supplier_id = $1 AND is_active",
            )
            .bind(supplier.id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_supplier_products", e))?;
            if in_use > 0 {
                rollback(tx).await?;
                return Err(StoreError::InUse(format!(
                    "supplier {} has {in_use} active products",
                    supplier.id
                )));
            }
        }

        let updated = sqlx::query(
            r#"
            UPDATE suppliers
            SET name = $2, phone = $3, email = $4, address = $5, is_active = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(supplier.id.as_uuid())
        .bind(&supplier.name)
        .bind(&supplier.contact.phone)
        .bind(&supplier.contact.email)
        .bind(&supplier.contact.address)
        .bind(supplier.is_active)
        .bind(supplier.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_supplier", e));
        if let Err(e) = updated {
            rollback(tx).await?;
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn load_supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, phone, email, address, is_active, created_at, updated_at
            FROM suppliers
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_supplier", e))?;

        row.as_ref().map(supplier_from_row).transpose()
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, phone, email, address, is_active, created_at, updated_at
            FROM suppliers
            ORDER BY name ASC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_suppliers", e))?;

        rows.iter().map(supplier_from_row).collect()
    }

    #[instrument(
        skip(self, product, opening),
        fields(product_id = %product.id_typed(), opening = opening.is_some()),
        err
    )]
    async fn insert_product(
        &self,
        product: &Product,
        opening: Option<&StockTransaction>,
    ) -> Result<(), StoreError> {
        match opening {
            Some(t) => validate_movement(product, t)?,
            None if product.quantity() != 0 => {
                return Err(StoreError::InvalidWrite(format!(
                    "product {} has quantity {} without an opening entry",
                    product.id_typed(),
                    product.quantity()
                )));
            }
            None => {}
        }

        let row = ProductRow::try_from(product.snapshot())?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if row.is_active {
            if let Err(e) = ensure_active_supplier(&mut tx, row.supplier_id).await {
                rollback(tx).await?;
                return Err(e);
            }
        }
        if let Err(e) = row.insert(&mut tx).await {
            rollback(tx).await?;
            return Err(e);
        }
        if let Some(t) = opening {
            if let Err(e) = insert_transaction(&mut tx, t).await {
                rollback(tx).await?;
                return Err(e);
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn load_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    /// Compare-and-swap on the product row plus append of the entry.
    ///
    /// The product row is locked with `FOR UPDATE` for the duration of the
    /// transaction, so two writers racing on the same product serialize here and
    /// the loser sees the bumped version.
    #[instrument(
        skip(self, product, movement),
        fields(
            product_id = %product.id_typed(),
            expected_version = ?expected_version,
            new_version = product.version(),
            operation = tracing::field::Empty
        ),
        err
    )]
    async fn commit(
        &self,
        product: &Product,
        expected_version: ExpectedVersion,
        movement: Option<&StockTransaction>,
    ) -> Result<(), StoreError> {
        let span = Span::current();
        span.record("operation", "commit");

        if let Some(t) = movement {
            validate_movement(product, t)?;
        }
        let row = ProductRow::try_from(product.snapshot())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current = sqlx::query(
            "SELECT version, quantity, sku, supplier_id FROM products WHERE id = $1 FOR UPDATE",
        )
            .bind(row.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?;

        let Some(current) = current else {
            rollback(tx).await?;
            return Err(StoreError::MissingReference(format!("product {}", row.id)));
        };
        let stored_version: i64 = current.try_get("version").map_err(read_err("version"))?;
        let stored_quantity: i64 = current.try_get("quantity").map_err(read_err("quantity"))?;
        let stored_sku: Option<String> = current.try_get("sku").map_err(read_err("sku"))?;
        let stored_supplier: Option<uuid::Uuid> =
            current.try_get("supplier_id").map_err(read_err("supplier_id"))?;

        if !expected_version.matches(stored_version as u64) {
            rollback(tx).await?;
            return Err(StoreError::Concurrency(format!(
                "product {}: expected {expected_version:?}, found {stored_version}",
                row.id
            )));
        }
        if stored_sku != row.sku {
            rollback(tx).await?;
            return Err(StoreError::InvalidWrite(format!("product {}: sku is immutable", row.id)));
        }
        let quantity_check = match movement {
            Some(t) if t.quantity_before != stored_quantity => Err(StoreError::InvalidWrite(format!(
                "movement {} starts at {}, stored quantity is {stored_quantity}",
                t.id, t.quantity_before
            ))),
            None if row.quantity != stored_quantity => Err(StoreError::InvalidWrite(format!(
                "product {}: quantity changed without a ledger entry",
                row.id
            ))),
            _ => Ok(()),
        };
        if let Err(e) = quantity_check {
            rollback(tx).await?;
            return Err(e);
        }
        if row.is_active && row.supplier_id != stored_supplier {
            if let Err(e) = ensure_active_supplier(&mut tx, row.supplier_id).await {
                rollback(tx).await?;
                return Err(e);
            }
        }

        if let Err(e) = row.update(&mut tx).await {
            rollback(tx).await?;
            return Err(e);
        }
        if let Some(t) = movement {
            if let Err(e) = insert_transaction(&mut tx, t).await {
                rollback(tx).await?;
                return Err(e);
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn history(
        &self,
        product_id: ProductId,
        limit: Option<usize>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions \
             WHERE product_id = $1 \
             ORDER BY created_at DESC, entry_no DESC \
             LIMIT $2"
        );
        self.fetch_transactions(
            "history",
            sqlx::query(&sql).bind(product_id.as_uuid()).bind(limit),
        )
        .await
    }

    async fn recent_transactions(&self, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions \
             ORDER BY created_at DESC, entry_no DESC \
             LIMIT $1"
        );
        self.fetch_transactions("recent_transactions", sqlx::query(&sql).bind(limit))
            .await
    }

    async fn transactions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions \
             WHERE created_at >= $1 AND created_at <= $2 \
             ORDER BY created_at ASC, entry_no ASC"
        );
        self.fetch_transactions(
            "transactions_between",
            sqlx::query(&sql).bind(from).bind(to),
        )
        .await
    }
}

fn read_err(column: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| StoreError::Backend(format!("failed to read column {column}: {e}"))
}

fn money_to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.minor_units())
        .map_err(|_| StoreError::InvalidWrite(format!("amount {money} does not fit in BIGINT")))
}

fn money_from_db(minor: i64) -> Result<Money, StoreError> {
    u64::try_from(minor)
        .map(Money::from_minor)
        .map_err(|_| StoreError::Backend(format!("negative amount {minor} in database")))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                Some("23503") => StoreError::MissingReference(msg),
                Some("23514") => StoreError::InvalidWrite(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn supplier_from_row(row: &PgRow) -> Result<Supplier, StoreError> {
    Ok(Supplier {
        id: SupplierId::from_uuid(row.try_get("id").map_err(read_err("id"))?),
        name: row.try_get("name").map_err(read_err("name"))?,
        contact: ContactInfo {
            phone: row.try_get("phone").map_err(read_err("phone"))?,
            email: row.try_get("email").map_err(read_err("email"))?,
            address: row.try_get("address").map_err(read_err("address"))?,
        },
        is_active: row.try_get("is_active").map_err(read_err("is_active"))?,
        created_at: row.try_get("created_at").map_err(read_err("created_at"))?,
        updated_at: row.try_get("updated_at").map_err(read_err("updated_at"))?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let row = ProductRow::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to read product row: {e}")))?;
    Ok(Product::restore(row.try_into()?))
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    name: String,
    category: String,
    description: Option<String>,
    price_minor: i64,
    quantity: i64,
    min_stock_level: i64,
    sku: Option<String>,
    supplier_id: Option<uuid::Uuid>,
    is_active: bool,
    version: i64,
    last_movement_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    async fn insert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.category)
        .bind(&self.description)
        .bind(self.price_minor)
        .bind(self.quantity)
        .bind(self.min_stock_level)
        .bind(&self.sku)
        .bind(self.supplier_id)
        .bind(self.is_active)
        .bind(self.version)
        .bind(self.last_movement_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update(&self, tx: &mut Transaction<'_, Postgres>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE products
            SET name = $2,
                category = $3,
                description = $4,
                price_minor = $5,
                quantity = $6,
                min_stock_level = $7,
                supplier_id = $8,
                is_active = $9,
                version = $10,
                last_movement_at = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.category)
        .bind(&self.description)
        .bind(self.price_minor)
        .bind(self.quantity)
        .bind(self.min_stock_level)
        .bind(self.supplier_id)
        .bind(self.is_active)
        .bind(self.version)
        .bind(self.last_movement_at)
        .bind(self.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(())
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            description: row.try_get("description")?,
            price_minor: row.try_get("price_minor")?,
            quantity: row.try_get("quantity")?,
            min_stock_level: row.try_get("min_stock_level")?,
            sku: row.try_get("sku")?,
            supplier_id: row.try_get("supplier_id")?,
            is_active: row.try_get("is_active")?,
            version: row.try_get("version")?,
            last_movement_at: row.try_get("last_movement_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ProductSnapshot> for ProductRow {
    type Error = StoreError;

    fn try_from(s: ProductSnapshot) -> Result<Self, Self::Error> {
        Ok(ProductRow {
            id: *s.id.as_uuid(),
            name: s.name,
            category: s.category,
            description: s.description,
            price_minor: money_to_db(s.price)?,
            quantity: s.quantity,
            min_stock_level: s.min_stock_level,
            sku: s.sku,
            supplier_id: s.supplier_id.map(|id| *id.as_uuid()),
            is_active: s.is_active,
            version: i64::try_from(s.version)
                .map_err(|_| StoreError::InvalidWrite(format!("version {} out of range", s.version)))?,
            last_movement_at: s.last_movement_at,
            created_at: s.created_at,
            updated_at: s.updated_at,
        })
    }
}

impl TryFrom<ProductRow> for ProductSnapshot {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(ProductSnapshot {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            category: row.category,
            description: row.description,
            price: money_from_db(row.price_minor)?,
            quantity: row.quantity,
            min_stock_level: row.min_stock_level,
            sku: row.sku,
            supplier_id: row.supplier_id.map(SupplierId::from_uuid),
            is_active: row.is_active,
            version: row.version as u64,
            last_movement_at: row.last_movement_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct TransactionRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    user_id: uuid::Uuid,
    direction: String,
    magnitude: i64,
    quantity_before: i64,
    quantity_after: i64,
    unit_price_minor: Option<i64>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for TransactionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            user_id: row.try_get("user_id")?,
            direction: row.try_get("direction")?,
            magnitude: row.try_get("magnitude")?,
            quantity_before: row.try_get("quantity_before")?,
            quantity_after: row.try_get("quantity_after")?,
            unit_price_minor: row.try_get("unit_price_minor")?,
            note: row.try_get("note")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<TransactionRow> for StockTransaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(StockTransaction {
            id: TransactionId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            user_id: UserId::from_uuid(row.user_id),
            direction: row
                .direction
                .parse::<Direction>()
                .map_err(|e| StoreError::Backend(e.to_string()))?,
            magnitude: row.magnitude,
            quantity_before: row.quantity_before,
            quantity_after: row.quantity_after,
            unit_price: row.unit_price_minor.map(money_from_db).transpose()?,
            note: row.note,
            created_at: row.created_at,
        })
    }
}
