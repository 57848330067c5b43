use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, Money, ProductId, SupplierId,
    TransactionId, UserId,
};

use crate::status::StockStatus;
use crate::transaction::{Direction, StockTransaction};

/// Threshold used when a product is registered without one.
pub const DEFAULT_MIN_STOCK_LEVEL: i64 = 10;

/// Aggregate root: Product.
///
/// `quantity` is private and only changes through `apply(StockMoved)`, so it
/// always equals the signed sum of the product's transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    category: String,
    description: Option<String>,
    price: Money,
    quantity: i64,
    min_stock_level: i64,
    sku: Option<String>,
    supplier_id: Option<SupplierId>,
    is_active: bool,
    version: u64,
    last_movement_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Flat, storable form of a [`Product`].
///
/// Storage backends persist and load this; domain code goes through `Product`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Money,
    pub quantity: i64,
    pub min_stock_level: i64,
    pub sku: Option<String>,
    pub supplier_id: Option<SupplierId>,
    pub is_active: bool,
    pub version: u64,
    pub last_movement_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Money,
    /// Recorded as an opening `add` transaction when positive.
    pub initial_quantity: i64,
    pub min_stock_level: Option<i64>,
    pub sku: Option<String>,
    pub supplier_id: Option<SupplierId>,
}

/// Editable product attributes. Quantity and SKU are not editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Money,
    pub min_stock_level: i64,
    pub supplier_id: Option<SupplierId>,
}

impl Product {
    /// Register a new product, optionally with an opening balance.
    ///
    /// The returned product is at version 0 without opening stock, or version 1
    /// with the opening transaction already applied.
    pub fn register(
        id: ProductId,
        new: NewProduct,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<(Product, Option<StockTransaction>)> {
        let name = required("name", &new.name)?;
        let category = required("category", &new.category)?;
        let min_stock_level = new.min_stock_level.unwrap_or(DEFAULT_MIN_STOCK_LEVEL);
        if min_stock_level < 0 {
            return Err(DomainError::validation("min_stock_level cannot be negative"));
        }
        if new.initial_quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        let sku = match new.sku.as_deref().map(str::trim) {
            Some("") => return Err(DomainError::validation("sku cannot be blank")),
            Some(s) => Some(s.to_string()),
            None => None,
        };

        let mut product = Product {
            id,
            name,
            category,
            description: optional_text(new.description),
            price: new.price,
            quantity: 0,
            min_stock_level,
            sku,
            supplier_id: new.supplier_id,
            is_active: true,
            version: 0,
            last_movement_at: None,
            created_at: occurred_at,
            updated_at: occurred_at,
        };

        if new.initial_quantity == 0 {
            return Ok((product, None));
        }

        let opening = product
            .execute(&ProductCommand::AdjustStock(AdjustStock {
                transaction_id: TransactionId::new(),
                product_id: id,
                direction: Direction::Add,
                magnitude: new.initial_quantity,
                actor,
                note: Some("opening balance".to_string()),
                occurred_at,
            }))?
            .into_iter()
            .find_map(|event| match event {
                ProductEvent::StockMoved(t) => Some(t),
                _ => None,
            });
        Ok((product, opening))
    }

    pub fn restore(snapshot: ProductSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            category: snapshot.category,
            description: snapshot.description,
            price: snapshot.price,
            quantity: snapshot.quantity,
            min_stock_level: snapshot.min_stock_level,
            sku: snapshot.sku,
            supplier_id: snapshot.supplier_id,
            is_active: snapshot.is_active,
            version: snapshot.version,
            last_movement_at: snapshot.last_movement_at,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }

    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            price: self.price,
            quantity: self.quantity,
            min_stock_level: self.min_stock_level,
            sku: self.sku.clone(),
            supplier_id: self.supplier_id,
            is_active: self.is_active,
            version: self.version,
            last_movement_at: self.last_movement_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn min_stock_level(&self) -> i64 {
        self.min_stock_level
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn last_movement_at(&self) -> Option<DateTime<Utc>> {
        self.last_movement_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn stock_status(&self) -> StockStatus {
        StockStatus::classify(self.quantity, self.min_stock_level)
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock_level
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= 0
    }

    /// Current stock valued at the current price.
    pub fn total_value(&self) -> Money {
        self.price.times(self.quantity)
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AdjustStock (the ledger's only quantity-changing command).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub direction: Direction,
    pub magnitude: i64,
    pub actor: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateProduct (soft delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    AdjustStock(AdjustStock),
    UpdateDetails(UpdateDetails),
    Deactivate(DeactivateProduct),
}

/// Event: DetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsUpdated {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeactivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    /// A ledger entry; the only event that changes quantity.
    StockMoved(StockTransaction),
    DetailsUpdated(DetailsUpdated),
    Deactivated(ProductDeactivated),
}

impl ProductEvent {
    pub fn as_stock_movement(&self) -> Option<&StockTransaction> {
        match self {
            ProductEvent::StockMoved(t) => Some(t),
            _ => None,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::StockMoved(t) => {
                self.quantity = t.quantity_after;
                self.last_movement_at = Some(t.created_at);
                self.updated_at = t.created_at;
            }
            ProductEvent::DetailsUpdated(e) => {
                self.name = e.details.name.clone();
                self.category = e.details.category.clone();
                self.description = e.details.description.clone();
                self.price = e.details.price;
                self.min_stock_level = e.details.min_stock_level;
                self.supplier_id = e.details.supplier_id;
                self.updated_at = e.occurred_at;
            }
            ProductEvent::Deactivated(e) => {
                self.is_active = false;
                self.updated_at = e.occurred_at;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            ProductCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            ProductCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.is_active {
            return Err(DomainError::InactiveProduct(self.id));
        }
        Ok(())
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;

        if cmd.magnitude <= 0 {
            return Err(DomainError::InvalidQuantity(cmd.magnitude));
        }
        self.ensure_active()?;

        let quantity_after = match cmd.direction {
            Direction::Add => self
                .quantity
                .checked_add(cmd.magnitude)
                .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?,
            Direction::Remove => {
                if cmd.magnitude > self.quantity {
                    return Err(DomainError::InsufficientStock {
                        requested: cmd.magnitude,
                        available: self.quantity,
                    });
                }
                self.quantity - cmd.magnitude
            }
        };

        // Ledger time never runs backwards for a product, even if clocks do.
        let created_at = match self.last_movement_at {
            Some(last) if last > cmd.occurred_at => last,
            _ => cmd.occurred_at,
        };

        Ok(vec![ProductEvent::StockMoved(StockTransaction {
            id: cmd.transaction_id,
            product_id: self.id,
            user_id: cmd.actor,
            direction: cmd.direction,
            magnitude: cmd.magnitude,
            quantity_before: self.quantity,
            quantity_after,
            unit_price: Some(self.price),
            note: optional_text(cmd.note.clone()),
            created_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;
        self.ensure_active()?;

        let details = &cmd.details;
        let name = required("name", &details.name)?;
        let category = required("category", &details.category)?;
        if details.min_stock_level < 0 {
            return Err(DomainError::validation("min_stock_level cannot be negative"));
        }

        Ok(vec![ProductEvent::DetailsUpdated(DetailsUpdated {
            product_id: self.id,
            details: ProductDetails {
                name,
                category,
                description: optional_text(details.description.clone()),
                price: details.price,
                min_stock_level: details.min_stock_level,
                supplier_id: details.supplier_id,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;
        self.ensure_active()?;

        Ok(vec![ProductEvent::Deactivated(ProductDeactivated {
            product_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn required(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trimmed text, or `None` when blank.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn new_product(initial_quantity: i64) -> NewProduct {
        NewProduct {
            name: "Wireless Mouse".to_string(),
            category: "Electronics".to_string(),
            description: None,
            price: Money::from_minor(2999),
            initial_quantity,
            min_stock_level: Some(5),
            sku: Some("MOUSE-WL-001".to_string()),
            supplier_id: None,
        }
    }

    fn registered(initial_quantity: i64) -> Product {
        Product::register(ProductId::new(), new_product(initial_quantity), UserId::new(), test_time())
            .unwrap()
            .0
    }

    fn adjust(product: &Product, direction: Direction, magnitude: i64) -> ProductCommand {
        ProductCommand::AdjustStock(AdjustStock {
            transaction_id: TransactionId::new(),
            product_id: product.id_typed(),
            direction,
            magnitude,
            actor: UserId::new(),
            note: None,
            occurred_at: test_time(),
        })
    }

    fn move_stock(product: &mut Product, direction: Direction, magnitude: i64) -> DomainResult<StockTransaction> {
        let command = adjust(product, direction, magnitude);
        let events = product.execute(&command)?;
        Ok(events[0].as_stock_movement().cloned().unwrap())
    }

    #[test]
    fn register_without_stock_has_no_opening_entry() {
        let (product, opening) =
            Product::register(ProductId::new(), new_product(0), UserId::new(), test_time()).unwrap();
        assert!(opening.is_none());
        assert_eq!(product.quantity(), 0);
        assert_eq!(product.version(), 0);
        assert!(product.is_active());
    }

    #[test]
    fn register_records_opening_balance_as_add() {
        let actor = UserId::new();
        let (product, opening) =
            Product::register(ProductId::new(), new_product(25), actor, test_time()).unwrap();
        let opening = opening.unwrap();
        assert_eq!(opening.direction, Direction::Add);
        assert_eq!((opening.quantity_before, opening.quantity_after), (0, 25));
        assert_eq!(opening.user_id, actor);
        assert_eq!(product.quantity(), 25);
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn register_rejects_bad_input() {
        let mut input = new_product(0);
        input.name = "   ".to_string();
        assert!(matches!(
            Product::register(ProductId::new(), input, UserId::new(), test_time()),
            Err(DomainError::Validation(_))
        ));

        let mut input = new_product(-1);
        input.sku = None;
        assert!(matches!(
            Product::register(ProductId::new(), input, UserId::new(), test_time()),
            Err(DomainError::Validation(_))
        ));

        let mut input = new_product(0);
        input.sku = Some(" ".to_string());
        assert!(Product::register(ProductId::new(), input, UserId::new(), test_time()).is_err());
    }

    #[test]
    fn sequential_scenario_from_ten() {
        let mut product = registered(10);

        let t = move_stock(&mut product, Direction::Add, 5).unwrap();
        assert_eq!((t.quantity_before, t.quantity_after), (10, 15));
        assert_eq!(product.quantity(), 15);

        let err = move_stock(&mut product, Direction::Remove, 20).unwrap_err();
        assert_eq!(err, DomainError::InsufficientStock { requested: 20, available: 15 });
        assert_eq!(product.quantity(), 15);

        let t = move_stock(&mut product, Direction::Remove, 15).unwrap();
        assert_eq!((t.quantity_before, t.quantity_after), (15, 0));
        assert_eq!(product.stock_status(), StockStatus::OutOfStock);
    }

    #[test]
    fn non_positive_magnitude_is_invalid_in_both_directions() {
        let product = registered(10);
        for direction in [Direction::Add, Direction::Remove] {
            for magnitude in [0, -3] {
                assert_eq!(
                    product.handle(&adjust(&product, direction, magnitude)),
                    Err(DomainError::InvalidQuantity(magnitude))
                );
            }
        }
    }

    #[test]
    fn inactive_product_rejects_every_mutation() {
        let mut product = registered(10);
        let events = product
            .handle(&ProductCommand::Deactivate(DeactivateProduct {
                product_id: product.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);
        assert!(!product.is_active());

        let id = product.id_typed();
        assert_eq!(
            product.handle(&adjust(&product, Direction::Add, 1)),
            Err(DomainError::InactiveProduct(id))
        );
        assert_eq!(
            product.handle(&ProductCommand::Deactivate(DeactivateProduct {
                product_id: id,
                occurred_at: test_time(),
            })),
            Err(DomainError::InactiveProduct(id))
        );
    }

    #[test]
    fn price_snapshot_and_note_are_captured() {
        let product = registered(3);
        let mut cmd = adjust(&product, Direction::Add, 2);
        if let ProductCommand::AdjustStock(c) = &mut cmd {
            c.note = Some("  restock from supplier  ".to_string());
        }
        let events = product.handle(&cmd).unwrap();
        let t = events[0].as_stock_movement().unwrap();
        assert_eq!(t.unit_price, Some(Money::from_minor(2999)));
        assert_eq!(t.note.as_deref(), Some("restock from supplier"));
    }

    #[test]
    fn movement_timestamps_never_go_backwards() {
        let mut product = registered(0);
        let later = test_time() + Duration::minutes(10);
        let mut cmd = adjust(&product, Direction::Add, 1);
        if let ProductCommand::AdjustStock(c) = &mut cmd {
            c.occurred_at = later;
        }
        let events = product.handle(&cmd).unwrap();
        product.apply(&events[0]);

        // A skewed clock reports an earlier time for the next movement.
        let mut cmd = adjust(&product, Direction::Add, 1);
        if let ProductCommand::AdjustStock(c) = &mut cmd {
            c.occurred_at = test_time();
        }
        let events = product.handle(&cmd).unwrap();
        assert_eq!(events[0].as_stock_movement().unwrap().created_at, later);
    }

    #[test]
    fn update_details_never_touches_quantity_or_sku() {
        let mut product = registered(7);
        let events = product
            .handle(&ProductCommand::UpdateDetails(UpdateDetails {
                product_id: product.id_typed(),
                details: ProductDetails {
                    name: "Wireless Mouse v2".to_string(),
                    category: "Peripherals".to_string(),
                    description: Some("".to_string()),
                    price: Money::from_minor(3499),
                    min_stock_level: 8,
                    supplier_id: None,
                },
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);

        assert_eq!(product.name(), "Wireless Mouse v2");
        assert_eq!(product.description(), None);
        assert_eq!(product.quantity(), 7);
        assert_eq!(product.sku(), Some("MOUSE-WL-001"));
        assert_eq!(product.stock_status(), StockStatus::LowStock);
        assert_eq!(product.total_value(), Money::from_minor(7 * 3499));
    }

    #[test]
    fn handle_is_deterministic() {
        let product = registered(4);
        let cmd = adjust(&product, Direction::Remove, 3);
        let before = product.clone();
        let events1 = product.handle(&cmd);
        let events2 = product.handle(&cmd);
        assert_eq!(product, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn snapshot_restores_identical_product() {
        let product = registered(12);
        assert_eq!(Product::restore(product.snapshot()), product);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn direction() -> impl Strategy<Value = Direction> {
            prop_oneof![Just(Direction::Add), Just(Direction::Remove)]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: quantity always equals the signed sum of the accepted history.
            #[test]
            fn quantity_equals_signed_history_sum(
                initial in 0i64..50,
                moves in proptest::collection::vec((direction(), -5i64..30), 0..60)
            ) {
                let (mut product, opening) =
                    Product::register(ProductId::new(), new_product(initial), UserId::new(), test_time()).unwrap();
                let mut history: Vec<StockTransaction> = opening.into_iter().collect();

                for (direction, magnitude) in moves {
                    let before = product.quantity();
                    match move_stock(&mut product, direction, magnitude) {
                        Ok(t) => {
                            prop_assert!(t.is_consistent());
                            history.push(t);
                        }
                        Err(_) => prop_assert_eq!(product.quantity(), before),
                    }
                    prop_assert!(product.quantity() >= 0);
                    let sum: i64 = history.iter().map(StockTransaction::signed_delta).sum();
                    prop_assert_eq!(product.quantity(), sum);
                }
                prop_assert_eq!(product.version(), history.len() as u64);
            }

            /// Property: removals beyond on-hand stock always fail and change nothing.
            #[test]
            fn over_removal_always_fails(initial in 0i64..100, extra in 1i64..100) {
                let product = registered(initial);
                let result = product.handle(&adjust(&product, Direction::Remove, initial + extra));
                prop_assert_eq!(
                    result,
                    Err(DomainError::InsufficientStock { requested: initial + extra, available: initial })
                );
            }
        }
    }
}
