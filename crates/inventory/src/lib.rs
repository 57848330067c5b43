//! Inventory domain module: products, their stock ledger, and derived reports.
//!
//! This crate contains business rules for inventory, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod report;
pub mod status;
pub mod supplier;
pub mod transaction;
pub mod user;

pub use product::{
    AdjustStock, DeactivateProduct, DetailsUpdated, NewProduct, Product, ProductCommand,
    ProductDeactivated, ProductDetails, ProductEvent, ProductSnapshot, UpdateDetails,
    DEFAULT_MIN_STOCK_LEVEL,
};
pub use report::{
    CategoryStats, InventorySummary, MovementReport, MovementStats, TopProduct,
    inventory_summary, low_stock_products, movement_report, out_of_stock_products,
};
pub use status::StockStatus;
pub use supplier::{ContactInfo, NewSupplier, Supplier};
pub use transaction::{Direction, StockTransaction};
pub use user::{NewUser, Role, User};
