//! Building blocks shared by the stock ledger crates: typed ids, money,
//! the domain error, and the aggregate/entity traits. No IO lives here.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ProductId, SupplierId, TransactionId, UserId};
pub use money::Money;
