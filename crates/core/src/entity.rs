/// A record with identity but no versioned history of its own (users,
/// suppliers).
///
/// Entities are never deleted; deactivation hides them from new references
/// while existing ledger entries keep pointing at them.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    fn is_active(&self) -> bool;
}
