//! Versioned aggregates and the optimistic-concurrency expectation used to
//! commit them.

/// Something with an identity and a write counter.
///
/// The store keeps the counter next to the state; a writer commits with the
/// counter it loaded, and the store refuses the write if the counter moved.
pub trait AggregateRoot {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> &Self::Id;

    /// Number of events applied since the aggregate was created.
    fn version(&self) -> u64;
}

/// What the stored version must be for a commit to succeed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Commit only if the stored version equals this one.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expect the version `aggregate` was loaded at.
    pub fn of<A: AggregateRoot + ?Sized>(aggregate: &A) -> Self {
        ExpectedVersion::Exact(aggregate.version())
    }

    pub fn matches(self, stored: u64) -> bool {
        let ExpectedVersion::Exact(expected) = self;
        expected == stored
    }
}

/// Decide/evolve split for aggregate behavior.
///
/// `handle` looks at the current state and a command and returns the events
/// that should happen, or an error. `apply` folds one event into the state and
/// bumps the version by one. Neither does IO.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Fold one event into the state (+1 version).
    fn apply(&mut self, event: &Self::Event);

    /// Decide. Must not mutate state; the same state and command always give
    /// the same result.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Decide and fold in one step. On error the state is untouched.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }
}
