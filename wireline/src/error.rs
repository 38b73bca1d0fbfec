use thiserror::Error;

/// Errors returned by the core primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A completion was set twice without an intervening reset.
    #[error("completion already holds a result")]
    AlreadyCompleted,
    /// A node was pushed while still linked into a list.
    #[error("list node {0} is already linked")]
    AlreadyLinked(usize),
    /// A node was removed from a list it is not linked into.
    #[error("list node {0} is not linked")]
    NotLinked(usize),
    /// A node was removed through a list other than the one holding it.
    #[error("list node {0} belongs to another list")]
    ForeignNode(usize),
    /// The key does not name a node in the arena.
    #[error("invalid list key {0}")]
    InvalidKey(usize),
}
