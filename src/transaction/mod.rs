// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Multi-document units of work over the document store with optimistic
// concurrency control.
//
// Design Patterns Used:
// - State Pattern: Transaction state management (Active, Committed, Aborted)
// - Command Pattern: Buffered changes applied on commit, dropped on abort
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod session;
pub mod state;

pub use change::Change;
pub use manager::{TransactionManager, TransactionStats};
pub use session::Session;
pub use state::{ReadSet, Transaction, TransactionId, TransactionState};
