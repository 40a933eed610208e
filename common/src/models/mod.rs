pub mod session;
pub mod tx;

pub use session::{PreviewIdentity, Role, Session, UnknownRole};
pub use tx::{TrackedTransaction, TxKind, TxState};
