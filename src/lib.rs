//! Tallybook core: clients, multi-currency operations, and batch sync
//! between the local SQLite store and a remote document store.
//!
//! The UI layer is a separate collaborator; everything here is the engine it
//! calls into: the local store surface, the pure conversion helper, and the
//! pull/push sync engines with their progress callbacks.

pub mod auth;
pub mod balance;
pub mod convert;
pub mod db;
mod id;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod remote;
pub mod settings;
pub mod store;
pub mod sync;
pub mod time;

pub use auth::User;
pub use balance::{client_balance, create_checkpoint, income_expense, Stats};
pub use convert::{convert, RateTable};
pub use id::new_uuid_v7;
pub use model::{Balance, Client, Currency, Operation};
pub use remote::{Collection, MemoryRemote, RemoteError, RemoteStore, WriteBatch};
pub use settings::{default_base_currency, Settings};
pub use store::StoreError;
pub use sync::{pull, push, SyncError};
