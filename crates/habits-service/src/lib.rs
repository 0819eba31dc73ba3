//! Record upsert orchestration for the habits system.
//!
//! [`RecordService`] is the single entry point that writes completion
//! records. Every write validates the request, upserts the ledger row and
//! updates the habit's cached streak inside one storage transaction.

pub mod clock;
pub mod error;
pub mod service;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Result, ServiceError};
pub use service::RecordService;
pub use types::{
    DEFAULT_PAGE_LIMIT, HistoryPage, MAX_PAGE_LIMIT, NewHabit, Pagination, RecordOutcome,
    RetroactiveOutcome, ServiceOptions, UpsertRecord,
};
