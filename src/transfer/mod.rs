//! Transfer construction, submission and delivery confirmation

pub mod coordinator;
pub mod request;
pub mod status;

pub use coordinator::{Coordinator, CoordinatorConfig, TransferOutcome, TransferStatus};
pub use request::{TransferDraft, TransferRequest};
pub use status::LayerZeroScan;
