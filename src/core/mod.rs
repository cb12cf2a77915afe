pub mod analytics;
pub mod desk;
pub mod error;
pub mod events;
pub mod export;
pub mod facility;
pub mod isbar;
pub mod persistence;
pub mod queue;
pub mod referral;
pub mod seed;
pub mod vitals;
pub mod workflow;

pub use desk::ReceivingDesk;
pub use error::{DeskError, Result};
pub use events::{Event, EventKind, EventStore};
pub use export::ExportFormat;
pub use facility::{FacilityMeta, FacilityRegistry};
pub use referral::{Referral, Status};
pub use vitals::VitalsInput;
pub use workflow::{Action, RejectReason};
