pub mod activities;
pub mod agencies;
pub mod leads;
pub mod manager;
pub mod messages;
pub mod models;
pub mod transfers;
pub mod users;

pub use activities::ActivityLog;
pub use agencies::AgencyRepository;
pub use leads::LeadRepository;
pub use manager::{DatabaseError, DatabaseManager};
pub use messages::{MessageRepository, NoteRepository, SentEmail};
pub use transfers::{DeadlineAnswer, TransferRepository};
pub use users::{CleanupResult, UserRepository};
