pub mod activity;
pub mod agency;
pub mod lead;
pub mod message;
pub mod note;
pub mod transfer;
pub mod user_profile;

pub use activity::NewActivity;
pub use agency::{Agency, NewAgency};
pub use lead::{Lead, LeadContact, LeadFilter, LeadPatch, NewLead};
pub use message::{EmailMessage, Message, MessageTemplate, NewMessage};
pub use note::LeadNote;
pub use transfer::{
    DeadlineRow, NewTransfer, OverdueTransfer, StatusCount, Transfer, TransferContact, TransferOwner,
    TransferPatch, TransferStatus, TransferView,
};
pub use user_profile::UserProfile;
