//! Sea-ORM entities for the messaging tables

pub mod direct_conversations;
pub mod message_read_status;
pub mod private_messages;
pub mod profiles;

pub use direct_conversations::Entity as DirectConversation;
pub use message_read_status::Entity as MessageReadStatus;
pub use private_messages::Entity as PrivateMessage;
pub use profiles::Entity as Profile;
