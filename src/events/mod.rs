pub mod guild;
pub mod intent;
pub mod interaction;
pub mod message;

pub use guild::{handle_channel_create, handle_member_add, handle_member_remove, handle_role_create};
pub use interaction::handle_interaction;
pub use message::{handle_message, handle_reaction_add, handle_voice_state_update};
