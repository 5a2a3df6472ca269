pub mod admin;
pub mod process;
pub mod providers;
pub mod responder;
pub mod state;
pub mod telegram;

pub use admin::{AdminBot, AdminCommand, RestartTarget};
pub use process::{ProcessController, ProcessError, SshTmuxController};
pub use providers::{Completion, ProviderError};
pub use responder::{Answer, Responder, ResponderConfig};
pub use state::BlacklistHandle;
