pub mod email;
pub mod push;

pub use email::{EmailSender, LogMailer, RelayMailer};
pub use push::{PushChannel, PushHub};

#[cfg(test)]
pub use email::EmailError;
#[cfg(test)]
pub use push::PushError;
