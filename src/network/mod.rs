//! Network subsystem for UDP audio transport

pub mod receiver;
pub mod sender;
pub mod udp;

pub use receiver::{AudioReceiver, SessionState};
pub use sender::{AudioSender, SenderStats};
pub use udp::bind_socket;
