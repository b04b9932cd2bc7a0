pub mod mailbox;
pub mod sender;
pub mod sink;
pub mod types;

pub use mailbox::CommandMailbox;
pub use sender::CommandSender;
pub use sink::{BlockingWriterSink, CommandSink, UdpCommandSink};
pub use types::{Command, Opcode};
