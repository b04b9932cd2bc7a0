//! Command byte codec.
//!
//! ## Wire format
//!
//! ```text
//! opcode: u8        (always)
//! param:  u8        (only when the command carries one)
//! ```
//!
//! There is no length prefix. Over UDP each datagram is one command;
//! over the serial line the writer emits the bytes back to back.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::command::{Command, Opcode};
use crate::error::CommandError;

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCodec;

impl Encoder<Command> for CommandCodec {
    type Error = CommandError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.wire_len());
        dst.put_u8(item.opcode.as_u8());
        if let Some(param) = item.param {
            dst.put_u8(param);
        }
        Ok(())
    }
}

/// Decodes one command per datagram. Used by peers on the far side of
/// the link and by tests standing in for them.
impl Decoder for CommandCodec {
    type Item = Command;
    type Error = CommandError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let datagram = src.split();
        let opcode = Opcode::try_from(datagram[0])?;
        Ok(Some(match datagram.get(1) {
            Some(&param) => Command::with_param(opcode, param),
            None => Command::new(opcode),
        }))
    }
}

/// Convenience for sinks that write a single command.
pub fn encode_command(cmd: Command) -> BytesMut {
    let mut buf = BytesMut::with_capacity(cmd.wire_len());
    // CommandCodec::encode cannot fail.
    let _ = CommandCodec.encode(cmd, &mut buf);
    buf
}
