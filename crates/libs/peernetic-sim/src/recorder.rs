//! The on-disk recorder format (spec §6): a sequence of blocks, each
//! `{u32 length, bytes}` where the bytes are an `rmp-serde`-encoded
//! [`RecordedBlock`] carrying a wall-clock timestamp and a list of
//! sub-messages `{srcAddress, dstSuffix, payload}`.

use std::io::{self, Read, Write};
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use peernetic_core::{Address, Message};

/// One wire-level sub-message inside a recorded block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedSubMessage<P> {
    pub src_address: Address,
    pub dst_suffix: Address,
    pub payload: P,
}

/// A block of sub-messages recorded at one wall-clock instant, expressed
/// as milliseconds since an arbitrary but consistent epoch the writer
/// chooses (kept opaque to this format — only deltas between consecutive
/// blocks are meaningful to a replayer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedBlock<P> {
    pub timestamp_millis: u64,
    pub sub_messages: Vec<RecordedSubMessage<P>>,
}

impl<P> RecordedBlock<P> {
    pub fn from_messages(timestamp_millis: u64, destination_prefix: &Address, messages: Vec<Message<P>>) -> Self {
        let sub_messages = messages
            .into_iter()
            .filter_map(|msg| {
                let dst_suffix = destination_prefix.remove_prefix(&msg.destination).ok()?;
                Some(RecordedSubMessage {
                    src_address: msg.source,
                    dst_suffix,
                    payload: msg.payload,
                })
            })
            .collect();
        RecordedBlock {
            timestamp_millis,
            sub_messages,
        }
    }

    pub fn into_messages(self, destination_prefix: &Address) -> Vec<Message<P>> {
        self.sub_messages
            .into_iter()
            .map(|sub| Message::new(sub.src_address, destination_prefix.append(&sub.dst_suffix), sub.payload))
            .collect()
    }
}

/// Writes one `{u32 length, bytes}` block.
pub fn write_block<W: Write, P: Serialize>(writer: &mut W, block: &RecordedBlock<P>) -> io::Result<()> {
    let bytes = rmp_serde::to_vec(block).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(bytes.len() as u32).to_be_bytes())?;
    writer.write_all(&bytes)
}

/// Reads one block, or `None` at a clean end of stream.
pub fn read_block<R: Read, P: DeserializeOwned>(reader: &mut R) -> io::Result<Option<RecordedBlock<P>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    let block = rmp_serde::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(block))
}

/// Reads every remaining block from `reader`, in order, returning the
/// transit duration to the *next* block alongside each (the last block's
/// delta is [`Duration::ZERO`] — there is nothing after it to wait for).
pub fn read_all_with_deltas<R: Read, P: DeserializeOwned>(
    reader: &mut R,
) -> io::Result<Vec<(RecordedBlock<P>, Duration)>> {
    let mut blocks = Vec::new();
    while let Some(block) = read_block(reader)? {
        blocks.push(block);
    }
    let deltas: Vec<Duration> = (0..blocks.len())
        .map(|i| {
            if i + 1 < blocks.len() {
                Duration::from_millis(blocks[i + 1].timestamp_millis.saturating_sub(blocks[i].timestamp_millis))
            } else {
                Duration::ZERO
            }
        })
        .collect();
    Ok(blocks.into_iter().zip(deltas).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_round_trips_through_the_wire_format() {
        let prefix = Address::parse("recorded").unwrap();
        let msgs = vec![Message::new(
            Address::parse("a:x").unwrap(),
            Address::parse("recorded:child").unwrap(),
            "hi".to_string(),
        )];
        let block = RecordedBlock::from_messages(1_000, &prefix, msgs.clone());

        let mut buf = Vec::new();
        write_block(&mut buf, &block).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let read_back: RecordedBlock<String> = read_block(&mut cursor).unwrap().unwrap();
        assert_eq!(read_back.sub_messages.len(), 1);
        assert_eq!(read_back.into_messages(&prefix), msgs);
    }

    #[test]
    fn reading_past_the_last_block_yields_none() {
        let mut buf = Vec::new();
        let block: RecordedBlock<String> = RecordedBlock {
            timestamp_millis: 0,
            sub_messages: vec![],
        };
        write_block(&mut buf, &block).unwrap();
        let mut cursor = io::Cursor::new(buf);
        assert!(read_block::<_, String>(&mut cursor).unwrap().is_some());
        assert!(read_block::<_, String>(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn deltas_are_computed_between_consecutive_blocks() {
        let mut buf = Vec::new();
        for t in [0u64, 100, 350] {
            let block: RecordedBlock<String> = RecordedBlock {
                timestamp_millis: t,
                sub_messages: vec![],
            };
            write_block(&mut buf, &block).unwrap();
        }
        let mut cursor = io::Cursor::new(buf);
        let blocks: Vec<(RecordedBlock<String>, Duration)> = read_all_with_deltas(&mut cursor).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].1, Duration::from_millis(100));
        assert_eq!(blocks[1].1, Duration::from_millis(250));
        assert_eq!(blocks[2].1, Duration::ZERO);
    }
}
