use alloy_primitives::Bytes;

use crate::{
    codec::{
        encode_len, write_bool, write_bytes, write_u32, write_varuint32, AbiReader, DecodeError,
        LengthOverflow,
    },
    constants::ship::{
        BLOCKS_ACK_REQUEST_INDEX, BLOCKS_REQUEST_INDEX, BLOCKS_RESULT_INDEX, STATUS_REQUEST_INDEX,
        STATUS_RESULT_INDEX,
    },
    BlockPosition, BlocksRequest, BlocksResult, StatusResult,
};

/// A request sent from the dispatcher to the state-history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum ShipRequest {
    /// Ask for the chain status.
    #[from(ignore)]
    Status,
    /// Subscribe to blocks.
    Blocks(BlocksRequest),
    /// Acknowledge processed results so the endpoint may send more.
    #[from(ignore)]
    AckBlocks {
        /// Number of results acknowledged.
        num_messages: u32,
    },
}

/// A result sent from the state-history endpoint to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum ShipResult {
    /// The chain status.
    Status(StatusResult),
    /// One delivered block.
    Blocks(BlocksResult),
}

fn write_position(out: &mut Vec<u8>, position: &BlockPosition) {
    write_u32(out, position.block_num);
    out.extend_from_slice(position.block_id.as_slice());
}

fn read_position(reader: &mut AbiReader<'_>) -> Result<BlockPosition, DecodeError> {
    Ok(BlockPosition { block_num: reader.read_u32()?, block_id: reader.read_checksum256()? })
}

fn write_optional<T>(out: &mut Vec<u8>, value: Option<&T>, write: impl FnOnce(&mut Vec<u8>, &T)) {
    write_bool(out, value.is_some());
    if let Some(value) = value {
        write(out, value);
    }
}

fn write_optional_bytes(out: &mut Vec<u8>, value: Option<&Bytes>) -> Result<(), LengthOverflow> {
    write_bool(out, value.is_some());
    value.map_or(Ok(()), |bytes| write_bytes(out, bytes))
}

impl ShipRequest {
    /// Encodes the request as a `request` variant.
    pub fn encode(&self) -> Result<Vec<u8>, LengthOverflow> {
        let mut out = Vec::new();
        match self {
            Self::Status => write_varuint32(&mut out, STATUS_REQUEST_INDEX),
            Self::Blocks(request) => {
                write_varuint32(&mut out, BLOCKS_REQUEST_INDEX);
                write_u32(&mut out, request.start_block_num);
                write_u32(&mut out, request.end_block_num);
                write_u32(&mut out, request.max_messages_in_flight);
                write_varuint32(&mut out, encode_len(request.have_positions.len())?);
                for position in &request.have_positions {
                    write_position(&mut out, position);
                }
                write_bool(&mut out, request.irreversible_only);
                write_bool(&mut out, request.fetch_block);
                write_bool(&mut out, request.fetch_traces);
                write_bool(&mut out, request.fetch_deltas);
            }
            Self::AckBlocks { num_messages } => {
                write_varuint32(&mut out, BLOCKS_ACK_REQUEST_INDEX);
                write_u32(&mut out, *num_messages);
            }
        }
        Ok(out)
    }

    /// Decodes a `request` variant.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = AbiReader::new(buf);
        let request = match reader.read_varuint32()? {
            STATUS_REQUEST_INDEX => Self::Status,
            BLOCKS_REQUEST_INDEX => Self::Blocks(BlocksRequest {
                start_block_num: reader.read_u32()?,
                end_block_num: reader.read_u32()?,
                max_messages_in_flight: reader.read_u32()?,
                have_positions: reader.read_vec(read_position)?,
                irreversible_only: reader.read_bool()?,
                fetch_block: reader.read_bool()?,
                fetch_traces: reader.read_bool()?,
                fetch_deltas: reader.read_bool()?,
            }),
            BLOCKS_ACK_REQUEST_INDEX => Self::AckBlocks { num_messages: reader.read_u32()? },
            index => return Err(DecodeError::UnknownVariant { ty: "request", index }),
        };
        reader.finish()?;
        Ok(request)
    }
}

impl ShipResult {
    /// Encodes the result as a `result` variant.
    pub fn encode(&self) -> Result<Vec<u8>, LengthOverflow> {
        let mut out = Vec::new();
        match self {
            Self::Status(status) => {
                write_varuint32(&mut out, STATUS_RESULT_INDEX);
                write_position(&mut out, &status.head);
                write_position(&mut out, &status.last_irreversible);
                write_u32(&mut out, status.trace_begin_block);
                write_u32(&mut out, status.trace_end_block);
                write_u32(&mut out, status.chain_state_begin_block);
                write_u32(&mut out, status.chain_state_end_block);
            }
            Self::Blocks(result) => {
                write_varuint32(&mut out, BLOCKS_RESULT_INDEX);
                write_position(&mut out, &result.head);
                write_position(&mut out, &result.last_irreversible);
                write_optional(&mut out, result.this_block.as_ref(), write_position);
                write_optional(&mut out, result.prev_block.as_ref(), write_position);
                write_optional_bytes(&mut out, result.block.as_ref())?;
                write_optional_bytes(&mut out, result.traces.as_ref())?;
                write_optional_bytes(&mut out, result.deltas.as_ref())?;
            }
        }
        Ok(out)
    }

    /// Decodes a `result` variant.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = AbiReader::new(buf);
        let result = match reader.read_varuint32()? {
            STATUS_RESULT_INDEX => Self::Status(StatusResult {
                head: read_position(&mut reader)?,
                last_irreversible: read_position(&mut reader)?,
                trace_begin_block: reader.read_u32()?,
                trace_end_block: reader.read_u32()?,
                chain_state_begin_block: reader.read_u32()?,
                chain_state_end_block: reader.read_u32()?,
            }),
            BLOCKS_RESULT_INDEX => Self::Blocks(BlocksResult {
                head: read_position(&mut reader)?,
                last_irreversible: read_position(&mut reader)?,
                this_block: reader.read_optional(read_position)?,
                prev_block: reader.read_optional(read_position)?,
                block: reader.read_optional(AbiReader::read_bytes)?,
                traces: reader.read_optional(AbiReader::read_bytes)?,
                deltas: reader.read_optional(AbiReader::read_bytes)?,
            }),
            index => return Err(DecodeError::UnknownVariant { ty: "result", index }),
        };
        reader.finish()?;
        Ok(result)
    }
}
