use everscale_types::cell::*;

use crate::error::{CellError, Error};
use crate::util::unlikely;

/// Opcode of a message body with a text comment.
pub const COMMENT_OPCODE: u32 = 0;

/// The maximum number of cells in a comment chain (including the root).
pub const MAX_COMMENT_CHAIN: usize = 256;

/// The number of whole bytes an empty cell can hold.
const CELL_DATA_BYTES: usize = 127;

/// Builds a message body with a text comment.
///
/// The body starts with a zero opcode, followed by the UTF-8 text
/// which continues in a chain of child cells when it does not fit.
pub fn build_comment(text: &str) -> Result<Cell, Error> {
    let mut builder = CellBuilder::new();
    ok!(builder.store_u32(COMMENT_OPCODE).map_err(Error::Cell));
    ok!(store_snake_bytes(&mut builder, text.as_bytes()));
    builder.build().map_err(From::from)
}

/// Stores bytes into the builder, filling it to capacity and moving
/// the rest into a chain of references.
pub fn store_snake_bytes(builder: &mut CellBuilder, data: &[u8]) -> Result<(), Error> {
    // Fast path for data that fits entirely
    if data.len() <= CELL_DATA_BYTES && builder.has_capacity(data.len() as u16 * 8, 0) {
        return builder
            .store_raw(data, data.len() as u16 * 8)
            .map_err(From::from);
    }

    let mut head_len = std::cmp::min(data.len(), CELL_DATA_BYTES);
    while head_len > 0 && !builder.has_capacity(head_len as u16 * 8, 1) {
        head_len -= 1;
    }
    if !builder.has_capacity(head_len as u16 * 8, 1) {
        return Err(Error::Cell(CellError::CellOverflow));
    }

    let (head, tail) = data.split_at(head_len);
    if tail.len().div_ceil(CELL_DATA_BYTES) + 1 > MAX_COMMENT_CHAIN {
        return Err(Error::CommentTooLong);
    }
    store_snake_chain(builder, head, tail).map_err(From::from)
}

fn store_snake_chain(builder: &mut CellBuilder, head: &[u8], tail: &[u8]) -> Result<(), CellError> {
    // Build the chain from the last cell
    let mut next = None::<Cell>;
    for chunk in tail.chunks(CELL_DATA_BYTES).rev() {
        let mut child = CellBuilder::new();
        ok!(child.store_raw(chunk, chunk.len() as u16 * 8));
        if let Some(cell) = next.take() {
            ok!(child.store_reference(cell));
        }
        next = Some(ok!(child.build()));
    }

    ok!(builder.store_raw(head, head.len() as u16 * 8));
    match next {
        Some(cell) => builder.store_reference(cell),
        None => Ok(()),
    }
}

/// Reads a text comment from a message body.
pub fn parse_comment(body: &DynCell) -> Result<String, Error> {
    let bytes = ok!(load_comment(body).map_err(snake_error));
    String::from_utf8(bytes).map_err(|_| Error::InvalidComment)
}

/// Reads bytes from a snake chain starting at the slice.
pub fn load_snake_bytes(slice: CellSlice<'_>) -> Result<Vec<u8>, Error> {
    load_snake_chain(slice).map_err(snake_error)
}

fn load_comment(body: &DynCell) -> Result<Vec<u8>, CellError> {
    let mut slice = ok!(body.as_slice());
    if unlikely(ok!(slice.load_u32()) != COMMENT_OPCODE) {
        return Err(CellError::InvalidTag);
    }
    load_snake_chain(slice)
}

fn load_snake_chain(mut slice: CellSlice<'_>) -> Result<Vec<u8>, CellError> {
    let mut result = Vec::new();
    let mut buffer = [0u8; 128];

    let mut depth = 1;
    loop {
        let bits = slice.size_bits();
        if unlikely(bits % 8 != 0) {
            return Err(CellError::InvalidData);
        }

        let len = (bits / 8) as usize;
        ok!(slice.load_raw(&mut buffer[..len], bits));
        result.extend_from_slice(&buffer[..len]);

        match slice.size_refs() {
            0 => break,
            1 => {
                depth += 1;
                if depth > MAX_COMMENT_CHAIN {
                    return Err(CellError::DepthOverflow);
                }
                let child = ok!(slice.load_reference());
                slice = ok!(child.as_slice());
            }
            _ => return Err(CellError::InvalidData),
        }
    }

    Ok(result)
}

fn snake_error(error: CellError) -> Error {
    match error {
        CellError::InvalidTag | CellError::InvalidData => Error::InvalidComment,
        CellError::DepthOverflow => Error::CommentTooLong,
        error => Error::Cell(error),
    }
}
