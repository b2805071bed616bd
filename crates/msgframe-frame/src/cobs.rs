//! Consistent Overhead Byte Stuffing.
//!
//! Rewrites a buffer so that `0x00` never appears in it, which frees `0x00`
//! to act as the frame delimiter on the wire. The body is split into blocks;
//! each block starts with a code byte giving the distance to the next
//! (implicit) zero. A code of `0xFF` means 254 data bytes with no zero after.
//!
//! Encoding is canonical: a trailing full block is not followed by an extra
//! `0x01` code. Decoding accepts either form.

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Largest code byte (254 data bytes, no implicit zero).
const MAX_CODE: u8 = 0xFF;

/// Upper bound on the encoded size of `len` input bytes (delimiter excluded).
pub fn max_encoded_len(len: usize) -> usize {
    len + len / 254 + 1
}

/// Append the COBS encoding of `src` to `dst`. No delimiter is written.
pub fn encode_into(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(max_encoded_len(src.len()));

    let mut code_idx = dst.len();
    dst.put_u8(0);
    let mut code: u8 = 1;

    for (i, &byte) in src.iter().enumerate() {
        if byte != 0 {
            dst.put_u8(byte);
            code += 1;
        }
        if byte == 0 || code == MAX_CODE {
            dst[code_idx] = code;
            // A full block at the very end needs no follow-up code byte.
            if byte == 0 || i + 1 < src.len() {
                code_idx = dst.len();
                dst.put_u8(0);
                code = 1;
            }
        }
    }

    dst[code_idx] = code;
}

/// COBS-encode `src` into a fresh buffer.
pub fn encode(src: &[u8]) -> BytesMut {
    let mut dst = BytesMut::with_capacity(max_encoded_len(src.len()));
    encode_into(src, &mut dst);
    dst
}

/// Reverse [`encode`]. `src` must not include the frame delimiter.
pub fn decode(src: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(src.len());
    let mut pos = 0usize;

    while pos < src.len() {
        let code = src[pos];
        if code == 0 {
            return Err(FrameError::MalformedCobs { offset: pos });
        }

        let end = pos + code as usize;
        if end > src.len() {
            return Err(FrameError::MalformedCobs { offset: pos });
        }

        let block = &src[pos + 1..end];
        if let Some(zero) = block.iter().position(|&b| b == 0) {
            return Err(FrameError::MalformedCobs {
                offset: pos + 1 + zero,
            });
        }
        out.extend_from_slice(block);

        pos = end;
        if code != MAX_CODE && pos < src.len() {
            out.push(0);
        }
    }

    Ok(out)
}
