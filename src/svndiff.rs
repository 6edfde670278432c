//! Streaming applier for the svndiff delta format used by `apply_textdelta`
//! (§4.D, Design Notes). A small state machine over the three svndiff
//! opcodes (source-copy, target-copy, new-data); bounded to one source
//! window plus one target window per the design notes rather than
//! materializing whole files.
//!
//! Format (svndiff0/1/2 header `"SVN\0"`/`"SVN\1"`/`"SVN\2"` followed by a
//! sequence of windows): each window carries a source view
//! (offset+length into the *previous* full file), an instructions section,
//! and a new-data section. In version 1/2 each section is optionally
//! zlib-deflated, self-describing via a leading decompressed-length varint.

use flate2::read::ZlibDecoder;
use std::io::Read;

use crate::errors::SvndiffError;

fn push_varint(out: &mut Vec<u8>, value: u64) {
    let mut stack = Vec::new();
    let mut v = value;
    loop {
        stack.push((v & 0x7f) as u8);
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    while let Some(byte) = stack.pop() {
        if stack.is_empty() {
            out.push(byte);
        } else {
            out.push(byte | 0x80);
        }
    }
}

/// Builds a minimal, uncompressed (version 0) svndiff stream encoding
/// `new_content` as a single new-data instruction with no source copy —
/// the simplest legal "replace everything with this" delta. Used by the
/// `testing` module and other fixtures to script `apply_textdelta` calls
/// without hand-assembling svndiff bytes for every scenario.
pub fn literal_svndiff(new_content: &[u8]) -> Vec<u8> {
    let len = new_content.len() as u64;
    let mut instructions = Vec::new();
    if len < 0x3f {
        instructions.push(0b10_000000 | len as u8);
    } else {
        instructions.push(0b10_000000);
        push_varint(&mut instructions, len);
    }

    let mut out = vec![b'S', b'V', b'N', 0];
    push_varint(&mut out, 0); // source view offset
    push_varint(&mut out, 0); // source view length
    push_varint(&mut out, len); // target view length
    push_varint(&mut out, instructions.len() as u64);
    push_varint(&mut out, len);
    out.extend_from_slice(&instructions);
    out.extend_from_slice(new_content);
    out
}

/// Applies a complete svndiff stream (header + one or more windows) against
/// `source`, producing the new full file content.
///
/// `max_window_bytes` bounds the size of any single source or target
/// window, matching the "bounded memory footprint" design constraint —
/// streams exceeding it are rejected rather than silently materialized.
pub fn apply(source: &[u8], diff: &[u8], max_window_bytes: usize) -> Result<Vec<u8>, SvndiffError> {
    if diff.len() < 4 || &diff[0..3] != b"SVN" {
        return Err(SvndiffError::BadMagic);
    }
    let version = diff[3];
    if version > 2 {
        return Err(SvndiffError::UnsupportedVersion(version));
    }

    let mut pos = 4usize;
    let mut target = Vec::new();
    while pos < diff.len() {
        pos = apply_window(source, diff, pos, version, max_window_bytes, &mut target)?;
    }
    Ok(target)
}

#[allow(clippy::too_many_arguments)]
fn apply_window(
    source: &[u8],
    diff: &[u8],
    mut pos: usize,
    version: u8,
    max_window_bytes: usize,
    target: &mut Vec<u8>,
) -> Result<usize, SvndiffError> {
    let source_view_offset = read_varint(diff, &mut pos)? as usize;
    let source_view_len = read_varint(diff, &mut pos)? as usize;
    let target_view_len = read_varint(diff, &mut pos)? as usize;
    let instructions_stored_len = read_varint(diff, &mut pos)? as usize;
    let data_stored_len = read_varint(diff, &mut pos)? as usize;

    if source_view_len > max_window_bytes || target_view_len > max_window_bytes {
        return Err(SvndiffError::WindowTooLarge {
            max: max_window_bytes,
            got: source_view_len.max(target_view_len),
        });
    }
    if source_view_offset
        .checked_add(source_view_len)
        .map(|end| end > source.len())
        .unwrap_or(true)
        && source_view_len > 0
    {
        return Err(SvndiffError::SourceOutOfRange {
            offset: source_view_offset,
            source_len: source.len(),
        });
    }

    let instructions_raw = take(diff, pos, instructions_stored_len)?;
    pos += instructions_stored_len;
    let data_raw = take(diff, pos, data_stored_len)?;
    pos += data_stored_len;

    let instructions = decode_section(instructions_raw, version)?;
    let data = decode_section(data_raw, version)?;

    let source_view = &source[source_view_offset..source_view_offset + source_view_len];
    let window_start = target.len();
    run_instructions(source_view, &data, instructions.as_slice(), target, window_start)?;

    let produced = target.len() - window_start;
    if produced != target_view_len {
        return Err(SvndiffError::Truncated {
            expected: target_view_len,
            found: produced,
        });
    }
    Ok(pos)
}

/// For version 0, a section is raw bytes. For version 1/2, a section is
/// `[decompressed_len: varint][bytes]`, where `bytes` is literal if its
/// length already equals `decompressed_len`, otherwise zlib-deflated.
fn decode_section(raw: &[u8], version: u8) -> Result<Vec<u8>, SvndiffError> {
    if version == 0 {
        return Ok(raw.to_vec());
    }
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let mut pos = 0usize;
    let decompressed_len = read_varint(raw, &mut pos)? as usize;
    let body = &raw[pos..];
    if body.len() == decompressed_len {
        return Ok(body.to_vec());
    }
    let mut decoder = ZlibDecoder::new(body);
    let mut out = Vec::with_capacity(decompressed_len);
    decoder
        .read_to_end(&mut out)
        .map_err(|_| SvndiffError::Truncated {
            expected: decompressed_len,
            found: out.len(),
        })?;
    Ok(out)
}

/// Executes one window's instruction stream, appending produced bytes to
/// `target`. `window_start` is `target`'s length before this window began —
/// target-copy offsets are relative to the *current window's own* output,
/// starting fresh at each window, not to the whole target built so far
/// across the textdelta.
fn run_instructions(
    source_view: &[u8],
    data: &[u8],
    instructions: &[u8],
    target: &mut Vec<u8>,
    window_start: usize,
) -> Result<(), SvndiffError> {
    let mut ipos = 0usize;
    let mut dpos = 0usize;
    while ipos < instructions.len() {
        let opcode = instructions[ipos];
        ipos += 1;
        let kind = opcode >> 6;
        let mut length = (opcode & 0x3f) as u64;
        if length == 0 {
            length = read_varint(instructions, &mut ipos)?;
        }
        let length = length as usize;

        match kind {
            0 => {
                // source copy
                let offset = read_varint(instructions, &mut ipos)? as usize;
                let end = offset.checked_add(length).ok_or(SvndiffError::SourceOutOfRange {
                    offset,
                    source_len: source_view.len(),
                })?;
                if end > source_view.len() {
                    return Err(SvndiffError::SourceOutOfRange {
                        offset,
                        source_len: source_view.len(),
                    });
                }
                target.extend_from_slice(&source_view[offset..end]);
            }
            1 => {
                // target copy — self-referential within this window only,
                // may overlap/extend past the current length (byte-by-byte
                // to support repetition).
                let offset = read_varint(instructions, &mut ipos)? as usize;
                let window_len = target.len() - window_start;
                if offset >= window_len {
                    return Err(SvndiffError::TargetOutOfRange {
                        offset,
                        target_len: window_len,
                    });
                }
                for i in 0..length {
                    let byte = target[window_start + offset + i];
                    target.push(byte);
                }
            }
            2 => {
                // new data
                let end = dpos.checked_add(length).ok_or(SvndiffError::Truncated {
                    expected: length,
                    found: data.len().saturating_sub(dpos),
                })?;
                if end > data.len() {
                    return Err(SvndiffError::Truncated {
                        expected: length,
                        found: data.len() - dpos,
                    });
                }
                target.extend_from_slice(&data[dpos..end]);
                dpos = end;
            }
            _ => return Err(SvndiffError::UnknownOpcode(opcode)),
        }
    }
    Ok(())
}

fn take<'a>(buf: &'a [u8], pos: usize, len: usize) -> Result<&'a [u8], SvndiffError> {
    if pos + len > buf.len() {
        return Err(SvndiffError::Truncated {
            expected: len,
            found: buf.len().saturating_sub(pos),
        });
    }
    Ok(&buf[pos..pos + len])
}

fn read_varint(buf: &[u8], pos: &mut usize) -> Result<u64, SvndiffError> {
    let mut result: u64 = 0;
    loop {
        let byte = *buf.get(*pos).ok_or(SvndiffError::Truncated {
            expected: 1,
            found: 0,
        })?;
        *pos += 1;
        result = (result << 7) | (byte & 0x7f) as u64;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok(result)
}
