//! Outbound helper that splits frames into radio-sized fragments.
//!
//! The splitter aims for near-equal chunks rather than filling each fragment
//! to the budget: a frame needing `N` fragments is cut into chunks of
//! `len / N + 1` bytes, leaving only the last chunk short.

use bytes::Bytes;

use super::{Fragment, FragmentHeader, FragmentationError, Position, SessionIndex};

/// Largest number of fragments a single frame may span.
pub const MAX_FRAGMENTS: usize = i8::MAX.unsigned_abs() as usize;

/// Split `payload` into fragments tagged with `session_index`.
///
/// Ordinals are 1-based and the last fragment's position is negated. An
/// empty payload still yields a single, empty terminal fragment so the
/// receiving side observes the message.
///
/// # Examples
///
/// ```
/// use rns_meshtastic::fragment::{SessionIndex, encode};
/// let fragments = encode(SessionIndex::new(5), b"hello world", 4).expect("split");
/// let positions: Vec<i8> = fragments.iter().map(|f| f.position().get()).collect();
/// assert_eq!(positions, [1, 2, -3]);
/// assert_eq!(fragments[0].payload(), b"hell");
/// ```
///
/// # Errors
///
/// Returns [`FragmentationError::InvalidMaxPayload`] when `max_payload` is
/// zero and [`FragmentationError::TooManyFragments`] when the frame would
/// need more than [`MAX_FRAGMENTS`] fragments.
pub fn encode(
    session_index: SessionIndex,
    payload: &[u8],
    max_payload: usize,
) -> Result<Vec<Fragment>, FragmentationError> {
    if max_payload == 0 {
        return Err(FragmentationError::InvalidMaxPayload);
    }

    let total = payload.len();
    if total == 0 {
        let header = FragmentHeader::new(session_index, terminal_position(1, 1)?);
        return Ok(vec![Fragment::new(header, Bytes::new())]);
    }

    let planned = total / max_payload + 1;
    let chunk_len = total / planned + 1;
    let count = total.div_ceil(chunk_len);
    if count > MAX_FRAGMENTS {
        return Err(FragmentationError::TooManyFragments {
            required: count,
            limit: MAX_FRAGMENTS,
        });
    }

    let payload = Bytes::copy_from_slice(payload);
    let mut fragments = Vec::with_capacity(count);
    for (offset, start) in (0..total).step_by(chunk_len).enumerate() {
        let end = (start + chunk_len).min(total);
        let position = if end == total {
            terminal_position(offset + 1, count)?
        } else {
            ordinal_position(offset + 1, count)?
        };
        fragments.push(Fragment::new(
            FragmentHeader::new(session_index, position),
            payload.slice(start..end),
        ));
    }
    Ok(fragments)
}

fn ordinal_position(ordinal: usize, count: usize) -> Result<Position, FragmentationError> {
    position(ordinal, count, false)
}

fn terminal_position(ordinal: usize, count: usize) -> Result<Position, FragmentationError> {
    position(ordinal, count, true)
}

fn position(ordinal: usize, count: usize, terminal: bool) -> Result<Position, FragmentationError> {
    u8::try_from(ordinal)
        .ok()
        .and_then(|ordinal| Position::new(ordinal, terminal))
        .ok_or(FragmentationError::TooManyFragments {
            required: count,
            limit: MAX_FRAGMENTS,
        })
}
