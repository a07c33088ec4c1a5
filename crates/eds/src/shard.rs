use std::io::{Read, Write};

use haven_square::{ExtendedDataSquare, MAX_ORIGINAL_WIDTH};
use haven_types::{Coordinate, DataHash, Share, SHARE_SIZE};

use crate::{EdsError, Result};

/// Magic bytes opening every shard archive, version included.
pub const SHARD_MAGIC: &[u8; 8] = b"HVNSHRD1";

/// Archive header: magic, extended square width, declared root.
pub const HEADER_LEN: usize = 8 + 2 + 32;

/// Byte offset of a share within a shard archive. Shares are laid out
/// quadrant-major so the original-data quadrant is a contiguous prefix and a
/// stream reader can stop after one quarter of the payload.
pub fn share_offset(width: usize, coord: Coordinate) -> usize {
    let n = width / 2;
    let quadrant = usize::from(coord.row >= n) * 2 + usize::from(coord.col >= n);
    let pos = quadrant * n * n + (coord.row % n) * n + (coord.col % n);
    HEADER_LEN + pos * SHARE_SIZE
}

/// Quadrant-major serial position of a coordinate, used as the inverted-index
/// entry payload.
pub fn share_position(width: usize, coord: Coordinate) -> u32 {
    ((share_offset(width, coord) - HEADER_LEN) / SHARE_SIZE) as u32
}

/// Coordinate for a quadrant-major serial position.
pub fn position_coord(width: usize, pos: u32) -> Coordinate {
    let n = width / 2;
    let pos = pos as usize;
    let quadrant = pos / (n * n);
    let local = pos % (n * n);
    Coordinate::new(
        (quadrant / 2) * n + local / n,
        (quadrant % 2) * n + local % n,
    )
}

/// Serialize a full square into an archive writer.
pub fn write_shard<W: Write>(writer: &mut W, eds: &ExtendedDataSquare) -> Result<()> {
    let width = eds.width();
    let root = eds.data_hash();

    writer.write_all(SHARD_MAGIC)?;
    writer.write_all(&(width as u16).to_be_bytes())?;
    writer.write_all(root.as_bytes())?;

    let n = width / 2;
    for quadrant in 0..4 {
        let (row_base, col_base) = ((quadrant / 2) * n, (quadrant % 2) * n);
        for row in 0..n {
            for col in 0..n {
                let share = eds.share(Coordinate::new(row_base + row, col_base + col))?;
                writer.write_all(share.as_bytes())?;
            }
        }
    }
    Ok(())
}

/// Parsed archive header.
#[derive(Debug)]
pub struct ShardHeader {
    pub width: usize,
    pub root: DataHash,
}

pub fn read_header<R: Read>(reader: &mut R) -> Result<ShardHeader> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != SHARD_MAGIC {
        return Err(EdsError::InvalidShard("bad magic".into()));
    }
    let mut width_bytes = [0u8; 2];
    reader.read_exact(&mut width_bytes)?;
    let width = u16::from_be_bytes(width_bytes) as usize;
    // The width comes from an untrusted stream; cap it here so a hostile
    // header cannot make the reader buffer an absurd quadrant before the
    // root check runs.
    if width < 2 || width > 2 * MAX_ORIGINAL_WIDTH || !width.is_power_of_two() {
        return Err(EdsError::InvalidShard(format!("bad width {width}")));
    }
    let mut root = [0u8; 32];
    reader.read_exact(&mut root)?;
    Ok(ShardHeader {
        width,
        root: DataHash::from_slice(&root),
    })
}

/// Recompute a full square from the original-data quadrant of an archive
/// stream and reject it unless the derived root matches the expected one.
/// Only the first quadrant is read; the parity quadrants of the stream are
/// never trusted.
pub fn reconstruct<R: Read>(expected: DataHash, mut reader: R) -> Result<ExtendedDataSquare> {
    let header = read_header(&mut reader)?;
    let n = header.width / 2;

    let mut original = Vec::with_capacity(n * n);
    for _ in 0..n * n {
        let mut buf = vec![0u8; SHARE_SIZE];
        reader.read_exact(&mut buf)?;
        original.push(Share::new(buf)?);
    }

    let eds = ExtendedDataSquare::extend(&original)?;
    let got = eds.data_hash();
    if got != expected {
        return Err(EdsError::IntegrityMismatch { expected, got });
    }
    Ok(eds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_square::random_eds;

    #[test]
    fn test_offsets_cover_archive_exactly_once() {
        let width = 8;
        let mut seen = vec![false; width * width];
        for row in 0..width {
            for col in 0..width {
                let pos = share_position(width, Coordinate::new(row, col)) as usize;
                assert!(!seen[pos]);
                seen[pos] = true;
            }
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn test_position_coord_roundtrip() {
        let width = 8;
        for row in 0..width {
            for col in 0..width {
                let coord = Coordinate::new(row, col);
                let pos = share_position(width, coord);
                assert_eq!(position_coord(width, pos), coord);
            }
        }
    }

    #[test]
    fn test_first_quadrant_is_prefix() {
        // Every original-data share must land before every parity share.
        let width = 4;
        let n = width / 2;
        let quadrant_end = HEADER_LEN + n * n * SHARE_SIZE;
        for row in 0..n {
            for col in 0..n {
                assert!(share_offset(width, Coordinate::new(row, col)) < quadrant_end);
            }
        }
        assert!(share_offset(width, Coordinate::new(0, n)) >= quadrant_end);
        assert!(share_offset(width, Coordinate::new(n, 0)) >= quadrant_end);
    }

    #[test]
    fn test_write_then_reconstruct() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 4);
        let root = eds.data_hash();

        let mut buf = Vec::new();
        write_shard(&mut buf, &eds).unwrap();
        assert_eq!(buf.len(), HEADER_LEN + 64 * SHARE_SIZE);

        let restored = reconstruct(root, buf.as_slice()).unwrap();
        assert_eq!(restored, eds);
    }

    #[test]
    fn test_reconstruct_rejects_wrong_root() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let mut buf = Vec::new();
        write_shard(&mut buf, &eds).unwrap();

        let wrong = DataHash::repeat_byte(0xAA);
        let err = reconstruct(wrong, buf.as_slice()).unwrap_err();
        assert!(matches!(err, EdsError::IntegrityMismatch { .. }));
    }

    #[test]
    fn test_reconstruct_rejects_tampered_quadrant() {
        let mut rng = rand::thread_rng();
        let eds = random_eds(&mut rng, 2);
        let root = eds.data_hash();
        let mut buf = Vec::new();
        write_shard(&mut buf, &eds).unwrap();

        buf[HEADER_LEN + 3] ^= 0xFF;
        let err = reconstruct(root, buf.as_slice()).unwrap_err();
        assert!(matches!(err, EdsError::IntegrityMismatch { .. }));
    }

    #[test]
    fn test_header_validation() {
        assert!(read_header(&mut &b"BADMAGIC\x00\x04"[..]).is_err());
    }

    #[test]
    fn test_oversized_width_rejected_before_reading_payload() {
        // A stream is free to declare any width; widths beyond the codec
        // limit must be refused at the header, not after buffering a
        // multi-gigabyte quadrant.
        for width in [512u16, 32768] {
            let mut buf = Vec::new();
            buf.extend_from_slice(SHARD_MAGIC);
            buf.extend_from_slice(&width.to_be_bytes());
            buf.extend_from_slice(&[0u8; 32]);

            let err = read_header(&mut buf.as_slice()).unwrap_err();
            assert!(matches!(err, EdsError::InvalidShard(_)));

            let err = reconstruct(DataHash::zero(), buf.as_slice()).unwrap_err();
            assert!(matches!(err, EdsError::InvalidShard(_)));
        }

        // The largest legal width still passes header validation.
        let mut buf = Vec::new();
        buf.extend_from_slice(SHARD_MAGIC);
        buf.extend_from_slice(&(2 * MAX_ORIGINAL_WIDTH as u16).to_be_bytes());
        buf.extend_from_slice(&[0u8; 32]);
        assert!(read_header(&mut buf.as_slice()).is_ok());
    }
}
