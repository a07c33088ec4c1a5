use reed_solomon_erasure::galois_8::ReedSolomon;

use crate::{Result, SquareError};

/// Reed-Solomon extension over equally sized chunks: `data.len()` original
/// chunks in, the same number of parity chunks out.
pub fn extend_chunks(data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
    let n = data.len();
    debug_assert!(n > 0);
    let chunk_size = data[0].len();

    let rs = ReedSolomon::new(n, n).map_err(|e| SquareError::Erasure(e.to_string()))?;

    let mut shards: Vec<Vec<u8>> = Vec::with_capacity(2 * n);
    shards.extend(data.iter().cloned());
    shards.resize(2 * n, vec![0u8; chunk_size]);

    rs.encode(&mut shards)
        .map_err(|e| SquareError::Erasure(e.to_string()))?;

    Ok(shards.split_off(n))
}
