//! Run-length coding of row results as flattened (value, count) pairs.
//!
//! `[0, 3, 5, 4]` decodes to `[0, 0, 0, 5, 5, 5, 5]`.

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RleError {
    #[error("run-length encoded data has odd length {0}")]
    OddLength(usize),

    #[error("run-length encoded data expands past the addressable size")]
    Overflow,
}

/// Number of values `encoded` expands to, without expanding it.
pub fn decoded_len(encoded: &[i32]) -> Result<usize, RleError> {
    if encoded.len() % 2 != 0 {
        return Err(RleError::OddLength(encoded.len()));
    }

    // Non-positive counts contribute nothing.
    encoded.chunks_exact(2).try_fold(0usize, |total, pair| {
        total
            .checked_add(pair[1].max(0) as usize)
            .ok_or(RleError::Overflow)
    })
}

pub fn decode(encoded: &[i32]) -> Result<Vec<i32>, RleError> {
    let total = decoded_len(encoded)?;

    let mut decoded = Vec::with_capacity(total);
    for pair in encoded.chunks_exact(2) {
        let (value, count) = (pair[0], pair[1].max(0) as usize);
        decoded.extend(std::iter::repeat_n(value, count));
    }
    Ok(decoded)
}

/// Greedily encodes `values` using the fewest runs.
pub fn encode(values: &[i32]) -> Vec<i32> {
    let mut encoded: Vec<i32> = Vec::new();
    for &value in values {
        match encoded.len() {
            n if n >= 2 && encoded[n - 2] == value && encoded[n - 1] < i32::MAX => {
                encoded[n - 1] += 1;
            }
            _ => encoded.extend([value, 1]),
        }
    }
    encoded
}
