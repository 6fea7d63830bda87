use thiserror::Error;

pub type KsResult<T> = Result<T, KsError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KsError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Check that a vector-like quantity has the expected length.
pub fn ensure_len(what: &'static str, expected: usize, actual: usize) -> KsResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(KsError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_len_reports_both_sizes() {
        assert!(ensure_len("q", 3, 3).is_ok());
        let msg = ensure_len("q", 3, 4).unwrap_err().to_string();
        assert!(msg.contains("expected 3"));
        assert!(msg.contains("got 4"));
    }
}
