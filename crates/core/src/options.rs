//! Runtime options for index scans.

use crate::config::{HNSW_DEFAULT_EF_SEARCH, HNSW_MAX_EF_SEARCH, HNSW_MIN_EF_SEARCH};
use crate::error::OptionsError;
use serde::{Deserialize, Serialize};

/// Per-scan tunables, captured when a scan begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Size of the dynamic candidate list at layer 0. Upper bound on the
    /// number of rows a single scan can return per distinct element.
    pub ef_search: usize,
}

impl ScanOptions {
    pub fn new(ef_search: usize) -> Result<Self, OptionsError> {
        let options = Self { ef_search };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(HNSW_MIN_EF_SEARCH..=HNSW_MAX_EF_SEARCH).contains(&self.ef_search) {
            return Err(OptionsError::EfSearchOutOfRange {
                value: self.ef_search,
                min: HNSW_MIN_EF_SEARCH,
                max: HNSW_MAX_EF_SEARCH,
            });
        }
        Ok(())
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ef_search: HNSW_DEFAULT_EF_SEARCH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ef_search() {
        assert_eq!(ScanOptions::default().ef_search, 40);
        assert!(ScanOptions::default().validate().is_ok());
    }

    #[test]
    fn test_range_is_enforced() {
        assert!(ScanOptions::new(1).is_ok());
        assert!(ScanOptions::new(1000).is_ok());
        assert_eq!(
            ScanOptions::new(0),
            Err(OptionsError::EfSearchOutOfRange {
                value: 0,
                min: 1,
                max: 1000
            })
        );
        assert!(ScanOptions::new(1001).is_err());
    }
}
