//! Vector dimensionality guard shared by the store implementations

use std::sync::Mutex;

use crate::error::{Error, Result};

/// Tracks the dimensionality fixed by the first insert (or configuration)
#[derive(Debug, Default)]
pub struct DimensionGuard {
    established: Mutex<Option<usize>>,
}

impl DimensionGuard {
    /// Create a guard, optionally with a pre-established dimensionality
    pub fn new(initial: Option<usize>) -> Self {
        DimensionGuard {
            established: Mutex::new(initial),
        }
    }

    /// Established dimensionality, if any
    pub fn get(&self) -> Option<usize> {
        *self.lock()
    }

    /// Check `len` against the established dimensionality without fixing it
    pub fn check(&self, len: usize) -> Result<()> {
        match self.get() {
            Some(expected) if expected != len => Err(Error::dimension_mismatch(expected, len)),
            _ => Ok(()),
        }
    }

    /// Check `len`, fixing it as the dimensionality when none is established.
    ///
    /// Check and set happen under one lock so two concurrent first inserts
    /// cannot establish different lengths.
    pub fn establish(&self, len: usize) -> Result<()> {
        let mut established = self.lock();
        match *established {
            Some(expected) if expected != len => Err(Error::dimension_mismatch(expected, len)),
            Some(_) => Ok(()),
            None => {
                *established = Some(len);
                Ok(())
            }
        }
    }

    /// Record a dimensionality observed in durable storage, replacing any
    /// earlier value
    pub fn observe(&self, len: usize) {
        *self.lock() = Some(len);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<usize>> {
        // The guarded value is a plain Option, always consistent
        self.established.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_length_wins() {
        let guard = DimensionGuard::default();
        assert_eq!(guard.get(), None);
        assert!(guard.check(5).is_ok());

        guard.establish(3).unwrap();
        assert_eq!(guard.get(), Some(3));
        assert!(guard.establish(3).is_ok());
        assert!(matches!(guard.establish(4), Err(Error::Validation(_))));
        assert!(guard.check(2).is_err());
    }

    #[test]
    fn test_preconfigured() {
        let guard = DimensionGuard::new(Some(1536));
        assert!(guard.establish(384).is_err());
        assert!(guard.establish(1536).is_ok());
    }

    #[test]
    fn test_observe_overrides() {
        let guard = DimensionGuard::new(Some(3));
        guard.observe(4);
        assert_eq!(guard.get(), Some(4));
        assert!(guard.check(3).is_err());
    }
}
