//! Cubic calibration of raw samples.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::packet::SAMPLES_PER_PACKET;

/// Coefficients of the calibration polynomial `c3*x^3 + c2*x^2 + c1*x + c0`.
///
/// A coefficient of exactly zero is treated as "not configured"; see
/// [`Coefficients::validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coefficients {
    /// Cubic term.
    pub c3: f64,
    /// Quadratic term.
    pub c2: f64,
    /// Linear term.
    pub c1: f64,
    /// Constant offset.
    pub c0: f64,
}

impl Coefficients {
    /// Create a validated set of coefficients.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCoefficient`] naming the first zero coefficient.
    pub fn new(c3: f64, c2: f64, c1: f64, c0: f64) -> Result<Self, ConfigError> {
        let coeffs = Self { c3, c2, c1, c0 };
        coeffs.validate()?;
        Ok(coeffs)
    }

    /// Check that every coefficient is non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("c3", self.c3), ("c2", self.c2), ("c1", self.c1), ("c0", self.c0)] {
            if value == 0.0 {
                return Err(ConfigError::ZeroCoefficient { name });
            }
        }
        Ok(())
    }

    /// Evaluate the polynomial for one raw sample.
    ///
    /// ```
    /// use probe_types::Coefficients;
    ///
    /// let coeffs = Coefficients::new(1.0, 1.0, 1.0, 1.0).unwrap();
    /// assert_eq!(coeffs.apply(2), 15.0);
    /// ```
    #[must_use]
    pub fn apply(&self, sample: u16) -> f64 {
        let x = f64::from(sample);
        // Horner form; same value as the expanded polynomial.
        ((self.c3 * x + self.c2) * x + self.c1) * x + self.c0
    }

    /// Calibrate all samples of a packet.
    #[must_use]
    pub fn apply_all(&self, samples: &[u16; SAMPLES_PER_PACKET]) -> [f64; SAMPLES_PER_PACKET] {
        samples.map(|s| self.apply(s))
    }
}

/// Arithmetic mean of calibrated values.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
