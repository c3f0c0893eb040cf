use crate::error::PipelineError;
use crate::Result;
use std::path::Path;

/// Ensure directory exists
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path)
            .map_err(|e| PipelineError::data_source(path, format!("cannot create directory: {}", e)))?;
    }
    Ok(())
}

/// Format duration as human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Random number utilities
pub mod random {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Create RNG with fixed seed
    pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }
}

/// Validation utilities
pub mod validation {
    use crate::error::PipelineError;
    use crate::Result;
    use std::fmt::Display;

    /// Validate that a fraction lies strictly between 0 and 1
    pub fn fraction(value: f64, name: &str) -> Result<()> {
        if !(value > 0.0 && value < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "{} must be strictly between 0 and 1, got {}",
                name, value
            )));
        }
        Ok(())
    }

    /// Validate that value is positive
    pub fn positive<T: PartialOrd + Default + Display>(value: T, name: &str) -> Result<()> {
        if value <= T::default() {
            return Err(PipelineError::InvalidConfig(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30.0s");
        assert_eq!(format_duration(90.0), "1.5m");
        assert_eq!(format_duration(3600.0), "1.0h");
    }

    #[test]
    fn test_seeded_rng() {
        let a: Vec<u32> = random::seeded_rng(42).sample_iter(rand::distributions::Standard).take(5).collect();
        let b: Vec<u32> = random::seeded_rng(42).sample_iter(rand::distributions::Standard).take(5).collect();
        let c: Vec<u32> = random::seeded_rng(43).sample_iter(rand::distributions::Standard).take(5).collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_validation() {
        assert!(validation::positive(1.0, "value").is_ok());
        assert!(validation::positive(0usize, "value").is_err());

        assert!(validation::fraction(0.2, "ratio").is_ok());
        assert!(validation::fraction(0.0, "ratio").is_err());
        assert!(validation::fraction(1.0, "ratio").is_err());
        assert!(validation::fraction(f64::NAN, "ratio").is_err());
    }

    #[test]
    fn test_ensure_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }
}
