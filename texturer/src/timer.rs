use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use base::defs::{IntoResult, Result};
use base::util::fs;

/// Wall-clock measurements of the pipeline stages.
pub struct Timer {
    start: Instant,
    last: Instant,
    measurements: Vec<(String, f64)>,
}

impl Timer {
    pub fn new() -> Timer {
        let now = Instant::now();
        Timer {
            start: now,
            last: now,
            measurements: Vec::new(),
        }
    }

    /// Records the time elapsed since the previous measurement.
    pub fn measure(&mut self, stage: &str) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64();
        self.measurements.push((stage.to_string(), elapsed));
        self.last = now;
    }

    pub fn total_elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn measurements(&self) -> &[(String, f64)] {
        &self.measurements
    }

    pub fn write_report<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(fs::create_file(path)?);
        for (stage, seconds) in &self.measurements {
            writeln!(writer, "{},{:.3}", stage, seconds).res(|| {
                format!("failed to write file '{}'", path.display())
            })?;
        }
        Ok(())
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurements_accumulate() {
        let mut timer = Timer::new();
        timer.measure("first");
        timer.measure("second");
        let stages: Vec<&str> = timer
            .measurements()
            .iter()
            .map(|(stage, _)| stage.as_str())
            .collect();
        assert_eq!(stages, ["first", "second"]);
    }
}
