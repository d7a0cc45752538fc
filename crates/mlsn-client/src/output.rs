//! Predicted-trajectory CSV output
//!
//! One row per tick that produced a prediction, flushed eagerly so the file
//! tails cleanly while the client runs.

use std::fs::File;
use std::path::Path;

use mlsn_core::{MlsnError, MlsnResult, Position};

/// Appends predicted positions to a CSV file with a `timestamp,x,y,z` header.
pub struct TrajectoryWriter {
    writer: csv::Writer<File>,
}

impl TrajectoryWriter {
    /// Create the output file and write the header.
    pub fn create(path: &Path) -> MlsnResult<Self> {
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| MlsnError::Io(format!("cannot create {}: {e}", path.display())))?;
        writer
            .write_record(["timestamp", "x", "y", "z"])
            .map_err(|e| MlsnError::Io(e.to_string()))?;
        writer.flush().map_err(|e| MlsnError::Io(e.to_string()))?;
        Ok(TrajectoryWriter { writer })
    }

    /// Append one prediction.
    pub fn append(&mut self, timestamp: f64, position: &Position) -> MlsnResult<()> {
        self.writer
            .write_record([
                format!("{timestamp:.3}"),
                format!("{:.3}", position.x),
                format!("{:.3}", position.y),
                format!("{:.3}", position.z),
            ])
            .map_err(|e| MlsnError::Io(e.to_string()))?;
        self.writer.flush().map_err(|e| MlsnError::Io(e.to_string()))
    }
}
