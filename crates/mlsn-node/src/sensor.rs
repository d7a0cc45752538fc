//! Sensor measurement cell
//!
//! Single writer (the sensor loop), many readers (router threads). Starts
//! at infinity until the first measurement lands.

use tokio::sync::RwLock;

/// The node's latest noisy distance to the target, in meters.
pub struct SensorCell {
    distance: RwLock<f64>,
}

impl SensorCell {
    pub fn new() -> Self {
        SensorCell {
            distance: RwLock::new(f64::INFINITY),
        }
    }

    /// Read the latest measurement.
    pub async fn get(&self) -> f64 {
        *self.distance.read().await
    }

    /// Store a new measurement.
    pub async fn set(&self, distance: f64) {
        *self.distance.write().await = distance;
    }
}

impl Default for SensorCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cell_starts_unmeasured() {
        let cell = SensorCell::new();
        assert!(cell.get().await.is_infinite());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cell = SensorCell::new();
        cell.set(4.7).await;
        assert_eq!(cell.get().await, 4.7);
    }
}
