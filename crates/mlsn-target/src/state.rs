//! Shared target position
//!
//! One writer (the trajectory updater), many readers (request handlers).

use tokio::sync::RwLock;

use mlsn_core::Position;

/// The target's current position in 3D space.
pub struct TargetCell {
    position: RwLock<Position>,
}

impl TargetCell {
    pub fn new(start: Position) -> Self {
        TargetCell {
            position: RwLock::new(start),
        }
    }

    /// Read the current position.
    pub async fn get(&self) -> Position {
        *self.position.read().await
    }

    /// Publish a new position.
    pub async fn set(&self, position: Position) {
        *self.position.write().await = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cell = TargetCell::new(Position::zeros());
        cell.set(Position::new(1.0, 1.0, 1.0)).await;
        assert_eq!(cell.get().await, Position::new(1.0, 1.0, 1.0));
    }
}
