use serde::{Deserialize, Serialize};

/// A legacy coordinate pair as stored for the `2d` index.
///
/// Field order matters: the store reads the first field as x (longitude) and
/// the second as y (latitude), so `long` must stay first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub long: f64,
    pub lat: f64,
}

impl Position {
    pub fn new(long: f64, lat: f64) -> Self {
        Self { long, lat }
    }
}
