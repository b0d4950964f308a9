//! Caller-held session state.
//!
//! The core is stateless; a session only remembers the last submitted input
//! and its prediction so later sweeps can be run around it.

use serde::{Deserialize, Serialize};

use super::features::FeatureVector;
use super::prediction::PredictionResult;

/// One interactive client's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Random session identifier
    pub id: String,

    /// Last vector passed to `submit`
    pub last_input: Option<FeatureVector>,

    /// Prediction for `last_input`
    pub last_prediction: Option<PredictionResult>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: session_id(),
            last_input: None,
            last_prediction: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// Remember a submission, replacing any earlier one.
    pub fn record(&mut self, input: FeatureVector, prediction: PredictionResult) {
        self.last_input = Some(input);
        self.last_prediction = Some(prediction);
    }

    #[must_use]
    pub fn has_submission(&self) -> bool {
        self.last_input.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Random UUID v4 string.
///
/// Seeded from OS entropy so ids from different processes never line up.
fn session_id() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
