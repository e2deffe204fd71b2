//! Values written for every synthesized key.

use rand::rngs::{OsRng, SmallRng};
use rand::{RngCore, SeedableRng, TryRngCore};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Length of randomly generated values.
pub const RANDOM_VALUE_LEN: usize = 40;

/// The value written in [`ValueMode::Constant`].
pub const CONSTANT_VALUE: [u8; 5] = [0x12, 0x34, 0x56, 0x78, 0x90];

/// Where value bytes come from.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueMode {
    /// Random bytes from a fast generator seeded by the operating system.
    #[default]
    Random,
    /// Random bytes drawn from the operating system for every value.
    Secure,
    /// The fixed [`CONSTANT_VALUE`].
    Constant,
}

#[derive(Debug)]
enum Source {
    Fast(SmallRng),
    Os,
    Constant,
}

/// Produces the value for every key of one writer.
#[derive(Debug)]
pub struct Payloads {
    source: Source,
}

impl Payloads {
    /// Creates a payload source.
    ///
    /// Fails if a random mode is requested and the operating system cannot provide a seed.
    pub fn new(mode: ValueMode) -> Result<Self> {
        let source = match mode {
            ValueMode::Random => {
                Source::Fast(SmallRng::try_from_os_rng().map_err(|e| Error::Entropy(e.into()))?)
            }
            ValueMode::Secure => Source::Os,
            ValueMode::Constant => Source::Constant,
        };
        Ok(Self { source })
    }

    /// Returns the next value.
    pub fn make_value(&mut self) -> Result<Vec<u8>> {
        match &mut self.source {
            Source::Fast(rng) => {
                let mut value = vec![0; RANDOM_VALUE_LEN];
                rng.fill_bytes(&mut value);
                Ok(value)
            }
            Source::Os => {
                let mut value = vec![0; RANDOM_VALUE_LEN];
                OsRng
                    .try_fill_bytes(&mut value)
                    .map_err(|e| Error::Entropy(e.into()))?;
                Ok(value)
            }
            Source::Constant => Ok(CONSTANT_VALUE.to_vec()),
        }
    }
}
