use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

use crate::{error::ProcessorError, model::constants::FAIL_EFFECTIVE_SCORE};

/// A raw daily result. Lower is better; `Fail` is stored as 7.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
#[repr(u8)]
pub enum Score {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Fail = 7
}

impl Score {
    pub fn is_fail(self) -> bool {
        self == Score::Fail
    }

    /// Numeric value used for comparisons and averages. A fail counts as
    /// [`FAIL_EFFECTIVE_SCORE`], strictly worse than a six.
    pub fn effective(self) -> i32 {
        match self {
            Score::Fail => FAIL_EFFECTIVE_SCORE,
            s => s as i32
        }
    }

    /// Index into a 7-slot distribution (0 = one guess, 6 = fail)
    pub fn distribution_index(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<i32> for Score {
    type Error = ProcessorError;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Score::One),
            2 => Ok(Score::Two),
            3 => Ok(Score::Three),
            4 => Ok(Score::Four),
            5 => Ok(Score::Five),
            6 => Ok(Score::Six),
            7 => Ok(Score::Fail),
            _ => Err(ProcessorError::InvalidScore(v))
        }
    }
}
