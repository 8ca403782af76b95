use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;

#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RatingAdjustmentType {
    /// The player played the period
    Participation = 0,
    /// The player was recently active but skipped the period
    Absence = 1,
    Decay = 2
}

impl TryFrom<i32> for RatingAdjustmentType {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(RatingAdjustmentType::Participation),
            1 => Ok(RatingAdjustmentType::Absence),
            2 => Ok(RatingAdjustmentType::Decay),
            _ => Err(())
        }
    }
}
