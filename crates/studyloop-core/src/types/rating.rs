// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorReport;

/// The lowest rating that counts as a successful recall.
pub const PASSING: u8 = 3;

/// A recall rating on the 0-5 scale.
///
/// - 0-2: failed to recall.
/// - 3: recalled with serious difficulty.
/// - 4: recalled after hesitation.
/// - 5: perfect recall.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const BLANK: Rating = Rating(0);
    pub const FORGOT: Rating = Rating(1);
    pub const PARTIAL: Rating = Rating(2);
    pub const HARD: Rating = Rating(3);
    pub const GOOD: Rating = Rating(4);
    pub const PERFECT: Rating = Rating(5);

    /// The ratings a user may pick by hand. 0 only comes from evaluator
    /// fallback and 2 only from partially correct matching.
    pub const MANUAL: [Rating; 4] = [Rating::FORGOT, Rating::HARD, Rating::GOOD, Rating::PERFECT];

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_passing(self) -> bool {
        self.0 >= PASSING
    }

    pub fn is_manual(self) -> bool {
        Rating::MANUAL.contains(&self)
    }

    pub fn as_str(&self) -> &'static str {
        match self.0 {
            0 => "blank",
            1 => "forgot",
            2 => "partial",
            3 => "hard",
            4 => "good",
            _ => "perfect",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = ErrorReport;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 5 {
            Ok(Rating(value))
        } else {
            Err(ErrorReport::new(format!("rating out of range: {value}")))
        }
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> u8 {
        r.0
    }
}

impl From<Rating> for f64 {
    fn from(r: Rating) -> f64 {
        r.0 as f64
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fallible;

    #[test]
    fn test_range() {
        for v in 0..=5 {
            assert!(Rating::try_from(v).is_ok());
        }
        assert!(Rating::try_from(6).is_err());
    }

    #[test]
    fn test_passing() {
        assert!(!Rating::PARTIAL.is_passing());
        assert!(Rating::HARD.is_passing());
    }

    #[test]
    fn test_manual_scale() {
        assert!(!Rating::BLANK.is_manual());
        assert!(!Rating::PARTIAL.is_manual());
        assert!(Rating::FORGOT.is_manual());
        assert!(Rating::PERFECT.is_manual());
    }

    #[test]
    fn test_serde_as_integer() -> Fallible<()> {
        assert_eq!(serde_json::to_string(&Rating::GOOD)?, "4");
        let r: Rating = serde_json::from_str("3")?;
        assert_eq!(r, Rating::HARD);
        assert!(serde_json::from_str::<Rating>("9").is_err());
        Ok(())
    }
}
