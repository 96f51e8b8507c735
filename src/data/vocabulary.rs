//! Binary categorical vocabularies

use serde::{Deserialize, Serialize};

/// A two-token vocabulary encoded to {0, 1}.
///
/// The first token of each pair encodes to 1, the second to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vocabulary {
    /// normal → 1, abnormal → 0
    NormalAbnormal,
    /// present → 1, notpresent → 0
    PresentNotPresent,
    /// yes → 1, no → 0
    YesNo,
    /// good → 1, poor → 0
    GoodPoor,
    /// ckd → 1, notckd → 0
    CkdNotCkd,
}

impl Vocabulary {
    /// All supported vocabularies
    pub const ALL: [Vocabulary; 5] = [
        Vocabulary::NormalAbnormal,
        Vocabulary::PresentNotPresent,
        Vocabulary::YesNo,
        Vocabulary::GoodPoor,
        Vocabulary::CkdNotCkd,
    ];

    /// The (positive, negative) token pair
    pub fn tokens(&self) -> (&'static str, &'static str) {
        match self {
            Vocabulary::NormalAbnormal => ("normal", "abnormal"),
            Vocabulary::PresentNotPresent => ("present", "notpresent"),
            Vocabulary::YesNo => ("yes", "no"),
            Vocabulary::GoodPoor => ("good", "poor"),
            Vocabulary::CkdNotCkd => ("ckd", "notckd"),
        }
    }

    /// Encode a token to its canonical code.
    ///
    /// Already-encoded codes ("1", "0", "1.0", "0.0") map to themselves so
    /// that normalizing a normalized table is a no-op. Returns `None` for any
    /// other token.
    pub fn encode(&self, token: &str) -> Option<f64> {
        let (positive, negative) = self.tokens();
        if token == positive {
            return Some(1.0);
        }
        if token == negative {
            return Some(0.0);
        }
        match token.parse::<f64>() {
            Ok(v) if v == 1.0 || v == 0.0 => Some(v),
            _ => None,
        }
    }

    /// Decode a code back to its token
    pub fn decode(&self, code: f64) -> Option<&'static str> {
        let (positive, negative) = self.tokens();
        if code == 1.0 {
            Some(positive)
        } else if code == 0.0 {
            Some(negative)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_token_is_recognized() {
        for vocab in Vocabulary::ALL {
            let (positive, negative) = vocab.tokens();
            assert_eq!(vocab.encode(positive), Some(1.0));
            assert_eq!(vocab.encode(negative), Some(0.0));
        }
    }

    #[test]
    fn test_encoding_is_idempotent() {
        for vocab in Vocabulary::ALL {
            let (positive, negative) = vocab.tokens();
            for token in [positive, negative] {
                let code = vocab.encode(token).unwrap();
                let again = vocab.encode(&code.to_string()).unwrap();
                assert_eq!(code, again);
                assert_eq!(vocab.decode(code), Some(token));
            }
        }
    }

    #[test]
    fn test_unknown_tokens_rejected() {
        assert_eq!(Vocabulary::YesNo.encode("maybe"), None);
        assert_eq!(Vocabulary::YesNo.encode(" yes"), None);
        assert_eq!(Vocabulary::GoodPoor.encode("2"), None);
        assert_eq!(Vocabulary::CkdNotCkd.encode("ckd\t"), None);
    }
}
