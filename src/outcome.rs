//! Tagged results for stages that may fall back instead of failing.

/// A value that was either computed normally or produced by a fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The stage succeeded.
    Computed(T),
    /// The stage failed and a substitute value was used.
    Fallback {
        /// The substitute value.
        value: T,
        /// Why the stage fell back.
        reason: String,
    },
}

impl<T> Outcome<T> {
    /// Borrow the value regardless of how it was produced.
    pub fn value(&self) -> &T {
        match self {
            Outcome::Computed(v) => v,
            Outcome::Fallback { value, .. } => value,
        }
    }

    /// Take the value regardless of how it was produced.
    pub fn into_value(self) -> T {
        match self {
            Outcome::Computed(v) => v,
            Outcome::Fallback { value, .. } => value,
        }
    }

    /// Whether a fallback was used.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback { .. })
    }

    /// Reason for the fallback, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Computed(_) => None,
            Outcome::Fallback { reason, .. } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let ok: Outcome<u8> = Outcome::Computed(1);
        assert!(!ok.is_fallback());
        assert_eq!(ok.reason(), None);
        assert_eq!(*ok.value(), 1);

        let fb = Outcome::Fallback {
            value: 2u8,
            reason: "degenerate".to_string(),
        };
        assert!(fb.is_fallback());
        assert_eq!(fb.reason(), Some("degenerate"));
        assert_eq!(fb.into_value(), 2);
    }
}
