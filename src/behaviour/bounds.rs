use std::fmt;

use crate::error::{CompileError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsKind {
    Lower,
    Upper,
    LowerAndUpper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsCategory {
    /// domain of validity of the variable, e.g. a positive temperature
    Physical,
    /// domain where the behaviour was identified, checked under the out of bounds policy
    Standard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundsDescription {
    pub variable: String,
    pub component: Option<usize>,
    pub kind: BoundsKind,
    pub category: BoundsCategory,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub line: usize,
}

impl BoundsDescription {
    /// `None` stands for an infinite bound. Fails if both bounds are infinite or if the
    /// lower bound is greater than the upper one.
    pub fn new(
        variable: &str,
        component: Option<usize>,
        category: BoundsCategory,
        lower: Option<f64>,
        upper: Option<f64>,
        line: usize,
    ) -> Result<Self, CompileError> {
        let kind = match (lower, upper) {
            (Some(lo), Some(hi)) => {
                if lo > hi || lo.is_nan() || hi.is_nan() {
                    return Err(CompileError::new(
                        ErrorKind::InvalidRange {
                            variable: variable.to_string(),
                            lower: lo,
                            upper: hi,
                        },
                        line,
                    ));
                }
                BoundsKind::LowerAndUpper
            }
            (Some(_), None) => BoundsKind::Lower,
            (None, Some(_)) => BoundsKind::Upper,
            (None, None) => {
                return Err(CompileError::syntax(
                    format!("bounds of '{}' are both infinite", variable),
                    line,
                ))
            }
        };
        Ok(Self {
            variable: variable.to_string(),
            component,
            kind,
            category,
            lower,
            upper,
            line,
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower.map_or(true, |lo| value >= lo) && self.upper.map_or(true, |hi| value <= hi)
    }

    pub fn keyword(&self) -> &'static str {
        match self.category {
            BoundsCategory::Physical => "@PhysicalBounds",
            BoundsCategory::Standard => "@Bounds",
        }
    }
}

impl fmt::Display for BoundsDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.variable)?;
        if let Some(c) = self.component {
            write!(f, "({})", c)?;
        }
        write!(f, " in ")?;
        match self.lower {
            Some(lo) => write!(f, "[{:?}", lo)?,
            None => write!(f, "]*")?,
        }
        write!(f, ":")?;
        match self.upper {
            Some(hi) => write!(f, "{:?}]", hi),
            None => write!(f, "*["),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn kinds() {
        let b = BoundsDescription::new("T", None, BoundsCategory::Physical, Some(0.), None, 4).unwrap();
        assert_eq!(b.kind, BoundsKind::Lower);
        assert!(b.contains(300.));
        assert!(!b.contains(-1.));
        assert_eq!(b.to_string(), "T in [0.0:*[");
        let b = BoundsDescription::new("eel", Some(2), BoundsCategory::Standard, Some(0.), Some(1.), 4)
            .unwrap();
        assert_eq!(b.kind, BoundsKind::LowerAndUpper);
        assert_eq!(b.to_string(), "eel(2) in [0.0:1.0]");
        assert!(BoundsDescription::new("T", None, BoundsCategory::Physical, None, None, 4).is_err());
    }

    proptest! {
        #[test]
        fn reversed_bounds_are_rejected(lo in -1e6f64..1e6, delta in 1e-3f64..1e6) {
            let err = BoundsDescription::new("x", None, BoundsCategory::Standard, Some(lo + delta), Some(lo), 7)
                .unwrap_err();
            let is_invalid_range = matches!(err.kind, ErrorKind::InvalidRange { .. });
            prop_assert!(is_invalid_range);
            prop_assert_eq!(err.line, 7);
        }

        #[test]
        fn ordered_bounds_are_accepted(lo in -1e6f64..1e6, delta in 0f64..1e6) {
            let b = BoundsDescription::new("x", None, BoundsCategory::Standard, Some(lo), Some(lo + delta), 7)
                .unwrap();
            prop_assert_eq!(b.kind, BoundsKind::LowerAndUpper);
            prop_assert!(b.contains(lo));
        }
    }
}
