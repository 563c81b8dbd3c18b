use std::fmt;
use std::str::FromStr;

/// environment variable giving the default policy
pub const POLICY_VARIABLE: &str = "MFRONT_OUT_OF_BOUNDS_POLICY";

/// What to do when a variable leaves its bounds at the end of a converged step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutOfBoundsPolicy {
    #[default]
    None,
    Warning,
    Strict,
}

impl OutOfBoundsPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            OutOfBoundsPolicy::None => "NONE",
            OutOfBoundsPolicy::Warning => "WARNING",
            OutOfBoundsPolicy::Strict => "STRICT",
        }
    }

    /// the policy set in `MFRONT_OUT_OF_BOUNDS_POLICY`, `None` when unset or invalid
    pub fn from_env() -> Self {
        Self::from_variable(POLICY_VARIABLE)
    }

    pub fn from_variable(name: &str) -> Self {
        std::env::var(name)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for OutOfBoundsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(OutOfBoundsPolicy::None),
            "WARNING" => Ok(OutOfBoundsPolicy::Warning),
            "STRICT" => Ok(OutOfBoundsPolicy::Strict),
            _ => Err(format!(
                "invalid out of bounds policy '{}', expected STRICT, WARNING or NONE",
                s
            )),
        }
    }
}

impl fmt::Display for OutOfBoundsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!("strict".parse::<OutOfBoundsPolicy>(), Ok(OutOfBoundsPolicy::Strict));
        assert_eq!("WARNING".parse::<OutOfBoundsPolicy>(), Ok(OutOfBoundsPolicy::Warning));
        assert!("sometimes".parse::<OutOfBoundsPolicy>().is_err());
        assert_eq!(OutOfBoundsPolicy::default().to_string(), "NONE");
    }

    #[test]
    fn unset_variable() {
        assert_eq!(
            OutOfBoundsPolicy::from_variable("MFRONT_TEST_UNSET_POLICY_VARIABLE"),
            OutOfBoundsPolicy::None
        );
    }
}
