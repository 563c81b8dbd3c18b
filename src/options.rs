use std::path::PathBuf;

use crate::behaviour::ModellingHypothesis;
use crate::integration::OutOfBoundsPolicy;

/// What to generate and where, as given on the command line.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// target interfaces, by name
    pub interfaces: Vec<String>,
    /// restricts the generation to these hypotheses, all the hypotheses of the behaviour
    /// when empty
    pub hypotheses: Vec<ModellingHypothesis>,
    pub output_dir: PathBuf,
    /// size of the generation thread pool, rayon's default when `None`
    pub jobs: Option<usize>,
    /// overrides `MFRONT_OUT_OF_BOUNDS_POLICY`
    pub out_of_bounds_policy: Option<OutOfBoundsPolicy>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            interfaces: vec!["generic".to_string()],
            hypotheses: Vec::new(),
            output_dir: PathBuf::from("."),
            jobs: None,
            out_of_bounds_policy: None,
        }
    }
}

impl CompilerOptions {
    pub fn selects(&self, hypothesis: ModellingHypothesis) -> bool {
        self.hypotheses.is_empty() || self.hypotheses.contains(&hypothesis)
    }
}
