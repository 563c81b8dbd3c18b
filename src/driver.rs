//! Batch compilation: every behaviour file is parsed in turn, then its sources are
//! generated for each selected hypothesis and interface on a thread pool.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::behaviour::{BehaviourDescription, ModellingHypothesis};
use crate::codegen::generate;
use crate::error::{CompileError, CompileErrors};
use crate::options::CompilerOptions;
use crate::parser::parse_mfront_file;
use crate::registry::Registry;

/// One pair of hypothesis and interface to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    pub hypothesis: ModellingHypothesis,
    pub interface: String,
}

/// What a compilation wrote and what went wrong.
#[derive(Debug, Default)]
pub struct CompilationReport {
    pub written: Vec<PathBuf>,
    /// tasks not run because the compilation was cancelled
    pub skipped: usize,
    pub errors: CompileErrors,
}

impl CompilationReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn merge(&mut self, other: CompilationReport) {
        self.written.extend(other.written);
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}

enum TaskOutcome {
    Written(Vec<PathBuf>),
    Skipped,
    Failed(CompileError),
}

/// writes `contents` to `dir/name` through a temporary file renamed on success, so that
/// a reader never sees a partial file
pub fn write_atomically(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, CompileError> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    let path = dir.join(name);
    file.persist(&path).map_err(|e| CompileError::from(e.error))?;
    Ok(path)
}

pub struct Driver {
    registry: Registry,
    options: CompilerOptions,
    cancelled: Arc<AtomicBool>,
}

impl Driver {
    pub fn new(options: CompilerOptions) -> Self {
        let registry = match options.out_of_bounds_policy {
            Some(policy) => Registry::new().with_policy(policy),
            None => Registry::new(),
        };
        Self::with_registry(registry, options)
    }

    pub fn with_registry(registry: Registry, options: CompilerOptions) -> Self {
        Self {
            registry,
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// tasks that have not started yet are skipped, running ones complete
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// a flag that cancels the compilation when set, for signal handlers
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// the selected hypotheses of the behaviour times the requested interfaces; pairs a
    /// known interface cannot handle are left out
    pub fn tasks(&self, bd: &BehaviourDescription) -> Vec<GenerationTask> {
        let mut tasks = Vec::new();
        for hypothesis in bd.hypotheses() {
            if !self.options.selects(hypothesis) {
                continue;
            }
            for interface in &self.options.interfaces {
                if let Some(backend) = self.registry.interface(interface) {
                    if !backend.supports(hypothesis) {
                        debug!(%hypothesis, interface, "hypothesis not supported by interface, skipped");
                        continue;
                    }
                }
                tasks.push(GenerationTask {
                    hypothesis,
                    interface: interface.clone(),
                });
            }
        }
        tasks
    }

    fn run_task(&self, bd: &BehaviourDescription, task: &GenerationTask) -> TaskOutcome {
        if self.is_cancelled() {
            return TaskOutcome::Skipped;
        }
        debug!(behaviour = %bd.class_name(), hypothesis = %task.hypothesis, interface = %task.interface, "task started");
        let result = generate(bd, task.hypothesis, &task.interface, &self.registry).and_then(|file| {
            let dir = &self.options.output_dir;
            let header = write_atomically(dir, &file.header_name, &file.header)?;
            let source = write_atomically(dir, &file.source_name, &file.source)?;
            Ok(vec![header, source])
        });
        match result {
            Ok(paths) => {
                for path in &paths {
                    info!(path = %path.display(), "written");
                }
                TaskOutcome::Written(paths)
            }
            Err(err) => {
                let err = match &bd.source_file {
                    Some(file) if err.file.is_none() => err.in_file(file),
                    _ => err,
                };
                warn!(hypothesis = %task.hypothesis, interface = %task.interface, "generation failed: {}", err);
                TaskOutcome::Failed(err)
            }
        }
    }

    /// generates the sources of a behaviour, a failing task leaving the others unaffected
    pub fn compile_behaviour(&self, bd: &BehaviourDescription) -> CompilationReport {
        let mut report = CompilationReport::default();
        if let Err(err) = fs::create_dir_all(&self.options.output_dir) {
            report.errors.push(CompileError::from(err));
            return report;
        }
        let tasks = self.tasks(bd);
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = self.options.jobs {
            builder = builder.num_threads(jobs);
        }
        let pool = match builder.build() {
            Ok(pool) => pool,
            Err(err) => {
                report
                    .errors
                    .push(CompileError::generation(format!("cannot start the thread pool: {}", err)));
                return report;
            }
        };
        let outcomes: Vec<TaskOutcome> =
            pool.install(|| tasks.par_iter().map(|task| self.run_task(bd, task)).collect());
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Written(paths) => report.written.extend(paths),
                TaskOutcome::Skipped => report.skipped += 1,
                TaskOutcome::Failed(err) => report.errors.push(err),
            }
        }
        report
    }

    pub fn compile_file(&self, path: &Path) -> CompilationReport {
        debug!(path = %path.display(), "parsing");
        match parse_mfront_file(path, &self.registry) {
            Ok(bd) => self.compile_behaviour(&bd),
            Err(errors) => CompilationReport {
                errors,
                ..CompilationReport::default()
            },
        }
    }

    /// compiles every file, the errors of one file never stopping the others
    pub fn compile_files<P: AsRef<Path>>(&self, paths: &[P]) -> CompilationReport {
        let mut report = CompilationReport::default();
        for path in paths {
            report.merge(self.compile_file(path.as_ref()));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_mfront_string;

    const NORTON: &str = "@DSL IsotropicMisesCreep; @Behaviour Norton; @MaterialProperty real A;\
                          @ModellingHypotheses {PlaneStrain, Tridimensional};\
                          @FlowRule { f = A*seq; df_dseq = A; }";

    fn driver(dir: &Path, interfaces: &[&str]) -> Driver {
        Driver::new(CompilerOptions {
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            output_dir: dir.to_path_buf(),
            jobs: Some(2),
            ..CompilerOptions::default()
        })
    }

    #[test]
    fn tasks_are_the_product_of_hypotheses_and_interfaces() {
        let dir = tempfile::tempdir().unwrap();
        let d = driver(dir.path(), &["umat", "cyrano", "generic"]);
        let bd = parse_mfront_string(NORTON, d.registry()).unwrap();
        // cyrano only handles the one dimensional hypotheses
        assert_eq!(d.tasks(&bd).len(), 4);
    }

    #[test]
    fn failing_task_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let d = driver(dir.path(), &["generic", "ansys"]);
        let bd = parse_mfront_string(NORTON, d.registry()).unwrap();
        let report = d.compile_behaviour(&bd);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.written.len(), 4);
        assert!(dir.path().join("Norton-generic-PLANESTRAIN.cxx").exists());
        assert!(report.errors.has_error_contains("unknown interface 'ansys'"));
    }

    #[test]
    fn cancelled_tasks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let d = driver(dir.path(), &["generic"]);
        let bd = parse_mfront_string(NORTON, d.registry()).unwrap();
        d.cancel();
        let report = d.compile_behaviour(&bd);
        assert!(report.written.is_empty());
        assert_eq!(report.skipped, 2);
        assert!(report.is_success());
    }

    #[test]
    fn atomic_write_replaces_the_file() {
        let dir = tempfile::tempdir().unwrap();
        write_atomically(dir.path(), "a.cxx", "first").unwrap();
        let path = write_atomically(dir.path(), "a.cxx", "second").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
