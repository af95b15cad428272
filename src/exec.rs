//! The pipeline engine: pipe setup, one fork per stage, reaping.

use crate::command::{CommandSpec, Pipeline};
use crate::error::ExecError;
use crate::pipes::PipeEndpointSet;
use crate::report::{ChildRecord, PipelineReport};
use crate::spawn::{ChildHandle, ForkExecSpawner, Spawner, StdinSource, StdoutSink, Wiring};
use crate::trace;

/// Where the executor is within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Idle,
    Parsed,
    PipesBuilt,
    Forking,
    Reaping,
    Reported,
    Aborted,
}

impl ExecState {
    fn can_move_to(self, next: ExecState) -> bool {
        use ExecState::*;
        match (self, next) {
            (Idle, Parsed) => true,
            (Parsed, PipesBuilt | Forking) => true,
            (PipesBuilt, Forking) => true,
            (Forking, Reaping) => true,
            (Reaping, Reported) => true,
            (Reported | Aborted, Idle) => true,
            (Parsed | PipesBuilt | Forking | Reaping, Aborted) => true,
            _ => false,
        }
    }
}

/// Runs pipelines, one at a time, through a `Spawner`.
///
/// After `run` returns the executor rests in `Reported` or `Aborted`; the
/// next `run` starts from `Idle` again. Nothing else carries over.
pub struct Executor<S = ForkExecSpawner> {
    spawner: S,
    state: ExecState,
}

impl Executor<ForkExecSpawner> {
    pub fn new() -> Self {
        Self::with_spawner(ForkExecSpawner::new())
    }
}

impl Default for Executor<ForkExecSpawner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Spawner> Executor<S> {
    pub fn with_spawner(spawner: S) -> Self {
        Self {
            spawner,
            state: ExecState::Idle,
        }
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn spawner_mut(&mut self) -> &mut S {
        &mut self.spawner
    }

    /// Run every stage of `pipeline` and wait for all of them.
    ///
    /// On a pipe or fork failure nothing more is spawned, but every
    /// descriptor is still closed and every child already started is still
    /// reaped before the error is returned.
    pub fn run(&mut self, pipeline: &Pipeline) -> Result<PipelineReport, ExecError> {
        if matches!(self.state, ExecState::Reported | ExecState::Aborted) {
            self.transition(ExecState::Idle);
        }
        self.transition(ExecState::Parsed);

        let result = check_arguments(pipeline).and_then(|()| {
            if pipeline.len() == 1 {
                self.run_single(&pipeline[0])
            } else {
                self.run_multi(pipeline)
            }
        });

        match result {
            Ok(children) => {
                self.transition(ExecState::Reported);
                Ok(PipelineReport::new(children))
            }
            Err(err) => {
                self.transition(ExecState::Aborted);
                Err(err)
            }
        }
    }

    fn run_single(&mut self, spec: &CommandSpec) -> Result<Vec<ChildRecord>, ExecError> {
        self.transition(ExecState::Forking);
        let child = self.spawner.spawn(spec, &Wiring::inherit())?;
        self.transition(ExecState::Reaping);
        let (records, err) = self.reap(vec![child]);
        match err {
            Some(err) => Err(err),
            None => Ok(records),
        }
    }

    fn run_multi(&mut self, pipeline: &Pipeline) -> Result<Vec<ChildRecord>, ExecError> {
        let stages = pipeline.len();
        let spawner = &mut self.spawner;
        let endpoints = PipeEndpointSet::build_with(stages, || spawner.make_pipe())?;
        self.transition(ExecState::PipesBuilt);

        self.transition(ExecState::Forking);
        let sweep = endpoints.raw_fds();
        let mut children = Vec::with_capacity(stages);
        let mut spawn_err = None;
        for (stage, spec) in pipeline.iter().enumerate() {
            let wiring = Wiring {
                stage,
                stdin: if stage > 0 {
                    StdinSource::Pipe(endpoints.read_end_of(stage - 1))
                } else {
                    StdinSource::Inherit
                },
                stdout: if stage < stages - 1 {
                    StdoutSink::Pipe(endpoints.write_end_of(stage))
                } else {
                    StdoutSink::Inherit
                },
                sweep: &sweep,
            };
            match self.spawner.spawn(spec, &wiring) {
                Ok(child) => children.push(child),
                Err(err) => {
                    trace!(
                        spawn,
                        "stage {stage} failed, reaping {} started stages",
                        children.len()
                    );
                    spawn_err = Some(err);
                    break;
                }
            }
        }

        // The coordinator never touches pipeline data; readers only see end
        // of stream once these write ends are gone.
        endpoints.close_all();

        if spawn_err.is_none() {
            self.transition(ExecState::Reaping);
        }
        let (records, wait_err) = self.reap(children);
        match spawn_err.or(wait_err) {
            Some(err) => Err(err),
            None => Ok(records),
        }
    }

    /// Wait for each child exactly once, even if some waits fail. Returns
    /// what was collected and the first failure.
    fn reap(&mut self, children: Vec<ChildHandle>) -> (Vec<ChildRecord>, Option<ExecError>) {
        let mut records = Vec::with_capacity(children.len());
        let mut first_err = None;
        for child in &children {
            match self.spawner.wait(child) {
                Ok(status) => records.push(ChildRecord {
                    stage: child.stage,
                    pid: child.pid,
                    status,
                }),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        (records, first_err)
    }

    fn transition(&mut self, next: ExecState) {
        debug_assert!(
            self.state.can_move_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(state, "{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// An argument with a NUL byte cannot reach `execvp`. Checked for every
/// stage before any pipe or child exists.
fn check_arguments(pipeline: &Pipeline) -> Result<(), ExecError> {
    match pipeline
        .iter()
        .position(|spec| spec.args().iter().any(|a| a.contains('\0')))
    {
        Some(stage) => Err(ExecError::InvalidArgument { stage }),
        None => Ok(()),
    }
}
