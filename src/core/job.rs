use std::{
    collections::HashMap,
    thread,
    time::{Duration, Instant},
};

use log::{error, info};
use uuid::Uuid;

use crate::{
    core::{
        build_name,
        listener::JobListener,
        step::{Step, StepExecution, StepStatus},
    },
    error::BatchError,
};

/// Type alias for job execution results.
type JobResult<T> = Result<T, BatchError>;

/// Status of a job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Starting,
    Executing,
    /// Terminal: every step on the executed path completed.
    Completed,
    /// Terminal: a step failed, or a `Fail` transition was taken.
    Failed,
}

/// Record of one job run: status, per-step executions and timing.
///
/// Step executions appear in completion order; the branches of a parallel
/// split therefore have no guaranteed relative order.
#[derive(Debug, Clone)]
pub struct JobExecution {
    pub id: Uuid,
    pub name: String,
    pub status: JobStatus,
    pub step_executions: Vec<StepExecution>,
    pub start_time: Instant,
    pub end_time: Instant,
    pub duration: Duration,
}

/// Represents a job that can be executed.
///
/// A job sequences steps through a flow of conditional and parallel edges
/// and aggregates the terminal status.
pub trait Job {
    /// Runs the job.
    ///
    /// # Returns
    /// - `Ok(JobExecution)` when every step on the executed path completed
    /// - `Err(BatchError::Job)` when the job failed; listeners still receive
    ///   the final execution snapshot
    fn run(&self) -> JobResult<JobExecution>;
}

/// Matches the exit status of a flow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPattern {
    /// Matches every exit status.
    Any,
    /// Matches one specific status.
    Status(StepStatus),
}

impl ExitPattern {
    fn matches(&self, status: StepStatus) -> bool {
        match self {
            ExitPattern::Any => true,
            ExitPattern::Status(expected) => *expected == status,
        }
    }
}

/// Where the flow goes after a node exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Continue with the named node.
    To(String),
    /// Terminate the job as failed, short-circuiting the remaining nodes.
    Fail,
    /// Terminate the flow; the job status is aggregated from the executed
    /// steps.
    End,
}

impl Transition {
    /// Convenience constructor for [`Transition::To`].
    pub fn to(node: &str) -> Transition {
        Transition::To(node.to_string())
    }
}

enum NodeKind<'a> {
    Step(&'a dyn Step),
    /// Parallel branch: members start together and the node waits for all
    /// of them before aggregating.
    Split(Vec<&'a dyn Step>),
}

struct FlowNode<'a> {
    name: String,
    kind: NodeKind<'a>,
    transitions: Vec<(ExitPattern, Transition)>,
}

enum Route {
    Next(usize),
    Finish,
    Abort,
}

/// A runnable flow of steps.
///
/// Transitions are evaluated in declaration order; the first matching
/// pattern wins. A node without a matching transition falls through to the
/// next node in declaration order when it completed, and fails the job when
/// it did not.
pub struct JobInstance<'a> {
    id: Uuid,
    name: String,
    nodes: Vec<FlowNode<'a>>,
    index: HashMap<String, usize>,
    listeners: Vec<&'a dyn JobListener>,
}

impl Job for JobInstance<'_> {
    fn run(&self) -> JobResult<JobExecution> {
        let start_time = Instant::now();
        let mut job_execution = JobExecution {
            id: self.id,
            name: self.name.clone(),
            status: JobStatus::Starting,
            step_executions: Vec::new(),
            start_time,
            end_time: start_time,
            duration: Duration::ZERO,
        };

        info!("Start of job: {}, id: {}", self.name, self.id);
        for listener in &self.listeners {
            listener.before_job(&job_execution);
        }
        job_execution.status = JobStatus::Executing;

        let mut aborted = false;
        let mut cursor = if self.nodes.is_empty() { None } else { Some(0) };
        while let Some(node_index) = cursor {
            let node = &self.nodes[node_index];
            let status = self.execute_node(node, &mut job_execution);
            cursor = match self.route(node, node_index, status) {
                Route::Next(next_index) => Some(next_index),
                Route::Finish => None,
                Route::Abort => {
                    aborted = true;
                    None
                }
            };
        }

        // Completed iff every step on the taken path completed; a routed-over
        // failure still fails the job.
        let all_steps_completed = job_execution
            .step_executions
            .iter()
            .all(|step_execution| step_execution.status == StepStatus::Completed);
        job_execution.status = if aborted || !all_steps_completed {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        job_execution.end_time = Instant::now();
        job_execution.duration = start_time.elapsed();

        for listener in &self.listeners {
            listener.after_job(&job_execution);
        }
        info!(
            "End of job: {}, id: {}, status: {:?}",
            self.name, self.id, job_execution.status
        );

        if job_execution.status == JobStatus::Failed {
            Err(BatchError::Job(self.name.clone()))
        } else {
            Ok(job_execution)
        }
    }
}

impl JobInstance<'_> {
    fn execute_node(&self, node: &FlowNode<'_>, job_execution: &mut JobExecution) -> StepStatus {
        match &node.kind {
            NodeKind::Step(step) => {
                let mut step_execution = StepExecution::new(step.name());
                if let Err(step_error) = step.execute(&mut step_execution) {
                    error!(
                        "Step {} of job {} failed: {}",
                        step.name(),
                        self.name,
                        step_error
                    );
                }
                let status = step_execution.status;
                job_execution.step_executions.push(step_execution);
                status
            }
            NodeKind::Split(steps) => {
                info!(
                    "Start of split: {} ({} branches)",
                    node.name,
                    steps.len()
                );
                let mut branch_executions: Vec<StepExecution> = Vec::with_capacity(steps.len());
                let mut panicked = false;
                thread::scope(|scope| {
                    let handles: Vec<_> = steps
                        .iter()
                        .map(|step| {
                            let step = *step;
                            scope.spawn(move || {
                                let mut step_execution = StepExecution::new(step.name());
                                if let Err(step_error) = step.execute(&mut step_execution) {
                                    error!(
                                        "Branch step {} failed: {}",
                                        step.name(),
                                        step_error
                                    );
                                }
                                step_execution
                            })
                        })
                        .collect();
                    // wait for every branch, then aggregate
                    for handle in handles {
                        match handle.join() {
                            Ok(step_execution) => branch_executions.push(step_execution),
                            Err(_) => {
                                error!("A branch of split {} panicked", node.name);
                                panicked = true;
                            }
                        }
                    }
                });

                let status = if !panicked
                    && branch_executions
                        .iter()
                        .all(|branch| branch.status == StepStatus::Completed)
                {
                    StepStatus::Completed
                } else {
                    StepStatus::Failed
                };
                job_execution.step_executions.extend(branch_executions);
                info!("End of split: {}, status: {:?}", node.name, status);
                status
            }
        }
    }

    fn route(&self, node: &FlowNode<'_>, node_index: usize, status: StepStatus) -> Route {
        for (pattern, transition) in &node.transitions {
            if pattern.matches(status) {
                return match transition {
                    // target existence is validated at build time
                    Transition::To(target) => Route::Next(self.index[target]),
                    Transition::Fail => Route::Abort,
                    Transition::End => Route::Finish,
                };
            }
        }

        if status == StepStatus::Completed {
            if node_index + 1 < self.nodes.len() {
                Route::Next(node_index + 1)
            } else {
                Route::Finish
            }
        } else {
            Route::Abort
        }
    }
}

/// Builder for [`JobInstance`].
///
/// Nodes execute in the order they are added unless a transition routes
/// elsewhere. `on` attaches a transition to the most recently added node.
///
/// # Examples
///
/// ```rust,ignore
/// let job = JobBuilder::new()
///     .name("nightly-users")
///     .start(&ingest)
///     .on(ExitPattern::Status(StepStatus::Failed), Transition::Fail)
///     .split("load", vec![&load_db, &load_file])
///     .build()?;
/// let result = job.run();
/// ```
#[derive(Default)]
pub struct JobBuilder<'a> {
    name: Option<String>,
    nodes: Vec<FlowNode<'a>>,
    listeners: Vec<&'a dyn JobListener>,
    misplaced_transition: bool,
}

impl<'a> JobBuilder<'a> {
    pub fn new() -> JobBuilder<'a> {
        JobBuilder {
            name: None,
            nodes: Vec::new(),
            listeners: Vec::new(),
            misplaced_transition: false,
        }
    }

    pub fn name(mut self, name: &str) -> JobBuilder<'a> {
        self.name = Some(name.to_string());
        self
    }

    /// Sets the first step of the job. Semantically identical to `next`,
    /// reads better for the initial node.
    pub fn start(self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.next(step)
    }

    /// Appends a step node, named after the step.
    pub fn next(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.nodes.push(FlowNode {
            name: step.name().to_string(),
            kind: NodeKind::Step(step),
            transitions: Vec::new(),
        });
        self
    }

    /// Appends a parallel branch of steps under the given node name.
    pub fn split(mut self, name: &str, steps: Vec<&'a dyn Step>) -> JobBuilder<'a> {
        self.nodes.push(FlowNode {
            name: name.to_string(),
            kind: NodeKind::Split(steps),
            transitions: Vec::new(),
        });
        self
    }

    /// Attaches a conditional transition to the most recently added node.
    pub fn on(mut self, pattern: ExitPattern, transition: Transition) -> JobBuilder<'a> {
        match self.nodes.last_mut() {
            Some(node) => node.transitions.push((pattern, transition)),
            None => self.misplaced_transition = true,
        }
        self
    }

    pub fn listener(mut self, listener: &'a dyn JobListener) -> JobBuilder<'a> {
        self.listeners.push(listener);
        self
    }

    /// Builds the job.
    ///
    /// # Errors
    /// Returns [`BatchError::Configuration`] for duplicate node names, a
    /// transition attached before any node, or a transition targeting an
    /// undefined node.
    pub fn build(self) -> Result<JobInstance<'a>, BatchError> {
        if self.misplaced_transition {
            return Err(BatchError::Configuration(
                "a transition was declared before any node".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(self.nodes.len());
        for (position, node) in self.nodes.iter().enumerate() {
            if index.insert(node.name.clone(), position).is_some() {
                return Err(BatchError::Configuration(format!(
                    "duplicate node name: {}",
                    node.name
                )));
            }
        }
        for node in &self.nodes {
            for (_, transition) in &node.transitions {
                if let Transition::To(target) = transition {
                    if !index.contains_key(target) {
                        return Err(BatchError::Configuration(format!(
                            "transition from {} targets undefined node: {}",
                            node.name, target
                        )));
                    }
                }
            }
        }

        Ok(JobInstance {
            id: Uuid::new_v4(),
            name: self.name.unwrap_or_else(build_name),
            nodes: self.nodes,
            index,
            listeners: self.listeners,
        })
    }
}
