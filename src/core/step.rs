use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    core::{
        chunk::{Chunk, ChunkStatus},
        fault::{FaultCategory, FaultCounters, FaultDecision, FaultPolicy},
        item::{DefaultProcessor, ItemOutcome, ItemProcessor, ItemReader, ItemWriter},
        listener::StepListener,
        lock,
    },
    error::BatchError,
};

/// Status of a step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// Initial status, before the first chunk is attempted.
    Starting,
    /// The chunk cycle is running.
    Executing,
    /// Terminal: the source was exhausted without a fatal fault.
    Completed,
    /// Terminal: a fatal fault aborted the step.
    Failed,
}

/// Record of one step run: status, counters and timing.
///
/// Mutated by the engine while the step executes; immutable once the status
/// is terminal. The counters reset with a fresh run of the step.
#[derive(Debug, Clone)]
pub struct StepExecution {
    /// Unique identifier for this execution
    pub id: Uuid,
    /// Name of the step being executed
    pub name: String,
    pub status: StepStatus,
    /// Number of items successfully read
    pub read_count: usize,
    /// Number of items committed by the writer
    pub write_count: usize,
    /// Number of faulty items dropped under the skip budget
    pub skip_count: usize,
    /// Number of items discarded by a `Filtered` outcome
    pub filter_count: usize,
    /// Failure occurrences per category
    pub fault_counts: FaultCounters,
    pub start_time: Instant,
    pub end_time: Instant,
    pub duration: Duration,
}

impl StepExecution {
    pub fn new(name: &str) -> StepExecution {
        let now = Instant::now();
        StepExecution {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: StepStatus::Starting,
            read_count: 0,
            write_count: 0,
            skip_count: 0,
            filter_count: 0,
            fault_counts: FaultCounters::default(),
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
        }
    }
}

/// Represents one phase of a job, executed to completion or failure.
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Executes the step, recording progress on `execution`.
    ///
    /// # Returns
    /// - `Ok(())` when the step completed; `execution.status` is `Completed`
    /// - `Err(BatchError)` when a fatal fault aborted it; `execution.status`
    ///   is `Failed`
    fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError>;
}

/// Counters shared by the workers of one step execution.
#[derive(Default)]
struct StepProgress {
    read_count: usize,
    write_count: usize,
    skip_count: usize,
    filter_count: usize,
    fault_counts: FaultCounters,
}

/// Position of the shared source. Exactly one worker fills a chunk at a
/// time, so chunks are contiguous slices of the stream and end of stream is
/// observed once.
struct ReadHead {
    exhausted: bool,
}

struct StepState {
    template: StepExecution,
    progress: Mutex<StepProgress>,
    read_head: Mutex<ReadHead>,
    aborted: AtomicBool,
}

impl StepState {
    fn new(template: StepExecution) -> StepState {
        StepState {
            template,
            progress: Mutex::new(StepProgress::default()),
            read_head: Mutex::new(ReadHead { exhausted: false }),
            aborted: AtomicBool::new(false),
        }
    }

    /// Snapshot of the execution with the counters as of now, for listeners.
    fn snapshot(&self) -> StepExecution {
        let progress = lock(&self.progress);
        let mut execution = self.template.clone();
        execution.read_count = progress.read_count;
        execution.write_count = progress.write_count;
        execution.skip_count = progress.skip_count;
        execution.filter_count = progress.filter_count;
        execution.fault_counts = progress.fault_counts.clone();
        execution
    }
}

/// A step that pulls items from a reader, runs them through a processor and
/// commits them to a writer in bounded-size chunks.
///
/// Faults during processing are handled per item (retry, then skip, then
/// fatal), faults during writing per chunk (retry, then fatal), both under
/// the step's [`FaultPolicy`]. With more than one worker, chunks execute
/// concurrently; commit order across workers is unspecified and a fatal
/// fault in one worker stops the others at their next chunk boundary.
pub struct ChunkOrientedStep<'a, I, O> {
    name: String,
    reader: &'a dyn ItemReader<I>,
    processor: &'a dyn ItemProcessor<I, O>,
    writer: &'a dyn ItemWriter<O>,
    chunk_size: usize,
    workers: usize,
    fault_policy: FaultPolicy,
    listeners: Vec<&'a dyn StepListener>,
}

impl<I, O> Step for ChunkOrientedStep<'_, I, O> {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError> {
        let start_time = Instant::now();
        execution.status = StepStatus::Starting;

        info!("Start of step: {}, id: {}", execution.name, execution.id);
        for listener in &self.listeners {
            listener.before_step(execution);
        }

        let result = match self.open_resources() {
            Ok(()) => self.run_chunk_cycle(execution),
            Err(open_error) => Err(open_error),
        };
        self.close_resources();

        execution.start_time = start_time;
        execution.end_time = Instant::now();
        execution.duration = start_time.elapsed();
        execution.status = match result {
            Ok(()) => StepStatus::Completed,
            Err(_) => StepStatus::Failed,
        };

        for listener in &self.listeners {
            listener.after_step(execution);
        }
        info!(
            "End of step: {}, id: {}, status: {:?}",
            execution.name, execution.id, execution.status
        );

        result
    }
}

impl<I, O> ChunkOrientedStep<'_, I, O> {
    fn open_resources(&self) -> Result<(), BatchError> {
        self.reader.open()?;
        self.writer.open()?;
        Ok(())
    }

    /// Close failures do not change the step outcome: commits happened at
    /// write time.
    fn close_resources(&self) {
        if let Err(close_error) = self.writer.close() {
            warn!("Error closing writer of step {}: {}", self.name, close_error);
        }
        if let Err(close_error) = self.reader.close() {
            warn!("Error closing reader of step {}: {}", self.name, close_error);
        }
    }

    /// Runs the read/process/write cycle on the configured worker pool and
    /// folds the shared counters back into `execution`.
    fn run_chunk_cycle(&self, execution: &mut StepExecution) -> Result<(), BatchError> {
        execution.status = StepStatus::Executing;
        let state = StepState::new(execution.clone());

        let mut first_error: Option<BatchError> = None;
        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|_| scope.spawn(|| self.chunk_worker(&state)))
                .collect();
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(worker_error)) => {
                        first_error.get_or_insert(worker_error);
                    }
                    Err(_) => {
                        state.aborted.store(true, Ordering::Relaxed);
                        first_error.get_or_insert(BatchError::Step(format!(
                            "worker thread panicked in step {}",
                            self.name
                        )));
                    }
                }
            }
        });

        let progress = lock(&state.progress);
        execution.read_count = progress.read_count;
        execution.write_count = progress.write_count;
        execution.skip_count = progress.skip_count;
        execution.filter_count = progress.filter_count;
        execution.fault_counts = progress.fault_counts.clone();
        drop(progress);

        match first_error {
            None => Ok(()),
            Some(fatal) => Err(fatal),
        }
    }

    /// One worker: loops over chunks until the source is drained or the
    /// step aborts. Cancellation is cooperative: an in-flight chunk always
    /// finishes before the flag is observed.
    fn chunk_worker(&self, state: &StepState) -> Result<(), BatchError> {
        loop {
            if state.aborted.load(Ordering::Relaxed) {
                debug!("Step {} aborted, worker stops", self.name);
                return Ok(());
            }

            let (chunk, chunk_status) = match self.read_chunk(state) {
                Ok(Some(read)) => read,
                Ok(None) => return Ok(()),
                Err(read_error) => {
                    state.aborted.store(true, Ordering::Relaxed);
                    return Err(read_error);
                }
            };

            let surviving = match self.process_chunk(chunk, state) {
                Ok(items) => items,
                Err(process_error) => {
                    state.aborted.store(true, Ordering::Relaxed);
                    return Err(process_error);
                }
            };

            if let Err(write_error) = self.write_chunk(&surviving, state) {
                state.aborted.store(true, Ordering::Relaxed);
                return Err(write_error);
            }

            if chunk_status == ChunkStatus::Finished {
                return Ok(());
            }
        }
    }

    /// Fills one chunk under the shared read lock. Source failures are
    /// fatal: they are returned as-is, never routed through the fault
    /// policy.
    fn read_chunk(
        &self,
        state: &StepState,
    ) -> Result<Option<(Chunk<I>, ChunkStatus)>, BatchError> {
        let mut head = lock(&state.read_head);
        if head.exhausted {
            return Ok(None);
        }

        debug!("Start reading chunk");
        let mut chunk = Chunk::new(self.chunk_size);
        let mut status = ChunkStatus::Full;

        while !chunk.is_full() {
            self.notify(state, |listener, snapshot| listener.before_read(snapshot));
            match self.reader.read() {
                Ok(Some(item)) => {
                    chunk.push(item);
                    lock(&state.progress).read_count += 1;
                    self.notify(state, |listener, snapshot| listener.after_read(snapshot));
                }
                Ok(None) => {
                    head.exhausted = true;
                    status = ChunkStatus::Finished;
                    break;
                }
                Err(read_error) => {
                    head.exhausted = true;
                    warn!("Error reading item: {}", read_error);
                    self.notify(state, |listener, snapshot| {
                        listener.on_error(snapshot, &read_error)
                    });
                    return Err(read_error);
                }
            }
        }

        if chunk.is_empty() {
            debug!("End reading chunk: source drained");
            return Ok(None);
        }
        debug!("End reading chunk: {:?} ({} items)", status, chunk.len());
        Ok(Some((chunk, status)))
    }

    fn process_chunk(&self, chunk: Chunk<I>, state: &StepState) -> Result<Vec<O>, BatchError> {
        debug!("Processing chunk of {} items", chunk.len());
        let mut surviving = Vec::with_capacity(chunk.len());

        for item in chunk.into_items() {
            if let Some(processed) = self.process_item(&item, state)? {
                surviving.push(processed);
            }
        }

        Ok(surviving)
    }

    /// Runs one item through the processor, retrying from the first stage
    /// up to the retry budget. The fault decision and the counter updates
    /// happen under one lock so concurrent workers cannot overrun the skip
    /// budget.
    fn process_item(&self, item: &I, state: &StepState) -> Result<Option<O>, BatchError> {
        self.notify(state, |listener, snapshot| listener.before_process(snapshot));
        let mut retries = 0;
        loop {
            match self.processor.process(item) {
                Ok(ItemOutcome::Forward(processed)) => {
                    self.notify(state, |listener, snapshot| listener.after_process(snapshot));
                    return Ok(Some(processed));
                }
                Ok(ItemOutcome::Filtered) => {
                    lock(&state.progress).filter_count += 1;
                    debug!("Item filtered before write");
                    return Ok(None);
                }
                Err(process_error) => {
                    let category = FaultCategory::of(&process_error);
                    self.notify(state, |listener, snapshot| {
                        listener.on_error(snapshot, &process_error)
                    });

                    let decision = {
                        let mut progress = lock(&state.progress);
                        progress.fault_counts.record(category);
                        let decision =
                            self.fault_policy
                                .decide_item(category, retries, progress.skip_count);
                        if decision == FaultDecision::Skip {
                            progress.skip_count += 1;
                        }
                        decision
                    };

                    match decision {
                        FaultDecision::Retry => {
                            retries += 1;
                            debug!("Retry {} for item after: {}", retries, process_error);
                        }
                        FaultDecision::Skip => {
                            warn!("Skipping item: {}", process_error);
                            return Ok(None);
                        }
                        FaultDecision::Fatal => {
                            error!("Fatal fault while processing: {}", process_error);
                            return Err(process_error);
                        }
                    }
                }
            }
        }
    }

    /// Commits one chunk, re-attempting the whole write up to the retry
    /// budget. An empty chunk still commits: every read chunk produces
    /// exactly one write call.
    fn write_chunk(&self, items: &[O], state: &StepState) -> Result<(), BatchError> {
        debug!("Start writing chunk ({} items)", items.len());
        self.notify(state, |listener, snapshot| {
            listener.before_chunk_write(snapshot)
        });

        let mut retries = 0;
        loop {
            match self.writer.write(items) {
                Ok(()) => {
                    lock(&state.progress).write_count += items.len();
                    self.notify(state, |listener, snapshot| {
                        listener.after_chunk_write(snapshot)
                    });
                    debug!("End writing chunk");
                    return Ok(());
                }
                Err(write_error) => {
                    let category = FaultCategory::of(&write_error);
                    self.notify(state, |listener, snapshot| {
                        listener.on_error(snapshot, &write_error)
                    });

                    let decision = {
                        let mut progress = lock(&state.progress);
                        progress.fault_counts.record(category);
                        self.fault_policy.decide_write(category, retries)
                    };

                    match decision {
                        FaultDecision::Retry => {
                            retries += 1;
                            warn!("Retry {} for chunk write after: {}", retries, write_error);
                        }
                        FaultDecision::Skip | FaultDecision::Fatal => {
                            error!("Fatal fault while writing chunk: {}", write_error);
                            return Err(write_error);
                        }
                    }
                }
            }
        }
    }

    fn notify<F>(&self, state: &StepState, hook: F)
    where
        F: Fn(&dyn StepListener, &StepExecution),
    {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = state.snapshot();
        for listener in &self.listeners {
            hook(*listener, &snapshot);
        }
    }
}

/// Entry point for building steps.
///
/// # Examples
///
/// ```rust,ignore
/// let step = StepBuilder::new("import-users")
///     .chunk::<User, User>(5)
///     .reader(&reader)
///     .processor(&processor)
///     .writer(&writer)
///     .retry_limit(3)
///     .skip_limit(5)
///     .build()?;
/// ```
pub struct StepBuilder {
    name: String,
}

impl StepBuilder {
    pub fn new(name: &str) -> StepBuilder {
        StepBuilder {
            name: name.to_string(),
        }
    }

    /// Continues with a chunk-oriented step of the given commit interval.
    pub fn chunk<'a, I, O>(self, chunk_size: usize) -> ChunkOrientedStepBuilder<'a, I, O> {
        ChunkOrientedStepBuilder {
            name: self.name,
            reader: None,
            processor: None,
            writer: None,
            chunk_size,
            retry_limit: 0,
            skip_limit: 0,
            workers: 1,
            fatal_categories: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

/// Builder for [`ChunkOrientedStep`].
///
/// Defaults: no fault tolerance (retry and skip limits of 0) and a single
/// worker. All configuration is validated by [`build`](Self::build); an
/// invalid step never starts executing.
pub struct ChunkOrientedStepBuilder<'a, I, O> {
    name: String,
    reader: Option<&'a dyn ItemReader<I>>,
    processor: Option<&'a dyn ItemProcessor<I, O>>,
    writer: Option<&'a dyn ItemWriter<O>>,
    chunk_size: usize,
    retry_limit: usize,
    skip_limit: usize,
    workers: usize,
    fatal_categories: Vec<FaultCategory>,
    listeners: Vec<&'a dyn StepListener>,
}

impl<'a, I, O> ChunkOrientedStepBuilder<'a, I, O> {
    pub fn reader(mut self, reader: &'a dyn ItemReader<I>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn processor(mut self, processor: &'a dyn ItemProcessor<I, O>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn writer(mut self, writer: &'a dyn ItemWriter<O>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Maximum number of re-attempts for a faulty item or chunk write.
    pub fn retry_limit(mut self, retry_limit: usize) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Maximum number of faulty items dropped before the step aborts.
    pub fn skip_limit(mut self, skip_limit: usize) -> Self {
        self.skip_limit = skip_limit;
        self
    }

    /// Size of the worker pool executing chunks concurrently.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Declares a failure category fatal: never retried, never skipped.
    pub fn fatal_on(mut self, category: FaultCategory) -> Self {
        self.fatal_categories.push(category);
        self
    }

    pub fn listener(mut self, listener: &'a dyn StepListener) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Builds the step.
    ///
    /// # Errors
    /// Returns [`BatchError::Configuration`] for a zero chunk size, an empty
    /// worker pool, or a missing reader, processor or writer.
    pub fn build(self) -> Result<ChunkOrientedStep<'a, I, O>, BatchError> {
        if self.chunk_size == 0 {
            return Err(BatchError::Configuration(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(BatchError::Configuration(
                "worker pool needs at least 1 worker".to_string(),
            ));
        }
        let reader = self
            .reader
            .ok_or_else(|| BatchError::Configuration("a reader is required".to_string()))?;
        let writer = self
            .writer
            .ok_or_else(|| BatchError::Configuration("a writer is required".to_string()))?;
        let processor = self.processor.ok_or_else(|| {
            BatchError::Configuration(
                "a processor is required; use pass_through() to move items unchanged".to_string(),
            )
        })?;

        let mut fault_policy = FaultPolicy::new(self.retry_limit, self.skip_limit);
        for category in self.fatal_categories {
            fault_policy = fault_policy.fatal_on(category);
        }

        Ok(ChunkOrientedStep {
            name: self.name,
            reader,
            processor,
            writer,
            chunk_size: self.chunk_size,
            workers: self.workers,
            fault_policy,
            listeners: self.listeners,
        })
    }
}

impl<'a, I: Clone + Send + Sync> ChunkOrientedStepBuilder<'a, I, I> {
    /// Moves items from reader to writer unchanged.
    pub fn pass_through(mut self) -> Self {
        self.processor = Some(&DefaultProcessor);
        self
    }
}
