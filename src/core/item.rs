use crate::error::BatchError;

/// Type alias for the result of a single read attempt.
///
/// - `Ok(Some(item))`: an item was read
/// - `Ok(None)`: the source is exhausted; it stays exhausted on every
///   subsequent call
/// - `Err(BatchError)`: the read failed; source failures are fatal to the
///   step that owns the reader
pub type ItemReaderResult<I> = Result<Option<I>, BatchError>;

/// Represents the retrieval of input for a step, one item at a time.
///
/// A reader instance may be drained concurrently by several workers, so an
/// implementation must serialize its own position advance (interior
/// mutability behind a `Mutex`); no two callers may ever observe the same
/// item.
pub trait ItemReader<I>: Send + Sync {
    /// Acquires the underlying resource. Called once before the first read.
    fn open(&self) -> Result<(), BatchError> {
        Ok(())
    }

    /// Reads the next item, advancing the internal position exactly once.
    fn read(&self) -> ItemReaderResult<I>;

    /// Releases the underlying resource. Called once after the last read,
    /// whether the step completed or aborted.
    fn close(&self) -> Result<(), BatchError> {
        Ok(())
    }
}

/// What a processing stage decided to do with an item.
#[derive(Debug, PartialEq, Eq)]
pub enum ItemOutcome<O> {
    /// Hand the item (possibly transformed) to the next stage or the writer.
    Forward(O),
    /// Silently discard the item. A filtered item never reaches the writer
    /// and is not an error: it does not count against the skip budget.
    Filtered,
}

/// Type alias for the result of a processing stage.
pub type ItemProcessorResult<O> = Result<ItemOutcome<O>, BatchError>;

/// Represents the business logic applied to one item between read and write.
///
/// Stages must tolerate being invoked more than once on the same logical
/// item: a retried item re-enters the processing chain from the first stage.
pub trait ItemProcessor<I, O>: Send + Sync {
    fn process(&self, item: &I) -> ItemProcessorResult<O>;
}

/// Represents the output of a step, one chunk of items at a time.
///
/// One `write` call receives one chunk and must commit it atomically: after
/// `Ok(())` every item of the slice is durable, after `Err` none is assumed
/// to be. The engine may re-issue the same chunk after a write failure.
pub trait ItemWriter<O>: Send + Sync {
    /// Acquires the underlying resource. Called once before the first write.
    fn open(&self) -> Result<(), BatchError> {
        Ok(())
    }

    /// Writes one chunk. The slice may be empty when every item of the chunk
    /// was skipped or filtered; implementations treat that as a no-op commit.
    fn write(&self, items: &[O]) -> Result<(), BatchError>;

    /// Releases the underlying resource. Called once after the last write.
    fn close(&self) -> Result<(), BatchError> {
        Ok(())
    }
}

/// Pass-through processor for steps that move items unchanged.
#[derive(Default)]
pub struct DefaultProcessor;

impl<I: Clone + Send + Sync> ItemProcessor<I, I> for DefaultProcessor {
    fn process(&self, item: &I) -> ItemProcessorResult<I> {
        Ok(ItemOutcome::Forward(item.clone()))
    }
}

/// An ordered sequence of same-typed stages applied left to right.
///
/// A `Filtered` outcome short-circuits the remaining stages and the item is
/// discarded without error. An `Err` short-circuits and is handed to the
/// step's fault policy. Stage order is fixed when the chain is built.
///
/// # Examples
///
/// ```
/// use batchline::core::item::{
///     ItemOutcome, ItemProcessor, ItemProcessorResult, ProcessorChainBuilder,
/// };
///
/// struct Trim;
/// impl ItemProcessor<String, String> for Trim {
///     fn process(&self, item: &String) -> ItemProcessorResult<String> {
///         Ok(ItemOutcome::Forward(item.trim().to_string()))
///     }
/// }
///
/// struct DropEmpty;
/// impl ItemProcessor<String, String> for DropEmpty {
///     fn process(&self, item: &String) -> ItemProcessorResult<String> {
///         if item.is_empty() {
///             Ok(ItemOutcome::Filtered)
///         } else {
///             Ok(ItemOutcome::Forward(item.clone()))
///         }
///     }
/// }
///
/// let trim = Trim;
/// let drop_empty = DropEmpty;
/// let chain = ProcessorChainBuilder::new()
///     .stage(&trim)
///     .stage(&drop_empty)
///     .build()
///     .unwrap();
///
/// let outcome = chain.process(&"  hello  ".to_string()).unwrap();
/// assert_eq!(outcome, ItemOutcome::Forward("hello".to_string()));
///
/// let outcome = chain.process(&"   ".to_string()).unwrap();
/// assert_eq!(outcome, ItemOutcome::Filtered);
/// ```
pub struct ProcessorChain<'a, T> {
    stages: Vec<&'a dyn ItemProcessor<T, T>>,
}

impl<T> ItemProcessor<T, T> for ProcessorChain<'_, T> {
    fn process(&self, item: &T) -> ItemProcessorResult<T> {
        let mut stages = self.stages.iter();

        // The chain is never empty, the builder rejects that.
        let first = stages
            .next()
            .ok_or_else(|| BatchError::ItemProcessor("empty processor chain".to_string()))?;

        let mut current = match first.process(item)? {
            ItemOutcome::Forward(next) => next,
            ItemOutcome::Filtered => return Ok(ItemOutcome::Filtered),
        };

        for stage in stages {
            current = match stage.process(&current)? {
                ItemOutcome::Forward(next) => next,
                ItemOutcome::Filtered => return Ok(ItemOutcome::Filtered),
            };
        }

        Ok(ItemOutcome::Forward(current))
    }
}

/// Builder for [`ProcessorChain`]. Stages run in the order they are added.
#[derive(Default)]
pub struct ProcessorChainBuilder<'a, T> {
    stages: Vec<&'a dyn ItemProcessor<T, T>>,
}

impl<'a, T> ProcessorChainBuilder<'a, T> {
    pub fn new() -> ProcessorChainBuilder<'a, T> {
        ProcessorChainBuilder { stages: Vec::new() }
    }

    /// Appends a stage to the end of the chain.
    pub fn stage(mut self, stage: &'a dyn ItemProcessor<T, T>) -> ProcessorChainBuilder<'a, T> {
        self.stages.push(stage);
        self
    }

    /// Builds the chain.
    ///
    /// # Errors
    /// Returns [`BatchError::Configuration`] when no stage was added.
    pub fn build(self) -> Result<ProcessorChain<'a, T>, BatchError> {
        if self.stages.is_empty() {
            return Err(BatchError::Configuration(
                "a processor chain needs at least one stage".to_string(),
            ));
        }
        Ok(ProcessorChain {
            stages: self.stages,
        })
    }
}
