#![allow(dead_code)]

pub mod mocks;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use batchline::{
    core::item::{
        ItemOutcome, ItemProcessor, ItemProcessorResult, ItemReader, ItemReaderResult, ItemWriter,
    },
    error::BatchError,
};

/// User record shared by the pipeline tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub active: bool,
}

impl User {
    pub fn new(id: u64, name: &str, email: &str, active: bool) -> User {
        User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            active,
        }
    }
}

/// Rejects users whose email has no '@'.
#[derive(Default)]
pub struct EmailValidationProcessor;

impl ItemProcessor<User, User> for EmailValidationProcessor {
    fn process(&self, item: &User) -> ItemProcessorResult<User> {
        if !item.email.contains('@') {
            return Err(BatchError::Validation(format!(
                "invalid email: {}",
                item.email
            )));
        }
        Ok(ItemOutcome::Forward(item.clone()))
    }
}

/// Upper-cases and trims the user name.
#[derive(Default)]
pub struct NameTransformProcessor;

impl ItemProcessor<User, User> for NameTransformProcessor {
    fn process(&self, item: &User) -> ItemProcessorResult<User> {
        let mut user = item.clone();
        user.name = user.name.trim().to_uppercase();
        Ok(ItemOutcome::Forward(user))
    }
}

/// Filters out inactive users.
#[derive(Default)]
pub struct ActiveUserFilterProcessor;

impl ItemProcessor<User, User> for ActiveUserFilterProcessor {
    fn process(&self, item: &User) -> ItemProcessorResult<User> {
        if item.active {
            Ok(ItemOutcome::Forward(item.clone()))
        } else {
            Ok(ItemOutcome::Filtered)
        }
    }
}

/// In-memory reader serving a fixed list of items.
pub struct VecItemReader<T> {
    items: Mutex<std::vec::IntoIter<T>>,
}

impl<T> VecItemReader<T> {
    pub fn new(items: Vec<T>) -> VecItemReader<T> {
        VecItemReader {
            items: Mutex::new(items.into_iter()),
        }
    }
}

impl<T: Send> ItemReader<T> for VecItemReader<T> {
    fn read(&self) -> ItemReaderResult<T> {
        Ok(self.items.lock().unwrap().next())
    }
}

/// In-memory writer collecting committed chunks.
#[derive(Default)]
pub struct MemoryWriter<T> {
    chunks: Mutex<Vec<Vec<T>>>,
}

impl<T> MemoryWriter<T> {
    pub fn new() -> MemoryWriter<T> {
        MemoryWriter {
            chunks: Mutex::new(Vec::new()),
        }
    }

    pub fn chunks(&self) -> Vec<Vec<T>>
    where
        T: Clone,
    {
        self.chunks.lock().unwrap().clone()
    }

    pub fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.chunks().into_iter().flatten().collect()
    }
}

impl<T: Clone + Send> ItemWriter<T> for MemoryWriter<T> {
    fn write(&self, items: &[T]) -> Result<(), BatchError> {
        self.chunks.lock().unwrap().push(items.to_vec());
        Ok(())
    }
}
