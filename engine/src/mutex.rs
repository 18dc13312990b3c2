use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-object lock shared by every node of the recall graph.
///
/// Guards are meant to be short lived: read or update the fields of one
/// object, then drop the guard before touching another object.
#[derive(Debug, Default)]
pub struct ObjectMutex<T> {
    data: Mutex<T>,
}

impl<T> ObjectMutex<T> {
    pub fn new(data: T) -> Self {
        ObjectMutex {
            data: Mutex::new(data),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        // A panic while holding a guard leaves plain data behind, never a
        // half-applied invariant the graph relies on.
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
