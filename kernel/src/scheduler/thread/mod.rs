//! Thread module

pub mod registry;
pub mod stack;
pub mod state;
pub mod thread;

pub use registry::ThreadRegistry;
pub use stack::{PageStackAllocator, StackAllocator, ThreadStack, PAGE_SIZE};
pub use state::{QueueLocation, ThreadState};
pub use thread::{
    Thread, ThreadEntry, ThreadFunc, ThreadId, NICE_DEFAULT, NICE_MAX, NICE_MIN, PRI_COUNT,
    PRI_DEFAULT, PRI_MAX, PRI_MIN, THREAD_MAGIC,
};
