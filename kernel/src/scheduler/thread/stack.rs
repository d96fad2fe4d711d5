//! Stack - Thread stack allocation
//!
//! Every thread except the initial one runs on a page obtained from a
//! [`StackAllocator`]. The page goes back to the allocator once the thread
//! has died and been switched away from.

use alloc::boxed::Box;
use alloc::vec;

/// Kernel stack size (one page)
pub const PAGE_SIZE: usize = 4096;

/// Thread stack
pub struct ThreadStack {
    /// Backing memory
    memory: Box<[u8]>,
}

impl ThreadStack {
    /// Allocate a zeroed stack of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            memory: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Get stack base address (lowest address)
    pub fn base(&self) -> usize {
        self.memory.as_ptr() as usize
    }

    /// Get stack top address (initial stack pointer)
    pub fn top(&self) -> usize {
        self.base() + self.memory.len()
    }

    /// Get stack size
    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Check if address is within stack
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base() && addr < self.top()
    }
}

impl core::fmt::Debug for ThreadStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadStack")
            .field("base", &format_args!("{:#x}", self.base()))
            .field("size", &self.size())
            .finish()
    }
}

/// Page/stack allocator collaborator
pub trait StackAllocator {
    /// Allocate one stack page, `None` when memory is exhausted
    fn allocate(&mut self) -> Option<ThreadStack>;

    /// Return a stack page
    fn free(&mut self, stack: ThreadStack);
}

/// Heap-backed allocator handing out at most `capacity` pages at a time
#[derive(Debug)]
pub struct PageStackAllocator {
    capacity: usize,
    in_use: usize,
}

impl PageStackAllocator {
    pub const fn new(capacity: usize) -> Self {
        Self { capacity, in_use: 0 }
    }

    /// Pages currently handed out
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Pages still available
    pub fn available(&self) -> usize {
        self.capacity - self.in_use
    }
}

impl StackAllocator for PageStackAllocator {
    fn allocate(&mut self) -> Option<ThreadStack> {
        if self.in_use >= self.capacity {
            return None;
        }
        self.in_use += 1;
        Some(ThreadStack::new(PAGE_SIZE))
    }

    fn free(&mut self, stack: ThreadStack) {
        debug_assert!(self.in_use > 0, "stack freed twice");
        self.in_use = self.in_use.saturating_sub(1);
        drop(stack);
    }
}
