/// Fixed batch size shared by the bulk pipelines.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Page-size hint for server-side scrolling cursors.
pub const SCROLL_PAGE_SIZE: usize = 1_000;

/// Fixed-capacity staging buffer for bulk writes.
///
/// `push` hands back the pending batch the moment the capacity-th item is
/// staged, so callers flush before staging anything further and no batch
/// ever exceeds the configured size. Only the pending batch is held in
/// memory; the full result set never is.
pub struct Batcher<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> Batcher<T> {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    /// Stage one item. Returns the full batch to flush when the buffer
    /// reaches capacity, `None` otherwise.
    #[must_use = "a returned batch must be flushed"]
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.items.push(item);
        if self.items.len() == self.capacity {
            Some(std::mem::replace(
                &mut self.items,
                Vec::with_capacity(self.capacity),
            ))
        } else {
            None
        }
    }

    /// Drain the partial batch left at end of stream.
    #[must_use = "a returned batch must be flushed"]
    pub fn take_remaining(&mut self) -> Option<Vec<T>> {
        if self.items.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.items))
        }
    }

    pub fn pending(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_returns_batch_exactly_at_capacity() {
        let mut batcher = Batcher::new(3);
        assert!(batcher.push(1).is_none());
        assert!(batcher.push(2).is_none());

        let batch = batcher.push(3).expect("third item fills the batch");
        assert_eq!(batch, vec![1, 2, 3]);
        assert_eq!(batcher.pending(), 0);

        // The next item starts a fresh batch rather than growing the old one.
        assert!(batcher.push(4).is_none());
        assert_eq!(batcher.pending(), 1);
    }

    #[test]
    fn no_batch_ever_exceeds_capacity() {
        let mut batcher = Batcher::new(5);
        for i in 0..23 {
            if let Some(batch) = batcher.push(i) {
                assert_eq!(batch.len(), 5);
            }
        }
        assert_eq!(batcher.take_remaining().unwrap().len(), 3);
    }

    #[test]
    fn take_remaining_on_empty_buffer_is_none() {
        let mut batcher: Batcher<i32> = Batcher::new(2);
        assert!(batcher.take_remaining().is_none());

        let _ = batcher.push(1);
        assert_eq!(batcher.take_remaining(), Some(vec![1]));
        assert!(batcher.take_remaining().is_none());
    }
}
