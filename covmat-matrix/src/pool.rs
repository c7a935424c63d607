///
/// Recycles matrix allocations between scheduler batches.
///
/// Each task borrows a `(depth, clip_ends)` pair and the scheduler gives it back once the
/// sink has accepted the record (or the task failed). At most `capacity` idle pairs are
/// kept; anything beyond that is dropped.
///
#[derive(Debug, Default)]
pub struct MatrixPool {
    idle: Vec<(Vec<u32>, Vec<u32>)>,
    capacity: usize,
}

impl MatrixPool {
    pub fn new(capacity: usize) -> Self {
        MatrixPool {
            idle: Vec::with_capacity(capacity),
            capacity,
        }
    }

    ///
    /// Hand out a buffer pair. Contents are unspecified; builders re-zero them.
    ///
    pub fn take(&mut self) -> (Vec<u32>, Vec<u32>) {
        self.idle.pop().unwrap_or_default()
    }

    pub fn reclaim(&mut self, depth: Vec<u32>, clip_ends: Vec<u32>) {
        if self.idle.len() < self.capacity {
            self.idle.push((depth, clip_ends));
        }
    }

    pub fn idle(&self) -> usize {
        self.idle.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn test_take_from_empty_pool() {
        let mut pool = MatrixPool::new(2);
        let (depth, clips) = pool.take();
        assert!(depth.is_empty());
        assert!(clips.is_empty());
    }

    #[rstest]
    fn test_reclaim_reuses_allocation() {
        let mut pool = MatrixPool::new(2);
        let depth = Vec::with_capacity(1000);
        let clips = Vec::with_capacity(1000);

        pool.reclaim(depth, clips);
        let (depth, clips) = pool.take();

        assert!(depth.capacity() >= 1000);
        assert!(clips.capacity() >= 1000);
        assert_eq!(pool.idle(), 0);
    }

    #[rstest]
    fn test_pool_is_bounded() {
        let mut pool = MatrixPool::new(2);
        for _ in 0..5 {
            pool.reclaim(vec![0; 4], vec![0; 4]);
        }
        assert_eq!(pool.idle(), 2);
    }
}
