use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Cursor cannot move back from block {current} to {requested}")]
pub struct CursorRegression {
    pub current: u64,
    pub requested: u64,
}

/// Half-open block range `(from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn first_block(&self) -> u64 {
        self.from + 1
    }

    pub fn last_block(&self) -> u64 {
        self.to
    }

    pub fn len(&self) -> u64 {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.to == self.from
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.from, self.to)
    }
}

/// Last block whose requests have been fully handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCursor {
    last_processed: u64,
}

impl BlockCursor {
    pub fn new(last_processed: u64) -> Self {
        Self { last_processed }
    }

    /// Cursor that will process `start_block` next. Block 0 is never
    /// processed: `starting_at(0)` behaves like `starting_at(1)`.
    pub fn starting_at(start_block: u64) -> Self {
        Self::new(start_block.saturating_sub(1))
    }

    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    /// Range to process given the current head, capped to `max_len` blocks.
    pub fn pending_range(&self, head: u64, max_len: Option<u64>) -> Option<BlockRange> {
        if head <= self.last_processed {
            return None;
        }
        let to = match max_len {
            Some(cap) if cap > 0 => head.min(self.last_processed.saturating_add(cap)),
            _ => head,
        };
        Some(BlockRange {
            from: self.last_processed,
            to,
        })
    }

    pub fn advance(&mut self, to: u64) -> Result<(), CursorRegression> {
        if to < self.last_processed {
            return Err(CursorRegression {
                current: self.last_processed,
                requested: to,
            });
        }
        self.last_processed = to;
        Ok(())
    }
}
