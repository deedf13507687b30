//! Run counter for rows handed to the sink.

/// Rows successfully yielded during one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCount(usize);

impl RunCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self) {
        self.0 += 1;
    }

    pub fn get(&self) -> usize {
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
