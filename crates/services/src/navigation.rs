/// Bounds-checked position within an ordered list of questions.
///
/// Out-of-range moves are ignored rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    len: usize,
}

impl Cursor {
    /// Cursor over `len` items starting at `start`, or at 0 if `start` is out of range.
    #[must_use]
    pub fn new(len: usize, start: usize) -> Self {
        let index = if start < len { start } else { 0 };
        Self { index, len }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.len
    }

    /// Move to `target`; returns `false` and stays put when out of range.
    pub fn go_to(&mut self, target: isize) -> bool {
        match usize::try_from(target) {
            Ok(target) if target < self.len => {
                self.index = target;
                true
            }
            _ => false,
        }
    }

    pub fn next(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn previous(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.index -= 1;
        true
    }
}
