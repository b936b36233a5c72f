//! The player's own field of balloons, each carrying one word.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopResult {
    /// The word matched a balloon; `cleared` is set when it was the last one
    Popped { cleared: bool },
    Miss,
}

#[derive(Debug, Clone, Default)]
pub struct WordField {
    remaining: Vec<String>,
    popped: usize,
}

impl WordField {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let remaining = words
            .into_iter()
            .map(|word| {
                let word: String = word.into();
                word.trim().to_string()
            })
            .filter(|word| !word.is_empty())
            .collect();
        Self {
            remaining,
            popped: 0,
        }
    }

    /// Pops the first balloon whose word equals `typed` after trimming.
    /// Duplicated words need one submission each.
    pub fn try_pop(&mut self, typed: &str) -> PopResult {
        let typed = typed.trim();
        if typed.is_empty() {
            return PopResult::Miss;
        }

        match self.remaining.iter().position(|word| word == typed) {
            Some(index) => {
                self.remaining.remove(index);
                self.popped += 1;
                PopResult::Popped {
                    cleared: self.remaining.is_empty(),
                }
            }
            None => PopResult::Miss,
        }
    }

    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    pub fn popped(&self) -> usize {
        self.popped
    }

    pub fn is_cleared(&self) -> bool {
        self.remaining.is_empty()
    }
}
