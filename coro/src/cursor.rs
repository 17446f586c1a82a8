use std::iter::FusedIterator;

use crate::Generator;

/// One `next` is exactly one step; iteration stops at completion.
impl<T, R> Iterator for Generator<'_, T, R> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.step().produced()
    }
}

impl<T, R> FusedIterator for Generator<'_, T, R> {}

/// "has more / current / advance" view over a generator.
///
/// The cursor does not step on construction. The first call to any of its
/// methods performs the first step; after that only [`advance`](Cursor::advance)
/// steps, once per call.
pub struct Cursor<'g, 'a, T, R> {
    generator: &'g mut Generator<'a, T, R>,
    current: Option<T>,
    primed: bool,
}

impl<'g, 'a, T, R> Cursor<'g, 'a, T, R> {
    pub(crate) fn new(generator: &'g mut Generator<'a, T, R>) -> Self {
        Self {
            generator,
            current: None,
            primed: false,
        }
    }

    pub fn has_more(&mut self) -> bool {
        self.prime();
        self.current.is_some()
    }

    pub fn current(&mut self) -> Option<&T> {
        self.prime();
        self.current.as_ref()
    }

    pub fn advance(&mut self) {
        if !self.prime() {
            self.current = self.generator.step().produced();
        }
    }

    /// Takes the current value out, leaving the cursor where it is.
    pub fn take_current(&mut self) -> Option<T> {
        self.prime();
        self.current.take()
    }

    fn prime(&mut self) -> bool {
        if self.primed {
            return false;
        }
        self.primed = true;
        self.current = self.generator.step().produced();
        true
    }
}
