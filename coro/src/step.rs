/// Outcome of a single [`Generator::step`](crate::Generator::step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step<T> {
    /// The routine suspended at a produce point with this value.
    Produced(T),
    /// The routine ran off the end of its body. Terminal.
    Completed,
}

impl<T> Step<T> {
    #[inline]
    pub const fn is_produced(&self) -> bool {
        matches!(self, Step::Produced(_))
    }

    #[inline]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Step::Completed)
    }

    /// Converts into `Option<T>`, `None` meaning completion.
    #[inline]
    pub fn produced(self) -> Option<T> {
        match self {
            Step::Produced(value) => Some(value),
            Step::Completed => None,
        }
    }

    #[inline]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Step<U> {
        match self {
            Step::Produced(value) => Step::Produced(f(value)),
            Step::Completed => Step::Completed,
        }
    }
}

impl<T> From<Option<T>> for Step<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Step::Produced(value),
            None => Step::Completed,
        }
    }
}
