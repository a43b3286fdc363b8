//! Last-known device state for a single attribute.
//!
//! `CachedState<T>` is a value-compare-and-swap cell. It does not publish events
//! itself: [`CachedState::set`] reports whether the effective value changed and the
//! owner decides how to notify. "Unknown" is a first-class state (`None`) and
//! compares like any other value, so going from unknown to a value is a change
//! and setting the same value twice is not.

/// Optional last-observed value plus the value it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedState<T> {
    current: Option<T>,
    previous: Option<T>,
}

impl<T> Default for CachedState<T> {
    fn default() -> Self {
        Self::unknown()
    }
}

impl<T> CachedState<T> {
    /// Cache with no observed value.
    pub const fn unknown() -> Self {
        Self {
            current: None,
            previous: None,
        }
    }
}

impl<T: Clone + PartialEq> CachedState<T> {
    /// Cache already holding `value`.
    pub fn known(value: T) -> Self {
        Self {
            current: Some(value),
            previous: None,
        }
    }

    /// Current value, `None` while unknown.
    pub fn get(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// The value held before the most recent change.
    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }

    /// True once a value has been observed or assumed.
    pub fn is_known(&self) -> bool {
        self.current.is_some()
    }

    /// Current value, or `default` while unknown.
    pub fn value_or(&self, default: T) -> T {
        self.current.clone().unwrap_or(default)
    }

    /// Store `value`. Returns `true` if the effective value changed.
    pub fn set(&mut self, value: T) -> bool {
        self.replace(Some(value))
    }

    /// Forget the current value. Returns `true` if a value was known.
    pub fn invalidate(&mut self) -> bool {
        self.replace(None)
    }

    /// Store `next` (possibly unknown). Returns `true` if it differs from the
    /// current state; an equal value leaves both current and previous untouched.
    pub fn replace(&mut self, next: Option<T>) -> bool {
        if self.current == next {
            return false;
        }
        self.previous = std::mem::replace(&mut self.current, next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_to_known_is_a_change() {
        let mut state = CachedState::unknown();
        assert!(!state.is_known());
        assert!(state.set(5u32));
        assert_eq!(state.get(), Some(&5));
        assert_eq!(state.previous(), None);
    }

    #[test]
    fn test_same_value_is_a_no_op() {
        let mut state = CachedState::known(true);
        let before = state.clone();
        assert!(!state.set(true));
        assert_eq!(state, before);
    }

    #[test]
    fn test_change_records_previous() {
        let mut state = CachedState::known(1.5f64);
        assert!(state.set(2.5));
        assert_eq!(state.get(), Some(&2.5));
        assert_eq!(state.previous(), Some(&1.5));
    }

    #[test]
    fn test_invalidate() {
        let mut state = CachedState::known("NORM".to_string());
        assert!(state.invalidate());
        assert!(!state.invalidate());
        assert_eq!(state.value_or("ZERO".into()), "ZERO");
        assert_eq!(state.previous().map(String::as_str), Some("NORM"));
    }

    #[test]
    fn test_default_needs_no_bounds() {
        #[derive(Debug)]
        struct Handle;

        let state = CachedState::<Handle>::default();
        assert!(state.current.is_none());
        assert!(state.previous.is_none());
    }
}
