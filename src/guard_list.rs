use std::ops::Deref;

/// Owns a list of guards and drops them last-to-first, so a set of objects
/// built in a loop is released in the reverse order it was created in. A
/// plain `Vec` would drop front-to-back.
pub struct GuardList<T> {
    guards: Vec<T>,
}

impl<T> GuardList<T> {
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl<T> FromIterator<T> for GuardList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            guards: iter.into_iter().collect(),
        }
    }
}

impl<T> Deref for GuardList<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.guards
    }
}

impl<T> Drop for GuardList<T> {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}
