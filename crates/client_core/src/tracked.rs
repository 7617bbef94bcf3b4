/// A record together with the snapshot last seen on the server. Update
/// payloads are the fields that differ between the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracked<T> {
    original: Option<T>,
    current: T,
}

impl<T: Clone + PartialEq> Tracked<T> {
    /// A record that does not exist on the server yet.
    pub fn new(value: T) -> Self {
        Self {
            original: None,
            current: value,
        }
    }

    pub fn from_server(value: T) -> Self {
        Self {
            original: Some(value.clone()),
            current: value,
        }
    }

    pub fn get(&self) -> &T {
        &self.current
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.current
    }

    pub fn original(&self) -> Option<&T> {
        self.original.as_ref()
    }

    pub fn has_changes(&self) -> bool {
        self.original.as_ref() != Some(&self.current)
    }

    /// The current value of a field if it differs from the snapshot. Every
    /// field counts as changed while the record is not persisted.
    pub fn changed<F>(&self, field: impl Fn(&T) -> &F) -> Option<&F>
    where
        F: PartialEq + ?Sized,
    {
        match &self.original {
            Some(original) if field(original) == field(&self.current) => None,
            _ => Some(field(&self.current)),
        }
    }
}

#[cfg(test)]
#[path = "tests/tracked_tests.rs"]
mod tests;
