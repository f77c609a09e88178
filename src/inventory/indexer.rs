/// Implemented assembly members in ordinal order.
///
/// Ordering is plain byte-wise ascending order of the backend paths; a
/// member's position is its public id. Nothing is remembered between
/// requests, so the list must be rebuilt from the current graph every time
/// an id is produced or consumed. Adding or removing a member shifts the ids
/// of everything sorted after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedMembers(Vec<String>);

impl OrderedMembers {
    pub fn new(members: impl IntoIterator<Item = String>) -> Self {
        let mut members: Vec<String> = members.into_iter().collect();
        members.sort();
        members.dedup();
        Self(members)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn position(&self, path: &str) -> Option<usize> {
        self.0.binary_search_by(|p| p.as_str().cmp(path)).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().map(String::as_str).enumerate()
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }
}
