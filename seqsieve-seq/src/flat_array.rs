/// Contiguous storage for a list of variable-length groups.
///
/// A data vector plus a `limits` vector: group `g` occupies
/// `limits[g]..limits[g + 1]`. Used to keep all seed hits of one query grouped by
/// target without per-group allocations.
///
/// # Example
/// ```
/// use seqsieve_seq::FlatArray;
/// let mut a: FlatArray<i32> = FlatArray::new();
/// a.next();
/// a.push(1);
/// a.push(2);
/// a.next();
/// a.push(3);
/// assert_eq!(a.groups(), 2);
/// assert_eq!(a.group(0), &[1, 2]);
/// assert_eq!(a.group(1), &[3]);
/// ```
#[derive(Clone)]
pub struct FlatArray<T> {
    data: Vec<T>,
    limits: Vec<usize>,
}

impl<T> FlatArray<T> {
    pub fn new() -> FlatArray<T> {
        FlatArray {
            data: Vec::new(),
            limits: vec![0],
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.limits.clear();
        self.limits.push(0);
    }

    pub fn reserve(&mut self, groups: usize, items: usize) {
        self.limits.reserve(groups);
        self.data.reserve(items);
    }

    /// Opens a new group; subsequent `push` calls append to it.
    pub fn next(&mut self) {
        self.limits.push(self.data.len());
    }

    pub fn push(&mut self, item: T) {
        self.data.push(item);
        *self.limits.last_mut().unwrap() = self.data.len();
    }

    /// Appends a whole group at once.
    pub fn push_group(&mut self, items: &[T])
    where
        T: Clone,
    {
        self.next();
        self.data.extend_from_slice(items);
        *self.limits.last_mut().unwrap() = self.data.len();
    }

    pub fn groups(&self) -> usize {
        self.limits.len() - 1
    }

    pub fn count(&self, group: usize) -> usize {
        self.limits[group + 1] - self.limits[group]
    }

    pub fn group(&self, group: usize) -> &[T] {
        &self.data[self.limits[group]..self.limits[group + 1]]
    }

    pub fn group_mut(&mut self, group: usize) -> &mut [T] {
        &mut self.data[self.limits[group]..self.limits[group + 1]]
    }

    /// Total number of stored items.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

impl<T> Default for FlatArray<T> {
    fn default() -> Self {
        FlatArray::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_groups_are_allowed() {
        let mut a: FlatArray<u8> = FlatArray::new();
        a.next();
        a.next();
        a.push(1);
        assert_eq!(a.groups(), 2);
        assert_eq!(a.count(0), 0);
        assert_eq!(a.group(1), &[1]);
    }
}
