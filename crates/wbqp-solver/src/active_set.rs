/// Inequality rows and variable bounds currently treated as equalities.
///
/// Indices are kept in insertion order, which fixes the row order of the
/// promoted equality system. A variable is never active at both its lower and
/// upper bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSet {
    inequalities: Vec<usize>,
    lower_bounds: Vec<usize>,
    upper_bounds: Vec<usize>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.inequalities.clear();
        self.lower_bounds.clear();
        self.upper_bounds.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of promoted rows
    pub fn len(&self) -> usize {
        self.inequalities.len() + self.lower_bounds.len() + self.upper_bounds.len()
    }

    pub fn inequality_indices(&self) -> &[usize] {
        &self.inequalities
    }

    pub fn lower_bound_indices(&self) -> &[usize] {
        &self.lower_bounds
    }

    pub fn upper_bound_indices(&self) -> &[usize] {
        &self.upper_bounds
    }

    pub fn contains_inequality(&self, row: usize) -> bool {
        self.inequalities.contains(&row)
    }

    pub fn contains_lower_bound(&self, variable: usize) -> bool {
        self.lower_bounds.contains(&variable)
    }

    pub fn contains_upper_bound(&self, variable: usize) -> bool {
        self.upper_bounds.contains(&variable)
    }

    /// Returns false if the row was already active
    pub fn add_inequality(&mut self, row: usize) -> bool {
        if self.contains_inequality(row) {
            return false;
        }
        self.inequalities.push(row);
        true
    }

    /// Returns false if the variable is already active at either bound
    pub fn add_lower_bound(&mut self, variable: usize) -> bool {
        if self.contains_lower_bound(variable) || self.contains_upper_bound(variable) {
            return false;
        }
        self.lower_bounds.push(variable);
        true
    }

    /// Returns false if the variable is already active at either bound
    pub fn add_upper_bound(&mut self, variable: usize) -> bool {
        if self.contains_upper_bound(variable) || self.contains_lower_bound(variable) {
            return false;
        }
        self.upper_bounds.push(variable);
        true
    }

    pub fn remove_inequality(&mut self, row: usize) {
        self.inequalities.retain(|&i| i != row);
    }

    pub fn remove_lower_bound(&mut self, variable: usize) {
        self.lower_bounds.retain(|&i| i != variable);
    }

    pub fn remove_upper_bound(&mut self, variable: usize) {
        self.upper_bounds.retain(|&i| i != variable);
    }

    pub fn retain_lower_bounds(&mut self, mut keep: impl FnMut(usize) -> bool) {
        self.lower_bounds.retain(|&i| keep(i));
    }

    pub fn retain_upper_bounds(&mut self, mut keep: impl FnMut(usize) -> bool) {
        self.upper_bounds.retain(|&i| keep(i));
    }
}
