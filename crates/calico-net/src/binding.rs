//! Variable bindings for transition firing.

use crate::ids::{Color, VariableId};

/// A total assignment of colors to the net's binding variables.
///
/// Stored dense: one slot per declared variable, reused across binding
/// enumeration so firing never allocates per binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    values: Vec<Color>,
}

impl Binding {
    pub fn new(variable_count: usize) -> Self {
        Self {
            values: vec![0; variable_count],
        }
    }

    #[inline]
    pub fn get(&self, var: VariableId) -> Color {
        self.values[var as usize]
    }

    #[inline]
    pub fn set(&mut self, var: VariableId, color: Color) {
        self.values[var as usize] = color;
    }

    /// Reset every slot to color `0`.
    pub fn clear(&mut self) {
        self.values.fill(0);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
