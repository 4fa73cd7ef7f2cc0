//! # Transform Stack
//!
//! A model-view matrix with a stack of saved copies, in the style of fixed-function GL.
//!
//! ## Usage
//!
//! Prefer [`TransformStack::scope`] over calling [`TransformStack::push`] and
//! [`TransformStack::pop`] by hand. The returned [`TransformScope`] saves the current matrix
//! when it is created and restores it when it is dropped, so every exit path of the code
//! that mutates the matrix leaves the stack as it found it:
//!
//! ```
//! use gles_harness::transform::{TransformOp, TransformStack};
//!
//! let mut stack = TransformStack::new();
//! {
//!     let mut scope = stack.scope();
//!     scope.mutate_current(TransformOp::translate(0.0, 0.0, -8.0));
//!     assert_eq!(scope.depth(), 1);
//! }
//! assert_eq!(stack.depth(), 0);
//! assert_eq!(*stack.current(), nalgebra_glm::Mat4::identity());
//! ```

use std::ops::{Deref, DerefMut};

use crate::error::StackUnderflowError;

/// An in-place edit of the current matrix.
///
/// Each operation post-multiplies, so it acts in the local frame left by the previous ones.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransformOp {
    Translate(nalgebra_glm::Vec3),
    /// Rotation by an angle in degrees about an axis.
    Rotate {
        degrees: f32,
        axis: nalgebra_glm::Vec3,
    },
    Scale(nalgebra_glm::Vec3),
}

impl TransformOp {
    pub fn translate(x: f32, y: f32, z: f32) -> Self {
        TransformOp::Translate(nalgebra_glm::vec3(x, y, z))
    }

    pub fn rotate_degrees(degrees: f32, axis: nalgebra_glm::Vec3) -> Self {
        TransformOp::Rotate { degrees, axis }
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        TransformOp::Scale(nalgebra_glm::vec3(x, y, z))
    }

    fn apply(self, matrix: &nalgebra_glm::Mat4) -> nalgebra_glm::Mat4 {
        match self {
            TransformOp::Translate(offset) => nalgebra_glm::translate(matrix, &offset),
            TransformOp::Rotate { degrees, axis } => {
                nalgebra_glm::rotate(matrix, degrees.to_radians(), &axis)
            }
            TransformOp::Scale(factors) => nalgebra_glm::scale(matrix, &factors),
        }
    }
}

/// The current model-view matrix plus the matrices saved by `push`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformStack {
    current: nalgebra_glm::Mat4,
    saved: Vec<nalgebra_glm::Mat4>,
    /// Saved entries owned by open scopes; `pop` never goes below it.
    floor: usize,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformStack {
    /// An empty stack whose current matrix is the identity.
    pub fn new() -> Self {
        Self {
            current: nalgebra_glm::Mat4::identity(),
            saved: Vec::new(),
            floor: 0,
        }
    }

    pub fn current(&self) -> &nalgebra_glm::Mat4 {
        &self.current
    }

    /// The current matrix in column-major order, ready for a uniform upload.
    pub fn current_columns(&self) -> [f32; 16] {
        let mut columns = [0.0; 16];
        columns.copy_from_slice(self.current.as_slice());
        columns
    }

    /// Number of saved matrices.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Saves a copy of the current matrix. The current matrix is unchanged.
    pub fn push(&mut self) {
        self.saved.push(self.current);
    }

    /// Restores the most recently saved matrix.
    ///
    /// # Errors
    ///
    /// [`StackUnderflowError`] when nothing is saved, or when the only saved matrices belong
    /// to an open [`TransformScope`]. The current matrix is left as is.
    pub fn pop(&mut self) -> Result<(), StackUnderflowError> {
        if self.saved.len() <= self.floor {
            return Err(StackUnderflowError);
        }
        let restored = self.saved.pop().ok_or(StackUnderflowError)?;
        self.current = restored;
        Ok(())
    }

    /// Replaces the current matrix with the identity.
    pub fn load_identity(&mut self) {
        self.current = nalgebra_glm::Mat4::identity();
    }

    pub fn mutate_current(&mut self, op: TransformOp) {
        self.current = op.apply(&self.current);
    }

    /// Pushes now and pops when the returned guard is dropped.
    pub fn scope(&mut self) -> TransformScope<'_> {
        let depth = self.saved.len();
        let floor = self.floor;
        let entry = self.current;
        self.push();
        self.floor = self.saved.len();
        TransformScope {
            stack: self,
            depth,
            floor,
            entry,
        }
    }
}

/// Guard returned by [`TransformStack::scope`].
///
/// Dereferences to the stack, so scopes nest. On drop the stack returns to the depth and
/// current matrix it had before the scope was opened, even if pushes inside the scope
/// were left unbalanced. While it is open, `pop` cannot reach the matrices saved before it.
#[derive(Debug)]
pub struct TransformScope<'a> {
    stack: &'a mut TransformStack,
    depth: usize,
    floor: usize,
    entry: nalgebra_glm::Mat4,
}

impl Deref for TransformScope<'_> {
    type Target = TransformStack;

    fn deref(&self) -> &TransformStack {
        self.stack
    }
}

impl DerefMut for TransformScope<'_> {
    fn deref_mut(&mut self) -> &mut TransformStack {
        self.stack
    }
}

impl Drop for TransformScope<'_> {
    fn drop(&mut self) {
        self.stack.saved.truncate(self.depth);
        self.stack.current = self.entry;
        self.stack.floor = self.floor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spun() -> TransformStack {
        let mut stack = TransformStack::new();
        stack.mutate_current(TransformOp::translate(1.0, 2.0, 3.0));
        stack.mutate_current(TransformOp::rotate_degrees(33.0, nalgebra_glm::Vec3::y()));
        stack
    }

    #[test]
    fn pop_restores_bit_identical_matrix() {
        let mut stack = spun();
        let before = *stack.current();

        stack.push();
        stack.mutate_current(TransformOp::scale(2.0, 2.0, 2.0));
        stack.push();
        stack.mutate_current(TransformOp::translate(0.0, 0.0, -8.0));
        assert_eq!(stack.depth(), 2);

        stack.pop().unwrap();
        stack.pop().unwrap();
        assert_eq!(stack.depth(), 0);
        assert_eq!(*stack.current(), before);
    }

    #[test]
    fn depth_is_pushes_minus_pops() {
        let mut stack = TransformStack::new();
        for _ in 0..5 {
            stack.push();
        }
        for _ in 0..3 {
            stack.pop().unwrap();
        }
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn underflow_leaves_current_untouched() {
        let mut stack = spun();
        let before = *stack.current();

        assert_eq!(stack.pop(), Err(StackUnderflowError));
        assert_eq!(*stack.current(), before);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn rotation_is_in_degrees() {
        let mut stack = TransformStack::new();
        stack.mutate_current(TransformOp::rotate_degrees(90.0, nalgebra_glm::Vec3::y()));
        let x_axis = stack.current() * nalgebra_glm::vec4(1.0, 0.0, 0.0, 0.0);
        assert!((x_axis.z + 1.0).abs() < 1e-6);
        assert!(x_axis.x.abs() < 1e-6);
    }

    #[test]
    fn scope_restores_on_early_return() {
        fn draw_child(stack: &mut TransformStack, bail: bool) -> Option<()> {
            let mut scope = stack.scope();
            scope.mutate_current(TransformOp::translate(5.0, 0.0, 0.0));
            scope.push();
            if bail {
                return None;
            }
            scope.pop().ok()
        }

        let mut stack = spun();
        let before = *stack.current();
        assert!(draw_child(&mut stack, true).is_none());
        assert_eq!(stack.depth(), 0);
        assert_eq!(*stack.current(), before);

        assert!(draw_child(&mut stack, false).is_some());
        assert_eq!(*stack.current(), before);
    }

    #[test]
    fn pop_inside_scope_cannot_unwind_parent() {
        let mut stack = TransformStack::new();
        stack.push();
        stack.mutate_current(TransformOp::translate(1.0, 0.0, 0.0));
        let before = *stack.current();
        {
            let mut scope = stack.scope();
            assert_eq!(scope.pop(), Err(StackUnderflowError));
            scope.mutate_current(TransformOp::scale(3.0, 3.0, 3.0));
            scope.push();
            scope.pop().unwrap();
            assert_eq!(scope.pop(), Err(StackUnderflowError));
        }
        assert_eq!(stack.depth(), 1);
        assert_eq!(*stack.current(), before);

        stack.pop().unwrap();
        assert_eq!(*stack.current(), nalgebra_glm::Mat4::identity());
    }

    #[test]
    fn scopes_nest() {
        let mut stack = TransformStack::new();
        let mut outer = stack.scope();
        outer.mutate_current(TransformOp::translate(0.0, 0.0, -8.0));
        let parent = *outer.current();
        {
            let mut inner = outer.scope();
            inner.mutate_current(TransformOp::scale(0.5, 0.5, 0.5));
            assert_eq!(inner.depth(), 2);
        }
        assert_eq!(outer.depth(), 1);
        assert_eq!(*outer.current(), parent);
        assert_eq!(outer.pop(), Err(StackUnderflowError));
        drop(outer);
        assert_eq!(*stack.current(), nalgebra_glm::Mat4::identity());
        assert_eq!(stack.pop(), Err(StackUnderflowError));
    }

    #[test]
    fn columns_are_column_major() {
        let mut stack = TransformStack::new();
        stack.mutate_current(TransformOp::translate(1.0, 2.0, 3.0));
        let columns = stack.current_columns();
        assert_eq!(&columns[12..15], &[1.0, 2.0, 3.0]);
    }
}
