//! Component D — the frame stack (spec.md §3 "Frame", §4.E break/continue).
//!
//! Modeled as a sum type over a single ordered sequence, per the Design
//! Notes' "control-construct stack with heterogeneous frame kinds" bullet.
//! Push/pop is RAII-scoped (the "Scoped frame push/pop" Design Notes
//! bullet) so a frame is popped on every exit path, including an early
//! `?`-propagated compile error.

use crate::label::Label;

#[derive(Clone, Debug)]
pub enum Frame {
    Loop {
        start_label: Label,
        else_label: Label,
        end_label: Label,
    },
    TryFinally {
        finally_label: Label,
    },
}

impl Frame {
    pub fn start_label(&self) -> Option<&Label> {
        match self {
            Frame::Loop { start_label, .. } => Some(start_label),
            Frame::TryFinally { .. } => None,
        }
    }

    pub fn end_label(&self) -> Option<&Label> {
        match self {
            Frame::Loop { end_label, .. } => Some(end_label),
            Frame::TryFinally { .. } => None,
        }
    }

    pub fn finally_label(&self) -> Option<&Label> {
        match self {
            Frame::TryFinally { finally_label } => Some(finally_label),
            Frame::Loop { .. } => None,
        }
    }
}

#[derive(Default)]
pub struct FrameStack(Vec<Frame>);

impl FrameStack {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Push a `LoopFrame`. Paired with [`FrameStack::pop`] by
    /// [`crate::lower::Compiler::in_loop`], which guarantees the pop runs
    /// whether the scoped closure returns `Ok` or propagates a
    /// `CompileError` — a closure-scoped stand-in for the RAII guard below,
    /// needed because the scoped closure also needs unrestricted `&mut`
    /// access to the rest of `Compiler` (a live [`FrameGuard`] borrow of
    /// just this field would conflict with that).
    pub fn push_loop(&mut self, start_label: Label, else_label: Label, end_label: Label) {
        self.0.push(Frame::Loop {
            start_label,
            else_label,
            end_label,
        });
    }

    pub fn push_try_finally(&mut self, finally_label: Label) {
        self.0.push(Frame::TryFinally { finally_label });
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    /// Push a `LoopFrame` and return a guard that pops it on drop. Usable
    /// standalone (see this module's tests); lowering itself uses
    /// `push_loop`/`pop` through `Compiler::in_loop` instead, for the
    /// borrow-checker reason documented on `push_loop`.
    pub fn enter_loop(
        &mut self,
        start_label: Label,
        else_label: Label,
        end_label: Label,
    ) -> FrameGuard<'_> {
        self.push_loop(start_label, else_label, end_label);
        FrameGuard { stack: self }
    }

    /// Push a `TryFinallyFrame` and return a guard that pops it on drop.
    pub fn enter_try_finally(&mut self, finally_label: Label) -> FrameGuard<'_> {
        self.push_try_finally(finally_label);
        FrameGuard { stack: self }
    }

    /// Iterate frames from innermost (top) to outermost, as `break`/
    /// `continue` lowering needs to.
    pub fn iter_innermost_first(&self) -> impl Iterator<Item = &Frame> {
        self.0.iter().rev()
    }
}

/// Pops exactly one frame when dropped, guaranteeing the push/pop pair
/// balances on every exit path of the lowering call that created it.
pub struct FrameGuard<'a> {
    stack: &'a mut FrameStack,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.stack.0.pop();
    }
}

/// A guard holds its `FrameStack` borrow exclusively until dropped, so
/// inspecting or further nesting frames while one is live goes through the
/// guard itself rather than the original `&mut FrameStack`.
impl std::ops::Deref for FrameGuard<'_> {
    type Target = FrameStack;
    fn deref(&self) -> &FrameStack {
        self.stack
    }
}

impl std::ops::DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut FrameStack {
        self.stack
    }
}
