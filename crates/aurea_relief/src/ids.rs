//! Compilation-scoped identifiers.
//!
//! Ids are dense `u32` newtypes allocated by monotonic per-compilation
//! counters. Equality implies semantic identity *within* one compilation;
//! ids are never stable across compilations of the same template.

use serde::{Deserialize, Serialize};

macro_rules! dense_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline(always)]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            #[inline(always)]
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            #[inline(always)]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

dense_id! {
    /// Identifies one authored expression occurrence.
    ExprId
}
dense_id! {
    /// Identifies one node of the template DOM.
    NodeId
}
dense_id! {
    /// Identifies one scope frame in the bind graph.
    FrameId
}

/// Monotonic id allocator owned by a single compilation.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_expr: u32,
    next_node: u32,
    next_frame: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_expr_id(&mut self) -> ExprId {
        let id = ExprId::new(self.next_expr);
        self.next_expr += 1;
        id
    }

    pub fn next_node_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_node);
        self.next_node += 1;
        id
    }

    pub fn next_frame_id(&mut self) -> FrameId {
        let id = FrameId::new(self.next_frame);
        self.next_frame += 1;
        id
    }

    /// Count of expression ids handed out so far.
    pub fn expr_count(&self) -> u32 {
        self.next_expr
    }

    /// Count of frame ids handed out so far.
    pub fn frame_count(&self) -> u32 {
        self.next_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_distinct() {
        let mut alloc = IdAllocator::new();
        let a = alloc.next_expr_id();
        let b = alloc.next_expr_id();
        assert_ne!(a, b);
        assert_eq!(a.as_u32(), 0);
        assert_eq!(b.as_u32(), 1);
        // Counters are independent per id kind.
        assert_eq!(alloc.next_node_id().as_u32(), 0);
        assert_eq!(alloc.next_frame_id().as_u32(), 0);
    }
}
