//! Stable identifier wrappers for scope, block, and instruction indices.

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            /// Creates an identifier from a raw value.
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            /// Returns the raw identifier value.
            pub const fn value(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// 1-based declaration-order index of a variable binding.
    ///
    /// Index 0 is reserved for "no variable"; live declarations start at 1.
    VarIndex
);

define_id!(
    /// 0-based index of a basic block within its control-flow graph.
    BlockId
);

define_id!(
    /// 0-based index of a value-producing block member (argument or
    /// instruction) within its control-flow graph, assigned in emission
    /// order.
    InstrId
);
