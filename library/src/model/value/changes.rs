use std::ops::{BitOr, BitOrAssign};

/// Change bits recorded on a value node until the next explicit sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChangeFlags(u8);

impl ChangeFlags {
    pub const NONE: ChangeFlags = ChangeFlags(0);
    /// A scalar somewhere below changed.
    pub const VALUE: ChangeFlags = ChangeFlags(1);
    /// An array was resized or an optional field toggled.
    pub const STRUCTURE: ChangeFlags = ChangeFlags(2);
    pub const ALL: ChangeFlags = ChangeFlags(3);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn intersects(self, other: ChangeFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, other: ChangeFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ChangeFlags {
    type Output = ChangeFlags;

    fn bitor(self, rhs: ChangeFlags) -> ChangeFlags {
        ChangeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeFlags {
    fn bitor_assign(&mut self, rhs: ChangeFlags) {
        self.0 |= rhs.0;
    }
}
