//! Kernel entry-point descriptors.

use crate::ir::MethodId;

/// Dimensionality of a kernel launch grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexDimension {
    One,
    Two,
    Three,
}

impl IndexDimension {
    /// Number of dimensions.
    pub fn count(self) -> u8 {
        match self {
            IndexDimension::One => 1,
            IndexDimension::Two => 2,
            IndexDimension::Three => 3,
        }
    }
}

/// The method a module is launched through.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryPoint {
    /// The kernel method.
    pub method: MethodId,
    /// Exported kernel name.
    pub name: String,
    pub dimension: IndexDimension,
    /// Fixed work-group size, if the kernel requires one.
    pub local_size: Option<[u32; 3]>,
}

impl EntryPoint {
    /// Entry point with no fixed work-group size.
    pub fn new(method: MethodId, name: impl Into<String>, dimension: IndexDimension) -> Self {
        Self {
            method,
            name: name.into(),
            dimension,
            local_size: None,
        }
    }

    /// Require a fixed work-group size.
    #[must_use]
    pub fn with_local_size(mut self, size: [u32; 3]) -> Self {
        self.local_size = Some(size);
        self
    }
}
