//! Allocation-kind classification.
//!
//! Backends need to know, before generating a method body, which
//! allocations live in private memory and which live in group-shared
//! memory: the two are declared in different places of the target module.
//! [`Allocas::collect`] walks a method once and sorts every
//! [`ValueKind::Alloca`] into one of three [`AllocaKind`]s.

use crate::ir::{AllocaLength, Method, Value, ValueId, ValueKind};
use crate::types::{AddressSpace, Type};

/// Storage class of an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocaKind {
    /// Private per-work-item memory.
    Local,
    /// Group-shared memory with a size known at compile time.
    Shared,
    /// Group-shared memory sized at launch time.
    DynamicShared,
}

/// One allocation site.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AllocaInfo {
    /// The alloca value (a pointer to `elem`).
    pub value: ValueId,
    /// Element type.
    pub elem: Type,
    pub len: AllocaLength,
}

impl AllocaInfo {
    /// Number of elements reserved, if fixed at compile time.
    pub fn element_count(&self) -> Option<u32> {
        match self.len {
            AllocaLength::Single => Some(1),
            AllocaLength::Fixed(n) => Some(n),
            AllocaLength::Dynamic => None,
        }
    }

    /// True if the allocation holds more than a single element.
    pub fn is_array(&self) -> bool {
        !matches!(self.len, AllocaLength::Single)
    }
}

/// All allocations of one kind, in stored order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AllocaKindInformation {
    pub allocas: Vec<AllocaInfo>,
}

impl AllocaKindInformation {
    /// Number of allocations.
    pub fn len(&self) -> usize {
        self.allocas.len()
    }

    /// True if there are no allocations of this kind.
    pub fn is_empty(&self) -> bool {
        self.allocas.is_empty()
    }

    /// True if `value` is one of these allocations.
    pub fn contains(&self, value: ValueId) -> bool {
        self.allocas.iter().any(|info| info.value == value)
    }

    /// Iterate over the allocations.
    pub fn iter(&self) -> std::slice::Iter<'_, AllocaInfo> {
        self.allocas.iter()
    }
}

/// Allocations of one method, grouped by kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Allocas {
    pub local: AllocaKindInformation,
    pub shared: AllocaKindInformation,
    pub dynamic_shared: AllocaKindInformation,
}

impl Allocas {
    /// Classify every alloca in `method`.
    ///
    /// The kind follows the address space of the alloca's pointer type:
    /// `Shared` pointers become shared allocations (dynamic when the length
    /// is [`AllocaLength::Dynamic`]); everything else is local. A local
    /// allocation whose pointer is not in [`AddressSpace::Local`] is kept
    /// as is, and backends that cannot place it reject it.
    pub fn collect(method: &Method) -> Self {
        let mut allocas = Allocas::default();
        for value in method.values() {
            let ValueKind::Alloca { elem, len } = &value.kind else {
                continue;
            };
            let info = AllocaInfo {
                value: value.id,
                elem: elem.clone(),
                len: *len,
            };
            match Self::classify(value) {
                AllocaKind::Local => allocas.local.allocas.push(info),
                AllocaKind::Shared => allocas.shared.allocas.push(info),
                AllocaKind::DynamicShared => allocas.dynamic_shared.allocas.push(info),
            }
        }
        tracing::trace!(
            method = %method.name,
            local = allocas.local.len(),
            shared = allocas.shared.len(),
            dynamic_shared = allocas.dynamic_shared.len(),
            "classified allocas"
        );
        allocas
    }

    /// Kind of the allocation `value` belongs to, if it is one.
    pub fn kind_of(&self, value: ValueId) -> Option<AllocaKind> {
        if self.local.contains(value) {
            Some(AllocaKind::Local)
        } else if self.shared.contains(value) {
            Some(AllocaKind::Shared)
        } else if self.dynamic_shared.contains(value) {
            Some(AllocaKind::DynamicShared)
        } else {
            None
        }
    }

    /// Total number of allocations.
    pub fn len(&self) -> usize {
        self.local.len() + self.shared.len() + self.dynamic_shared.len()
    }

    /// True if the method allocates nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn classify(value: &Value) -> AllocaKind {
        let shared = value.ty.address_space() == Some(AddressSpace::Shared);
        match value.kind {
            ValueKind::Alloca {
                len: AllocaLength::Dynamic,
                ..
            } if shared => AllocaKind::DynamicShared,
            _ if shared => AllocaKind::Shared,
            _ => AllocaKind::Local,
        }
    }
}
