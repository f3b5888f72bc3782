//! Identifier allocation.
//!
//! SPIR-V names every result with a module-unique `<id>`. IDs are handed
//! out by one module-wide [`IdCounter`]. Each method generator reserves a
//! contiguous [`IdRange`] up front, so generators running on different
//! threads never touch the counter while emitting a body, and their IDs
//! are disjoint by construction.
//!
//! [`IdAllocator`] maps IR entities (values and blocks of one method) to
//! IDs taken from its range. It is owned by one generator and dropped with
//! it.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use ori_gpu::{BlockId, Method, ValueId};
use rustc_hash::FxHashMap;

use crate::error::{CodegenError, CodegenResult};
use crate::spirv::MAX_ID_BOUND;

// ── SpirvId ─────────────────────────────────────────────────────────

/// A SPIR-V result `<id>`. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SpirvId(u32);

impl SpirvId {
    /// The raw word.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SpirvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

// ── Entities ────────────────────────────────────────────────────────

/// An IR entity that receives an identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    Value(ValueId),
    Block(BlockId),
}

impl From<ValueId> for Entity {
    fn from(value: ValueId) -> Self {
        Entity::Value(value)
    }
}

impl From<BlockId> for Entity {
    fn from(block: BlockId) -> Self {
        Entity::Block(block)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Value(value) => write!(f, "value %{}", value.raw()),
            Entity::Block(block) => write!(f, "block bb{}", block.raw()),
        }
    }
}

// ── IdCounter ───────────────────────────────────────────────────────

/// Module-wide ID source. Starts at 1; 0 is not a valid SPIR-V ID.
#[derive(Debug)]
pub struct IdCounter {
    next: AtomicU32,
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl IdCounter {
    /// A fresh counter.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// A counter whose next ID is `first` (clamped to at least 1).
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first.max(1)),
        }
    }

    /// Reserve `count` consecutive IDs.
    pub fn reserve(&self, count: u32) -> CodegenResult<IdRange> {
        let start = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                next.checked_add(count).filter(|&end| end <= MAX_ID_BOUND)
            })
            .map_err(|next| {
                tracing::error!(next, count, "SPIR-V id space exhausted");
                CodegenError::IdSpaceExhausted
            })?;
        Ok(IdRange {
            next: start,
            end: start + count,
        })
    }

    /// Take a single ID.
    pub fn next_id(&self) -> CodegenResult<SpirvId> {
        self.reserve(1).map(|range| SpirvId(range.next))
    }

    /// The module bound: one past the highest ID handed out.
    pub fn bound(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

/// A contiguous block of reserved IDs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdRange {
    next: u32,
    end: u32,
}

impl IdRange {
    /// Take the next ID of the range.
    pub fn take(&mut self) -> CodegenResult<SpirvId> {
        if self.next >= self.end {
            tracing::error!(end = self.end, "generator id range exhausted");
            return Err(CodegenError::IdRangeExhausted);
        }
        let id = SpirvId(self.next);
        self.next += 1;
        Ok(id)
    }

    /// IDs left.
    pub fn remaining(&self) -> u32 {
        self.end - self.next
    }
}

/// Number of IDs a generator reserves for `method`.
///
/// One per parameter and block, and up to three per value (grid builtins
/// need a load, an extract and a conversion; arrayed allocas need a
/// variable and a cast).
pub fn id_budget(method: &Method) -> u32 {
    let params = method.params.len();
    let blocks = method.blocks.len();
    let values = method.value_count();
    let budget = params
        .saturating_add(blocks)
        .saturating_add(values.saturating_mul(3))
        .saturating_add(1);
    u32::try_from(budget).unwrap_or(u32::MAX)
}

// ── IdAllocator ─────────────────────────────────────────────────────

/// Per-generator identifier table.
#[derive(Debug)]
pub struct IdAllocator {
    range: IdRange,
    table: FxHashMap<Entity, SpirvId>,
}

impl IdAllocator {
    /// An empty table drawing from `range`.
    pub fn new(range: IdRange) -> Self {
        Self {
            range,
            table: FxHashMap::default(),
        }
    }

    /// Assign a fresh ID to `entity`.
    pub fn allocate(&mut self, entity: impl Into<Entity>) -> CodegenResult<SpirvId> {
        let entity = entity.into();
        if self.table.contains_key(&entity) {
            tracing::error!(%entity, "duplicate identifier allocation");
            return Err(CodegenError::DuplicateAllocation(entity));
        }
        let id = self.range.take()?;
        self.table.insert(entity, id);
        Ok(id)
    }

    /// Map `entity` onto an existing ID (module-level constants and
    /// variables).
    pub fn bind(&mut self, entity: impl Into<Entity>, id: SpirvId) -> CodegenResult<()> {
        let entity = entity.into();
        if self.table.contains_key(&entity) {
            tracing::error!(%entity, "duplicate identifier allocation");
            return Err(CodegenError::DuplicateAllocation(entity));
        }
        self.table.insert(entity, id);
        Ok(())
    }

    /// The ID allocated for `entity`.
    pub fn load(&self, entity: impl Into<Entity>) -> CodegenResult<SpirvId> {
        let entity = entity.into();
        self.table.get(&entity).copied().ok_or_else(|| {
            tracing::error!(%entity, "identifier loaded before allocation");
            CodegenError::UnallocatedEntity(entity)
        })
    }

    /// The ID allocated for `entity`, if any.
    pub fn get(&self, entity: impl Into<Entity>) -> Option<SpirvId> {
        self.table.get(&entity.into()).copied()
    }

    /// An anonymous ID for an intermediate result.
    pub fn fresh(&mut self) -> CodegenResult<SpirvId> {
        self.range.take()
    }

    /// Number of entities in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True if nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
