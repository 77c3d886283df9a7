//! The Property System (spec.md §4.1): a typed, id-addressable bag of
//! per-galaxy values so that physics modules can attach data without
//! editing the core galaxy layout.
//!
//! Grounded on the teacher's primitive registry: a dense id assigned at
//! registration time, looked up through a name-keyed table at the
//! configuration boundary, then addressed purely by id at runtime.

use rustc_hash::FxHashMap;

use sage_core::types::{Galaxy, PropertyBag, PropertySlot};
use sage_core::{PropertyId, SageError, SageResult};

use crate::kind::{Arity, PropertyKind, PropertyValue};

/// One registered property's shape and default value.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub id: PropertyId,
    pub name: String,
    pub kind: PropertyKind,
    pub arity: Arity,
    pub default: PropertyValue,
}

/// The property registry. Owns the dense id space and the declared shape of
/// every property; does not itself hold per-galaxy storage (that lives in
/// each `Galaxy::properties`, allocated by `allocate`).
pub struct PropertyTable {
    by_name: FxHashMap<String, PropertyId>,
    descriptors: Vec<PropertyDescriptor>,
    /// Number of sub-steps per snapshot, needed to resolve `Arity::PerSubstep`.
    steps: usize,
    /// Set once the first galaxy has been allocated; registration after this
    /// point is rejected (spec.md §4.1: "must be completed before any galaxy
    /// is allocated"). A `Cell` because `allocate` runs through a shared
    /// `&PropertyTable` alongside every other per-galaxy accessor.
    locked: std::cell::Cell<bool>,
}

impl PropertyTable {
    pub fn new(steps: usize) -> Self {
        PropertyTable {
            by_name: FxHashMap::default(),
            descriptors: Vec::new(),
            steps,
            locked: std::cell::Cell::new(false),
        }
    }

    /// Registers the fixed set of properties the core itself reads (spec.md
    /// §4.1 "standard properties"), then returns a table ready for module
    /// registration to append to. Mirrors the per-galaxy fields in spec.md
    /// §3 that are exposed generically (e.g. to diagnostic or output
    /// modules that don't know the `Galaxy` struct layout).
    pub fn with_standard_properties(steps: usize) -> SageResult<Self> {
        let mut table = PropertyTable::new(steps);
        table.register_property("mvir", PropertyKind::F64, Arity::Scalar, PropertyValue::F64(0.0))?;
        table.register_property("rvir", PropertyKind::F64, Arity::Scalar, PropertyValue::F64(0.0))?;
        table.register_property("vvir", PropertyKind::F64, Arity::Scalar, PropertyValue::F64(0.0))?;
        table.register_property("vmax", PropertyKind::F64, Arity::Scalar, PropertyValue::F64(0.0))?;
        table.register_property(
            "cold_gas_mass",
            PropertyKind::F64,
            Arity::Scalar,
            PropertyValue::F64(0.0),
        )?;
        table.register_property(
            "hot_gas_mass",
            PropertyKind::F64,
            Arity::Scalar,
            PropertyValue::F64(0.0),
        )?;
        table.register_property(
            "stellar_mass",
            PropertyKind::F64,
            Arity::Scalar,
            PropertyValue::F64(0.0),
        )?;
        table.register_property(
            "black_hole_mass",
            PropertyKind::F64,
            Arity::Scalar,
            PropertyValue::F64(0.0),
        )?;
        table.register_property(
            "sfr_disk",
            PropertyKind::F64,
            Arity::PerSubstep,
            PropertyValue::F64(0.0),
        )?;
        Ok(table)
    }

    /// Registers a property; idempotent on a matching (kind, arity) pair for
    /// the same name, otherwise fails with `PropertyConflict`.
    pub fn register_property(
        &mut self,
        name: &str,
        kind: PropertyKind,
        arity: Arity,
        default: PropertyValue,
    ) -> SageResult<PropertyId> {
        if let Some(&existing_id) = self.by_name.get(name) {
            let existing = &self.descriptors[existing_id.0 as usize];
            if existing.kind == kind && existing.arity == arity {
                return Ok(existing_id);
            }
            return Err(SageError::PropertyConflict { name: name.to_string() });
        }
        if self.locked.get() {
            return Err(SageError::PropertyConflict {
                name: format!("{name} (registered after allocation began)"),
            });
        }
        let id = PropertyId(self.descriptors.len() as u32);
        self.descriptors.push(PropertyDescriptor {
            id,
            name: name.to_string(),
            kind,
            arity,
            default,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<PropertyId> {
        self.by_name.get(name).copied()
    }

    pub fn descriptor(&self, id: PropertyId) -> Option<&PropertyDescriptor> {
        self.descriptors.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Fills `galaxy.properties` from the registry in registration order,
    /// all values initialised to their declared defaults (spec.md §4.1).
    pub fn allocate(&self, galaxy: &mut Galaxy) -> SageResult<()> {
        self.locked.set(true);
        let mut bag = PropertyBag::default();
        for descriptor in &self.descriptors {
            let len = descriptor.arity.len(self.steps);
            let slot = match descriptor.default {
                PropertyValue::I32(v) => PropertySlot::I32(vec![v; len]),
                PropertyValue::I64(v) => PropertySlot::I64(vec![v; len]),
                PropertyValue::F32(v) => PropertySlot::F32(vec![v; len]),
                PropertyValue::F64(v) => PropertySlot::F64(vec![v; len]),
                PropertyValue::Bool(v) => PropertySlot::Bool(vec![v; len]),
            };
            bag.push(slot);
        }
        galaxy.properties = Some(bag);
        Ok(())
    }

    pub fn get(&self, galaxy: &Galaxy, id: PropertyId, index: usize) -> SageResult<PropertyValue> {
        let descriptor = self.require_descriptor(id)?;
        let bag = self.require_bag(galaxy)?;
        let slot = &bag.slots()[id.0 as usize];
        read_slot(slot, index, &descriptor.name)
    }

    pub fn set(
        &self,
        galaxy: &mut Galaxy,
        id: PropertyId,
        index: usize,
        value: PropertyValue,
    ) -> SageResult<()> {
        let descriptor = self.require_descriptor(id)?;
        if value.kind() != descriptor.kind {
            return Err(SageError::PropertyIndexOutOfRange {
                name: descriptor.name.clone(),
                index,
                arity: descriptor.arity.len(self.steps),
            });
        }
        let name = descriptor.name.clone();
        let bag = galaxy
            .properties
            .as_mut()
            .ok_or_else(|| SageError::PropertyConflict { name: name.clone() })?;
        let slot = &mut bag.slots_mut()[id.0 as usize];
        write_slot(slot, index, value, &name)
    }

    /// Element-wise deep copy of all registered properties from `src` to `dst`.
    pub fn copy(&self, dst: &mut Galaxy, src: &Galaxy) -> SageResult<()> {
        match &src.properties {
            Some(bag) => {
                dst.properties = Some(bag.clone());
                Ok(())
            }
            None => {
                dst.properties = None;
                Ok(())
            }
        }
    }

    /// Releases property storage for a galaxy.
    pub fn free(&self, galaxy: &mut Galaxy) {
        galaxy.properties = None;
    }

    fn require_descriptor(&self, id: PropertyId) -> SageResult<&PropertyDescriptor> {
        self.descriptors
            .get(id.0 as usize)
            .ok_or_else(|| SageError::PropertyIndexOutOfRange {
                name: format!("<unregistered {id}>"),
                index: 0,
                arity: 0,
            })
    }

    fn require_bag<'g>(&self, galaxy: &'g Galaxy) -> SageResult<&'g PropertyBag> {
        galaxy
            .properties
            .as_ref()
            .ok_or_else(|| SageError::PropertyConflict { name: "<unallocated>".to_string() })
    }
}

fn read_slot(slot: &PropertySlot, index: usize, name: &str) -> SageResult<PropertyValue> {
    let oob = || SageError::PropertyIndexOutOfRange {
        name: name.to_string(),
        index,
        arity: slot_len(slot),
    };
    match slot {
        PropertySlot::I32(v) => v.get(index).copied().map(PropertyValue::I32).ok_or_else(oob),
        PropertySlot::I64(v) => v.get(index).copied().map(PropertyValue::I64).ok_or_else(oob),
        PropertySlot::F32(v) => v.get(index).copied().map(PropertyValue::F32).ok_or_else(oob),
        PropertySlot::F64(v) => v.get(index).copied().map(PropertyValue::F64).ok_or_else(oob),
        PropertySlot::Bool(v) => v.get(index).copied().map(PropertyValue::Bool).ok_or_else(oob),
    }
}

fn write_slot(slot: &mut PropertySlot, index: usize, value: PropertyValue, name: &str) -> SageResult<()> {
    let arity = slot_len(slot);
    let oob = || SageError::PropertyIndexOutOfRange { name: name.to_string(), index, arity };
    match (slot, value) {
        (PropertySlot::I32(v), PropertyValue::I32(x)) => *v.get_mut(index).ok_or_else(oob)? = x,
        (PropertySlot::I64(v), PropertyValue::I64(x)) => *v.get_mut(index).ok_or_else(oob)? = x,
        (PropertySlot::F32(v), PropertyValue::F32(x)) => *v.get_mut(index).ok_or_else(oob)? = x,
        (PropertySlot::F64(v), PropertyValue::F64(x)) => *v.get_mut(index).ok_or_else(oob)? = x,
        (PropertySlot::Bool(v), PropertyValue::Bool(x)) => *v.get_mut(index).ok_or_else(oob)? = x,
        _ => return Err(oob()),
    }
    Ok(())
}

fn slot_len(slot: &PropertySlot) -> usize {
    match slot {
        PropertySlot::I32(v) => v.len(),
        PropertySlot::I64(v) => v.len(),
        PropertySlot::F32(v) => v.len(),
        PropertySlot::F64(v) => v.len(),
        PropertySlot::Bool(v) => v.len(),
    }
}

impl std::fmt::Debug for PropertyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyTable")
            .field("registered", &self.descriptors.len())
            .field("locked", &self.locked)
            .finish()
    }
}
