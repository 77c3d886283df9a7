//! The halo and galaxy data model (spec.md §3).

use smallvec::SmallVec;

use crate::ids::{GalaxyIndex, GalaxyNr, HaloIndex, Snapshot};

/// A 3-vector of f64, used for position/velocity/spin. Plain data, no units baked in —
/// units are a configuration concern (see `crate::config::UnitsParams`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
}

/// A dark-matter halo at one snapshot, as read from the tree file.
///
/// Halos are immutable to the core (spec.md §3): the engine only ever reads
/// these fields. Links between halos are indices into the same forest's
/// flat halo array, never pointers.
#[derive(Debug, Clone)]
pub struct Halo {
    pub snapshot: Snapshot,
    pub mvir: f64,
    pub vvir: f64,
    pub rvir: f64,
    pub vmax: f64,
    pub pos: Vec3,
    pub vel: Vec3,
    pub spin: Vec3,
    pub len: u32,
    pub most_bound_particle_id: i64,

    /// `first_in_fof(first_in_fof(h)) == first_in_fof(h)`.
    pub fof_root: HaloIndex,
    /// Next halo sharing this FOF group, or `None` if this is the last.
    pub next_in_fof: Option<HaloIndex>,
    /// First progenitor at an earlier snapshot, if any.
    pub first_progenitor: Option<HaloIndex>,
    /// Next progenitor of the same descendant, if any.
    pub next_progenitor: Option<HaloIndex>,
    /// Descendant at a later snapshot, if any.
    pub descendant: Option<HaloIndex>,
}

impl Halo {
    /// Whether this halo is the root of its own FOF group.
    pub fn is_fof_root(&self, self_index: HaloIndex) -> bool {
        self.fof_root == self_index
    }
}

/// Galaxy classification (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalaxyType {
    /// The unique galaxy per FOF group living in the FOF root halo.
    Central = 0,
    /// Lives in a non-root subhalo of the FOF group.
    Satellite = 1,
    /// Host halo has disappeared but the FOF survives; carries no virial mass.
    Orphan = 2,
    /// Merged or disrupted; retained only for bookkeeping this snapshot.
    Merged = 3,
}

/// A mass reservoir paired with its metal content (spec.md §3).
///
/// Invariants I4/I5 (spec.md §3) apply to every reservoir: `mass >= 0`,
/// `metals >= 0`, `metals <= mass`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reservoir {
    pub mass: f64,
    pub metals: f64,
}

impl Reservoir {
    pub const ZERO: Reservoir = Reservoir { mass: 0.0, metals: 0.0 };

    /// `true` if both I4 and I5 hold for this reservoir.
    pub fn is_valid(&self) -> bool {
        self.mass >= 0.0 && self.metals >= 0.0 && self.metals <= self.mass
    }
}

/// The canonical set of baryonic reservoirs (spec.md §3, §9 "CGMgas/HotGas drift").
/// A module that needs an additional reservoir does so through the Property
/// System (§4.1); the core only enforces I4/I5 over this fixed set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reservoirs {
    pub cold_disk_gas: Reservoir,
    pub stellar_disk: Reservoir,
    pub stellar_bulge: Reservoir,
    pub hot_halo_gas: Reservoir,
    pub ejected_gas: Reservoir,
    pub black_hole: Reservoir,
    pub intracluster_stars: Reservoir,
}

impl Reservoirs {
    /// Iterate the canonical reservoirs by reference, for invariant checks.
    pub fn iter(&self) -> [&Reservoir; 7] {
        [
            &self.cold_disk_gas,
            &self.stellar_disk,
            &self.stellar_bulge,
            &self.hot_halo_gas,
            &self.ejected_gas,
            &self.black_hole,
            &self.intracluster_stars,
        ]
    }

    /// `true` if every reservoir satisfies I4 and I5.
    pub fn all_valid(&self) -> bool {
        self.iter().into_iter().all(|r| r.is_valid())
    }

    /// Mutable counterpart to `iter`, for clamp-and-warn enforcement.
    pub fn iter_mut(&mut self) -> [&mut Reservoir; 7] {
        [
            &mut self.cold_disk_gas,
            &mut self.stellar_disk,
            &mut self.stellar_bulge,
            &mut self.hot_halo_gas,
            &mut self.ejected_gas,
            &mut self.black_hole,
            &mut self.intracluster_stars,
        ]
    }

    /// Clamps every reservoir to satisfy I4/I5: negative mass/metals raised
    /// to zero, metals capped at mass. Returns `true` if anything changed.
    pub fn clamp_to_valid(&mut self) -> bool {
        let mut changed = false;
        for r in self.iter_mut() {
            if r.mass < 0.0 {
                r.mass = 0.0;
                changed = true;
            }
            if r.metals < 0.0 {
                r.metals = 0.0;
                changed = true;
            }
            if r.metals > r.mass {
                r.metals = r.mass;
                changed = true;
            }
        }
        changed
    }

    pub fn total_baryonic_mass(&self) -> f64 {
        self.iter().into_iter().map(|r| r.mass).sum()
    }
}

/// Deferred merger/disruption bookkeeping carried on a galaxy (spec.md §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergerType {
    Major,
    Minor,
    DiskInstability,
    IcsDisruption,
}

/// Merger bookkeeping fields living on a galaxy between queuing and drain.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergerBookkeeping {
    pub merger_type: Option<MergerType>,
    pub target_galaxy_nr: Option<u64>,
    pub target_snapshot: Option<u32>,
    pub remaining_merger_time: f64,
}

/// The evolving baryonic object (spec.md §3).
#[derive(Debug, Clone)]
pub struct Galaxy {
    // Identity
    pub galaxy_nr: GalaxyNr,
    pub most_bound_particle_id: i64,
    pub current_halo: HaloIndex,
    /// Self-reference for centrals; index of the elected central within the
    /// owning transient FOF buffer (rewritten to the this-snapshot container
    /// index during FINAL — spec.md §9 "CentralGal semantics").
    pub fof_central: GalaxyIndex,

    // Classification
    pub galaxy_type: GalaxyType,
    pub merged: bool,

    pub snapshot: Snapshot,

    // Geometry
    pub pos: Vec3,
    pub vel: Vec3,
    pub mvir: f64,
    pub rvir: f64,
    pub vvir: f64,
    pub vmax: f64,

    // Baryonic reservoirs
    pub reservoirs: Reservoirs,

    // Merger bookkeeping
    pub merger: MergerBookkeeping,

    // History
    pub time_of_last_merger: f64,
    /// Per-sub-step star formation rate history, length STEPS.
    pub sfr_history: SmallVec<[f64; 8]>,

    /// Per-galaxy property storage (§4.1). `None` until `PropertyTable::allocate`
    /// has run for this galaxy. `sage-core` only carries the data shape; the
    /// Property System (`sage-primitives`) is the sole owner of registration,
    /// allocation, typed access, copy and free over this field.
    pub properties: Option<PropertyBag>,
}

/// Per-galaxy property storage. One `PropertySlot` per registered property,
/// in registration order, filled in by `PropertyTable::allocate`.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    slots: Vec<PropertySlot>,
}

/// One typed value slot. Scalars are stored as length-1 vecs so that
/// `scalar` / `fixed(N)` / `per_substep(STEPS)` share one representation.
#[derive(Debug, Clone)]
pub enum PropertySlot {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
}

impl PropertyBag {
    pub fn slots(&self) -> &[PropertySlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut Vec<PropertySlot> {
        &mut self.slots
    }

    pub fn push(&mut self, slot: PropertySlot) {
        self.slots.push(slot);
    }
}

impl Galaxy {
    /// Construct a primordial galaxy: all reservoirs zero, no properties allocated
    /// yet (the Property System's `allocate` does that — spec.md §4.1, §9
    /// "one initialiser that sets all core fields to documented defaults").
    pub fn primordial(galaxy_nr: GalaxyNr, halo: &Halo, current_halo: HaloIndex, snapshot: Snapshot, steps: usize) -> Self {
        Galaxy {
            galaxy_nr,
            most_bound_particle_id: halo.most_bound_particle_id,
            current_halo,
            fof_central: GalaxyIndex(0), // rewritten by the FOF Assembler once the buffer index is known
            galaxy_type: GalaxyType::Central,
            merged: false,
            snapshot,
            pos: halo.pos,
            vel: halo.vel,
            mvir: halo.mvir,
            rvir: halo.rvir,
            vvir: halo.vvir,
            vmax: halo.vmax,
            reservoirs: Reservoirs::default(),
            merger: MergerBookkeeping::default(),
            time_of_last_merger: -1.0,
            sfr_history: SmallVec::from_elem(0.0, steps),
            properties: None,
        }
    }

    /// Deep-copy this galaxy, adopting a new current halo (used by inheritance,
    /// spec.md §4.7 step 1c). Property cloning is delegated to the caller via
    /// `sage-primitives::PropertyTable::copy`, which this constructor does not
    /// perform — see `sage-storage::GalaxyContainer::append`.
    pub fn inherit(&self, current_halo: HaloIndex) -> Self {
        let mut g = self.clone();
        g.current_halo = current_halo;
        g
    }

    pub fn is_output_eligible(&self) -> bool {
        !self.merged && !matches!(self.galaxy_type, GalaxyType::Merged)
    }
}
