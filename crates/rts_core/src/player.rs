//! Players, factions, and per-player economy state (part of C4/C7, §3).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Stable player identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u32);

impl PlayerId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw integer value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Stable faction identifier. Unlike the closed 5-variant enum of earlier
/// designs, factions are dynamically defined per scenario — a faction is
/// just an id with a friend/enemy set, not a hardcoded roster (§3, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(u32);

impl FactionId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw integer value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Resource categories tracked by a player's economy (§3 supplement, ground
/// in the literal production scenario of `spec.md` §8 scenario 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Construction material for vehicles and buildings.
    Steel,
    /// Precision components for advanced units and research.
    Electronics,
    /// Consumed by weapons fire and unit upkeep.
    Ammunition,
    /// Population available to crew new infantry.
    Conscripts,
}

/// All resource kinds, in a fixed iteration order used wherever the
/// simulation must enumerate them deterministically (e.g. per-second
/// stock accrual).
pub const ALL_RESOURCE_KINDS: [ResourceKind; 4] = [
    ResourceKind::Steel,
    ResourceKind::Electronics,
    ResourceKind::Ammunition,
    ResourceKind::Conscripts,
];

/// Per-resource-kind economic state for one player.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceAccount {
    /// Current stockpile.
    pub stock: i64,
    /// Accrued per second (per scheduled economy tick).
    pub yield_per_second: i64,
    /// Drained per second by upkeep.
    pub consumption_per_second: i64,
    /// Scales effective production output for buildings that produce this
    /// resource, `[0, 1]`.
    pub production_efficiency: crate::math::Fixed,
}

impl ResourceAccount {
    fn new() -> Self {
        Self {
            production_efficiency: crate::math::Fixed::ONE,
            ..Default::default()
        }
    }
}

/// A player's full resource ledger, one [`ResourceAccount`] per
/// [`ResourceKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLedger {
    accounts: HashMap<ResourceKind, ResourceAccount>,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        let accounts = ALL_RESOURCE_KINDS
            .into_iter()
            .map(|kind| (kind, ResourceAccount::new()))
            .collect();
        Self { accounts }
    }
}

impl ResourceLedger {
    /// Account for `kind`.
    #[must_use]
    pub fn account(&self, kind: ResourceKind) -> ResourceAccount {
        self.accounts.get(&kind).copied().unwrap_or_default()
    }

    /// Mutable account for `kind`.
    pub fn account_mut(&mut self, kind: ResourceKind) -> &mut ResourceAccount {
        self.accounts.entry(kind).or_insert_with(ResourceAccount::new)
    }

    /// True if the ledger holds at least `amount` of `kind`.
    #[must_use]
    pub fn has_at_least(&self, kind: ResourceKind, amount: i64) -> bool {
        self.account(kind).stock >= amount
    }

    /// Deduct `amount` of `kind` unconditionally (callers must check
    /// [`Self::has_at_least`] first to honor the Resource-deficit error
    /// contract of §7).
    pub fn deduct(&mut self, kind: ResourceKind, amount: i64) {
        self.account_mut(kind).stock -= amount;
    }

    /// Credit `amount` of `kind`.
    pub fn credit(&mut self, kind: ResourceKind, amount: i64) {
        self.account_mut(kind).stock += amount;
    }

    /// Apply one second of yield/consumption accrual to every non-energy
    /// resource kind (§4.7 — this ledger has no separate energy kind;
    /// energy is tracked per-building via `power_ratio` instead).
    pub fn accrue_one_second(&mut self) {
        for kind in ALL_RESOURCE_KINDS {
            let account = self.account_mut(kind);
            account.stock += account.yield_per_second - account.consumption_per_second;
        }
    }
}

/// Victory conditions for one scenario (supplement to §3, grounded in
/// `original_source/scenarios/map.py` and the teacher's
/// `rts_headless::scenario::VictoryConditions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VictoryConditions {
    /// Victory points required for each player to win outright.
    pub required_victory_points: HashMap<PlayerId, u32>,
    /// If true, eliminating every enemy faction's units/buildings also
    /// ends the scenario in the last player's favor.
    pub eliminate_all_enemies: bool,
}

/// One player's full simulation-visible state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// This player's id.
    pub id: PlayerId,
    /// Faction this player belongs to.
    pub faction_id: FactionId,
    /// Display color (RGB), a rendering concern carried only as data.
    pub color: (u8, u8, u8),
    /// Per-resource-kind economy.
    pub resources: ResourceLedger,
    /// Technology ids this player has fully researched.
    pub known_technologies: HashSet<String>,
    /// In-progress research accumulation per technology id, `0..100`.
    pub current_research: HashMap<String, crate::math::Fixed>,
    /// Enemies known to this player (union of all owned entities'
    /// known-enemies sets, refreshed each tick per §4.4).
    pub known_enemies: HashSet<EntityId>,
    /// Unit type ids this player is permitted to construct.
    pub buildable_units: Vec<String>,
    /// Building type ids this player is permitted to construct.
    pub buildable_buildings: Vec<String>,
    /// Per production-building-type id, whether it's the player's
    /// cached default producer (used to pick a sensible default
    /// production building in the UI collaborator).
    pub default_producers: HashMap<String, bool>,
    /// True once this player has been eliminated (zero units and zero
    /// buildings, or explicit `Defeat` event).
    pub eliminated: bool,
}

impl Player {
    /// Construct a new player with empty resources and no progress.
    #[must_use]
    pub fn new(id: PlayerId, faction_id: FactionId, color: (u8, u8, u8)) -> Self {
        Self {
            id,
            faction_id,
            color,
            resources: ResourceLedger::default(),
            known_technologies: HashSet::new(),
            current_research: HashMap::new(),
            known_enemies: HashSet::new(),
            buildable_units: Vec::new(),
            buildable_buildings: Vec::new(),
            default_producers: HashMap::new(),
            eliminated: false,
        }
    }

    /// Clears known-enemies at the start of each tick before the entity
    /// scan repopulates it (§2 per-tick data flow: "Factions/Players
    /// update (economy, known-enemies clear)").
    pub fn clear_known_enemies(&mut self) {
        self.known_enemies.clear();
    }
}

/// A faction: a symmetric web of alliances/hostilities shared by a group
/// of players.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faction {
    /// This faction's id.
    pub id: FactionId,
    /// Factions considered friendly (never attacked automatically).
    pub friends: HashSet<FactionId>,
    /// Factions at war with this one.
    pub enemies: HashSet<FactionId>,
    /// The player leading this faction (e.g. for victory/defeat
    /// attribution in a single-leader scenario).
    pub leader: PlayerId,
    /// All units owned by any player of this faction.
    pub units: HashSet<EntityId>,
    /// All buildings owned by any player of this faction.
    pub buildings: HashSet<EntityId>,
    /// Aggregated known-enemies across this faction's players, used by the
    /// `NoUnitsLeft(faction)` trigger condition.
    pub known_enemies: HashSet<EntityId>,
}

impl Faction {
    /// Construct a faction with no allies or enemies yet.
    #[must_use]
    pub fn new(id: FactionId, leader: PlayerId) -> Self {
        Self {
            id,
            friends: HashSet::new(),
            enemies: HashSet::new(),
            leader,
            units: HashSet::new(),
            buildings: HashSet::new(),
            known_enemies: HashSet::new(),
        }
    }

    /// True if this faction has zero units and zero buildings (used by
    /// the `NoUnitsLeft` trigger condition, §4.9).
    #[must_use]
    pub fn has_no_units_left(&self) -> bool {
        self.units.is_empty() && self.buildings.is_empty()
    }
}

/// Declares war between two factions, symmetrically and atomically (§3,
/// §5's "Faction hostility changes are symmetric and atomic"). Both
/// factions must already exist in the caller's faction table; this
/// function only updates the two in-memory records passed to it.
pub fn start_war_with(a: &mut Faction, b: &mut Faction) {
    a.enemies.insert(b.id);
    b.enemies.insert(a.id);
    a.friends.remove(&b.id);
    b.friends.remove(&a.id);
}

/// Declares alliance between two factions, symmetrically.
pub fn make_peace_with(a: &mut Faction, b: &mut Faction) {
    a.friends.insert(b.id);
    b.friends.insert(a.id);
    a.enemies.remove(&b.id);
    b.enemies.remove(&a.id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_war_with_is_symmetric() {
        let mut a = Faction::new(FactionId::new(0), PlayerId::new(0));
        let mut b = Faction::new(FactionId::new(1), PlayerId::new(1));
        start_war_with(&mut a, &mut b);
        assert!(a.enemies.contains(&b.id));
        assert!(b.enemies.contains(&a.id));
    }

    #[test]
    fn resource_ledger_deduct_and_credit() {
        let mut ledger = ResourceLedger::default();
        ledger.credit(ResourceKind::Steel, 1000);
        assert!(ledger.has_at_least(ResourceKind::Steel, 1000));
        ledger.deduct(ResourceKind::Steel, 100);
        assert_eq!(ledger.account(ResourceKind::Steel).stock, 900);
    }

    #[test]
    fn accrue_one_second_applies_yield_minus_consumption() {
        let mut ledger = ResourceLedger::default();
        {
            let account = ledger.account_mut(ResourceKind::Electronics);
            account.yield_per_second = 10;
            account.consumption_per_second = 3;
        }
        ledger.accrue_one_second();
        assert_eq!(ledger.account(ResourceKind::Electronics).stock, 7);
    }

    #[test]
    fn faction_no_units_left() {
        let faction = Faction::new(FactionId::new(0), PlayerId::new(0));
        assert!(faction.has_no_units_left());
    }
}
