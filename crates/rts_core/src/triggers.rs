//! Scenario triggers: predicate → consequence engine (C9, §4.9).
//!
//! Grounded in `original_source/campaigns/triggers.py` (the `Trigger`
//! subclasses become [`Condition`] variants) and `triggered_events.py` (the
//! `TriggeredEvent` subclasses become [`Event`] variants). The Python
//! original's `ControlsAreaTrigger` is an unimplemented stub (`pass`); it is
//! dropped here rather than translated, since a stub condition that always
//! reports unfulfilled has no well-defined Rust counterpart.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::player::{FactionId, PlayerId, ResourceKind};

/// A predicate evaluated against simulation state, drawn from
/// `original_source/campaigns/triggers.py`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// True once the scenario clock has passed `minutes` minutes.
    TimePassed {
        /// Minutes required to have elapsed.
        minutes: u32,
    },
    /// True once the fog of war's `unexplored` set is empty.
    MapRevealed,
    /// True once the named player has zero units and zero buildings.
    NoUnitsLeftPlayer {
        /// The player to check.
        player: PlayerId,
    },
    /// True once every player in the named faction has zero units and zero
    /// buildings (aggregated, per `original_source`'s faction variant).
    NoUnitsLeftFaction {
        /// The faction to check.
        faction: FactionId,
    },
    /// True once `player` owns more than `amount` units whose blueprint id
    /// is `unit_type`.
    HasUnitsOfType {
        /// The player to check.
        player: PlayerId,
        /// Unit blueprint id.
        unit_type: String,
        /// Threshold the count must exceed.
        amount: u32,
    },
    /// Same as [`Self::HasUnitsOfType`] but counts buildings.
    HasBuildingsOfType {
        /// The player to check.
        player: PlayerId,
        /// Building blueprint id.
        building_type: String,
        /// Threshold the count must exceed.
        amount: u32,
    },
    /// True once `player` owns the building with this entity id.
    ControlsBuilding {
        /// The player to check.
        player: PlayerId,
        /// Building entity id, encoded as its raw id (buildings never move
        /// arenas, so this is stable for the scenario's lifetime).
        building: u64,
    },
    /// True once `player` has fully researched the named technology.
    HasTechnology {
        /// The player to check.
        player: PlayerId,
        /// Technology blueprint id.
        technology: String,
    },
    /// True once `player`'s stock of `kind` is at least `amount`.
    HasResource {
        /// The player to check.
        player: PlayerId,
        /// Resource kind.
        kind: ResourceKind,
        /// Threshold stock must reach.
        amount: i64,
    },
    /// True once `player`'s victory points reach `required`.
    VictoryPoints {
        /// The player to check.
        player: PlayerId,
        /// Threshold victory points must reach.
        required: u32,
    },
}

/// A consequence fired when a trigger's [`Condition`] is satisfied, drawn
/// from `original_source/campaigns/triggered_events.py`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Add `amount` victory points to `player`'s counter, checking the
    /// victory threshold immediately afterward.
    AddVictoryPoints {
        /// Player to credit.
        player: PlayerId,
        /// Points to add.
        amount: u32,
    },
    /// End the scenario with `player` as the winner outright.
    Victory {
        /// The winning player.
        player: PlayerId,
    },
    /// Eliminate `player`; if exactly one non-eliminated player remains
    /// afterward, the scenario ends with that player as winner.
    Defeat {
        /// The eliminated player.
        player: PlayerId,
    },
    /// Surface a dialog to the UI collaborator (text is caller-supplied
    /// config, not modeled here — the core only carries the dialog id).
    ShowDialog {
        /// Config id naming the dialog content.
        dialog_id: String,
    },
}

/// One trigger: a condition, the events it fires, and a one-shot `active`
/// flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTrigger {
    /// Predicate gating this trigger's events.
    pub condition: Condition,
    /// Events fired, in order, the first time `condition` is satisfied.
    pub events: Vec<Event>,
    /// False once this trigger has fired; a deactivated trigger is skipped
    /// by every subsequent evaluation (one-shot semantics, §4.9).
    pub active: bool,
}

impl EventTrigger {
    /// Construct an active trigger.
    #[must_use]
    pub fn new(condition: Condition, events: Vec<Event>) -> Self {
        Self {
            condition,
            events,
            active: true,
        }
    }
}

/// Outcome of a scenario ending, surfaced to the headless runner / UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioOutcome {
    /// `player` won outright.
    Victory {
        /// The winning player.
        player: PlayerId,
    },
}

/// A scenario's trigger set and victory-point bookkeeping (§3, §4.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Players participating in this scenario.
    pub player_ids: Vec<PlayerId>,
    /// All triggers, active or already fired.
    pub triggers: Vec<EventTrigger>,
    /// Current victory-point tally per player.
    pub victory_points: HashMap<PlayerId, u32>,
    /// Victory-point threshold per player (0 or absent means no VP victory
    /// condition for that player).
    pub required_victory_points: HashMap<PlayerId, u32>,
    /// Set once the scenario has ended.
    pub outcome: Option<ScenarioOutcome>,
    /// Players eliminated via a `Defeat` event.
    pub eliminated_players: Vec<PlayerId>,
}

impl Scenario {
    /// Add `amount` victory points to `player`'s counter; ends the scenario
    /// with `player` as winner if the threshold is now met (§4.9's literal
    /// `add_victory_points` contract).
    pub fn add_victory_points(&mut self, player: PlayerId, amount: u32) {
        let tally = self.victory_points.entry(player).or_insert(0);
        *tally += amount;
        let required = self.required_victory_points.get(&player).copied().unwrap_or(0);
        if required > 0 && *tally >= required && self.outcome.is_none() {
            self.outcome = Some(ScenarioOutcome::Victory { player });
        }
    }

    /// Mark `player` eliminated; if exactly one participating player
    /// remains un-eliminated, end the scenario with that player as winner.
    pub fn eliminate_player(&mut self, player: PlayerId) {
        if !self.eliminated_players.contains(&player) {
            self.eliminated_players.push(player);
        }
        if self.outcome.is_some() {
            return;
        }
        let remaining: Vec<PlayerId> = self
            .player_ids
            .iter()
            .copied()
            .filter(|p| !self.eliminated_players.contains(p))
            .collect();
        if remaining.len() == 1 {
            self.outcome = Some(ScenarioOutcome::Victory { player: remaining[0] });
        }
    }

    /// Declare `player` the winner outright.
    pub fn victory(&mut self, player: PlayerId) {
        if self.outcome.is_none() {
            self.outcome = Some(ScenarioOutcome::Victory { player });
        }
    }
}

/// Minimal read-only view of simulation state a [`Condition`] needs to
/// evaluate itself, decoupling this module from `simulation.rs` (which
/// constructs this view from live state each evaluation).
pub struct ConditionContext<'a> {
    /// Scenario clock, in elapsed minutes.
    pub elapsed_minutes: u32,
    /// True once the fog of war's unexplored set is empty.
    pub map_fully_revealed: bool,
    /// Per-player unit count, by player id.
    pub unit_counts: &'a HashMap<PlayerId, u32>,
    /// Per-player building count, by player id.
    pub building_counts: &'a HashMap<PlayerId, u32>,
    /// Per-faction aggregated unit+building count, by faction id.
    pub faction_entity_counts: &'a HashMap<FactionId, u32>,
    /// Per-(player, unit_type) owned-unit count.
    pub units_of_type: &'a HashMap<(PlayerId, String), u32>,
    /// Per-(player, building_type) owned-building count.
    pub buildings_of_type: &'a HashMap<(PlayerId, String), u32>,
    /// Building entity ids owned per player (raw ids).
    pub controlled_buildings: &'a HashMap<PlayerId, Vec<u64>>,
    /// Known technologies per player.
    pub known_technologies: &'a HashMap<PlayerId, std::collections::HashSet<String>>,
    /// Current resource stock per `(player, kind)`.
    pub resource_stock: &'a HashMap<(PlayerId, ResourceKind), i64>,
    /// Current victory points per player.
    pub victory_points: &'a HashMap<PlayerId, u32>,
}

impl Condition {
    /// Evaluate this condition against `ctx`.
    #[must_use]
    pub fn is_satisfied(&self, ctx: &ConditionContext<'_>) -> bool {
        match self {
            Self::TimePassed { minutes } => ctx.elapsed_minutes >= *minutes,
            Self::MapRevealed => ctx.map_fully_revealed,
            Self::NoUnitsLeftPlayer { player } => {
                ctx.unit_counts.get(player).copied().unwrap_or(0) == 0
                    && ctx.building_counts.get(player).copied().unwrap_or(0) == 0
            }
            Self::NoUnitsLeftFaction { faction } => {
                ctx.faction_entity_counts.get(faction).copied().unwrap_or(0) == 0
            }
            Self::HasUnitsOfType { player, unit_type, amount } => {
                let count = ctx
                    .units_of_type
                    .get(&(*player, unit_type.clone()))
                    .copied()
                    .unwrap_or(0);
                count > *amount
            }
            Self::HasBuildingsOfType { player, building_type, amount } => {
                let count = ctx
                    .buildings_of_type
                    .get(&(*player, building_type.clone()))
                    .copied()
                    .unwrap_or(0);
                count > *amount
            }
            Self::ControlsBuilding { player, building } => ctx
                .controlled_buildings
                .get(player)
                .is_some_and(|ids| ids.contains(building)),
            Self::HasTechnology { player, technology } => ctx
                .known_technologies
                .get(player)
                .is_some_and(|set| set.contains(technology)),
            Self::HasResource { player, kind, amount } => {
                ctx.resource_stock.get(&(*player, *kind)).copied().unwrap_or(0) >= *amount
            }
            Self::VictoryPoints { player, required } => {
                ctx.victory_points.get(player).copied().unwrap_or(0) >= *required
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod fresh {
        use super::*;

        #[test]
        fn time_passed_threshold() {
            let unit_counts = HashMap::new();
            let building_counts = HashMap::new();
            let faction_counts = HashMap::new();
            let units_of_type = HashMap::new();
            let buildings_of_type = HashMap::new();
            let controlled = HashMap::new();
            let known_tech = HashMap::new();
            let resources = HashMap::new();
            let vp = HashMap::new();
            let ctx = ConditionContext {
                elapsed_minutes: 1,
                map_fully_revealed: false,
                unit_counts: &unit_counts,
                building_counts: &building_counts,
                faction_entity_counts: &faction_counts,
                units_of_type: &units_of_type,
                buildings_of_type: &buildings_of_type,
                controlled_buildings: &controlled,
                known_technologies: &known_tech,
                resource_stock: &resources,
                victory_points: &vp,
            };
            assert!(Condition::TimePassed { minutes: 1 }.is_satisfied(&ctx));
            assert!(!Condition::TimePassed { minutes: 2 }.is_satisfied(&ctx));
        }

        #[test]
        fn victory_points_trigger_ends_scenario() {
            let mut scenario = Scenario {
                player_ids: vec![PlayerId::new(0)],
                required_victory_points: HashMap::from([(PlayerId::new(0), 10)]),
                ..Default::default()
            };
            scenario.add_victory_points(PlayerId::new(0), 5);
            assert!(scenario.outcome.is_none());
            scenario.add_victory_points(PlayerId::new(0), 5);
            assert_eq!(
                scenario.outcome,
                Some(ScenarioOutcome::Victory { player: PlayerId::new(0) })
            );
        }

        #[test]
        fn defeat_down_to_last_player_ends_scenario() {
            let mut scenario = Scenario {
                player_ids: vec![PlayerId::new(0), PlayerId::new(1)],
                ..Default::default()
            };
            scenario.eliminate_player(PlayerId::new(0));
            assert_eq!(
                scenario.outcome,
                Some(ScenarioOutcome::Victory { player: PlayerId::new(1) })
            );
        }

        #[test]
        fn trigger_deactivates_after_firing() {
            let mut trigger = EventTrigger::new(
                Condition::TimePassed { minutes: 1 },
                vec![Event::AddVictoryPoints { player: PlayerId::new(0), amount: 1 }],
            );
            assert!(trigger.active);
            trigger.active = false;
            assert!(!trigger.active);
        }
    }
}
