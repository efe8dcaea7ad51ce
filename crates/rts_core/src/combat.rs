//! Attack, hit-chance, and damage resolution (C4's combat half, §4.4).
//!
//! Ported from `original_source/units/weapons.py`'s `Weapon.hit_target`
//! and `original_source/players_and_factions/player.py`'s
//! `on_being_damaged`/`kill`, generalized from those files' free-floating
//! `PlayerEntity` attributes into explicit parameter structs so the pure
//! functions here don't need a reference to a whole entity.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, PlayerEntityCommon, Weapon};
use crate::math::Fixed;
use crate::rng::DeterministicRng;

/// Every input the hit-chance sum needs, beyond the weapon's own
/// `accuracy` (§4.4: "sums base accuracy, shooter experience bonus, target
/// size bonus (building), shooter-moving penalty, target-moving penalty,
/// anti-infantry penalty, cover penalty").
#[derive(Debug, Clone, Copy, Default)]
pub struct HitChanceContext {
    /// Shooter's experience level; contributes `experience * 0.05`.
    pub shooter_experience: Fixed,
    /// True if the target is a building (flat `+25` bonus).
    pub target_is_building: bool,
    /// True if the shooter moved this tick (flat `-25` penalty).
    pub shooter_moving: bool,
    /// True if the target moved this tick (flat `-15` penalty).
    pub target_moving: bool,
    /// True if the target is infantry and the shooter is not (flat `-25`
    /// penalty; infantry-vs-infantry and non-infantry-vs-infantry-shooter
    /// both skip this).
    pub target_is_infantry_penalty: bool,
    /// Target's cover value, subtracted directly from the hit chance.
    pub target_cover: Fixed,
}

fn experience_bonus_factor() -> Fixed {
    Fixed::from_num(5) / Fixed::from_num(100)
}

const BUILDING_SIZE_BONUS: i32 = 25;
const SHOOTER_MOVING_PENALTY: i32 = 25;
const TARGET_MOVING_PENALTY: i32 = 15;
const ANTI_INFANTRY_PENALTY: i32 = 25;

/// Sum the hit-chance contract's terms into a single percentage-scale
/// value (not yet clamped — a heavily-penalized shot can legitimately
/// reach zero or negative, in which case it always misses).
#[must_use]
pub fn hit_chance(weapon: &Weapon, ctx: &HitChanceContext) -> Fixed {
    let mut chance = weapon.accuracy;
    chance += ctx.shooter_experience * experience_bonus_factor();
    if ctx.target_is_building {
        chance += Fixed::from_num(BUILDING_SIZE_BONUS);
    }
    chance -= ctx.target_cover;
    if ctx.shooter_moving {
        chance -= Fixed::from_num(SHOOTER_MOVING_PENALTY);
    }
    if ctx.target_moving {
        chance -= Fixed::from_num(TARGET_MOVING_PENALTY);
    }
    if ctx.target_is_infantry_penalty {
        chance -= Fixed::from_num(ANTI_INFANTRY_PENALTY);
    }
    chance
}

/// Standard deviation scale applied to the hit-chance Gaussian roll (§4.4:
/// "sample Gaussian around hit-chance with σ=0.2·hit-chance").
fn hit_chance_std_dev_factor() -> f64 {
    0.2
}

/// Sample the hit-chance Gaussian and compare against the threshold: hit
/// iff `sample < hit_chance`. A non-positive hit chance always misses (the
/// degenerate Gaussian collapses to the mean, which is not `< mean`).
pub fn roll_to_hit(chance: Fixed, rng: &mut DeterministicRng) -> bool {
    let mean: f64 = chance.to_num();
    let sample = rng.gauss(mean, mean.abs() * hit_chance_std_dev_factor());
    sample < mean
}

/// Outcome of firing one weapon at one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotOutcome {
    /// The weapon was not yet reloaded.
    NotReady,
    /// Penetration was insufficient to damage the target at all.
    Deflected,
    /// The shot was fired but the hit-chance roll missed.
    Missed,
    /// The shot connected; the caller must still apply
    /// [`apply_damage`] to the target.
    Hit,
}

/// Fire `weapon` at a target with `target_armour`, advancing its reload
/// timer unconditionally (a shot is "spent" the instant it is attempted,
/// matching `Weapon.shoot`'s unconditional `next_firing_time` update).
/// Returns [`ShotOutcome::Hit`] when [`apply_damage`] should be called by
/// the caller (this function does not mutate the target itself, since the
/// caller owns both entities and Rust's borrow rules forbid holding a
/// mutable reference to each at once from here).
pub fn shoot(
    weapon: &mut Weapon,
    now: u64,
    target_armour: u32,
    ctx: &HitChanceContext,
    rng: &mut DeterministicRng,
) -> ShotOutcome {
    weapon.next_firing_time = now + weapon.rate_of_fire.to_num::<u64>().max(1);

    if weapon.penetration < target_armour {
        return ShotOutcome::Deflected;
    }

    let chance = hit_chance(weapon, ctx);
    if roll_to_hit(chance, rng) {
        ShotOutcome::Hit
    } else {
        ShotOutcome::Missed
    }
}

/// Every ready weapon on `shooter` that should fire at `enemy` this tick,
/// per §4.4's `attack(enemy)` contract: "for every loaded weapon (`now >=
/// weapon.next_firing_time`) calls `weapon.shoot(enemy)`". Returns the
/// indices into `weapons` that are ready, leaving the actual `shoot` call
/// to the caller (which holds both the shooter and the target and can
/// satisfy the borrow checker without this function needing to).
#[must_use]
pub fn ready_weapon_indices(weapons: &[Weapon], now: u64) -> Vec<usize> {
    weapons
        .iter()
        .enumerate()
        .filter(|(_, w)| w.ready(now))
        .map(|(i, _)| i)
        .collect()
}

/// Default standard deviation of the damage-roll Gaussian, when no
/// scenario-specific `damage_randomness_factor` override applies.
pub const DEFAULT_DAMAGE_RANDOMNESS_STD_DEV: f64 = 2.0;

/// Apply one hit's damage to `target`, per §4.4's `on_being_damaged`:
/// immortal entities are untouched; otherwise
/// `health -= gauss(damage, damage_randomness) * (1 - max(armour -
/// penetration, 0))`, clamped to `[0, max_health]`. Returns `true` if this
/// hit brought the target to zero health (the caller should then invoke
/// [`crate::simulation::Simulation`]'s `kill` handling — detaching from
/// player/faction, clearing blocked nodes, removing from the spatial
/// index).
pub fn apply_damage(
    target: &mut PlayerEntityCommon,
    damage: u32,
    penetration: u32,
    armour: u32,
    damage_randomness_std_dev: f64,
    rng: &mut DeterministicRng,
) -> bool {
    if target.immortal {
        return false;
    }

    let effectiveness = 1.0 - f64::from(armour.saturating_sub(penetration)).max(0.0);
    let rolled = rng.gauss(f64::from(damage), damage_randomness_std_dev) * effectiveness;
    let rolled_int = rolled.round() as i32;

    target.health = (target.health - rolled_int).clamp(0, target.max_health);
    target.is_dead()
}

/// Preference order for automatic target selection among `known_enemies`
/// when the player has not explicitly assigned one (§4.4's "Target
/// selection": "prefer armed enemies, then lowest health").
#[must_use]
pub fn select_target(
    candidates: &[(EntityId, bool, i32)],
    assigned: Option<EntityId>,
) -> Option<EntityId> {
    if let Some(assigned) = assigned {
        if candidates.iter().any(|(id, ..)| *id == assigned) {
            return Some(assigned);
        }
    }

    candidates
        .iter()
        .min_by_key(|(_, armed, health)| (!*armed, *health))
        .map(|(id, ..)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2Fixed;
    use crate::player::{FactionId, PlayerId};
    use std::collections::HashSet;

    fn sample_weapon() -> Weapon {
        Weapon {
            name: "rifle".to_string(),
            damage: 10,
            penetration: 2,
            accuracy: Fixed::from_num(75),
            range: Fixed::from_num(200),
            rate_of_fire: Fixed::from_num(4),
            next_firing_time: 0,
        }
    }

    fn sample_common() -> PlayerEntityCommon {
        PlayerEntityCommon {
            id: EntityId::new(1),
            player_id: PlayerId::new(0),
            faction_id: FactionId::new(0),
            position: Vec2Fixed::ZERO,
            health: 100,
            max_health: 100,
            cover: Fixed::ZERO,
            visibility_radius: Fixed::from_num(5),
            known_enemies: HashSet::new(),
            enemy_assigned_by_player: None,
            targeted_enemy: None,
            immortal: false,
        }
    }

    #[test]
    fn hit_chance_sums_every_term() {
        let weapon = sample_weapon();
        let ctx = HitChanceContext {
            shooter_experience: Fixed::from_num(100),
            target_is_building: true,
            shooter_moving: true,
            target_moving: true,
            target_is_infantry_penalty: true,
            target_cover: Fixed::from_num(5),
        };
        // 75 + 100*0.05 + 25 - 5 - 25 - 15 - 25 = 35
        assert_eq!(hit_chance(&weapon, &ctx), Fixed::from_num(35));
    }

    #[test]
    fn shoot_sets_next_firing_time_unconditionally() {
        let mut weapon = sample_weapon();
        let ctx = HitChanceContext::default();
        let mut rng = DeterministicRng::new(1);
        let _ = shoot(&mut weapon, 100, 0, &ctx, &mut rng);
        assert_eq!(weapon.next_firing_time, 104);
    }

    #[test]
    fn shoot_deflects_when_penetration_insufficient() {
        let mut weapon = sample_weapon();
        let ctx = HitChanceContext::default();
        let mut rng = DeterministicRng::new(1);
        let outcome = shoot(&mut weapon, 0, 99, &ctx, &mut rng);
        assert_eq!(outcome, ShotOutcome::Deflected);
    }

    #[test]
    fn immortal_target_takes_no_damage() {
        let mut target = sample_common();
        target.immortal = true;
        let mut rng = DeterministicRng::new(1);
        let killed = apply_damage(&mut target, 1000, 0, 0, 2.0, &mut rng);
        assert!(!killed);
        assert_eq!(target.health, 100);
    }

    #[test]
    fn armour_reduces_damage_fully_when_exceeding_penetration() {
        let mut target = sample_common();
        let mut rng = DeterministicRng::new(1);
        // armour(10) - penetration(0) = 10, clamped to max 1.0 effectiveness
        // factor still applied as (1 - 10).max(0)? no: formula is 1 - max(armour-pen,0)
        // armour=1, penetration=0 => effectiveness = 1 - 1 = 0 => no damage.
        let killed = apply_damage(&mut target, 50, 0, 1, 0.0, &mut rng);
        assert!(!killed);
        assert_eq!(target.health, 100);
    }

    #[test]
    fn damage_kills_at_zero_health() {
        let mut target = sample_common();
        target.health = 5;
        let mut rng = DeterministicRng::new(1);
        let killed = apply_damage(&mut target, 50, 0, 0, 0.0, &mut rng);
        assert!(killed);
        assert_eq!(target.health, 0);
    }

    #[test]
    fn select_target_prefers_assigned_if_still_present() {
        let candidates = vec![(EntityId::new(1), true, 50), (EntityId::new(2), true, 10)];
        let chosen = select_target(&candidates, Some(EntityId::new(1)));
        assert_eq!(chosen, Some(EntityId::new(1)));
    }

    #[test]
    fn select_target_prefers_armed_then_lowest_health() {
        let candidates = vec![
            (EntityId::new(1), false, 5),
            (EntityId::new(2), true, 80),
            (EntityId::new(3), true, 20),
        ];
        let chosen = select_target(&candidates, None);
        assert_eq!(chosen, Some(EntityId::new(3)));
    }

    #[test]
    fn ready_weapon_indices_filters_by_reload_timer() {
        let mut w1 = sample_weapon();
        w1.next_firing_time = 50;
        let mut w2 = sample_weapon();
        w2.next_firing_time = 200;
        let ready = ready_weapon_indices(&[w1, w2], 100);
        assert_eq!(ready, vec![0]);
    }
}
