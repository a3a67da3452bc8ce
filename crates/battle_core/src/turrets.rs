//! Building turrets.
//!
//! A building with turret definitions for its owner's race gets one gun per
//! definition when the battle starts. Guns are stored per building in
//! definition order; the cascade removes them from the end of that list.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::battle::GroundBattle;
use crate::buildings::{BuildingId, TurretModel};
use crate::combat::{rotate_toward, FireProgress};
use crate::effects::{Explosion, ExplosionKind, SoundEvent};
use crate::error::ViolationKind;
use crate::math::{fixed_serde, Fixed};
use crate::player::PlayerId;
use crate::unit::{Unit, UnitId};

/// Identifier of a building turret.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GunId(pub u32);

impl fmt::Display for GunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gun#{}", self.0)
    }
}

/// A turret mounted on a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gun {
    /// Unique id.
    pub id: GunId,
    /// Owner of the building.
    pub owner: PlayerId,
    /// The building carrying this gun.
    pub building: BuildingId,
    /// Position of the gun in the building's list.
    pub index: usize,
    /// Number of turret definitions of the building.
    pub count: usize,
    /// Turret heading in degrees.
    #[serde(with = "fixed_serde")]
    pub angle: Fixed,
    /// Ticks until the gun can fire again.
    pub cooldown: u32,
    /// Firing animation phase; zero when idle.
    pub fire_phase: u32,
    /// Unit being shot at.
    pub target: Option<UnitId>,
    /// Turret stats.
    pub turret: TurretModel,
}

impl Gun {
    /// A gun only fires when its building gets enough energy for it.
    #[must_use]
    pub fn is_powered(&self, energy_ratio: Fixed) -> bool {
        let available = Fixed::from_num(self.count as u32) * energy_ratio;
        Fixed::from_num(self.index as u32) < available
    }
}

/// Guns of all buildings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GunStorage {
    guns: BTreeMap<GunId, Gun>,
    by_building: BTreeMap<BuildingId, Vec<GunId>>,
    next_id: u32,
}

impl GunStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Create one gun per turret definition.
    pub fn mount(
        &mut self,
        building: BuildingId,
        owner: PlayerId,
        turrets: &[TurretModel],
    ) -> Vec<GunId> {
        let ids: Vec<GunId> = turrets
            .iter()
            .enumerate()
            .map(|(index, turret)| {
                let id = GunId(self.next_id);
                self.next_id += 1;
                self.guns.insert(
                    id,
                    Gun {
                        id,
                        owner,
                        building,
                        index,
                        count: turrets.len(),
                        angle: Fixed::ZERO,
                        cooldown: 0,
                        fire_phase: 0,
                        target: None,
                        turret: turret.clone(),
                    },
                );
                id
            })
            .collect();
        self.by_building.insert(building, ids.clone());
        ids
    }

    /// Remove up to `count` guns from the end of a building's list.
    pub fn remove_last(&mut self, building: BuildingId, count: usize) -> Vec<GunId> {
        let Some(list) = self.by_building.get_mut(&building) else {
            return Vec::new();
        };
        let keep = list.len().saturating_sub(count);
        let removed = list.split_off(keep);
        if list.is_empty() {
            self.by_building.remove(&building);
        }
        for id in &removed {
            self.guns.remove(id);
        }
        removed
    }

    /// Remove all guns of a building.
    pub fn remove_building(&mut self, building: BuildingId) -> Vec<GunId> {
        self.remove_last(building, usize::MAX)
    }

    /// Remove one gun.
    pub fn remove(&mut self, id: GunId) -> Option<Gun> {
        let gun = self.guns.remove(&id)?;
        if let Some(list) = self.by_building.get_mut(&gun.building) {
            list.retain(|g| *g != id);
            if list.is_empty() {
                self.by_building.remove(&gun.building);
            }
        }
        Some(gun)
    }

    /// Guns of a building in list order.
    #[must_use]
    pub fn for_building(&self, building: BuildingId) -> &[GunId] {
        self.by_building.get(&building).map_or(&[], Vec::as_slice)
    }

    /// Get a gun by id.
    #[must_use]
    pub fn get(&self, id: GunId) -> Option<&Gun> {
        self.guns.get(&id)
    }

    /// Get a mutable gun by id.
    pub fn get_mut(&mut self, id: GunId) -> Option<&mut Gun> {
        self.guns.get_mut(&id)
    }

    /// Gun ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<GunId> {
        self.guns.keys().copied().collect()
    }

    /// Iterate guns in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Gun> {
        self.guns.values()
    }

    /// Number of guns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guns.len()
    }

    /// True if there are no guns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guns.is_empty()
    }
}

impl GroundBattle {
    /// Run one tick for every gun.
    pub(crate) fn update_guns(&mut self) {
        for id in self.guns.ids() {
            self.update_gun(id);
        }
    }

    fn update_gun(&mut self, id: GunId) {
        let Some(gun) = self.guns.get(id) else {
            return;
        };
        let Some(building) = self.planet.building(gun.building) else {
            let detail = format!("{id} refers to missing {}", gun.building);
            self.diagnostics.report(ViolationKind::OrphanGun, detail);
            self.guns.remove(id);
            return;
        };
        if !building.complete || !gun.is_powered(building.energy_ratio) {
            return;
        }

        let origin = building.center();
        let owner = gun.owner;
        let reach = |u: &Unit| {
            let distance = building.distance_to(u.position);
            gun.turret.in_range(distance).then_some(distance)
        };
        let target = gun
            .target
            .filter(|t| {
                self.units
                    .alive(*t)
                    .is_some_and(|u| u.owner != owner && reach(u).is_some())
            })
            .or_else(|| self.nearest_enemy_unit(owner, reach));
        let target_position = target.and_then(|t| self.units.get(t)).map(|u| u.position);

        let Some(gun) = self.guns.get_mut(id) else {
            return;
        };
        gun.target = target;
        gun.cooldown = gun.cooldown.saturating_sub(1);

        let progress = if gun.fire_phase > 0 {
            gun.fire_phase += 1;
            if gun.fire_phase >= gun.turret.fire_phases {
                gun.fire_phase = 0;
                Some(FireProgress::Resolve)
            } else {
                None
            }
        } else if let Some(position) = target_position {
            let (angle, aligned) = rotate_toward(
                gun.angle,
                origin.bearing_to(position),
                gun.turret.rotation_step(),
            );
            gun.angle = angle;
            if aligned && gun.cooldown == 0 {
                gun.cooldown = gun.turret.delay;
                if gun.turret.fire_phases <= 1 {
                    Some(FireProgress::Resolve)
                } else {
                    gun.fire_phase = 1;
                    Some(FireProgress::Started)
                }
            } else {
                None
            }
        } else {
            None
        };

        match progress {
            Some(FireProgress::Started) => {
                self.events.sounds.insert(SoundEvent::GunFire);
            }
            Some(FireProgress::Resolve) => self.resolve_gun_hit(id),
            None => {}
        }
    }

    /// The shot lands on the gun's current target, if it is still alive.
    fn resolve_gun_hit(&mut self, id: GunId) {
        let Some(gun) = self.guns.get(id) else {
            return;
        };
        let (owner, damage) = (gun.owner, gun.turret.damage);
        let Some(target) = gun.target.and_then(|t| self.units.alive(t)) else {
            return;
        };
        let (target_id, position) = (target.id, target.position);
        self.events.sounds.insert(SoundEvent::GunFire);
        self.spawn_explosion(Explosion::new(ExplosionKind::Small, position));
        self.damage_unit(target_id, damage, Some(owner));
    }
}
