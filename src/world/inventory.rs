//! Item instances, inventories, and equipment slots.

use crate::data::{DataTables, EquipSlot, ItemTemplate};
use crate::script::StatDeltas;
use std::collections::HashMap;

/// The money item.
pub const ADENA: u32 = 40308;

/// Mithril, the alternative warehouse fee currency.
pub const MITHRIL: u32 = 40494;

/// Inventory capacity in distinct stacks.
pub const MAX_SLOTS: usize = 180;

/// One concrete item in the world: in a bag, a warehouse, a trade window,
/// or on the ground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInstance {
    /// World-unique object id; survives trades and warehouse round-trips.
    pub obj_id: u32,
    pub item_id: u32,
    pub count: u32,
    pub enchant: i32,
    pub identified: bool,
    pub durability: i32,
}

impl ItemInstance {
    /// Display line: enchant prefix when identified, bare name otherwise.
    pub fn describe(&self, t: &ItemTemplate) -> String {
        if !self.identified {
            return t.name.clone();
        }
        if self.enchant != 0 {
            format!("{:+} {}", self.enchant, t.name)
        } else {
            t.name.clone()
        }
    }
}

/// A player's bag plus worn equipment.
///
/// Equipment references bag items by object id; the two writes at save
/// time keep that referential integrity (items first, slots second).
#[derive(Debug, Default)]
pub struct Inventory {
    items: Vec<ItemInstance>,
    equipped: HashMap<EquipSlot, u32>,
    /// Recorded per-slot stat deltas, subtracted on unequip.
    equip_deltas: HashMap<EquipSlot, StatDeltas>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ItemInstance] {
        &self.items
    }

    pub fn get(&self, obj_id: u32) -> Option<&ItemInstance> {
        self.items.iter().find(|i| i.obj_id == obj_id)
    }

    pub fn get_mut(&mut self, obj_id: u32) -> Option<&mut ItemInstance> {
        self.items.iter_mut().find(|i| i.obj_id == obj_id)
    }

    /// Whether another stack fits.
    pub fn has_room(&self) -> bool {
        self.items.len() < MAX_SLOTS
    }

    /// Add an item, merging into an existing stack when the template is
    /// stackable. Returns the resident object id.
    pub fn add(&mut self, item: ItemInstance, tables: &DataTables) -> u32 {
        let stackable = tables.item(item.item_id).is_some_and(|t| t.stackable);
        if stackable {
            if let Some(existing) = self.items.iter_mut().find(|i| i.item_id == item.item_id) {
                existing.count += item.count;
                return existing.obj_id;
            }
        }
        let id = item.obj_id;
        self.items.push(item);
        id
    }

    /// Remove a whole instance by object id.
    pub fn remove(&mut self, obj_id: u32) -> Option<ItemInstance> {
        let idx = self.items.iter().position(|i| i.obj_id == obj_id)?;
        if self.equipped.values().any(|&e| e == obj_id) {
            return None;
        }
        Some(self.items.remove(idx))
    }

    /// Split `count` off an instance, removing it entirely when drained.
    /// Returns the detached portion.
    pub fn take(&mut self, obj_id: u32, count: u32, next_obj_id: u32) -> Option<ItemInstance> {
        let idx = self.items.iter().position(|i| i.obj_id == obj_id)?;
        if self.equipped.values().any(|&e| e == obj_id) {
            return None;
        }
        let item = &mut self.items[idx];
        if count == 0 || count > item.count {
            return None;
        }
        if count == item.count {
            return Some(self.items.remove(idx));
        }
        item.count -= count;
        let mut part = item.clone();
        part.obj_id = next_obj_id;
        part.count = count;
        Some(part)
    }

    /// Total count across stacks of a template id.
    pub fn count_of(&self, item_id: u32) -> u32 {
        self.items
            .iter()
            .filter(|i| i.item_id == item_id)
            .map(|i| i.count)
            .sum()
    }

    /// Consume `count` units of a template id across stacks. Fails without
    /// side effects when short.
    pub fn consume(&mut self, item_id: u32, count: u32) -> bool {
        if self.count_of(item_id) < count {
            return false;
        }
        let mut left = count;
        self.items.retain_mut(|i| {
            if left == 0 || i.item_id != item_id {
                return true;
            }
            if i.count > left {
                i.count -= left;
                left = 0;
                true
            } else {
                left -= i.count;
                false
            }
        });
        true
    }

    /// Adena on hand.
    pub fn adena(&self) -> u32 {
        self.count_of(ADENA)
    }

    /// Carried weight in template units.
    pub fn weight(&self, tables: &DataTables) -> u64 {
        self.items
            .iter()
            .map(|i| {
                tables.item(i.item_id).map_or(0, |t| t.weight as u64) * i.count as u64
            })
            .sum()
    }

    /// First arrow stack, for ranged attacks.
    pub fn find_arrow(&self, tables: &DataTables) -> Option<u32> {
        self.items
            .iter()
            .find(|i| tables.item(i.item_id).is_some_and(|t| t.arrow))
            .map(|i| i.obj_id)
    }

    /// Object id worn in a slot.
    pub fn equipped_in(&self, slot: EquipSlot) -> Option<u32> {
        self.equipped.get(&slot).copied()
    }

    pub fn is_equipped(&self, obj_id: u32) -> bool {
        self.equipped.values().any(|&e| e == obj_id)
    }

    /// All (slot, obj_id) pairs currently worn.
    pub fn worn(&self) -> impl Iterator<Item = (EquipSlot, u32)> + '_ {
        self.equipped.iter().map(|(&s, &o)| (s, o))
    }

    /// Mark an item worn and record its deltas. The caller has already
    /// applied the deltas to the player.
    pub fn set_equipped(&mut self, slot: EquipSlot, obj_id: u32, deltas: StatDeltas) {
        self.equipped.insert(slot, obj_id);
        self.equip_deltas.insert(slot, deltas);
    }

    /// Clear a slot, returning the recorded deltas for reversal.
    pub fn clear_equipped(&mut self, slot: EquipSlot) -> Option<(u32, StatDeltas)> {
        let obj = self.equipped.remove(&slot)?;
        let deltas = self.equip_deltas.remove(&slot).unwrap_or_default();
        Some((obj, deltas))
    }

    /// Sum of all worn deltas; persistence subtracts this to store base
    /// values.
    pub fn equip_delta_total(&self) -> StatDeltas {
        let mut total = StatDeltas::default();
        for d in self.equip_deltas.values() {
            add_deltas(&mut total, d);
        }
        total
    }

    /// Weapon currently wielded.
    pub fn weapon(&self) -> Option<&ItemInstance> {
        self.equipped_in(EquipSlot::Weapon).and_then(|o| self.get(o))
    }
}

/// Field-wise accumulate, used by persistence and equip bookkeeping.
pub fn add_deltas(total: &mut StatDeltas, d: &StatDeltas) {
    total.ac += d.ac;
    total.str_ += d.str_;
    total.dex += d.dex;
    total.con += d.con;
    total.int += d.int;
    total.wis += d.wis;
    total.cha += d.cha;
    total.max_hp += d.max_hp;
    total.max_mp += d.max_mp;
    total.hit_mod += d.hit_mod;
    total.dmg_mod += d.dmg_mod;
    total.sp += d.sp;
    total.mr += d.mr;
    total.hpr += d.hpr;
    total.mpr += d.mpr;
    total.bow_hit += d.bow_hit;
    total.bow_dmg += d.bow_dmg;
    total.dodge += d.dodge;
    total.resist_stun += d.resist_stun;
    total.resist_stone += d.resist_stone;
    total.resist_sleep += d.resist_sleep;
    total.resist_freeze += d.resist_freeze;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ItemKind;

    fn tables() -> DataTables {
        let mut t = DataTables::new();
        t.insert_item(ItemTemplate {
            item_id: ADENA,
            name: "adena".into(),
            kind: ItemKind::Etc,
            use_kind: Default::default(),
            weight: 0,
            dmg_small: 0,
            dmg_large: 0,
            hit_mod: 0,
            dmg_mod: 0,
            ac: 0,
            two_handed: false,
            ranged: false,
            arrow: false,
            stackable: true,
            slot: None,
            max_durability: 0,
            add_str: 0,
            add_dex: 0,
            add_con: 0,
            add_int: 0,
            add_wis: 0,
            add_cha: 0,
            add_hp: 0,
            add_mp: 0,
            add_mr: 0,
            gfx: 0,
        });
        t
    }

    fn adena(obj_id: u32, count: u32) -> ItemInstance {
        ItemInstance {
            obj_id,
            item_id: ADENA,
            count,
            enchant: 0,
            identified: true,
            durability: 0,
        }
    }

    #[test]
    fn stackables_merge_on_add() {
        let t = tables();
        let mut inv = Inventory::new();
        inv.add(adena(1, 100), &t);
        inv.add(adena(2, 50), &t);
        assert_eq!(inv.items().len(), 1);
        assert_eq!(inv.adena(), 150);
    }

    #[test]
    fn consume_spans_stacks_and_fails_cleanly() {
        let t = tables();
        let mut inv = Inventory::new();
        inv.add(adena(1, 100), &t);
        assert!(!inv.consume(ADENA, 200));
        assert_eq!(inv.adena(), 100);
        assert!(inv.consume(ADENA, 60));
        assert_eq!(inv.adena(), 40);
    }

    #[test]
    fn take_splits_a_stack() {
        let t = tables();
        let mut inv = Inventory::new();
        inv.add(adena(1, 100), &t);
        let part = inv.take(1, 30, 99).unwrap();
        assert_eq!(part.obj_id, 99);
        assert_eq!(part.count, 30);
        assert_eq!(inv.adena(), 70);

        // Draining the stack removes it.
        let rest = inv.take(1, 70, 100).unwrap();
        assert_eq!(rest.obj_id, 1);
        assert!(inv.items().is_empty());
    }

    #[test]
    fn equipped_items_refuse_removal() {
        let t = tables();
        let mut inv = Inventory::new();
        inv.add(adena(7, 1), &t);
        inv.set_equipped(EquipSlot::Weapon, 7, StatDeltas::default());
        assert!(inv.remove(7).is_none());
        inv.clear_equipped(EquipSlot::Weapon);
        assert!(inv.remove(7).is_some());
    }
}
