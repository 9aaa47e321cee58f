//! Shared test harness: an in-memory world with a deterministic formula
//! engine and channel-backed sessions, so tests drive the simulation
//! exactly like the tick thread does.

#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use runegated::config::Config;
use runegated::data::{
    DataTables, ItemKind, ItemTemplate, MapData, MapGrid, NpcTemplate, SkillTarget, SkillTemplate,
    UseKind,
};
use runegated::db::Database;
use runegated::game::Env;
use runegated::net::{Session, SessionRegistry, SessionState};
use runegated::script::{
    AiCommand, AiContext, AttackOutcome, BuffEffect, EnchantContext, EnchantOutcome, FormulaEngine,
    LevelUpGain, MeleeContext, PotionEffect, ResurrectEffect, SkillDamageContext,
    SkillDamageOutcome,
};
use runegated::world::{ItemInstance, Player, World};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Test map id.
pub const MAP: u32 = 4;
/// A one-handed sword template.
pub const SWORD: u32 = 1;
/// A chest piece with stat bonuses.
pub const PLATE: u32 = 20011;
/// The orc every combat test kills.
pub const ORC: u32 = 45001;

/// Deterministic engine: every swing hits for `damage`, buffs follow a
/// small fixed table, nothing rolls dice.
pub struct FixedEngine {
    pub damage: i32,
}

impl FormulaEngine for FixedEngine {
    fn calc_melee_attack(&self, _ctx: MeleeContext) -> AttackOutcome {
        AttackOutcome {
            damage: self.damage,
            hit: true,
        }
    }

    fn calc_ranged_attack(&self, ctx: MeleeContext) -> AttackOutcome {
        self.calc_melee_attack(ctx)
    }

    fn calc_skill_damage(&self, _ctx: SkillDamageContext) -> SkillDamageOutcome {
        SkillDamageOutcome {
            damage: self.damage,
            hit_count: 1,
            drain_mp: 0,
        }
    }

    fn calc_heal(&self, value: i32, _dice: i32, _count: i32, _int: i32, _sp: i32) -> i32 {
        value
    }

    fn calc_level_up(&self, _class: u8, _con: i32, _wis: i32) -> LevelUpGain {
        LevelUpGain { hp: 10, mp: 5 }
    }

    fn level_from_exp(&self, exp: u64) -> u16 {
        (exp / 1000 + 1).min(99) as u16
    }

    fn exp_for_level(&self, level: u16) -> u64 {
        (level as u64 - 1) * 1000
    }

    fn calc_death_exp_penalty(&self, _level: u16, exp: u64) -> u64 {
        exp
    }

    fn potion_effect(&self, _item_id: u32) -> Option<PotionEffect> {
        None
    }

    fn buff_effect(&self, skill_id: u16, _level: u16) -> BuffEffect {
        let mut e = BuffEffect::default();
        match skill_id {
            // Shield-style stat buff.
            3 => {
                e.duration_secs = 60;
                e.deltas.str_ = 5;
                e.deltas.ac = -2;
                e.deltas.max_hp = 30;
            }
            // Haste.
            43 => {
                e.duration_secs = 20;
                e.flags.move_speed = Some(1);
                e.exclusions = vec![54];
            }
            // Greater haste.
            54 => {
                e.duration_secs = 20;
                e.flags.move_speed = Some(2);
                e.exclusions = vec![43];
            }
            // Invisibility.
            60 => {
                e.duration_secs = 60;
                e.flags.invisible = true;
            }
            // Counter barrier.
            91 => {
                e.duration_secs = 120;
            }
            // Freeze.
            157 => {
                e.duration_secs = 30;
                e.flags.paralyzed = true;
            }
            _ => {}
        }
        e
    }

    fn resurrect_effect(&self, _skill_id: u16) -> ResurrectEffect {
        ResurrectEffect { hp_ratio_pct: 10 }
    }

    fn is_non_cancellable(&self, _skill_id: u16) -> bool {
        false
    }

    fn respawn_location(&self, _map: u32) -> (u32, i32, i32) {
        (MAP, 10, 10)
    }

    fn run_npc_ai(&self, _ctx: &AiContext) -> Vec<AiCommand> {
        Vec::new()
    }

    fn calc_enchant(&self, _ctx: EnchantContext) -> EnchantOutcome {
        EnchantOutcome::Fail
    }

    fn pk_lawful_penalty(&self, _victim_lawful: i32) -> i32 {
        0
    }

    fn pk_item_drop(&self, _lawful: i32) -> u32 {
        0
    }

    fn hp_regen_amount(&self, _level: u16, _con: i32) -> i32 {
        0
    }

    fn mp_regen_amount(&self, _level: u16, _wis: i32) -> i32 {
        0
    }

    fn turn_undead_chance(&self, _caster_level: u16, _target_level: u16) -> i32 {
        0
    }
}

fn base_item(item_id: u32, name: &str) -> ItemTemplate {
    ItemTemplate {
        item_id,
        name: name.to_string(),
        kind: ItemKind::Etc,
        use_kind: UseKind::None,
        weight: 10,
        dmg_small: 0,
        dmg_large: 0,
        hit_mod: 0,
        dmg_mod: 0,
        ac: 0,
        two_handed: false,
        ranged: false,
        arrow: false,
        stackable: false,
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
    }
}

pub fn tables() -> DataTables {
    let mut t = DataTables::new();

    let mut sword = base_item(SWORD, "long sword");
    sword.kind = ItemKind::Weapon;
    sword.dmg_small = 20;
    sword.dmg_large = 40;
    sword.slot = Some(runegated::data::EquipSlot::Weapon);
    sword.max_durability = 100;
    t.insert_item(sword);

    let mut plate = base_item(PLATE, "plate mail");
    plate.kind = ItemKind::Armor;
    plate.ac = 8;
    plate.add_str = 2;
    plate.add_hp = 20;
    plate.slot = Some(runegated::data::EquipSlot::Armor);
    t.insert_item(plate);

    let mut adena = base_item(runegated::world::ADENA, "adena");
    adena.stackable = true;
    adena.weight = 0;
    t.insert_item(adena);

    t.insert_npc(NpcTemplate {
        npc_id: ORC,
        name: "orc".into(),
        gfx: 61,
        level: 8,
        hp: 10,
        mp: 0,
        ac: 6,
        mr: 0,
        str_: 12,
        dex: 10,
        exp: 100,
        lawful: -80,
        aggro: true,
        ranged: 1,
        atk_speed_ticks: 6,
        move_speed_ticks: 3,
        poison_atk: 0,
        is_guard: false,
        undead: false,
        big: false,
        wander_dist: 6,
        skills: vec![],
        elemental_mr: None,
        respawn_delay_secs: 30,
    });

    for (skill_id, name) in [(3u16, "shield"), (43, "haste"), (54, "greater haste")] {
        t.insert_skill(SkillTemplate {
            skill_id,
            name: name.into(),
            target: SkillTarget::Buff,
            mp_cost: 2,
            hp_cost: 0,
            material: None,
            ranged: 3,
            area: 0,
            buff_duration: 20,
            reuse_delay_ms: 1000,
            dice: 0,
            dice_count: 0,
            value: 0,
            type_: 0,
            act_id: 0,
            gfx_id: 0,
            magic: true,
        });
    }

    t
}

/// A connected fake client: the session plus the writer-task receiver.
pub struct TestClient {
    pub session: Arc<Session>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl TestClient {
    /// Flush the session and return the opcode of every framed payload.
    pub fn drain_opcodes(&mut self) -> Vec<u8> {
        self.session.flush();
        let mut ops = Vec::new();
        while let Ok(chunk) = self.rx.try_recv() {
            let mut buf = BytesMut::from(&chunk[..]);
            while let Ok(Some(payload)) = runegate_proto::frame::split_frame(&mut buf) {
                if !payload.is_empty() {
                    ops.push(payload[0]);
                }
            }
        }
        ops
    }

    /// Full payloads instead of bare opcodes.
    pub fn drain_payloads(&mut self) -> Vec<Bytes> {
        self.session.flush();
        let mut out = Vec::new();
        while let Ok(chunk) = self.rx.try_recv() {
            let mut buf = BytesMut::from(&chunk[..]);
            while let Ok(Some(payload)) = runegate_proto::frame::split_frame(&mut buf) {
                out.push(payload);
            }
        }
        out
    }
}

pub struct Harness {
    pub world: World,
    pub env: Env,
}

impl Harness {
    /// World + Env with the fixed engine dealing `damage` per swing.
    pub fn new(damage: i32) -> Self {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let handle = rt.handle().clone();
        let db = handle.block_on(Database::new(":memory:")).unwrap();
        // Leaked so the handle stays usable for the test's lifetime.
        std::mem::forget(rt);

        let config: Config = toml::from_str(
            r#"
            [server]
            name = "runegate-test"
            metrics_port = 0

            [listen]
            addr = "127.0.0.1:0"
            "#,
        )
        .unwrap();

        let mut map_data = MapData::new();
        map_data.insert(MapGrid::new(MAP, 0, 0, 1000, 1000));

        let env = Env {
            config: Arc::new(config),
            tables: Arc::new(tables()),
            engine: Arc::new(FixedEngine { damage }),
            sessions: Arc::new(SessionRegistry::new()),
            db,
            rt: handle,
        };
        Self {
            world: World::new(map_data),
            env,
        }
    }

    /// Create a session and an in-world player bound to it.
    pub fn join_player(&mut self, char_id: u32, x: i32, y: i32) -> (TestClient, u64) {
        let (session, _tx, rx) = self
            .env
            .sessions
            .create("127.0.0.1:0".parse().unwrap(), 64);
        session.set_state(SessionState::InWorld);
        let session_id = session.id;

        let mut p = Player::new(char_id, session_id, "acc".into(), format!("hero{char_id}"));
        p.map = MAP;
        p.x = x;
        p.y = y;
        p.level = 10;
        p.exp = 9000;
        p.max_hp = 100;
        p.cur_hp = 100;
        p.max_mp = 50;
        p.cur_mp = 50;
        self.world.add_player(p);

        (TestClient { session, rx }, session_id)
    }

    /// Hand a player the test sword, equipped.
    pub fn arm_player(&mut self, char_id: u32) {
        let obj_id = self.world.alloc_obj_id();
        let p = self.world.players.get_mut(&char_id).unwrap();
        p.inventory.add(
            ItemInstance {
                obj_id,
                item_id: SWORD,
                count: 1,
                enchant: 0,
                identified: true,
                durability: 100,
            },
            &self.env.tables,
        );
        p.inventory.set_equipped(
            runegated::data::EquipSlot::Weapon,
            obj_id,
            Default::default(),
        );
    }

    /// Spawn the test orc and return its object id.
    pub fn spawn_orc(&mut self, x: i32, y: i32) -> u32 {
        runegated::game::respawn::spawn_npc(&mut self.world, &self.env, ORC, MAP, x, y).unwrap()
    }
}
