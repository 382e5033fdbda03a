use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use anyhow::{ensure, Context, Result};
use pps_model::{
    DataKind, FixedEffect, GroupName, Location, Material, NoteColor, OrdinaryColor, Owner,
    ParticleData, ParticleDefinition, ParticleEffect, ParticleGroup, ParticleStyle, UserRecord,
    DEFAULT_BLOCK_MATERIAL, DEFAULT_ITEM_MATERIAL,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Statement};
use uuid::Uuid;

const PARTICLE_COLUMNS: &str =
    "p.id,p.effect,p.style,p.item_material,p.block_material,p.note,p.r,p.g,p.b";

const INSERT_PARTICLE: &str = "INSERT INTO particles(uuid,group_uuid,id,effect,style,item_material,block_material,note,r,g,b) \
     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)";

/// Result of [`ParticleStore::load_record`].
#[derive(Debug)]
pub struct LoadedRecord {
    pub record: UserRecord,
    /// The owner had no active group and an empty one was written.
    pub created_active_group: bool,
}

/// Group / fixed-effect operations over a borrowed connection. Every
/// multi-statement write runs inside a single transaction.
pub struct ParticleStore<'c> {
    conn: &'c Connection,
}

impl<'c> ParticleStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS groups (
              uuid TEXT PRIMARY KEY,
              owner_uuid TEXT NOT NULL,
              name TEXT NOT NULL,
              -- GroupName::key() of name
              name_key TEXT NOT NULL,
              UNIQUE (owner_uuid, name_key)
            );
            CREATE INDEX IF NOT EXISTS idx_groups_owner ON groups(owner_uuid);

            -- group_uuid is NULL for particles embedded in a fixed effect
            CREATE TABLE IF NOT EXISTS particles (
              uuid TEXT PRIMARY KEY,
              group_uuid TEXT REFERENCES groups(uuid),
              id INTEGER NOT NULL,
              effect TEXT NOT NULL,
              style TEXT NOT NULL,
              item_material TEXT NOT NULL,
              block_material TEXT NOT NULL,
              note INTEGER NOT NULL,
              r INTEGER NOT NULL,
              g INTEGER NOT NULL,
              b INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_particles_group ON particles(group_uuid);

            CREATE TABLE IF NOT EXISTS fixed_effects (
              owner_uuid TEXT NOT NULL,
              id INTEGER NOT NULL,
              particle_uuid TEXT NOT NULL REFERENCES particles(uuid),
              world TEXT NOT NULL,
              x REAL NOT NULL,
              y REAL NOT NULL,
              z REAL NOT NULL,
              PRIMARY KEY (owner_uuid, id)
            );
            "#,
        )?;
        Ok(())
    }

    /// All groups of `owner` with their particles. Groups without particles
    /// are included.
    pub fn load_groups(&self, owner: Owner) -> Result<Vec<ParticleGroup>> {
        let sql = format!(
            "SELECT g.uuid,g.name,{PARTICLE_COLUMNS} FROM groups g \
             LEFT JOIN particles p ON p.group_uuid = g.uuid \
             WHERE g.owner_uuid = ?1 ORDER BY g.uuid, p.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![owner.to_string()])?;
        let mut staged: BTreeMap<String, (GroupName, Vec<ParticleDefinition>)> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let uuid: String = row.get(0)?;
            let entry = match staged.entry(uuid) {
                Entry::Occupied(o) => o.into_mut(),
                Entry::Vacant(v) => {
                    let name: String = row.get(1)?;
                    let name = GroupName::from_stored(&name)
                        .with_context(|| format!("group '{name}' of {owner}"))?;
                    v.insert((name, Vec::new()))
                }
            };
            if row.get::<_, Option<u32>>(2)?.is_some() {
                entry.1.push(particle_from_row(owner, row, 2)?);
            }
        }
        staged
            .into_values()
            .map(|(name, particles)| Ok(ParticleGroup::new(owner, name, particles)?))
            .collect()
    }

    pub fn load_fixed_effects(&self, owner: Owner) -> Result<Vec<FixedEffect>> {
        let sql = format!(
            "SELECT f.id,f.world,f.x,f.y,f.z,{PARTICLE_COLUMNS} FROM fixed_effects f \
             JOIN particles p ON p.uuid = f.particle_uuid \
             WHERE f.owner_uuid = ?1 ORDER BY f.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![owner.to_string()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let id: u32 = row.get(0)?;
            let world: String = row.get(1)?;
            let location = Location::new(&world, row.get(2)?, row.get(3)?, row.get(4)?)?;
            let particle = particle_from_row(owner, row, 5)?;
            out.push(FixedEffect::new(owner, id, location, particle)?);
        }
        Ok(out)
    }

    /// Groups then fixed effects; writes an empty active group when the
    /// owner has none, so a loaded record always carries one.
    pub fn load_record(&self, owner: Owner) -> Result<LoadedRecord> {
        let groups = self.load_groups(owner)?;
        let fixed = self.load_fixed_effects(owner)?;
        let (record, created_active_group) = UserRecord::assemble(owner, groups, fixed)
            .with_context(|| format!("assemble record for {owner}"))?;
        if created_active_group {
            if let Some(active) = record.active_group() {
                self.replace_group(owner, active)?;
            }
        }
        Ok(LoadedRecord {
            record,
            created_active_group,
        })
    }

    /// Inserts the group or replaces the one with the same case-insensitive
    /// name, including its casing and its full particle set.
    pub fn replace_group(&self, owner: Owner, group: &ParticleGroup) -> Result<()> {
        ensure!(
            group.owner() == owner,
            "group '{}' belongs to {}, not {}",
            group.name(),
            group.owner(),
            owner
        );
        let owner_s = owner.to_string();
        let tx = self.conn.unchecked_transaction()?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT uuid FROM groups WHERE owner_uuid = ?1 AND name_key = ?2",
                params![owner_s, group.name().key()],
                |row| row.get(0),
            )
            .optional()?;
        let group_uuid = match existing {
            Some(uuid) => {
                tx.execute(
                    "UPDATE groups SET name = ?1, name_key = ?2 WHERE uuid = ?3",
                    params![group.name().as_str(), group.name().key(), uuid],
                )?;
                tx.execute("DELETE FROM particles WHERE group_uuid = ?1", params![uuid])?;
                uuid
            }
            None => {
                let uuid = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO groups(uuid,owner_uuid,name,name_key) VALUES (?1,?2,?3,?4)",
                    params![uuid, owner_s, group.name().as_str(), group.name().key()],
                )?;
                uuid
            }
        };
        {
            let mut stmt = tx.prepare(INSERT_PARTICLE)?;
            for particle in group.particles() {
                insert_particle(&mut stmt, Some(&group_uuid), particle)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Returns whether a group existed.
    pub fn delete_group(&self, owner: Owner, name: &GroupName) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT uuid FROM groups WHERE owner_uuid = ?1 AND name_key = ?2",
                params![owner.to_string(), name.key()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(uuid) = existing else {
            return Ok(false);
        };
        tx.execute("DELETE FROM particles WHERE group_uuid = ?1", params![uuid])?;
        tx.execute("DELETE FROM groups WHERE uuid = ?1", params![uuid])?;
        tx.commit()?;
        Ok(true)
    }

    pub fn insert_fixed_effect(&self, effect: &FixedEffect) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let particle_uuid = {
            let mut stmt = tx.prepare(INSERT_PARTICLE)?;
            insert_particle(&mut stmt, None, effect.particle())?
        };
        let location = effect.location();
        tx.execute(
            "INSERT INTO fixed_effects(owner_uuid,id,particle_uuid,world,x,y,z) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                effect.owner().to_string(),
                effect.id(),
                particle_uuid,
                location.world(),
                location.x(),
                location.y(),
                location.z()
            ],
        )
        .with_context(|| format!("insert fixed effect {} of {}", effect.id(), effect.owner()))?;
        tx.commit()?;
        Ok(())
    }

    /// Returns whether a fixed effect existed.
    pub fn delete_fixed_effect(&self, owner: Owner, id: u32) -> Result<bool> {
        let owner_s = owner.to_string();
        let tx = self.conn.unchecked_transaction()?;
        let particle_uuid: Option<String> = tx
            .query_row(
                "SELECT particle_uuid FROM fixed_effects WHERE owner_uuid = ?1 AND id = ?2",
                params![owner_s, id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(particle_uuid) = particle_uuid else {
            return Ok(false);
        };
        tx.execute(
            "DELETE FROM fixed_effects WHERE owner_uuid = ?1 AND id = ?2",
            params![owner_s, id],
        )?;
        tx.execute("DELETE FROM particles WHERE uuid = ?1", params![particle_uuid])?;
        tx.commit()?;
        Ok(true)
    }

    pub fn count_owners(&self) -> Result<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(DISTINCT owner_uuid) FROM groups",
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}

fn insert_particle(
    stmt: &mut Statement<'_>,
    group_uuid: Option<&str>,
    particle: &ParticleDefinition,
) -> Result<String> {
    let uuid = Uuid::new_v4().to_string();
    // unused payload columns keep neutral defaults
    let item = match particle.data() {
        ParticleData::Item(m) => m.as_str(),
        _ => DEFAULT_ITEM_MATERIAL,
    };
    let block = match particle.data() {
        ParticleData::Block(m) => m.as_str(),
        _ => DEFAULT_BLOCK_MATERIAL,
    };
    let note = particle.note().map(|n| n.note()).unwrap_or(0);
    let color = particle.color().unwrap_or(OrdinaryColor::BLACK);
    stmt.execute(params![
        uuid,
        group_uuid,
        particle.id(),
        particle.effect().name(),
        particle.style().name(),
        item,
        block,
        note,
        color.red(),
        color.green(),
        color.blue()
    ])?;
    Ok(uuid)
}

/// Decodes the nine particle columns starting at `base`.
fn particle_from_row(owner: Owner, row: &Row<'_>, base: usize) -> Result<ParticleDefinition> {
    let id: u32 = row.get(base)?;
    let effect: ParticleEffect = row.get::<_, String>(base + 1)?.parse()?;
    let style: ParticleStyle = row.get::<_, String>(base + 2)?.parse()?;
    let data = match effect.data_kind() {
        DataKind::None => ParticleData::None,
        DataKind::ItemMaterial => {
            ParticleData::Item(Material::new(&row.get::<_, String>(base + 3)?)?)
        }
        DataKind::BlockMaterial => {
            ParticleData::Block(Material::new(&row.get::<_, String>(base + 4)?)?)
        }
        DataKind::Note => ParticleData::Note(NoteColor::new(row.get(base + 5)?)?),
        DataKind::Color => ParticleData::Color(OrdinaryColor::new(
            row.get(base + 6)?,
            row.get(base + 7)?,
            row.get(base + 8)?,
        )?),
    };
    Ok(ParticleDefinition::new(owner, id, effect, style, data)?)
}
