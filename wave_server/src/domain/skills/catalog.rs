// Immutable skill templates keyed by (attribute, grade).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Attribute {
    Fire,
    Frost,
    Storm,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Fire, Attribute::Frost, Attribute::Storm];

    const fn code(self) -> u32 {
        match self {
            Attribute::Fire => 1,
            Attribute::Frost => 2,
            Attribute::Storm => 3,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.code() == code)
    }
}

/// Power tier. Only the lowest grade can be drawn; the rest come from synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Grade {
    pub const LOWEST: Grade = Grade::Common;
    pub const MAX: Grade = Grade::Legendary;

    pub const fn rank(self) -> u32 {
        match self {
            Grade::Common => 1,
            Grade::Rare => 2,
            Grade::Epic => 3,
            Grade::Legendary => 4,
        }
    }

    fn from_rank(rank: u32) -> Option<Self> {
        match rank {
            1 => Some(Grade::Common),
            2 => Some(Grade::Rare),
            3 => Some(Grade::Epic),
            4 => Some(Grade::Legendary),
            _ => None,
        }
    }

    /// The tier synthesis promotes into, or `None` at the top.
    pub fn next(self) -> Option<Self> {
        Self::from_rank(self.rank() + 1)
    }
}

/// Stable skill key: `grade * 100 + attribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(pub u32);

impl SkillId {
    pub const fn from_parts(attribute: Attribute, grade: Grade) -> Self {
        Self(grade.rank() * 100 + attribute.code())
    }

    pub fn attribute(self) -> Option<Attribute> {
        Attribute::from_code(self.0 % 100)
    }

    pub fn grade(self) -> Option<Grade> {
        Grade::from_rank(self.0 / 100)
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Special-effect flags carried by a skill and copied onto its projectiles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkillEffects {
    pub piercing: bool,
    /// Splash radius around the primary hit point, if the skill deals area damage.
    pub area_radius: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillDefinition {
    pub id: SkillId,
    pub name: &'static str,
    pub attribute: Attribute,
    pub grade: Grade,
    pub damage: f32,
    /// Seconds between uses.
    pub cooldown: f32,
    pub range: f32,
    pub speed: f32,
    pub effects: SkillEffects,
}

/// Read-only table of every skill a session can grant.
#[derive(Debug, Clone)]
pub struct SkillCatalog {
    // Sorted by id so tier scans are deterministic.
    definitions: Vec<SkillDefinition>,
}

const GRADE_DAMAGE: [f32; 4] = [1.0, 1.8, 3.0, 5.0];
const GRADE_COOLDOWN: [f32; 4] = [1.0, 0.9, 0.8, 0.7];
const GRADE_RANGE: [f32; 4] = [1.0, 1.1, 1.2, 1.3];

impl SkillCatalog {
    pub fn from_definitions(mut definitions: Vec<SkillDefinition>) -> Self {
        definitions.sort_by_key(|d| d.id);
        definitions.dedup_by_key(|d| d.id);
        Self { definitions }
    }

    /// The shipped 3 attributes x 4 grades table.
    pub fn standard() -> Self {
        let mut definitions = Vec::with_capacity(12);
        for attribute in Attribute::ALL {
            let (names, damage, cooldown, range, speed) = match attribute {
                Attribute::Fire => (
                    ["Ember Bolt", "Fireball", "Inferno", "Meteor"],
                    12.0,
                    1.2,
                    260.0,
                    420.0,
                ),
                Attribute::Frost => (
                    ["Frost Shard", "Ice Lance", "Blizzard", "Absolute Zero"],
                    9.0,
                    1.0,
                    240.0,
                    360.0,
                ),
                Attribute::Storm => (
                    ["Spark", "Chain Lightning", "Thunderstrike", "Tempest"],
                    7.0,
                    0.7,
                    300.0,
                    560.0,
                ),
            };

            for (index, grade) in [Grade::Common, Grade::Rare, Grade::Epic, Grade::Legendary]
                .into_iter()
                .enumerate()
            {
                definitions.push(SkillDefinition {
                    id: SkillId::from_parts(attribute, grade),
                    name: names[index],
                    attribute,
                    grade,
                    damage: damage * GRADE_DAMAGE[index],
                    cooldown: cooldown * GRADE_COOLDOWN[index],
                    range: range * GRADE_RANGE[index],
                    speed,
                    effects: native_effects(attribute, grade),
                });
            }
        }
        Self::from_definitions(definitions)
    }

    pub fn get(&self, id: SkillId) -> Option<&SkillDefinition> {
        self.definitions
            .binary_search_by_key(&id, |d| d.id)
            .ok()
            .map(|index| &self.definitions[index])
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn tier(&self, grade: Grade) -> impl Iterator<Item = &SkillDefinition> {
        self.definitions.iter().filter(move |d| d.grade == grade)
    }
}

// High tiers come with built-in effects; stacking can add more.
fn native_effects(attribute: Attribute, grade: Grade) -> SkillEffects {
    match (attribute, grade) {
        (Attribute::Storm, Grade::Epic | Grade::Legendary) => SkillEffects {
            piercing: true,
            area_radius: None,
        },
        (Attribute::Fire, Grade::Epic) => SkillEffects {
            piercing: false,
            area_radius: Some(50.0),
        },
        (Attribute::Fire, Grade::Legendary) => SkillEffects {
            piercing: false,
            area_radius: Some(80.0),
        },
        (Attribute::Frost, Grade::Legendary) => SkillEffects {
            piercing: true,
            area_radius: Some(60.0),
        },
        _ => SkillEffects::default(),
    }
}
