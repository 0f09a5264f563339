// Skill templates, per-player inventory and the progression rules built on them.

pub mod bonus;
pub mod catalog;
pub mod inventory;
pub mod progression;

pub use bonus::{EffectiveSkill, effective_skill};
pub use catalog::{Attribute, Grade, SkillCatalog, SkillDefinition, SkillEffects, SkillId};
pub use inventory::{Acquired, ActiveSlot, SkillInventory};
pub use progression::Synthesis;
