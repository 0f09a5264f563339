// Per-player owned-skill records and the active slot table.

use super::catalog::SkillId;
use crate::domain::error::PreconditionFailure;
use std::collections::BTreeMap;

/// One auto-fire slot: the skill it holds and when it may fire next (session seconds).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActiveSlot {
    pub skill: Option<SkillId>,
    pub ready_at: f64,
}

impl ActiveSlot {
    pub fn is_ready(&self, now: f64) -> bool {
        now >= self.ready_at
    }
}

/// Result of a successful acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
    pub skill: SkillId,
    pub stack: u8,
    /// Slot assigned on first acquisition, if one was free.
    pub slot: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SkillInventory {
    stacks: BTreeMap<SkillId, u8>,
    slots: Vec<ActiveSlot>,
}

impl SkillInventory {
    pub fn new(slot_capacity: usize) -> Self {
        Self {
            stacks: BTreeMap::new(),
            slots: vec![ActiveSlot::default(); slot_capacity],
        }
    }

    /// Inventory as replicated: owned stacks plus the skill held by each slot.
    /// Slots naming an unowned skill come back empty.
    pub fn restore(slot_capacity: usize, stacks: &[(SkillId, u8)], slots: &[Option<SkillId>]) -> Self {
        let mut inventory = Self::new(slot_capacity);
        inventory.stacks = stacks.iter().copied().filter(|(_, n)| *n > 0).collect();
        for (slot, skill) in inventory.slots.iter_mut().zip(slots) {
            slot.skill = skill.filter(|s| inventory.stacks.contains_key(s));
        }
        inventory
    }

    pub fn stack(&self, skill: SkillId) -> u8 {
        self.stacks.get(&skill).copied().unwrap_or(0)
    }

    pub fn owned(&self) -> impl Iterator<Item = (SkillId, u8)> + '_ {
        self.stacks.iter().map(|(id, stack)| (*id, *stack))
    }

    pub fn slots(&self) -> &[ActiveSlot] {
        &self.slots
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut ActiveSlot> {
        self.slots.get_mut(index)
    }

    pub fn slot_of(&self, skill: SkillId) -> Option<usize> {
        self.slots.iter().position(|s| s.skill == Some(skill))
    }

    /// Adds one stack. A first acquisition takes the first free slot; at the cap nothing changes.
    pub fn acquire(&mut self, skill: SkillId, max_stack: u8) -> Result<Acquired, PreconditionFailure> {
        let current = self.stack(skill);
        if current >= max_stack {
            return Err(PreconditionFailure::StackCapReached {
                skill,
                max: max_stack,
            });
        }

        let stack = current + 1;
        self.stacks.insert(skill, stack);

        let slot = if current == 0 {
            self.assign_free_slot(skill)
        } else {
            None
        };

        Ok(Acquired { skill, stack, slot })
    }

    /// Removes `amount` stacks, dropping the record and its slot when nothing is left.
    pub fn consume(&mut self, skill: SkillId, amount: u8) -> Result<u8, PreconditionFailure> {
        let current = self.stack(skill);
        if current == 0 {
            return Err(PreconditionFailure::NotOwned(skill));
        }
        if current < amount {
            return Err(PreconditionFailure::BelowSynthesisThreshold {
                skill,
                stack: current,
                threshold: amount,
            });
        }

        let remaining = current - amount;
        if remaining == 0 {
            self.stacks.remove(&skill);
            self.evict(skill);
        } else {
            self.stacks.insert(skill, remaining);
        }
        Ok(remaining)
    }

    /// Clears every slot holding `skill`.
    pub fn evict(&mut self, skill: SkillId) {
        for slot in self.slots.iter_mut().filter(|s| s.skill == Some(skill)) {
            *slot = ActiveSlot::default();
        }
    }

    fn assign_free_slot(&mut self, skill: SkillId) -> Option<usize> {
        let index = self.slots.iter().position(|s| s.skill.is_none())?;
        self.slots[index] = ActiveSlot {
            skill: Some(skill),
            ready_at: 0.0,
        };
        Some(index)
    }
}
