// Draw and synthesis. Both validate everything before the first write so a
// rejected request leaves the player untouched.

use super::catalog::{Grade, SkillId};
use super::inventory::Acquired;
use crate::domain::context::SessionContext;
use crate::domain::error::{CommandError, MissingReference, PreconditionFailure};
use crate::domain::events::{EventBus, SkillEvent};
use crate::domain::player::SimPlayer;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synthesis {
    pub from: SkillId,
    pub to: SkillId,
    /// Stacks of `from` left after the debit.
    pub remaining: u8,
    pub acquired: Acquired,
}

/// Rolls one weighted-random lowest-grade skill and grants it for the draw cost.
///
/// The cost is only taken once the roll is known to be grantable: a capped roll or an
/// empty draw table changes nothing.
pub fn draw(player: &mut SimPlayer, ctx: &mut SessionContext) -> Result<Acquired, CommandError> {
    player.ensure_alive()?;

    let tuning = &ctx.tuning.skill;
    player.ensure_affordable(tuning.draw_cost)?;

    let (candidates, weights): (Vec<SkillId>, Vec<u32>) = tuning
        .draw_weights
        .iter()
        .map(|w| (SkillId::from_parts(w.attribute, Grade::LOWEST), w.weight))
        .filter(|(id, _)| ctx.catalog.get(*id).is_some())
        .unzip();
    let index = ctx
        .rng
        .pick_weighted(&weights)
        .ok_or(MissingReference::EmptyTier(Grade::LOWEST))?;
    let skill = candidates[index];

    if player.inventory.stack(skill) >= tuning.max_stack {
        debug!(player_id = %player.id, skill_id = %skill, "draw rolled a capped skill");
        return Err(PreconditionFailure::StackCapReached {
            skill,
            max: tuning.max_stack,
        }
        .into());
    }

    player.spend_currency(tuning.draw_cost, &mut ctx.events)?;
    let acquired = player.inventory.acquire(skill, tuning.max_stack)?;
    publish_acquired(player, acquired, &mut ctx.events);
    Ok(acquired)
}

/// Debits `synthesis_threshold` stacks of `skill` for one unit of a random next-grade skill.
pub fn combine(
    player: &mut SimPlayer,
    skill: SkillId,
    ctx: &mut SessionContext,
) -> Result<Synthesis, CommandError> {
    player.ensure_alive()?;

    let tuning = &ctx.tuning.skill;
    let threshold = tuning.synthesis_threshold;
    let stack = player.inventory.stack(skill);
    if stack == 0 {
        return Err(PreconditionFailure::NotOwned(skill).into());
    }
    if stack < threshold {
        return Err(PreconditionFailure::BelowSynthesisThreshold {
            skill,
            stack,
            threshold,
        }
        .into());
    }

    let def = ctx.catalog.get(skill).ok_or(MissingReference::Skill(skill))?;
    let next = def.grade.next().ok_or(PreconditionFailure::MaxGrade(skill))?;

    let tier: Vec<SkillId> = ctx.catalog.tier(next).map(|d| d.id).collect();
    let index = ctx
        .rng
        .pick_index(tier.len())
        .ok_or(MissingReference::EmptyTier(next))?;
    let to = tier[index];

    if player.inventory.stack(to) >= tuning.max_stack {
        return Err(PreconditionFailure::StackCapReached {
            skill: to,
            max: tuning.max_stack,
        }
        .into());
    }

    let remaining = player.inventory.consume(skill, threshold)?;
    let acquired = player.inventory.acquire(to, tuning.max_stack)?;

    ctx.events.publish(SkillEvent::Upgraded {
        player_id: player.id,
        from_id: skill,
        to_id: to,
    });
    publish_acquired(player, acquired, &mut ctx.events);

    Ok(Synthesis {
        from: skill,
        to,
        remaining,
        acquired,
    })
}

fn publish_acquired(player: &SimPlayer, acquired: Acquired, events: &mut EventBus) {
    events.publish(SkillEvent::Acquired {
        player_id: player.id,
        skill_id: acquired.skill,
        new_stack: acquired.stack,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::DomainEvent;
    use crate::domain::ids::{MonsterId, PlayerId};
    use crate::domain::skills::catalog::{Attribute, SkillCatalog, SkillDefinition, SkillEffects};
    use crate::domain::state::Position;
    use crate::domain::tuning::GameTuning;
    use crate::domain::rng::GameRng;
    use std::sync::Arc;

    fn setup() -> (SimPlayer, SessionContext) {
        let ctx = SessionContext::seeded(42);
        let player = SimPlayer::new(
            PlayerId::new(1),
            "Pilot".to_string(),
            Position::default(),
            &ctx.tuning.player,
            ctx.tuning.skill.active_slots,
        );
        (player, ctx)
    }

    fn common(attribute: Attribute) -> SkillId {
        SkillId::from_parts(attribute, Grade::Common)
    }

    fn give(player: &mut SimPlayer, skill: SkillId, stacks: u8) {
        for _ in 0..stacks {
            player.inventory.acquire(skill, 10).expect("acquire");
        }
    }

    #[test]
    fn draw_with_insufficient_currency_changes_nothing() {
        let (mut player, mut ctx) = setup();
        player.currency = 40;

        let err = draw(&mut player, &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Precondition(PreconditionFailure::InsufficientCurrency { .. })
        ));
        assert_eq!(player.currency, 40);
        assert_eq!(player.inventory.owned().count(), 0);
        assert!(ctx.events.pending().is_empty());
    }

    #[test]
    fn draw_spends_cost_and_grants_a_lowest_grade_skill_in_the_first_slot() {
        let (mut player, mut ctx) = setup();
        player.currency = 100;

        let acquired = draw(&mut player, &mut ctx).expect("draw");
        assert_eq!(player.currency, 50);
        assert_eq!(acquired.skill.grade(), Some(Grade::Common));
        assert_eq!(acquired.stack, 1);
        assert_eq!(acquired.slot, Some(0));
        assert!(ctx.events.pending().iter().any(|e| matches!(
            e,
            DomainEvent::Skill(SkillEvent::Acquired { new_stack: 1, .. })
        )));
    }

    #[test]
    fn dead_players_cannot_draw() {
        let (mut player, mut ctx) = setup();
        player.apply_damage(1_000.0, MonsterId::new(1), 1.0, &mut ctx.events);
        let currency = player.currency;

        let err = draw(&mut player, &mut ctx).unwrap_err();
        assert_eq!(err, CommandError::Precondition(PreconditionFailure::ActorDead));
        assert_eq!(player.currency, currency);
    }

    #[test]
    fn draw_of_a_capped_skill_changes_nothing() {
        let (mut player, mut ctx) = setup();
        for attribute in Attribute::ALL {
            give(&mut player, common(attribute), 10);
        }
        player.currency = 50;

        let err = draw(&mut player, &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Precondition(PreconditionFailure::StackCapReached { max: 10, .. })
        ));
        assert_eq!(player.currency, 50);
        for attribute in Attribute::ALL {
            assert_eq!(player.inventory.stack(common(attribute)), 10);
        }
        assert!(ctx.events.pending().is_empty());
    }

    #[test]
    fn all_zero_draw_weights_abort_without_charging() {
        let mut tuning = GameTuning::default();
        for w in &mut tuning.skill.draw_weights {
            w.weight = 0;
        }
        let mut ctx = SessionContext::new(
            Arc::new(tuning),
            Arc::new(SkillCatalog::standard()),
            GameRng::from_seed(3),
        );
        let mut player = SimPlayer::new(
            PlayerId::new(1),
            "Pilot".to_string(),
            Position::default(),
            &ctx.tuning.player,
            ctx.tuning.skill.active_slots,
        );
        player.currency = 100;

        let err = draw(&mut player, &mut ctx).unwrap_err();
        assert_eq!(
            err,
            CommandError::Missing(MissingReference::EmptyTier(Grade::Common))
        );
        assert_eq!(player.currency, 100);
        assert_eq!(player.inventory.owned().count(), 0);
        assert!(ctx.events.pending().is_empty());
    }

    #[test]
    fn combine_at_exactly_threshold_evicts_and_grants_next_tier() {
        let (mut player, mut ctx) = setup();
        let fire = common(Attribute::Fire);
        give(&mut player, fire, 3);
        assert_eq!(player.inventory.slot_of(fire), Some(0));

        let synthesis = combine(&mut player, fire, &mut ctx).expect("combine");
        assert_eq!(synthesis.remaining, 0);
        assert_eq!(player.inventory.stack(fire), 0);
        assert_eq!(player.inventory.slot_of(fire), None);
        assert_eq!(synthesis.to.grade(), Some(Grade::Rare));
        assert_eq!(player.inventory.stack(synthesis.to), 1);

        let events = ctx.events.drain();
        assert!(events.contains(&DomainEvent::Skill(SkillEvent::Upgraded {
            player_id: player.id,
            from_id: fire,
            to_id: synthesis.to,
        })));
    }

    #[test]
    fn combine_with_leftover_stacks_keeps_the_slot() {
        let (mut player, mut ctx) = setup();
        let fire = common(Attribute::Fire);
        give(&mut player, fire, 4);

        let synthesis = combine(&mut player, fire, &mut ctx).expect("combine");
        assert_eq!(synthesis.remaining, 1);
        assert_eq!(player.inventory.slot_of(fire), Some(0));
    }

    #[test]
    fn below_threshold_and_max_grade_are_rejected_without_change() {
        let (mut player, mut ctx) = setup();
        let fire = common(Attribute::Fire);
        give(&mut player, fire, 2);
        let err = combine(&mut player, fire, &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Precondition(PreconditionFailure::BelowSynthesisThreshold { .. })
        ));
        assert_eq!(player.inventory.stack(fire), 2);

        let top = SkillId::from_parts(Attribute::Storm, Grade::MAX);
        give(&mut player, top, 5);
        let err = combine(&mut player, top, &mut ctx).unwrap_err();
        assert_eq!(
            err,
            CommandError::Precondition(PreconditionFailure::MaxGrade(top))
        );
        assert_eq!(player.inventory.stack(top), 5);
        assert!(ctx.events.pending().is_empty());
    }

    #[test]
    fn empty_next_tier_aborts_with_state_intact() {
        let fire = common(Attribute::Fire);
        let catalog = SkillCatalog::from_definitions(vec![SkillDefinition {
            id: fire,
            name: "Lonely Ember",
            attribute: Attribute::Fire,
            grade: Grade::Common,
            damage: 5.0,
            cooldown: 1.0,
            range: 100.0,
            speed: 100.0,
            effects: SkillEffects::default(),
        }]);
        let mut ctx = SessionContext::new(
            Arc::new(GameTuning::default()),
            Arc::new(catalog),
            GameRng::from_seed(1),
        );
        let mut player = SimPlayer::new(
            PlayerId::new(1),
            "Pilot".to_string(),
            Position::default(),
            &ctx.tuning.player,
            6,
        );
        give(&mut player, fire, 3);

        let err = combine(&mut player, fire, &mut ctx).unwrap_err();
        assert_eq!(
            err,
            CommandError::Missing(MissingReference::EmptyTier(Grade::Rare))
        );
        assert_eq!(player.inventory.stack(fire), 3);
        assert_eq!(player.inventory.slot_of(fire), Some(0));
    }

    #[test]
    fn unowned_skill_cannot_be_combined() {
        let (mut player, mut ctx) = setup();
        let frost = common(Attribute::Frost);
        assert_eq!(
            combine(&mut player, frost, &mut ctx).unwrap_err(),
            CommandError::Precondition(PreconditionFailure::NotOwned(frost))
        );
    }
}
