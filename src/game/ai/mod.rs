//! Bot decision engine
//!
//! Every tick each bot picks one behavior from a guarded set (farm,
//! evade, avoid, contest, dodge, panic, and the IT-only hunt, rush,
//! chase and wind-up) and turns it into a [`BotIntent`]. All randomness
//! comes from the bot's own seeded RNG.

mod brain;
mod decide;
pub mod params;
mod steering;
mod targeting;

pub use brain::{effective_boldness, BoldnessTrait, BotBrain, BotState, PerceivedTarget, ThrowPlan};
pub use decide::{decide, BotIntent, ThrowCommand, TickView};
pub use steering::{dodge_heading, escape_direction};
pub use targeting::{score_candidate, shed_urgency, throw_confidence, ShotContext};

use super::world::{Control, World};

/// Run the decision engine for every bot.
///
/// Brains are cloned out, updated against an unchanged world and written
/// back, so every bot decides from the same view of the tick.
pub fn plan_bots(world: &mut World, dt: f32) -> Vec<(usize, BotIntent)> {
    let view = TickView::capture(world);

    let decisions: Vec<(usize, BotIntent, BotBrain)> = world
        .players
        .iter()
        .enumerate()
        .filter_map(|(idx, p)| match &p.control {
            Control::Bot(brain) => {
                let mut brain = (**brain).clone();
                let intent = decide(world, &view, idx, &mut brain, dt);
                Some((idx, intent, brain))
            }
            Control::Human(_) => None,
        })
        .collect();

    decisions
        .into_iter()
        .map(|(idx, intent, brain)| {
            if let Control::Bot(slot) = &mut world.players[idx].control {
                **slot = brain;
            }
            (idx, intent)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::Tuning;

    #[test]
    fn plans_every_bot_and_stores_state() {
        let mut world = World::new(Tuning::default(), 12);
        let human = world.add_human(crate::game::world::PlayerId::new_random(), "h");
        let plans = plan_bots(&mut world, 1.0 / 60.0);
        assert_eq!(plans.len(), world.bot_count());
        assert!(plans.iter().all(|(idx, _)| world.players[*idx].id != human));
        for (idx, intent) in &plans {
            let brain = world.players[*idx].brain().unwrap();
            assert_eq!(brain.state, intent.state);
            assert!(brain.last_pos.is_some());
        }
    }

    #[test]
    fn seeded_worlds_plan_identically() {
        let mut a = World::new(Tuning::default(), 77);
        let mut b = World::new(Tuning::default(), 77);
        for _ in 0..10 {
            let pa = plan_bots(&mut a, 1.0 / 60.0);
            let pb = plan_bots(&mut b, 1.0 / 60.0);
            assert_eq!(pa, pb);
            a.now_ms += 1000.0 / 60.0;
            b.now_ms += 1000.0 / 60.0;
        }
    }
}
