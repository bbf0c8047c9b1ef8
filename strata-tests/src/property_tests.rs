//! Property-based tests: universal invariants over randomized charts.
//!
//! A fixed palette of state types is assembled into a random tree with
//! random reaction tables (driven by a `Plan` placed in the user context),
//! then exercised with random event sequences. After every dispatch:
//!
//! - entries minus exits is 0 or 1 for every state, and exactly 1 iff the
//!   state is the current state or one of its ancestors;
//! - an event kind no state reacts to leaves the chart untouched.

use proptest::prelude::*;
use strata_core::{Runtime, SetupCtx, State, StateHooks, StateId};

const STATE_COUNT: usize = 6;
const EVENT_KINDS: usize = 3;

#[derive(Debug, Clone, Copy)]
enum PlanReaction {
    Ignore,
    Transit(usize),
    Discard,
    Defer,
}

#[derive(Debug, Clone, Default)]
struct Plan {
    /// Parent index per state; parents always precede children.
    parents: Vec<Option<usize>>,
    /// Starting sub-state index, set for every super-state.
    starting: Vec<Option<usize>>,
    /// Reaction per state and event kind.
    reactions: Vec<Vec<PlanReaction>>,
}

#[derive(Default)]
struct HarnessCtx {
    plan: Plan,
    ids: Vec<StateId>,
    entered: [u32; STATE_COUNT],
    exited: [u32; STATE_COUNT],
}

struct E0;
struct E1;
struct E2;
/// Never wired to any reaction.
struct Probe;

fn wire(index: usize, setup: &mut SetupCtx<'_, HarnessCtx>) -> StateHooks<HarnessCtx> {
    let (row, starting, ids) = {
        let ctx = setup.context();
        (ctx.plan.reactions[index].clone(), ctx.plan.starting[index], ctx.ids.clone())
    };
    if let Some(starting) = starting {
        setup.set_starting_state(ids[starting]);
    }
    wire_event::<E0>(setup, row[0], &ids);
    wire_event::<E1>(setup, row[1], &ids);
    wire_event::<E2>(setup, row[2], &ids);
    StateHooks::none()
        .on_entry(move |ctx: &mut HarnessCtx| ctx.entered[index] += 1)
        .on_exit(move |ctx: &mut HarnessCtx| ctx.exited[index] += 1)
}

fn wire_event<E: strata_core::Event>(
    setup: &mut SetupCtx<'_, HarnessCtx>,
    reaction: PlanReaction,
    ids: &[StateId],
) {
    match reaction {
        PlanReaction::Ignore => {}
        PlanReaction::Transit(target) => setup.add_transition_to::<E>(ids[target]),
        PlanReaction::Discard => setup.add_discard::<E>(),
        PlanReaction::Defer => setup.add_defer::<E>(),
    }
}

macro_rules! harness_states {
    ($(($ty:ident, $index:literal)),+ $(,)?) => {
        $(
            #[derive(Default)]
            struct $ty;

            impl State<HarnessCtx> for $ty {
                fn setup(&mut self, setup: &mut SetupCtx<'_, HarnessCtx>) -> StateHooks<HarnessCtx> {
                    wire($index, setup)
                }
            }
        )+

        fn add_nth(
            runtime: &mut Runtime<HarnessCtx>,
            index: usize,
            parent: Option<StateId>,
        ) -> StateId {
            match index {
                $(
                    $index => match parent {
                        Some(parent) => runtime.add_sub_state($ty, parent),
                        None => runtime.add_state($ty),
                    },
                )+
                _ => unreachable!("harness has {} states", STATE_COUNT),
            }
        }
    };
}

harness_states!((H0, 0), (H1, 1), (H2, 2), (H3, 3), (H4, 4), (H5, 5));

fn build(plan: &Plan, initial: usize) -> Runtime<HarnessCtx> {
    let mut runtime = Runtime::new(HarnessCtx { plan: plan.clone(), ..Default::default() });
    let mut ids: Vec<StateId> = Vec::with_capacity(STATE_COUNT);
    for index in 0..STATE_COUNT {
        let parent = plan.parents[index].map(|p| ids[p]);
        ids.push(add_nth(&mut runtime, index, parent));
    }
    let initial = ids[initial];
    runtime.context_mut().ids = ids;
    runtime.initialize(initial);
    runtime
}

fn dispatch_kind(runtime: &mut Runtime<HarnessCtx>, kind: usize) {
    match kind {
        0 => runtime.dispatch_event(E0),
        1 => runtime.dispatch_event(E1),
        _ => runtime.dispatch_event(E2),
    }
}

fn check_balance(runtime: &Runtime<HarnessCtx>) -> Result<(), TestCaseError> {
    let ctx = runtime.context();
    let current = runtime.current_state();
    let current_index = ctx
        .ids
        .iter()
        .position(|&id| id == current)
        .expect("current state was registered by the harness");

    let mut on_path = [false; STATE_COUNT];
    let mut cursor = Some(current_index);
    while let Some(index) = cursor {
        on_path[index] = true;
        cursor = ctx.plan.parents[index];
    }

    for index in 0..STATE_COUNT {
        let balance = i64::from(ctx.entered[index]) - i64::from(ctx.exited[index]);
        prop_assert!(
            balance == 0 || balance == 1,
            "state {index} entered {} times but exited {} times",
            ctx.entered[index],
            ctx.exited[index],
        );
        prop_assert_eq!(
            balance == 1,
            on_path[index],
            "state {} balance {} disagrees with the current path",
            index,
            balance,
        );
    }
    Ok(())
}

fn arb_reaction() -> impl Strategy<Value = PlanReaction> {
    prop_oneof![
        2 => Just(PlanReaction::Ignore),
        3 => (0..STATE_COUNT).prop_map(PlanReaction::Transit),
        1 => Just(PlanReaction::Discard),
        1 => Just(PlanReaction::Defer),
    ]
}

prop_compose! {
    fn arb_plan()(
        parent_present in prop::collection::vec(any::<bool>(), STATE_COUNT),
        parent_pick in prop::collection::vec(any::<prop::sample::Index>(), STATE_COUNT),
        starting_pick in prop::collection::vec(any::<prop::sample::Index>(), STATE_COUNT),
        reactions in prop::collection::vec(
            prop::collection::vec(arb_reaction(), EVENT_KINDS),
            STATE_COUNT,
        ),
    ) -> Plan {
        // Parents point backwards, so the tree is acyclic by construction.
        let parents: Vec<Option<usize>> = (0..STATE_COUNT)
            .map(|index| {
                if index > 0 && parent_present[index] {
                    Some(parent_pick[index].index(index))
                } else {
                    None
                }
            })
            .collect();
        // Every super-state needs a starting sub-state or it could never
        // become current; pick one of its direct children.
        let starting = (0..STATE_COUNT)
            .map(|index| {
                let children: Vec<usize> =
                    (0..STATE_COUNT).filter(|&child| parents[child] == Some(index)).collect();
                if children.is_empty() {
                    None
                } else {
                    Some(children[starting_pick[index].index(children.len())])
                }
            })
            .collect();
        Plan { parents, starting, reactions }
    }
}

proptest! {
    #[test]
    fn entry_exit_balance_tracks_the_current_path(
        plan in arb_plan(),
        initial in any::<prop::sample::Index>(),
        events in prop::collection::vec(0..EVENT_KINDS, 0..40),
    ) {
        let mut runtime = build(&plan, initial.index(STATE_COUNT));
        check_balance(&runtime)?;
        for &kind in &events {
            dispatch_kind(&mut runtime, kind);
            check_balance(&runtime)?;
        }
    }

    #[test]
    fn unmatched_event_kinds_have_no_observable_effect(
        plan in arb_plan(),
        initial in any::<prop::sample::Index>(),
        warmup in prop::collection::vec(0..EVENT_KINDS, 0..10),
    ) {
        let mut runtime = build(&plan, initial.index(STATE_COUNT));
        for &kind in &warmup {
            dispatch_kind(&mut runtime, kind);
        }
        let entered = runtime.context().entered;
        let exited = runtime.context().exited;
        let current = runtime.current_state();

        runtime.dispatch_event(Probe);

        prop_assert_eq!(runtime.context().entered, entered);
        prop_assert_eq!(runtime.context().exited, exited);
        prop_assert_eq!(runtime.current_state(), current);
    }

    #[test]
    fn same_inputs_same_trajectory(
        plan in arb_plan(),
        initial in any::<prop::sample::Index>(),
        events in prop::collection::vec(0..EVENT_KINDS, 0..40),
    ) {
        let mut first = build(&plan, initial.index(STATE_COUNT));
        let mut second = build(&plan, initial.index(STATE_COUNT));
        for &kind in &events {
            dispatch_kind(&mut first, kind);
            dispatch_kind(&mut second, kind);
        }
        prop_assert_eq!(first.current_state(), second.current_state());
        prop_assert_eq!(first.context().entered, second.context().entered);
        prop_assert_eq!(first.context().exited, second.context().exited);
    }
}
