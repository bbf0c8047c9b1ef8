//! End-to-end scenarios driven through the public API.

use crate::common::*;
use strata_core::{Reaction, Runtime, SetupCtx, State, StateHooks, StateMachine};

#[test]
fn stopwatch_counter_lines_in_order() {
    setup_tracing();

    let machine = stopwatch_machine();
    machine.dispatch_event(Activate); // Idle -> Active, lands on Stopped
    machine.dispatch_event(StartStop); // Stopped -> Running
    machine.dispatch_event(Reset); // Running -> Active, back to Stopped
    machine.dispatch_event(Deactivate); // Stopped -> Idle

    let context = machine.into_context();
    assert_eq!(context.log, STOPWATCH_LOG);
}

// Simple toggle: one transition, one exit, one entry.

#[derive(Default)]
struct ToggleCtx {
    off_exits: u32,
    on_enters: u32,
}

struct SwitchOn;

struct OnState;
struct OffState;

impl State<ToggleCtx> for OnState {
    fn setup(&mut self, _setup: &mut SetupCtx<'_, ToggleCtx>) -> StateHooks<ToggleCtx> {
        StateHooks::none().on_entry(|ctx: &mut ToggleCtx| ctx.on_enters += 1)
    }
}

impl State<ToggleCtx> for OffState {
    fn setup(&mut self, setup: &mut SetupCtx<'_, ToggleCtx>) -> StateHooks<ToggleCtx> {
        setup.add_transition::<SwitchOn, OnState>();
        StateHooks::none().on_exit(|ctx: &mut ToggleCtx| ctx.off_exits += 1)
    }
}

#[test]
fn toggle_runs_exit_then_entry_once() {
    let machine = StateMachine::new(ToggleCtx::default());
    let on = machine.add_state(OnState);
    let off = machine.add_state(OffState);
    machine.initialize(off);

    machine.dispatch_event(SwitchOn);
    assert_eq!(machine.current_state(), on);
    assert_eq!(machine.with_context(|ctx| (ctx.off_exits, ctx.on_enters)), (1, 1));
}

// Lockable switch: `Off` is a super-state entered at `OffDefault`; the
// `OffLockTag` sub-state defers `TurnOn` until the lock is lifted.

#[derive(Default)]
struct LockCtx {
    off_enters: u32,
    off_exits: u32,
    tag_enters: u32,
    tag_exits: u32,
    on_enters: u32,
}

struct TurnOn;
struct Tag;
struct UnTag;

struct LockOn;
struct LockOff;
struct OffDefault;
struct OffLockTag;

impl State<LockCtx> for LockOn {
    fn setup(&mut self, _setup: &mut SetupCtx<'_, LockCtx>) -> StateHooks<LockCtx> {
        StateHooks::none().on_entry(|ctx: &mut LockCtx| ctx.on_enters += 1)
    }
}

impl State<LockCtx> for LockOff {
    fn setup(&mut self, setup: &mut SetupCtx<'_, LockCtx>) -> StateHooks<LockCtx> {
        let starting = setup.state_id_of::<OffDefault>();
        setup.set_starting_state(starting);
        setup.add_transition::<TurnOn, LockOn>();
        StateHooks::none()
            .on_entry(|ctx: &mut LockCtx| ctx.off_enters += 1)
            .on_exit(|ctx: &mut LockCtx| ctx.off_exits += 1)
    }
}

impl State<LockCtx> for OffDefault {
    fn setup(&mut self, setup: &mut SetupCtx<'_, LockCtx>) -> StateHooks<LockCtx> {
        setup.add_transition::<Tag, OffLockTag>();
        StateHooks::none()
    }
}

impl State<LockCtx> for OffLockTag {
    fn setup(&mut self, setup: &mut SetupCtx<'_, LockCtx>) -> StateHooks<LockCtx> {
        setup.add_transition::<UnTag, OffDefault>();
        setup.add_defer::<TurnOn>();
        StateHooks::none()
            .on_entry(|ctx: &mut LockCtx| ctx.tag_enters += 1)
            .on_exit(|ctx: &mut LockCtx| ctx.tag_exits += 1)
    }
}

struct LockIds {
    on: strata_core::StateId,
    off: strata_core::StateId,
    off_default: strata_core::StateId,
}

fn lock_chart() -> (StateMachine<LockCtx>, LockIds) {
    let machine = StateMachine::new(LockCtx::default());
    let on = machine.add_state(LockOn);
    let off = machine.add_state(LockOff);
    machine.add_sub_state(OffLockTag, off);
    let off_default = machine.add_sub_state(OffDefault, off);
    (machine, LockIds { on, off, off_default })
}

#[test]
fn initializing_a_super_state_enters_its_starting_sub_state() {
    let (machine, ids) = lock_chart();
    machine.initialize(ids.off);

    assert_eq!(machine.current_state(), ids.off_default);
    machine.with_context(|ctx| {
        assert_eq!(ctx.off_enters, 1);
        assert_eq!(ctx.tag_enters, 0);
    });
}

#[test]
fn deferred_event_fires_after_the_releasing_transition() {
    let (machine, ids) = lock_chart();
    machine.initialize(ids.off);

    machine.dispatch_event(Tag); // OffDefault -> OffLockTag
    machine.dispatch_event(TurnOn); // deferred by the lock state
    machine.with_context(|ctx| assert_eq!(ctx.on_enters, 0));

    machine.dispatch_event(UnTag); // releases the deferred TurnOn
    assert_eq!(machine.current_state(), ids.on);
    machine.with_context(|ctx| {
        assert_eq!(ctx.off_enters, 1);
        assert_eq!(ctx.off_exits, 1);
        assert_eq!(ctx.tag_enters, 1);
        assert_eq!(ctx.tag_exits, 1);
        assert_eq!(ctx.on_enters, 1);
    });
}

// Re-entry: a self-transition runs exit and entry exactly once.

struct Retrigger;
struct Lone;

impl State<u32> for Lone {
    fn setup(&mut self, setup: &mut SetupCtx<'_, u32>) -> StateHooks<u32> {
        setup.add_transition::<Retrigger, Lone>();
        StateHooks::none().on_entry(|count: &mut u32| *count += 1)
    }
}

#[test]
fn self_transition_reenters_the_state() {
    let machine = StateMachine::new(0u32);
    let lone = machine.add_state(Lone);
    machine.initialize(lone);
    machine.dispatch_event(Retrigger);
    assert_eq!(machine.with_context(|count| *count), 2);
}

// Cross-branch transition: exits leaf-first, action in the middle, entries
// root-first on the other branch.

#[derive(Default)]
struct CallOrderCtx {
    calls: String,
}

struct Jump;

macro_rules! traced_state {
    ($ty:ident, $label:literal) => {
        struct $ty;

        impl State<CallOrderCtx> for $ty {
            fn setup(&mut self, _setup: &mut SetupCtx<'_, CallOrderCtx>) -> StateHooks<CallOrderCtx> {
                StateHooks::none()
                    .on_entry(|ctx: &mut CallOrderCtx| ctx.calls.push_str(concat!($label, "() ")))
                    .on_exit(|ctx: &mut CallOrderCtx| ctx.calls.push_str(concat!("~", $label, "() ")))
            }
        }
    };
}

traced_state!(BranchA, "A");
traced_state!(BranchB, "B");
traced_state!(BranchX, "X");
traced_state!(BranchY, "Y");
traced_state!(BranchZ, "Z");

struct BranchC;

impl State<CallOrderCtx> for BranchC {
    fn setup(&mut self, setup: &mut SetupCtx<'_, CallOrderCtx>) -> StateHooks<CallOrderCtx> {
        setup.add_transition_with::<Jump, BranchZ>(|ctx, _event| ctx.calls.push_str("Action() "));
        StateHooks::none()
            .on_entry(|ctx: &mut CallOrderCtx| ctx.calls.push_str("C() "))
            .on_exit(|ctx: &mut CallOrderCtx| ctx.calls.push_str("~C() "))
    }
}

#[test]
fn cross_branch_transition_call_order() {
    let mut runtime = Runtime::new(CallOrderCtx::default());
    let a = runtime.add_state(BranchA);
    let b = runtime.add_sub_state(BranchB, a);
    let c = runtime.add_sub_state(BranchC, b);
    let x = runtime.add_state(BranchX);
    let y = runtime.add_sub_state(BranchY, x);
    runtime.add_sub_state(BranchZ, y);

    runtime.initialize(c);
    assert_eq!(runtime.context().calls, "A() B() C() ");

    runtime.context_mut().calls.clear();
    runtime.dispatch_event(Jump);
    assert_eq!(runtime.context().calls, "~C() ~B() ~A() Action() X() Y() Z() ");
}

// Guards live inside custom reactions: an unarmed child forwards to its
// parent instead of transiting.

#[derive(Default)]
struct GuardCtx {
    armed: bool,
    parent_discards: u32,
}

struct Fire;

struct Watcher;
struct Child;
struct Target;

impl State<GuardCtx> for Watcher {
    fn setup(&mut self, setup: &mut SetupCtx<'_, GuardCtx>) -> StateHooks<GuardCtx> {
        let starting = setup.state_id_of::<Child>();
        setup.set_starting_state(starting);
        setup.add_custom_reaction::<Fire>(|scope, _event| {
            scope.context().parent_discards += 1;
            Reaction::Discard
        });
        StateHooks::none()
    }
}

impl State<GuardCtx> for Child {
    fn setup(&mut self, setup: &mut SetupCtx<'_, GuardCtx>) -> StateHooks<GuardCtx> {
        let target = setup.state_id_of::<Target>();
        setup.add_custom_reaction::<Fire>(move |scope, _event| {
            if scope.context().armed {
                scope.transit(target)
            } else {
                Reaction::Forward
            }
        });
        StateHooks::none()
    }
}

impl State<GuardCtx> for Target {
    fn setup(&mut self, _setup: &mut SetupCtx<'_, GuardCtx>) -> StateHooks<GuardCtx> {
        StateHooks::none()
    }
}

#[test]
fn custom_reaction_guard_forwards_until_armed() {
    let machine = StateMachine::new(GuardCtx::default());
    let watcher = machine.add_state(Watcher);
    machine.add_sub_state(Child, watcher);
    let target = machine.add_state(Target);
    machine.initialize(watcher);

    machine.dispatch_event(Fire);
    machine.with_context(|ctx| assert_eq!(ctx.parent_discards, 1));

    machine.with_context(|ctx| ctx.armed = true);
    machine.dispatch_event(Fire);
    assert_eq!(machine.current_state(), target);
    machine.with_context(|ctx| assert_eq!(ctx.parent_discards, 1));
}
