//! Renders the stopwatch chart as PlantUML in all three diagram flavors.

use std::io;

use strata_core::{Runtime, SetupCtx, State, StateHooks, UmlDiagramType};

struct Activate;
struct Deactivate;
struct StartStop;
struct Reset;

struct Idle;

impl State<()> for Idle {
    fn setup(&mut self, setup: &mut SetupCtx<'_, ()>) -> StateHooks<()> {
        setup.add_transition::<Activate, Active>();
        StateHooks::none()
    }
}

struct Active;

impl State<()> for Active {
    fn setup(&mut self, setup: &mut SetupCtx<'_, ()>) -> StateHooks<()> {
        let starting = setup.state_id_of::<Stopped>();
        setup.set_starting_state(starting);
        setup.add_transition::<Deactivate, Idle>();
        setup.add_transition::<Reset, Active>();
        StateHooks::none().on_entry(|_| {})
    }
}

struct Stopped;

impl State<()> for Stopped {
    fn setup(&mut self, setup: &mut SetupCtx<'_, ()>) -> StateHooks<()> {
        setup.add_transition::<StartStop, Running>();
        StateHooks::none()
    }
}

struct Running;

impl State<()> for Running {
    fn setup(&mut self, setup: &mut SetupCtx<'_, ()>) -> StateHooks<()> {
        setup.add_transition::<StartStop, Stopped>();
        StateHooks::none().on_entry(|_| {}).on_exit(|_| {})
    }
}

fn main() -> io::Result<()> {
    let mut runtime = Runtime::new(());
    let idle = runtime.add_state(Idle);
    let active = runtime.add_state(Active);
    runtime.add_sub_state(Stopped, active);
    runtime.add_sub_state(Running, active);
    runtime.initialize(idle);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for diagram in [
        UmlDiagramType::HierarchyOnly,
        UmlDiagramType::HierarchyWithTransitions,
        UmlDiagramType::FlatWithTransitions,
    ] {
        println!("-- {diagram:?} --");
        runtime.write_uml_diagram(&mut out, diagram)?;
        println!();
    }
    Ok(())
}
