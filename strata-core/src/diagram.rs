//! PlantUML rendering of a configured chart.
//!
//! A pure read-only walk over the registry and the recorded reaction
//! annotations; no dispatch state is touched. The parent→children view the
//! walk needs is inverted from the flat list on demand and never stored in
//! the live engine.

use std::io::{self, Write};

use crate::reaction::{UmlNote, UmlResult};
use crate::runtime::Runtime;
use crate::state::{StateId, StateNode};

/// Flavor of the emitted diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UmlDiagramType {
    /// Nested `state` blocks only.
    HierarchyOnly,
    /// Nested `state` blocks plus the transition arrows.
    HierarchyWithTransitions,
    /// One flat block per state, annotated with its parent, plus the arrows.
    FlatWithTransitions,
}

impl<C: 'static> Runtime<C> {
    /// Writes a PlantUML rendering of the configured chart to `out`.
    ///
    /// Call after `initialize` for complete output: starting sub-states,
    /// entry/exit hooks and reaction annotations are recorded during setup.
    ///
    /// # Errors
    /// Propagates write errors from `out`.
    pub fn write_uml_diagram<W: Write>(
        &self,
        out: &mut W,
        diagram: UmlDiagramType,
    ) -> io::Result<()> {
        writeln!(out, "@startuml")?;
        let children = self.child_index();
        let top_level: Vec<StateId> =
            self.nodes.iter().filter(|node| node.parent.is_none()).map(|node| node.id).collect();
        match diagram {
            UmlDiagramType::HierarchyOnly | UmlDiagramType::HierarchyWithTransitions => {
                for &id in &top_level {
                    self.write_nested_state(out, &children, id, "")?;
                }
            }
            UmlDiagramType::FlatWithTransitions => {
                for &id in &top_level {
                    self.write_flat_states(out, &children, id)?;
                }
            }
        }
        if diagram != UmlDiagramType::HierarchyOnly {
            self.write_transitions(out)?;
        }
        writeln!(out, "@enduml")
    }

    /// Inverts the parent back-references into per-state child lists,
    /// preserving registration order.
    fn child_index(&self) -> Vec<Vec<StateId>> {
        let mut children = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            if let Some(parent) = node.parent {
                children[parent.index()].push(node.id);
            }
        }
        children
    }

    fn write_nested_state<W: Write>(
        &self,
        out: &mut W,
        children: &[Vec<StateId>],
        id: StateId,
        tab: &str,
    ) -> io::Result<()> {
        let node = self.node(id);
        writeln!(out, "{tab}state {} {{", node.name)?;
        let inner = format!("{tab}  ");
        self.write_inner_actions(out, node, &inner)?;
        if let Some(starting) = node.starting_state {
            writeln!(out, "{inner}[*] -> {}", self.node(starting).name)?;
        }
        for &child in &children[id.index()] {
            self.write_nested_state(out, children, child, &inner)?;
        }
        writeln!(out, "{tab}}}")
    }

    fn write_flat_states<W: Write>(
        &self,
        out: &mut W,
        children: &[Vec<StateId>],
        id: StateId,
    ) -> io::Result<()> {
        let node = self.node(id);
        match node.parent {
            Some(parent) => writeln!(
                out,
                "state \"{} : {}\" as {} {{",
                node.name,
                self.node(parent).name,
                node.name
            )?,
            None => writeln!(out, "state {} {{", node.name)?,
        }
        if node.is_super_state {
            writeln!(out, "  {}: Super-State = True", node.name)?;
            if let Some(starting) = node.starting_state {
                writeln!(out, "  {}: Starting-State = {}", node.name, self.node(starting).name)?;
            }
        }
        self.write_inner_actions(out, node, "  ")?;
        writeln!(out, "}}")?;
        for &child in &children[id.index()] {
            self.write_flat_states(out, children, child)?;
        }
        Ok(())
    }

    /// Entry/exit annotations and the non-transiting reaction lines.
    fn write_inner_actions<W: Write>(
        &self,
        out: &mut W,
        node: &StateNode<C>,
        tab: &str,
    ) -> io::Result<()> {
        if node.entry.is_some() {
            writeln!(out, "{tab}{}: entry / With Action", node.name)?;
        }
        if node.exit.is_some() {
            writeln!(out, "{tab}{}: exit / With Action", node.name)?;
        }
        for reaction in &node.reactions {
            for note in &reaction.notes {
                let guard = render_guard(note);
                match note.result {
                    UmlResult::Discard => {
                        let action = note.action.as_deref().unwrap_or("DISCARD");
                        writeln!(
                            out,
                            "{tab}{}: {}{guard} / {action}",
                            node.name, reaction.event_name
                        )?;
                    }
                    UmlResult::Defer => {
                        writeln!(
                            out,
                            "{tab}{}: {}{guard} / DEFER",
                            node.name, reaction.event_name
                        )?;
                    }
                    UmlResult::Transit => {}
                }
            }
        }
        Ok(())
    }

    fn write_transitions<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for node in &self.nodes {
            for reaction in &node.reactions {
                for note in &reaction.notes {
                    if note.result != UmlResult::Transit {
                        continue;
                    }
                    let target = match note.target {
                        Some(target) => self.node(target).name.as_str(),
                        None => "Unknown",
                    };
                    write!(out, "{} -> {} : {}", node.name, target, reaction.event_name)?;
                    write!(out, "{}", render_guard(note))?;
                    if let Some(action) = note.action.as_deref() {
                        write!(out, " / {action}")?;
                    }
                    writeln!(out)?;
                }
            }
        }
        Ok(())
    }
}

fn render_guard(note: &UmlNote) -> String {
    match note.guard.as_deref() {
        Some(guard) if !guard.is_empty() => format!("[{guard}]"),
        _ => String::new(),
    }
}
