use std::fmt::Write;

use brainstem::BrainSpec;
use brainstem::Result;
use brainstem::channels::ChannelSpec;
use brainstem::state::{GraphDefinition, StateDefinition, TransitionDefinition, TransitionMode};

pub fn summary(spec: &BrainSpec) -> String {
    let mut out = format!("{}: ok ({} channels", spec.name, spec.channels.len());
    if let Some(machine) = &spec.machine {
        let _ = write!(
            out,
            ", {} states, {} transitions",
            machine.states.len(),
            machine.transitions.len()
        );
    }
    out.push(')');
    out
}

/// Indented hierarchy. `*` marks the default of each level.
pub fn state_tree(graph: &GraphDefinition) -> String {
    let mut out = String::new();
    write_level(graph, None, 0, &mut out);
    out
}

fn write_level(graph: &GraphDefinition, parent: Option<&str>, depth: usize, out: &mut String) {
    let default = graph.default_of(parent);
    for state in graph.children(parent) {
        let indent = "  ".repeat(depth);
        let marker = if default == Some(state.name.as_str()) { " *" } else { "" };
        let _ = writeln!(out, "{}{}{}{}", indent, state.name, marker, hooks(state));
        for t in graph.transitions_from(&state.name) {
            let _ = writeln!(out, "{}  -> {} [{}]", indent, t.to, transition_label(t));
        }
        write_level(graph, Some(&state.name), depth + 1, out);
    }
}

fn hooks(state: &StateDefinition) -> String {
    let names: Vec<&str> = [
        (state.has_enter, "enter"),
        (state.has_during, "during"),
        (state.has_exit, "exit"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();
    if names.is_empty() {
        String::new()
    } else {
        format!(" ({})", names.join(", "))
    }
}

fn transition_label(t: &TransitionDefinition) -> String {
    let mut label = match t.mode {
        TransitionMode::ConditionOnly => "condition".to_string(),
        TransitionMode::TimeOnly => format!("after {}s", t.min_elapsed),
        TransitionMode::TimeAndCondition => format!("after {}s and condition", t.min_elapsed),
        TransitionMode::TimeOrCondition => format!("after {}s or condition", t.min_elapsed),
    };
    if t.has_notify {
        label.push_str(", notify");
    }
    label
}

pub fn channel_table(specs: &[ChannelSpec]) -> Result<String> {
    let mut rows = vec![[
        "NAME".to_string(),
        "TYPE".to_string(),
        "DEFAULT".to_string(),
        "CLEARS".to_string(),
        "CONSTRAINT".to_string(),
    ]];
    for spec in specs {
        rows.push([
            spec.name.clone(),
            spec.kind.to_string(),
            spec.default_value()?.to_string(),
            if spec.clears { "yes" } else { "no" }.to_string(),
            spec.constraint()?.to_string(),
        ]);
    }

    let mut widths = [0usize; 5];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    }
    Ok(out)
}
