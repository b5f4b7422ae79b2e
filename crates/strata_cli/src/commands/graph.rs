//! Graph command - Print the emission order and dependency edges.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use strata_core::ConstructPath;
use strata_graph::{DependencyGraph, GraphError, LogicalIdRegistry};
use tracing::info;

use super::{build_app, definition_arg, EnvironmentArgs};

#[derive(Args)]
pub struct GraphArgs {
    /// App definition file (or a directory holding app.yaml)
    definition: PathBuf,

    /// Print Graphviz dot instead of text
    #[arg(long)]
    dot: bool,

    #[command(flatten)]
    environment: EnvironmentArgs,
}

pub async fn execute(args: GraphArgs) -> Result<()> {
    let app = build_app(&definition_arg(args.definition), &args.environment)?;
    let graph = DependencyGraph::build(&app.stack);
    let ids = LogicalIdRegistry::assign(&app.stack)?;
    info!(
        "Graph for {}: {} declaration(s), {} edge(s)",
        app.stack.name(),
        graph.nodes().len(),
        graph.edge_count()
    );

    let id = |path: &ConstructPath| ids.get(path).unwrap_or("?").to_string();

    if args.dot {
        println!("digraph \"{}\" {{", app.stack.name());
        for node in graph.nodes() {
            println!("  \"{}\" [label=\"{}\\n{}\"];", id(node), id(node), node);
        }
        for (from, to, kind) in graph.edges() {
            let style = if kind.explicit { "solid" } else { "dashed" };
            println!("  \"{}\" -> \"{}\" [style={}];", id(from), id(to), style);
        }
        println!("}}");
        return Ok(());
    }

    match graph.topological_order() {
        Ok(order) => {
            println!("📋 Emission order:");
            for (index, path) in order.iter().enumerate() {
                println!("  {:>3}. {} ({})", index + 1, id(path), path);
            }
        }
        Err(cycle) => {
            println!("❌ {}", cycle);
            return Err(GraphError::from(cycle).into());
        }
    }

    println!();
    println!("🔗 Edges:");
    for (from, to, kind) in graph.edges() {
        let via = match (kind.explicit, kind.inferred) {
            (true, true) => "explicit, reference",
            (true, false) => "explicit",
            _ => "reference",
        };
        println!("  {} -> {} ({})", id(from), id(to), via);
    }
    for dangling in graph.dangling() {
        println!("  ⚠️  {} -> {} (not in this stack)", dangling.source, dangling.target);
    }

    Ok(())
}
