//! # harmonia-cli
//!
//! Thin front-end over `harmonia-state` (catalog reads/writes) and
//! `harmonia-runner` (spawn + supervise). Owns argument parsing and error
//! formatting only; every decision about what a graph, a compiled plan, or
//! a run means lives in `harmonia-core` and `harmonia-runner`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harmonia_core::Edge;
use harmonia_state::StateProvider;

#[derive(Parser)]
#[command(name = "harmonia")]
#[command(about = "Declare, compile and run DAG pipelines of OS commands", long_about = None)]
#[command(version)]
struct Cli {
    /// `file://` root for declared graphs.
    #[arg(long, global = true, default_value = "file://./state/graph/")]
    graph_root: String,

    /// `file://` root for compiled plans.
    #[arg(long, global = true, default_value = "file://./state/compiled/")]
    compiled_root: String,

    /// `file://` root for running-instance records.
    #[arg(long, global = true, default_value = "file://./state/run/")]
    running_root: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog entries.
    List {
        #[command(subcommand)]
        target: ListTarget,
    },

    /// Compile a declared graph into a persisted plan.
    Compile {
        /// Name of the declared graph to read.
        graph_name: String,

        /// Name to give the compiled plan.
        #[arg(long)]
        name: String,

        /// Restrict compilation to a sub-graph bounded by these input edge
        /// URIs (defaults to the full graph's `full_io()` inputs).
        #[arg(long = "inputs")]
        inputs: Vec<String>,

        /// Restrict compilation to a sub-graph bounded by these output edge
        /// URIs (defaults to the full graph's `full_io()` outputs).
        #[arg(long = "outputs")]
        outputs: Vec<String>,
    },

    /// Execute a compiled plan.
    Run {
        graph_name: String,
        compiled_name: String,

        /// Run version; a sortable id is minted when omitted.
        #[arg(long)]
        version: Option<String>,
    },

    /// Pretty-print a persisted artifact, or its validation failure.
    Inspect {
        #[command(subcommand)]
        target: InspectTarget,
    },
}

#[derive(Subcommand)]
enum ListTarget {
    Graphs,
    Compiled { graph_name: String },
    Versions { graph_name: String, compiled_name: String },
}

#[derive(Subcommand)]
enum InspectTarget {
    Graph { name: String },
    Compiled { graph_name: String, compiled_name: String },
    Running { graph_name: String, compiled_name: String, version: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let state = StateProvider::new(&cli.graph_root, &cli.compiled_root, &cli.running_root)
        .context("building state provider from the given roots")?;

    match cli.command {
        Commands::List { target } => list(&state, target),
        Commands::Compile {
            graph_name,
            name,
            inputs,
            outputs,
        } => compile(&state, &graph_name, &name, inputs, outputs),
        Commands::Run {
            graph_name,
            compiled_name,
            version,
        } => run(&state, &graph_name, &compiled_name, version).await,
        Commands::Inspect { target } => inspect(&state, target),
    }
}

fn list(state: &StateProvider, target: ListTarget) -> Result<()> {
    let names = match target {
        ListTarget::Graphs => state.list_graphs()?,
        ListTarget::Compiled { graph_name } => state.list_compiled(&graph_name)?,
        ListTarget::Versions {
            graph_name,
            compiled_name,
        } => state.list_versions(&graph_name, &compiled_name)?,
    };
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn compile(
    state: &StateProvider,
    graph_name: &str,
    compiled_name: &str,
    inputs: Vec<String>,
    outputs: Vec<String>,
) -> Result<()> {
    let graph = state
        .read_graph(graph_name)
        .with_context(|| format!("reading graph '{graph_name}'"))?;

    let compiled = if inputs.is_empty() && outputs.is_empty() {
        graph
            .compile(compiled_name)
            .context("compiling the full graph")?
    } else {
        let boundary_inputs = resolve_edges(&graph, &inputs)?;
        let boundary_outputs = resolve_edges(&graph, &outputs)?;
        let (_, full_middle, _) = graph.full_io()?;
        let middle: Vec<Edge> = full_middle
            .into_iter()
            .filter(|e| !boundary_inputs.contains(e) && !boundary_outputs.contains(e))
            .collect();
        graph
            .compile_graph(compiled_name, boundary_inputs, middle, boundary_outputs)
            .context("compiling the requested sub-graph")?
    };

    state
        .write_compiled(graph_name, &compiled)
        .context("persisting the compiled plan")?;
    println!("compiled '{compiled_name}' from graph '{graph_name}' ({} layers)", compiled.order().len());
    Ok(())
}

fn resolve_edges(graph: &harmonia_core::Graph, uris: &[String]) -> Result<Vec<Edge>> {
    uris.iter()
        .map(|uri| {
            graph
                .edges()
                .iter()
                .find(|e| e.uri() == uri)
                .cloned()
                .with_context(|| format!("edge '{uri}' is not a member of graph '{}'", graph.name()))
        })
        .collect()
}

async fn run(
    state: &StateProvider,
    graph_name: &str,
    compiled_name: &str,
    version: Option<String>,
) -> Result<()> {
    let compiled = state
        .read_compiled(graph_name, compiled_name)
        .with_context(|| format!("reading compiled plan '{graph_name}/{compiled_name}'"))?;
    let version = version.unwrap_or_else(harmonia_runner::new_version);

    println!("running '{graph_name}/{compiled_name}' as version '{version}'");
    let result = harmonia_runner::run(&compiled, &version).await;

    state
        .write_running(graph_name, compiled_name, &version, &compiled)
        .context("persisting the running-instance record")?;

    result.context("run failed")?;
    println!("run '{version}' completed successfully");
    Ok(())
}

fn inspect(state: &StateProvider, target: InspectTarget) -> Result<()> {
    match target {
        InspectTarget::Graph { name } => match state.read_graph(&name) {
            Ok(graph) => print_json(&graph),
            Err(e) => print_failure(&e),
        },
        InspectTarget::Compiled {
            graph_name,
            compiled_name,
        } => match state.read_compiled(&graph_name, &compiled_name) {
            Ok(compiled) => print_json(&compiled),
            Err(e) => print_failure(&e),
        },
        InspectTarget::Running {
            graph_name,
            compiled_name,
            version,
        } => match state.read_running(&graph_name, &compiled_name, &version) {
            Ok(running) => print_json(&running),
            Err(e) => print_failure(&e),
        },
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to render artifact as JSON: {e}"),
    }
}

fn print_failure(err: &harmonia_state::StateError) {
    eprintln!("{err}");
}
