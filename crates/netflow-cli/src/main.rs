//! `netflow` - validate, inspect and compile workflow graphs on disk

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use netflow_engine::{
    has_errors, validate_workflow, CompileError, CompiledScript, CompilerOptions, GraphDocument, GraphModel,
    NetflowError, ResolvedConfig, ScriptCompiler, StoredWorkflow, ValidationIssue,
};

/// Network-automation workflow compiler
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report structural problems in a graph
    Validate {
        /// Graph document (`{nodes, edges}`) or saved workflow JSON
        graph: PathBuf,
        /// Print findings as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the nodes and edges of a graph
    Inspect {
        graph: PathBuf,
    },
    /// Compile a graph into a runner script
    Compile {
        graph: PathBuf,
        /// Resolved credentials, device groups, templates and variables
        #[arg(long)]
        resolved: Option<PathBuf>,
        /// Compiler options JSON
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the script here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the unresolved-resource manifest as JSON (to stderr when
        /// the script goes to stdout)
        #[arg(long)]
        manifest: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> netflow_engine::Result<ExitCode> {
    match command {
        Command::Validate { graph, json } => validate(&graph, json),
        Command::Inspect { graph } => inspect(&graph),
        Command::Compile {
            graph,
            resolved,
            config,
            output,
            manifest,
        } => compile(&graph, resolved.as_deref(), config.as_deref(), output.as_deref(), manifest),
    }
}

/// Read either a bare graph document or a saved workflow wrapping one
fn load_graph(path: &Path) -> netflow_engine::Result<GraphModel> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let document = if value.get("graph").is_some() {
        serde_json::from_value::<StoredWorkflow>(value)?.graph
    } else {
        serde_json::from_value::<GraphDocument>(value)?
    };
    log::debug!(
        "Loaded graph from {:?}: {} node(s), {} edge(s)",
        path,
        document.nodes.len(),
        document.edges.len()
    );
    Ok(GraphModel::from_document(document))
}

fn print_issues(issues: &[ValidationIssue]) {
    for issue in issues {
        let location = match (&issue.node_id, &issue.edge_id) {
            (Some(node), Some(edge)) => format!(" (node {}, edge {})", node, edge),
            (Some(node), None) => format!(" (node {})", node),
            (None, Some(edge)) => format!(" (edge {})", edge),
            (None, None) => String::new(),
        };
        eprintln!("{}{}", issue, location);
    }
}

fn validate(path: &Path, json: bool) -> netflow_engine::Result<ExitCode> {
    let graph = load_graph(path)?;
    let issues = validate_workflow(&graph);

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
    } else if issues.is_empty() {
        println!("{}: no findings", path.display());
    } else {
        print_issues(&issues);
    }

    Ok(if has_errors(&issues) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn inspect(path: &Path) -> netflow_engine::Result<ExitCode> {
    let graph = load_graph(path)?;
    println!("{} node(s), {} edge(s)", graph.nodes().len(), graph.edges().len());
    for node in graph.nodes() {
        println!("  {:<24} {:<16} {}", node.id, node.kind(), node.label);
    }
    for edge in graph.edges() {
        let port = edge.source_port.map(|p| format!(" [{}]", p)).unwrap_or_default();
        println!("  {} -> {}{}  ({})", edge.source, edge.target, port, edge.id);
    }
    Ok(ExitCode::SUCCESS)
}

fn compile(
    path: &Path,
    resolved: Option<&Path>,
    config: Option<&Path>,
    output: Option<&Path>,
    manifest: bool,
) -> netflow_engine::Result<ExitCode> {
    let graph = load_graph(path)?;
    let resolved = match resolved {
        Some(p) => ResolvedConfig::from_file(p)?,
        None => ResolvedConfig::new(),
    };
    let options = match config {
        Some(p) => CompilerOptions::from_file(p)?,
        None => CompilerOptions::default(),
    };
    let compiler = ScriptCompiler::builder().with_options(options).build()?;

    let script = match compiler.compile(&graph, &resolved) {
        Ok(script) => script,
        Err(CompileError::NotCompilable { issues }) => {
            eprintln!("{}: not compilable", path.display());
            print_issues(&issues);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(NetflowError::from(e)),
    };

    let text = script.render(compiler.options());
    match output {
        Some(out) => {
            std::fs::write(out, &text)?;
            log::info!("Wrote {} step(s) to {:?}", script.steps.len(), out);
        }
        None => print!("{}", text),
    }

    if manifest {
        let manifest = manifest_json(&script)?;
        // Keep stdout a runnable script when the script went there
        if output.is_some() {
            println!("{}", manifest);
        } else {
            eprintln!("{}", manifest);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn manifest_json(script: &CompiledScript) -> netflow_engine::Result<String> {
    let manifest = serde_json::json!({
        "resources": script.resources,
        "diagnostics": script.diagnostics,
    });
    Ok(serde_json::to_string_pretty(&manifest)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netflow_engine::types::DeviceConnectConfig;
    use netflow_engine::{TargetSelector, WorkflowBuilder};
    use tempfile::TempDir;

    fn write_graph(dir: &TempDir, name: &str, graph: &GraphModel) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, serde_json::to_string(&graph.to_document()).unwrap()).unwrap();
        path
    }

    fn minimal() -> GraphModel {
        WorkflowBuilder::new()
            .add_start("start")
            .add_end("end")
            .connect("start", "end")
            .build()
    }

    #[test]
    fn test_cli_parses_compile() {
        let cli = Cli::parse_from([
            "netflow", "compile", "g.json", "--resolved", "r.json", "--manifest",
        ]);
        match cli.command {
            Command::Compile {
                resolved, manifest, output, ..
            } => {
                assert_eq!(resolved, Some(PathBuf::from("r.json")));
                assert!(manifest);
                assert!(output.is_none());
            }
            other => panic!("Expected Compile, got {:?}", other),
        }
    }

    #[test]
    fn test_load_graph_accepts_stored_workflow() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stored.json");
        let stored = StoredWorkflow::new("wf", "Workflow", &minimal());
        std::fs::write(&path, serde_json::to_string(&stored).unwrap()).unwrap();
        assert_eq!(load_graph(&path).unwrap(), minimal());
    }

    #[test]
    fn test_compile_writes_output() {
        let dir = TempDir::new().unwrap();
        let graph_path = write_graph(&dir, "graph.json", &minimal());
        let out = dir.path().join("out.py");

        let code = compile(&graph_path, None, None, Some(out.as_path()), false).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("def run_workflow(ctx):"));
    }

    #[test]
    fn test_manifest_lists_unresolved_resources() {
        let graph = WorkflowBuilder::new()
            .add_start("start")
            .add_device_connect(
                "connect",
                DeviceConnectConfig {
                    credential_ref: Some("lab".to_string()),
                    target: Some(TargetSelector::Host {
                        host: "10.0.0.1".to_string(),
                    }),
                },
            )
            .add_end("end")
            .connect("start", "connect")
            .connect("connect", "end")
            .build();
        let script = ScriptCompiler::new()
            .compile(&graph, &ResolvedConfig::new())
            .unwrap();

        let manifest: serde_json::Value =
            serde_json::from_str(&manifest_json(&script).unwrap()).unwrap();
        assert_eq!(manifest["resources"][0]["kind"], "credential");
        assert_eq!(manifest["resources"][0]["id"], "lab");
        assert_eq!(manifest["diagnostics"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_invalid_graph_fails() {
        let dir = TempDir::new().unwrap();
        let graph_path = write_graph(&dir, "empty.json", &GraphModel::new());
        assert_eq!(validate(&graph_path, false).unwrap(), ExitCode::FAILURE);
        assert_eq!(
            compile(&graph_path, None, None, None, false).unwrap(),
            ExitCode::FAILURE
        );
    }
}
