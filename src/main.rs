use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use serde_sarif::sarif::{
    Artifact, ArtifactLocation, Invocation, PropertyBag, ReportingDescriptor, Result as SarifResult,
    Run, SCHEMA_URL, Sarif, Tool, ToolComponent,
};
use tracing::info;

use nullflow::config::AnalysisConfig;
use nullflow::engine::{AnalysisSummary, Engine};
use nullflow::program::load_program;
use nullflow::telemetry::{Telemetry, init_logging, with_span};

/// CLI arguments for nullflow execution.
#[derive(Parser, Debug)]
#[command(
    name = "nullflow",
    about = "Symbolic nullness, cast and instanceof analysis with SARIF output.",
    version
)]
struct Cli {
    /// Program document (JSON) to analyze.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Analysis settings (JSON).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// SARIF destination; `-` or omitted writes to stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Overrides the configured state budget per procedure.
    #[arg(long, value_name = "N")]
    max_states: Option<usize>,
    /// Report nullable arguments passed to unannotated parameters.
    #[arg(long)]
    report_unannotated: bool,
    /// OTLP HTTP endpoint receiving trace spans.
    #[arg(long, value_name = "URL")]
    otel: Option<String>,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !cli.quiet {
        init_logging();
    }
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    if !cli.input.exists() {
        anyhow::bail!("input not found: {}", cli.input.display());
    }
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(max_states) = cli.max_states {
        config.max_states = max_states;
    }
    if cli.report_unannotated {
        config.report_unannotated = true;
    }

    let telemetry = cli.otel.clone().map(Telemetry::new).transpose()?;

    let started_at = Instant::now();
    let load_started_at = Instant::now();
    let program = with_span(telemetry.as_ref(), "load", &[], || load_program(&cli.input))?;
    let load_duration_ms = load_started_at.elapsed().as_millis();

    let analysis_started_at = Instant::now();
    let output = Engine::new(config).analyze(&program, telemetry.as_ref())?;
    let analysis_duration_ms = analysis_started_at.elapsed().as_millis();

    let invocation = build_invocation(&InvocationStats {
        load_duration_ms,
        analysis_duration_ms,
        summary: output.summary,
    });
    let artifacts = vec![input_artifact(&cli.input)];
    let sarif = build_sarif(artifacts, invocation, output.rules, output.results);

    let mut writer = output_writer(cli.output.as_deref())?;
    serde_json::to_writer_pretty(&mut writer, &sarif)
        .context("failed to serialize SARIF output")?;
    writer
        .write_all(b"\n")
        .context("failed to write SARIF output")?;

    if let Some(telemetry) = &telemetry {
        telemetry.shutdown()?;
    }

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} load_ms={} analysis_ms={} procedures={} too_complex={}",
            started_at.elapsed().as_millis(),
            load_duration_ms,
            analysis_duration_ms,
            output.summary.procedures,
            output.summary.too_complex
        );
    }
    info!(input = %cli.input.display(), "analysis written");

    Ok(())
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

fn input_artifact(path: &Path) -> Artifact {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    let location = ArtifactLocation::builder()
        .uri(format!("file://{}", absolute.to_string_lossy()))
        .build();
    Artifact::builder()
        .location(location)
        .roles(vec![json!("analysisTarget")])
        .build()
}

/// Metadata captured for SARIF invocation properties.
struct InvocationStats {
    load_duration_ms: u128,
    analysis_duration_ms: u128,
    summary: AnalysisSummary,
}

fn build_invocation(stats: &InvocationStats) -> Invocation {
    let arguments: Vec<String> = std::env::args().collect();
    let command_line = arguments.join(" ");
    let mut properties = BTreeMap::new();
    properties.insert("nullflow.load_ms".to_string(), json!(stats.load_duration_ms));
    properties.insert(
        "nullflow.analysis_ms".to_string(),
        json!(stats.analysis_duration_ms),
    );
    properties.insert(
        "nullflow.procedure_count".to_string(),
        json!(stats.summary.procedures),
    );
    properties.insert(
        "nullflow.too_complex_count".to_string(),
        json!(stats.summary.too_complex),
    );
    properties.insert(
        "nullflow.states_visited".to_string(),
        json!(stats.summary.states_visited),
    );

    Invocation::builder()
        .execution_successful(true)
        .arguments(arguments)
        .command_line(command_line)
        .properties(PropertyBag::builder().additional_properties(properties).build())
        .build()
}

fn build_sarif(
    artifacts: Vec<Artifact>,
    invocation: Invocation,
    rules: Vec<ReportingDescriptor>,
    results: Vec<SarifResult>,
) -> Sarif {
    let driver = if rules.is_empty() {
        ToolComponent::builder()
            .name("nullflow")
            .version(env!("CARGO_PKG_VERSION"))
            .build()
    } else {
        ToolComponent::builder()
            .name("nullflow")
            .version(env!("CARGO_PKG_VERSION"))
            .rules(rules)
            .build()
    };
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let run = if artifacts.is_empty() {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .build()
    } else {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .artifacts(artifacts)
            .build()
    };

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}
