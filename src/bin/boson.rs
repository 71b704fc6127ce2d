//! boson CLI - data-driven API test execution tool.

use anyhow::{anyhow, Context, Result};
use boson::store::{MemoryStore, VariableStore, YamlFileStore};
use boson::{
    http::ReqwestClient, Runner, Scenario, ScenarioExecutor, ScenarioLoader,
    ScenarioResult,
};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// boson - YAML-driven API test executor.
#[derive(Parser, Debug)]
#[command(name = "boson", version, about)]
struct Cli {
    /// Scenario file or directory path.
    #[arg(short = 'p', long = "path")]
    test_path: Option<String>,

    /// Filter scenarios by name (partial match).
    #[arg(short = 'f', long = "filter")]
    test_filter: Option<String>,

    /// Enable verbose logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Timeout in seconds per step.
    #[arg(short = 't', long = "timeout")]
    timeout: Option<u64>,

    /// Directory to save report files.
    #[arg(short = 'r', long = "report-dir")]
    report_dir: Option<String>,

    /// Report output format.
    #[arg(long = "report-format", default_value = "json")]
    report_format: ReportFormat,

    /// Base URL override for all scenarios.
    #[arg(short = 'b', long = "base-url")]
    base_url: Option<String>,

    /// Persist captured variables to this YAML file instead of
    /// keeping them in memory.
    #[arg(long = "variables-file", env = "BOSON_VARIABLES_FILE")]
    variables_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum ReportFormat {
    Json,
    Yaml,
    Text,
}

fn init_tracing(verbose: bool) {
    if std::env::var_os("RUST_LOG").is_none() {
        let level = if verbose { "debug" } else { "info" };
        std::env::set_var("RUST_LOG", level);
    }

    if tracing::dispatcher::has_been_set() {
        return;
    }

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}

fn print_scenario_result(result: &ScenarioResult, verbose: bool) {
    let status = if result.success {
        "\x1b[32mPASS\x1b[0m"
    } else {
        "\x1b[31mFAIL\x1b[0m"
    };
    info!(
        "{} scenario: {} ({} ms)",
        status, result.name, result.duration_ms
    );

    for (i, step) in result.steps.iter().enumerate() {
        let step_status = if step.success {
            "\x1b[32m✓\x1b[0m"
        } else {
            "\x1b[31m✗\x1b[0m"
        };
        info!(
            "  {}. {} {} ({} ms)",
            i + 1,
            step_status,
            step.name,
            step.duration_ms
        );

        if let Some(error) = &step.error {
            error!("     \x1b[31mError: {}\x1b[0m", error);
        }

        if verbose {
            debug!("     Request: {} {}", step.request.method, step.request.url);
            if let Some(body) = &step.request.body {
                debug!("     Request body: {}", truncate(body, 500));
            }

            if let Some(response) = &step.response {
                debug!("     Response: Status {}", response.status);
                if let Some(body) = &response.body {
                    debug!("     Response body: {}", truncate(body, 500));
                }
            }
        }
    }
}

fn truncate(body: &str, limit: usize) -> String {
    if body.len() > limit {
        format!("{}...(truncated)", &body[..limit])
    } else {
        body.to_string()
    }
}

fn save_report(
    result: &ScenarioResult,
    report_dir: &Path,
    format: ReportFormat,
) -> Result<PathBuf> {
    if !report_dir.exists() {
        fs::create_dir_all(report_dir)?;
    }

    let timestamp = Utc::now().timestamp();
    let sanitized_name = result.name.replace([' ', '/'], "_");

    let (filename, content) = match format {
        ReportFormat::Json => {
            let filename = format!("{sanitized_name}-{timestamp}.json");
            let content = serde_json::to_string_pretty(result)?;
            (filename, content)
        }
        ReportFormat::Yaml => {
            let filename = format!("{sanitized_name}-{timestamp}.yaml");
            let content = serde_yaml::to_string(result)?;
            (filename, content)
        }
        ReportFormat::Text => {
            let filename = format!("{sanitized_name}-{timestamp}.txt");
            let mut content = String::new();
            content.push_str(&format!("Scenario: {}\n", result.name));
            content.push_str(&format!(
                "Status: {}\n",
                if result.success { "PASS" } else { "FAIL" }
            ));
            if let Some(error) = &result.error {
                content.push_str(&format!("Error: {error}\n"));
            }
            content.push_str(&format!("Duration: {} ms\n\n", result.duration_ms));
            content.push_str("Steps:\n");
            for (i, step) in result.steps.iter().enumerate() {
                content.push_str(&format!(
                    "  {}. {} ({})\n",
                    i + 1,
                    step.name,
                    if step.success { "PASS" } else { "FAIL" }
                ));
                if let Some(error) = &step.error {
                    content.push_str(&format!("     Error: {error}\n"));
                }
                content.push_str(&format!("     Duration: {} ms\n", step.duration_ms));
            }
            (filename, content)
        }
    };

    let file_path = report_dir.join(filename);
    let mut file = File::create(&file_path)?;
    file.write_all(content.as_bytes())?;

    Ok(file_path)
}

fn prepare_scenarios(test_path: Option<String>) -> Result<Vec<Scenario>> {
    let mut loader = ScenarioLoader::new();

    let default_paths = ["tests/scenarios", "testcase/scenarios", "test/scenarios"];

    for path in &default_paths {
        if Path::new(path).exists() {
            loader.add_path(path);
        }
    }

    let mut scenarios = Vec::new();

    if let Some(path) = test_path {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(anyhow!("Path does not exist: {}", path.display()));
        }

        if path.is_file() {
            scenarios.push(
                loader
                    .load_scenario(&path)
                    .context(format!("Failed to load scenario: {}", path.display()))?,
            );
        } else if path.is_dir() {
            let dir_scenarios = loader.load_scenarios_from_dir(&path).context(format!(
                "Failed to load scenarios from directory: {}",
                path.display()
            ))?;
            scenarios.extend(dir_scenarios);
        }
    } else {
        scenarios = loader.load_all_scenarios()?;
    }

    if scenarios.is_empty() {
        return Err(anyhow!("No scenarios found"));
    }

    Ok(scenarios)
}

async fn run_all_scenarios(args: Cli, scenarios: Vec<Scenario>) -> Result<bool> {
    let store: Box<dyn VariableStore> = match &args.variables_file {
        Some(path) => Box::new(YamlFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };
    // One executor for the whole run: variables and the bearer
    // credential are shared across scenarios.
    let mut executor =
        ScenarioExecutor::new(Box::new(ReqwestClient::new()), store);

    let mut all_success = true;
    let total_start = Instant::now();
    let mut passed = 0;
    let mut failed = 0;

    let filtered: Vec<Scenario> = match &args.test_filter {
        Some(filter) => scenarios
            .into_iter()
            .filter(|s| s.name.to_lowercase().contains(&filter.to_lowercase()))
            .collect(),
        None => scenarios,
    };

    if filtered.is_empty() {
        return Err(anyhow!("No scenarios matching the filter were found"));
    }

    let total = filtered.len();
    info!("Running {} scenario(s)...", total);

    let report_dir = args.report_dir.as_ref().map(PathBuf::from);

    for (idx, mut scenario) in filtered.into_iter().enumerate() {
        if let Some(timeout) = args.timeout {
            scenario.config.timeout = timeout;
        }
        if let Some(ref base_url) = args.base_url {
            scenario.config.base_url = Some(base_url.clone());
        }

        info!("Scenario {}/{}: {}", idx + 1, total, scenario.name);
        match executor.run(&scenario).await {
            Ok(result) => {
                print_scenario_result(&result, args.verbose);

                if let Some(ref dir) = report_dir {
                    match save_report(&result, dir, args.report_format) {
                        Ok(path) => info!("Report saved: {}", path.display()),
                        Err(e) => error!("Failed to save report: {}", e),
                    }
                }

                if result.success {
                    passed += 1;
                } else {
                    all_success = false;
                    failed += 1;
                }
            }
            Err(e) => {
                error!(
                    "\x1b[31mScenario execution error: {} - {}\x1b[0m",
                    scenario.name, e
                );
                all_success = false;
                failed += 1;
            }
        }
    }

    let total_duration = total_start.elapsed().as_millis();
    info!(
        "Summary:\n  Total: {}\n  \x1b[32mPassed: {}\x1b[0m\n  \x1b[31mFailed: {}\x1b[0m\n  Duration: {} ms",
        passed + failed,
        passed,
        failed,
        total_duration
    );

    Ok(all_success)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.verbose);

    let scenarios = prepare_scenarios(args.test_path.clone())?;

    let success = run_all_scenarios(args, scenarios).await?;

    if !success {
        exit(1);
    }

    Ok(())
}
