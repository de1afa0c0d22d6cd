// crates/faascli/src/main.rs

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use faascore::{Function, Language, RuntimeKind};
use faasruntime::{DockerApi, DockerCli, FaasRuntime, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "faas")]
#[command(about = "Function platform CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a local source file in a container
    Run {
        /// Path to a .py or .js source file
        #[arg(short, long)]
        file: PathBuf,

        /// Override language detection (python or node)
        #[arg(short, long)]
        language: Option<String>,

        /// Container runtime (runc or runsc)
        #[arg(short, long, default_value = "runc")]
        runtime: String,

        /// Execution timeout in seconds
        #[arg(short, long, default_value_t = 30)]
        timeout: u64,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check the local Docker environment
    Doctor,

    /// Create an example function definition
    Init {
        /// Output file path
        #[arg(short, long, default_value = "function.json")]
        output: PathBuf,
    },

    /// Register a function definition with a running server
    Deploy {
        /// Path to a function JSON file
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "http://localhost:3000")]
        server: String,
    },

    /// Execute a deployed function by id
    Invoke {
        #[arg(short, long)]
        id: i64,

        #[arg(short, long, default_value = "http://localhost:3000")]
        server: String,
    },

    /// List deployed functions
    List {
        #[arg(short, long, default_value = "http://localhost:3000")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            language,
            runtime,
            timeout,
            verbose,
        } => {
            // Initialize logging
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::WARN)
                    .init();
            }

            run_file(file, language, runtime, timeout).await?;
        }

        Commands::Doctor => {
            doctor().await?;
        }

        Commands::Init { output } => {
            create_example_function(output)?;
        }

        Commands::Deploy { file, server } => {
            deploy(file, server).await?;
        }

        Commands::Invoke { id, server } => {
            invoke(id, server).await?;
        }

        Commands::List { server } => {
            list(server).await?;
        }
    }

    Ok(())
}

fn detect_language(path: &Path, explicit: Option<String>) -> Result<Language> {
    if let Some(lang) = explicit {
        return Language::from_str(&lang).map_err(|e| anyhow!(e));
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("py") => Ok(Language::Python),
        Some("js") | Some("mjs") => Ok(Language::Node),
        _ => Err(anyhow!(
            "cannot detect language from {}; pass --language",
            path.display()
        )),
    }
}

async fn run_file(
    file: PathBuf,
    language: Option<String>,
    runtime: String,
    timeout: u64,
) -> Result<()> {
    let language = detect_language(&file, language)?;
    let runtime_kind = RuntimeKind::from_str(&runtime).map_err(|e| anyhow!(e))?;
    let code = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("local")
        .to_string();

    println!("🚀 Running {} ({language}, {runtime_kind})", file.display());

    let function = Function::new(&name, format!("/{name}"), language)
        .with_code(code)
        .with_timeout(timeout)
        .with_runtime(runtime_kind);

    // Local one-shot execution: no warm pool
    let engine = FaasRuntime::with_config(RuntimeConfig {
        prewarm_count: 0,
        ..RuntimeConfig::default()
    });
    engine.ensure_ready().await?;

    let report = engine.execute(&function).await?;

    if !report.output.is_empty() {
        println!("{}", report.output);
    }
    if !report.stderr.is_empty() {
        eprintln!("{}", report.stderr.trim_end());
    }

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", report.execution_id);
    println!("   Runtime: {runtime_kind}");
    println!("   Response time: {:.3}s", report.sample.response_time);
    println!("   Peak memory: {:.1} MiB", report.sample.memory_usage);
    println!("   Peak CPU: {:.2}%", report.sample.cpu_usage);

    if report.timed_out {
        println!("❌ Killed after exceeding {timeout}s");
        std::process::exit(1);
    } else if !report.success {
        println!("❌ Exited with code {}", report.exit_code);
        std::process::exit(report.exit_code.max(1));
    } else {
        println!("✨ Completed successfully");
    }

    Ok(())
}

async fn doctor() -> Result<()> {
    let docker = DockerCli::new();
    let config = RuntimeConfig::default();

    println!("🔍 Checking Docker environment");

    match docker.ping().await {
        Ok(()) => println!("  ✅ Docker daemon reachable"),
        Err(e) => {
            println!("  ❌ Docker daemon: {e}");
            return Err(anyhow!("docker daemon is not available"));
        }
    }

    let runtimes = docker.runtimes().await?;
    println!("  📦 Installed runtimes: {}", runtimes.join(", "));
    if !runtimes.iter().any(|r| r == "runsc") {
        println!("  ⚠️  gVisor (runsc) not installed; sandboxed runs will fail");
    }

    for (language, image) in [
        (Language::Python, &config.python_image),
        (Language::Node, &config.node_image),
    ] {
        if docker.image_present(image).await? {
            println!("  ✅ {language} image present: {image}");
        } else {
            println!("  ⚠️  {language} image missing: {image} (pulled on first use)");
        }
    }

    Ok(())
}

fn create_example_function(output: PathBuf) -> Result<()> {
    let function = Function::new("hello", "/hello", Language::Python)
        .with_code("print('Hello, world!')")
        .with_timeout(30);

    let json = serde_json::to_string_pretty(&function)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example function: {}", output.display());
    println!();
    println!("Deploy it with:");
    println!("  faas deploy --file {}", output.display());

    Ok(())
}

async fn deploy(file: PathBuf, server: String) -> Result<()> {
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let function: Function = serde_json::from_str(&raw)?;
    function.validate().map_err(|e| anyhow!(e))?;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{server}/functions/"))
        .json(&function)
        .send()
        .await
        .with_context(|| format!("failed to reach {server}"))?;

    let status = response.status();
    let body: serde_json::Value = response.json().await?;

    if status.is_success() {
        println!(
            "✅ Deployed {} as function {}",
            function.name,
            body.get("id").cloned().unwrap_or_default()
        );
    } else {
        return Err(anyhow!(
            "server rejected deploy ({status}): {}",
            body.get("error").and_then(|e| e.as_str()).unwrap_or("?")
        ));
    }

    Ok(())
}

async fn invoke(id: i64, server: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{server}/functions/{id}/run"))
        .send()
        .await
        .with_context(|| format!("failed to reach {server}"))?;

    let status = response.status();
    let body: serde_json::Value = response.json().await?;

    if status.is_success() {
        println!(
            "{}",
            body.get("output").and_then(|o| o.as_str()).unwrap_or("")
        );
    } else {
        return Err(anyhow!(
            "invocation failed ({status}): {}",
            body.get("error").and_then(|e| e.as_str()).unwrap_or("?")
        ));
    }

    Ok(())
}

async fn list(server: String) -> Result<()> {
    let client = reqwest::Client::new();
    let functions: Vec<Function> = client
        .get(format!("{server}/functions/"))
        .send()
        .await
        .with_context(|| format!("failed to reach {server}"))?
        .json()
        .await?;

    if functions.is_empty() {
        println!("No functions deployed");
        return Ok(());
    }

    println!("📦 Deployed functions:");
    for f in functions {
        println!(
            "  {:>4}  {:<20} {:<10} {:<6} {}",
            f.id, f.name, f.route, f.language, f.runtime
        );
    }

    Ok(())
}
