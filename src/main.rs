//! autonative - Native Library Discovery and Binding
//!
//! CLI for inspecting how a native library would be found and bound on this
//! machine.

use anyhow::{Context, Result};
use autonative::config::LoaderConfig;
use autonative::logging::init_logging;
use autonative::{
    bind, CandidatePath, InterfaceDescriptor, NativeImport, NativeValue, OperationSignature,
    PlatformInfo,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "autonative")]
#[command(version)]
#[command(about = "Locate and bind native shared libraries", long_about = None)]
struct Cli {
    /// Config file (default: nearest autonative.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate paths in search order
    Candidates {
        /// Logical library name (e.g. rocksdb)
        name: String,

        /// Dotted version
        #[arg(long, default_value = "")]
        version: String,

        /// Search root (default: directory of this executable)
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Directory holding per-architecture subdirectories
        #[arg(long)]
        arch_base: Option<String>,

        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Show the detected platform
    Platform {
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Locate a library, resolve symbols and bind signatures
    Probe {
        /// Logical library name
        name: String,

        /// Dotted version
        #[arg(long, default_value = "")]
        version: String,

        /// Search root (default: directory of this executable)
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Directory holding per-architecture subdirectories
        #[arg(long)]
        arch_base: Option<String>,

        /// Resolve an exported symbol (repeatable)
        #[arg(long = "symbol", value_name = "NAME")]
        symbols: Vec<String>,

        /// Bind a declaration such as "i32 getpid()" (repeatable)
        #[arg(long = "signature", value_name = "DECL")]
        signatures: Vec<String>,

        /// Call bound operations that take no arguments
        #[arg(long)]
        call: bool,

        /// Keep the library mapped on exit
        #[arg(long)]
        suppress_unload: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let filter = if cli.verbose {
        "autonative=debug"
    } else {
        config.logging.filter.as_str()
    };
    init_logging(Some(filter));

    match cli.command {
        Commands::Platform { json } => cmd_platform(json),
        Commands::Candidates {
            name,
            version,
            base_dir,
            arch_base,
            json,
        } => {
            let import = build_import(&name, &version, base_dir, arch_base, &config);
            cmd_candidates(&import, json)
        }
        Commands::Probe {
            name,
            version,
            base_dir,
            arch_base,
            symbols,
            signatures,
            call,
            suppress_unload,
        } => {
            let mut import = build_import(&name, &version, base_dir, arch_base, &config);
            if suppress_unload {
                import = import.suppress_unload(true);
            }
            cmd_probe(&import, &symbols, &signatures, call)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<LoaderConfig> {
    match path {
        Some(path) => LoaderConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to read working directory")?;
            LoaderConfig::find_and_load(&cwd).context("Failed to load config")
        }
    }
}

fn build_import(
    name: &str,
    version: &str,
    base_dir: Option<PathBuf>,
    arch_base: Option<String>,
    config: &LoaderConfig,
) -> NativeImport {
    let mut import = NativeImport::new(name, version);
    if let Some(dir) = base_dir {
        import = import.with_base_dir(dir);
    }
    if let Some(arch_base) = arch_base {
        import = import.with_arch_base(arch_base);
    }
    import.with_config(config)
}

fn cmd_platform(json: bool) -> Result<()> {
    let platform = PlatformInfo::current();
    let loader = autonative::system_loader();

    if json {
        let out = serde_json::to_string_pretty(platform).context("Failed to encode platform")?;
        println!("{}", out);
        return Ok(());
    }

    println!("Family:       {}", platform.family);
    println!("Architecture: {}", platform.arch_tag);
    println!("Library name: {}", loader.translate_name("<name>"));
    for fallback in &platform.fallbacks {
        println!("Fallback:     {}", fallback);
    }
    Ok(())
}

fn cmd_candidates(import: &NativeImport, json: bool) -> Result<()> {
    let candidates = import.candidates();

    if json {
        let out =
            serde_json::to_string_pretty(&candidates).context("Failed to encode candidates")?;
        println!("{}", out);
        return Ok(());
    }

    println!(
        "{} candidates for '{}' (version '{}'):",
        candidates.len(),
        import.library(),
        import.version()
    );
    for (i, candidate) in candidates.iter().enumerate() {
        print_candidate(i + 1, candidate);
    }
    Ok(())
}

fn print_candidate(position: usize, candidate: &CandidatePath) {
    println!(
        "{:>4}  {:<12} {}",
        position,
        candidate.tier.to_string(),
        candidate.path().display()
    );
}

fn cmd_probe(
    import: &NativeImport,
    symbols: &[String],
    signatures: &[String],
    call: bool,
) -> Result<()> {
    let operations = signatures
        .iter()
        .map(|decl| {
            OperationSignature::parse(decl)
                .with_context(|| format!("Invalid signature: {}", decl))
        })
        .collect::<Result<Vec<_>>>()?;
    let descriptor = InterfaceDescriptor::new(operations)
        .map_err(|name| anyhow::anyhow!("Duplicate signature: {}", name))?;

    let library = import
        .locate()
        .with_context(|| format!("Failed to locate '{}'", import.library()))?;
    println!("Loaded {}", library.path().display());

    for symbol in symbols {
        match library.resolve(symbol) {
            Ok(address) => println!("  {:<24} {:?}", symbol, address),
            Err(err) => println!("  {:<24} missing ({})", symbol, err.reason),
        }
    }

    if descriptor.is_empty() {
        return Ok(());
    }

    let adapter = bind(&descriptor, library).context("Binding failed")?;
    println!(
        "Bound {} operations in {} call shapes",
        adapter.len(),
        adapter.shape_count()
    );
    for function in adapter.functions() {
        println!(
            "  {:<40} {:?}  [{}]",
            function.signature().to_string(),
            function.address(),
            function.shape()
        );
    }

    if call {
        for function in adapter.functions() {
            if !function.signature().params.is_empty() {
                continue;
            }
            let value = adapter
                .call(function.name(), &[])
                .with_context(|| format!("Call to {} failed", function.name()))?;
            if value != NativeValue::Void {
                println!("  {}() = {}", function.name(), value);
            }
        }
    }

    if adapter.release() {
        println!("Released {}", adapter.library_path().display());
    }
    Ok(())
}
