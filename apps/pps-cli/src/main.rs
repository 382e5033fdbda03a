use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pps_core::config::{load_config, write_schema_file, Config};
use pps_core::{DataManager, ForegroundLoop, LazySettings};
use pps_kernel::Kernel;
use pps_model::Owner;
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pps", version, about = "Particle profile store utilities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or migrate) the particle database
    Init(StoreArgs),
    /// Print one owner's record as JSON
    Show(ShowArgs),
    /// Print store statistics (JSON)
    Stats(StoreArgs),
    /// Write the configuration JSON schema to a file
    ConfigSchema {
        /// Output path
        path: PathBuf,
    },
}

#[derive(Args)]
struct StoreArgs {
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override `[store] state_dir`
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ShowArgs {
    /// Owner UUID
    owner: String,
    #[command(flatten)]
    store: StoreArgs,
    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() {
    pps_otel::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Init(args) => cmd_init(&args),
        Commands::Show(args) => cmd_show(&args),
        Commands::Stats(args) => cmd_stats(&args),
        Commands::ConfigSchema { path } => cmd_config_schema(&path),
    };
    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn read_config(args: &StoreArgs) -> Result<Config> {
    let mut cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &args.state_dir {
        cfg.store.state_dir = Some(dir.display().to_string());
    }
    Ok(cfg)
}

fn open_kernel(cfg: &Config) -> Result<Kernel> {
    let dir = cfg.store.state_dir();
    Kernel::open(&dir).with_context(|| format!("open store in {}", dir.display()))
}

fn cmd_init(args: &StoreArgs) -> Result<()> {
    let cfg = read_config(args)?;
    let kernel = open_kernel(&cfg)?;
    tracing::info!(target: "pps::cli", path = %kernel.db_path().display(), "store ready");
    println!("{}", kernel.db_path().display());
    Ok(())
}

fn cmd_stats(args: &StoreArgs) -> Result<()> {
    let cfg = read_config(args)?;
    let kernel = open_kernel(&cfg)?;
    let owners = kernel.with_store(|store| store.count_owners())?;
    println!(
        "{}",
        json!({ "db_path": kernel.db_path().display().to_string(), "owners": owners })
    );
    Ok(())
}

fn cmd_show(args: &ShowArgs) -> Result<()> {
    let owner: Owner = args.owner.parse()?;
    let cfg = read_config(&args.store)?;
    let kernel = open_kernel(&cfg)?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start runtime")?;
    let report = rt.block_on(show_record(kernel, cfg, owner))?;
    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

async fn show_record(kernel: Kernel, cfg: Config, owner: Owner) -> Result<serde_json::Value> {
    let (dispatcher, foreground) = ForegroundLoop::new(tokio::runtime::Handle::current());
    let _foreground = foreground.spawn().context("spawn foreground loop")?;
    let manager = DataManager::builder(kernel, dispatcher)
        .settings(LazySettings::fixed(cfg))
        .build();
    let record = manager.load(owner).await?;
    Ok(json!({
        "record": record,
        "next_fixed_effect_id": manager.next_fixed_effect_id(&record),
        "fixed_effect_limit_reached": manager.has_reached_fixed_effect_limit(&record),
    }))
}

fn cmd_config_schema(path: &Path) -> Result<()> {
    write_schema_file(path).with_context(|| format!("write {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn state_dir_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let args = StoreArgs {
            config: None,
            state_dir: Some(dir.path().join("db")),
        };
        cmd_init(&args).unwrap();
        assert!(dir.path().join("db").join(pps_kernel::DB_FILE_NAME).exists());
    }

    #[test]
    fn show_initializes_and_reports_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let args = StoreArgs {
            config: None,
            state_dir: Some(dir.path().to_path_buf()),
        };
        let cfg = read_config(&args).unwrap();
        let kernel = open_kernel(&cfg).unwrap();
        let owner = Owner::new_random();
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let report = rt.block_on(show_record(kernel.clone(), cfg, owner)).unwrap();
        assert_eq!(report["next_fixed_effect_id"], 1);
        assert_eq!(report["fixed_effect_limit_reached"], false);
        assert_eq!(kernel.with_store(|s| s.count_owners()).unwrap(), 1);
    }

    #[test]
    fn schema_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        cmd_config_schema(&path).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("write_failure_policy"));
    }
}
