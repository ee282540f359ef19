//! Driftwood Migration CLI Tool
//!
//! Command-line interface for applying declarative MySQL migrations.
//! Supports both CLI execution and integration with CI/CD pipelines.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use driftwood::config::MigratorConfig;
use driftwood::migration::{
    runner, validate, MigrationReport, Migrator, MysqlMigrator, SkipReason, ZERO_VERSION,
};
use driftwood_migrate::{
    create_migration_file, discover_migrations, pending_migrations, MigrationFile,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "driftwood-migrate")]
#[command(about = "Declarative schema migrations for MySQL")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (default: config/driftwood.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Migrations directory path
    #[arg(long, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and version table if missing
    Init,

    /// Print the current schema version
    Version,

    /// Show migration status (applied vs pending)
    Status,

    /// Apply pending migrations
    Up {
        /// Stop after this version (default: all pending)
        #[arg(long)]
        target: Option<String>,

        /// Dry run - show the SQL that would be executed without running it.
        /// Works before `init`: a missing database or version table counts as version 0
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate every migration file without connecting
    Check,

    /// Generate a new migration file
    New {
        /// Migration name (e.g., "create_users_table")
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    } else if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    dotenv::dotenv().ok();

    // `check` and `new` work offline; everything else needs the database config
    let config = cli.config.as_deref();
    let dir = cli.migrations_dir.as_path();
    let result = match &cli.command {
        Commands::Check => handle_check(dir),
        Commands::New { name } => handle_new(dir, name),
        Commands::Init => load_migrator(config).and_then(|m| handle_init(&m)),
        Commands::Version => load_migrator(config).and_then(|m| handle_version(&m)),
        Commands::Status => load_migrator(config).and_then(|m| handle_status(&m, dir)),
        Commands::Up { target, dry_run } => load_migrator(config)
            .and_then(|m| handle_up(&m, dir, target.as_deref(), *dry_run)),
    };

    match result {
        Ok(()) => {
            if !cli.quiet {
                println!("{}", "✅ Success".green());
            }
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{} {:#}", "❌ Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn load_migrator(config_path: Option<&Path>) -> Result<MysqlMigrator> {
    let config = match config_path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            MigratorConfig::load_from(path)
        }
        None => MigratorConfig::load(),
    }
    .context("Failed to load migrator configuration")?;

    log::debug!(
        "Using database {} on {}:{} (version table {})",
        config.database.database,
        config.database.host,
        config.database.port,
        config.version_table
    );
    Ok(MysqlMigrator::new(config))
}

fn handle_init(migrator: &MysqlMigrator) -> Result<()> {
    migrator.init()?;
    println!(
        "Database {} ready (version table {})",
        migrator.config().database.database.bold(),
        migrator.config().version_table
    );
    Ok(())
}

fn handle_version(migrator: &MysqlMigrator) -> Result<()> {
    println!("{}", migrator.version()?);
    Ok(())
}

fn handle_status(migrator: &MysqlMigrator, migrations_dir: &Path) -> Result<()> {
    let migrations = discover_migrations(migrations_dir)?;
    let current = migrator.version()?;

    println!("\n📊 Migration Status (current version: {})\n", current.bold());

    let mut applied = 0;
    for migration in &migrations {
        if migration.version.as_str() <= current.as_str() {
            applied += 1;
            println!("  {} {}_{}", "✓".green(), migration.version, migration.name);
        } else {
            println!("  {} {}_{} (pending)", "⏳".yellow(), migration.version, migration.name);
        }
    }

    if migrations.is_empty() {
        println!("  No migration files in {}", migrations_dir.display());
    }

    println!(
        "\n📈 Summary: {} applied, {} pending",
        applied,
        migrations.len() - applied
    );
    Ok(())
}

fn handle_up(
    migrator: &MysqlMigrator,
    migrations_dir: &Path,
    target: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let migrations = discover_migrations(migrations_dir)?;

    if dry_run {
        // Nothing is created on a dry run, so an uninitialized server reads as version 0
        let (current, database_exists) = match migrator.version() {
            Ok(version) => (version, true),
            Err(e) if e.is_unknown_database() => (ZERO_VERSION.to_string(), false),
            Err(e) if e.is_missing_table() => (ZERO_VERSION.to_string(), true),
            Err(e) => return Err(e.into()),
        };
        if !database_exists {
            log::info!(
                "database {} does not exist yet, planning without introspection",
                migrator.config().database.database
            );
        }
        let pending = pending_migrations(&migrations, &current, target);
        if pending.is_empty() {
            println!("No pending migrations to apply");
            return Ok(());
        }

        println!("Would apply {} migration(s):", pending.len());
        for (i, migration) in pending.iter().enumerate() {
            println!("  {}. {}_{}", i + 1, migration.version, migration.name);
            // Later migrations are planned against the current schema, not the
            // schema earlier pending migrations would leave behind
            let plan = if database_exists {
                migrator.plan(&migration.up)
            } else {
                validate(&migration.up).and_then(|commands| runner::plan(&commands, None))
            }
            .with_context(|| format!("Failed to plan {}", migration.path.display()))?;
            for statement in &plan.statements {
                println!("     {}", statement.cyan());
            }
            for skip in &plan.skipped {
                println!("     {} {}", "skip".dimmed(), describe_skip(&skip.constraint, &skip.reason));
            }
        }
        return Ok(());
    }

    migrator.init()?;
    let current = migrator.version()?;
    let pending = pending_migrations(&migrations, &current, target);

    println!("Applying migrations...");
    let mut applied = 0;
    for migration in pending {
        let report = apply(migrator, migration)?;
        print_report(migration, &report);
        applied += 1;
    }

    if applied > 0 {
        println!("✅ Successfully applied {} migration(s)", applied);
    } else {
        println!("✅ No migrations to apply");
    }

    Ok(())
}

fn apply(migrator: &MysqlMigrator, migration: &MigrationFile) -> Result<MigrationReport> {
    log::info!("Applying {}_{}", migration.version, migration.name);
    migrator
        .migrate(&migration.version, &migration.up)
        .with_context(|| format!("Migration {}_{} failed", migration.version, migration.name))
}

fn print_report(migration: &MigrationFile, report: &MigrationReport) {
    println!(
        "  {} {}_{} ({} statement(s))",
        "✓".green(),
        migration.version,
        migration.name,
        report.statements.len()
    );
    for skip in &report.skipped {
        println!("     {} {}", "skip".dimmed(), describe_skip(&skip.constraint, &skip.reason));
    }
}

fn describe_skip(constraint: &str, reason: &SkipReason) -> String {
    match reason {
        SkipReason::AlreadyPresent => format!("{} already exists", constraint),
        SkipReason::NotPresent => format!("{} does not exist", constraint),
    }
}

fn handle_check(migrations_dir: &Path) -> Result<()> {
    let migrations = discover_migrations(migrations_dir)?;

    let mut failures = 0;
    for migration in &migrations {
        match migration.check() {
            Ok(()) => println!("  {} {}_{}", "✓".green(), migration.version, migration.name),
            Err(e) => {
                failures += 1;
                println!("  {} {}_{}: {}", "✗".red(), migration.version, migration.name, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} migration file(s) are invalid", failures, migrations.len());
    }
    println!("All {} migration file(s) valid", migrations.len());
    Ok(())
}

fn handle_new(migrations_dir: &Path, name: &str) -> Result<()> {
    let path = create_migration_file(migrations_dir, name, chrono::Utc::now())?;
    println!("✅ Generated migration: {}", path.display());
    println!("   Add [[up]] and [[down]] command tables to the file");
    Ok(())
}
