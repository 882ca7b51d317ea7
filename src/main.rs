//! git-ws CLI entry point.

use clap::{Parser, Subcommand};
use git_ws::cli::Output;
use git_ws::core::orchestrator::{InitOptions, Orchestrator};

#[derive(Parser)]
#[command(name = "git-ws")]
#[command(author, version, about = "Multi-repository workspace orchestrator", long_about = None)]
struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Output machine-readable JSON where supported
    #[arg(long, global = true)]
    json: bool,
    /// Restrict group-filtered operations to an additional group (repeatable)
    #[arg(short = 'G', long = "group", global = true)]
    group: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn the current directory into a workspace root
    Init {
        /// Path to the main project, relative to the workspace root
        #[arg(long)]
        main_path: Option<String>,
        /// Manifest path within the main project
        #[arg(long)]
        manifest_path: Option<String>,
        /// Default clone depth for shallow dependencies
        #[arg(long)]
        depth: Option<u32>,
        /// Re-initialize even if `.git-ws` already exists
        #[arg(long)]
        force: bool,
    },
    /// Clone a main project and turn it into a workspace root
    Clone {
        /// URL of the main project
        url: String,
        /// Revision to check out
        #[arg(long)]
        revision: Option<String>,
        /// Path to the main project, relative to the workspace root
        #[arg(long)]
        main_path: Option<String>,
        /// Manifest path within the main project
        #[arg(long)]
        manifest_path: Option<String>,
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Remove the workspace's `.git-ws` state
    Deinit,
    /// Clone missing dependencies and synchronize existing ones to their declared revisions
    Update {
        /// Only update the named project paths
        projects: Vec<String>,
        /// Remove clones no longer declared by any reachable manifest
        #[arg(long)]
        prune: bool,
        /// Rebase instead of merge when fast-forwarding a tracked branch
        #[arg(long)]
        rebase: bool,
        /// Proceed even over local modifications
        #[arg(long)]
        force: bool,
    },
    /// Remove clones that are no longer declared
    Prune {
        #[arg(long)]
        force: bool,
    },
    /// Show per-clone status
    Status,
    /// Check out a revision across all clones
    Checkout {
        revision: String,
        /// Restrict to these project paths
        #[arg(long)]
        project: Vec<String>,
    },
    /// Stage changes in the clone owning a path
    Add {
        path: String,
        files: Vec<String>,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        all: bool,
    },
    /// Unstage/remove files in the clone owning a path
    Rm {
        path: String,
        files: Vec<String>,
        #[arg(long)]
        cached: bool,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        recursive: bool,
    },
    /// Reset files in the clone owning a path
    Reset { path: String, files: Vec<String> },
    /// Commit staged changes in the clone owning a path
    Commit {
        path: String,
        #[arg(short, long)]
        message: String,
        #[arg(long)]
        all: bool,
    },
    /// Show a diffstat, optionally scoped to one project
    Diff {
        #[arg(long)]
        project: Option<String>,
    },
    /// Run a shell command in every cloned project
    Foreach {
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Freeze the current state of every clone into a tag
    Tag {
        name: String,
        #[arg(short, long)]
        message: Option<String>,
        #[arg(long)]
        force: bool,
    },
    /// Manifest inspection
    Manifest {
        #[command(subcommand)]
        action: ManifestCommands,
    },
    /// Sync manifests with the discovered origin URL of each clone
    DepUpdate,
}

#[derive(Subcommand)]
enum ManifestCommands {
    /// Print the path of the effective manifest
    Path,
    /// Print the resolved manifest, optionally freezing revisions
    Resolve {
        #[arg(long)]
        freeze: bool,
    },
    /// Validate the effective manifest
    Validate,
}

fn main() -> anyhow::Result<()> {
    let telemetry_config = if std::env::var("GIT_WS_VERBOSE").is_ok() {
        git_ws::telemetry::TelemetryConfig::development()
    } else {
        git_ws::telemetry::TelemetryConfig::default()
    };
    let _telemetry_guard = git_ws::telemetry::init_telemetry(&telemetry_config)?;

    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    let result = run(&cli, &cwd);
    if let Err(err) = &result {
        Output::error(&err.to_string());
    }
    result?;
    Ok(())
}

fn run(cli: &Cli, cwd: &std::path::Path) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init {
            main_path,
            manifest_path,
            depth,
            force,
        } => {
            let orch = Orchestrator::init(
                cwd,
                InitOptions {
                    main_path: main_path.as_deref(),
                    manifest_path: manifest_path.as_deref(),
                    group_filters: cli.group.clone(),
                    depth: *depth,
                    force: *force,
                },
            )?;
            Output::success(&format!("initialized workspace at {}", orch.workspace.root.display()));
        }
        Commands::Clone {
            url,
            revision,
            main_path,
            manifest_path,
            depth,
        } => {
            let orch = Orchestrator::clone_new(
                cwd,
                url,
                revision.as_deref(),
                InitOptions {
                    main_path: main_path.as_deref(),
                    manifest_path: manifest_path.as_deref(),
                    group_filters: cli.group.clone(),
                    depth: *depth,
                    force: false,
                },
            )?;
            Output::success(&format!("cloned into {}", orch.workspace.root.display()));
        }
        Commands::Deinit => {
            let orch = Orchestrator::open(cwd)?;
            orch.deinit()?;
            Output::success("removed .git-ws state");
        }
        Commands::Update {
            projects,
            prune,
            rebase,
            force,
        } => {
            let mut orch = Orchestrator::open(cwd)?;
            let filter = if projects.is_empty() { None } else { Some(projects.as_slice()) };
            orch.update(filter, *prune, *rebase, *force)?;
            Output::success("workspace synchronized");
        }
        Commands::Prune { force } => {
            let orch = Orchestrator::open(cwd)?;
            let removed = orch.prune(*force)?;
            for path in &removed {
                Output::list_item(&path.display().to_string());
            }
            Output::success(&format!("removed {} clone(s)", removed.len()));
        }
        Commands::Status => {
            let orch = Orchestrator::open(cwd)?;
            for (path, entries) in orch.status_all()? {
                if entries.is_empty() {
                    continue;
                }
                Output::header(&path);
                for entry in entries {
                    print_status_entry(&entry);
                }
            }
        }
        Commands::Checkout { revision, project } => {
            let orch = Orchestrator::open(cwd)?;
            let filter = if project.is_empty() { None } else { Some(project.as_slice()) };
            orch.checkout(revision, filter)?;
            Output::success(&format!("checked out {revision}"));
        }
        Commands::Add {
            path,
            files,
            force,
            all,
        } => {
            let orch = Orchestrator::open(cwd)?;
            let paths = if files.is_empty() { None } else { Some(files.as_slice()) };
            orch.add(path, paths, *force, *all)?;
        }
        Commands::Rm {
            path,
            files,
            cached,
            force,
            recursive,
        } => {
            let orch = Orchestrator::open(cwd)?;
            orch.rm(path, files, *cached, *force, *recursive)?;
        }
        Commands::Reset { path, files } => {
            let orch = Orchestrator::open(cwd)?;
            orch.reset(path, files)?;
        }
        Commands::Commit { path, message, all } => {
            let orch = Orchestrator::open(cwd)?;
            orch.commit(path, message, None, *all)?;
            Output::success("committed");
        }
        Commands::Diff { project } => {
            let orch = Orchestrator::open(cwd)?;
            for (path, stat) in orch.diff(project.as_deref(), None)? {
                println!("{path}\t{stat}");
            }
        }
        Commands::Foreach { command } => {
            let orch = Orchestrator::open(cwd)?;
            let program = &command[0];
            let args = &command[1..];
            orch.foreach(|clone| {
                Output::subheader(&clone.project.path);
                let status = std::process::Command::new(program)
                    .args(args)
                    .current_dir(clone.git.path())
                    .status();
                if let Ok(status) = status {
                    if !status.success() {
                        Output::warning(&format!("{} exited with {}", clone.project.path, status));
                    }
                }
                Ok(())
            })?;
        }
        Commands::Tag { name, message, force } => {
            let orch = Orchestrator::open(cwd)?;
            orch.tag(name, message.as_deref(), *force)?;
            Output::success(&format!("tagged {name}"));
        }
        Commands::Manifest { action } => {
            let orch = Orchestrator::open(cwd)?;
            match action {
                ManifestCommands::Path => {
                    let main = orch.workspace.main_path()?;
                    let declared = main.join(&orch.workspace.config.manifest_path);
                    println!("{}", orch.effective_manifest_path(&main, &declared).display());
                }
                ManifestCommands::Resolve { freeze } => {
                    let spec = orch.get_manifest_spec(*freeze)?;
                    let text = if cli.json {
                        serde_json::to_string_pretty(&spec)?
                    } else {
                        toml::to_string_pretty(&spec)?
                    };
                    println!("{text}");
                }
                ManifestCommands::Validate => {
                    let main = orch.workspace.main_path()?;
                    let declared = main.join(&orch.workspace.config.manifest_path);
                    let path = orch.effective_manifest_path(&main, &declared);
                    let spec = orch.get_manifest_spec(false)?;
                    spec.validate(&path)?;
                    Output::success("manifest is valid");
                }
            }
        }
        Commands::DepUpdate => {
            let orch = Orchestrator::open(cwd)?;
            orch.dependency_update()?;
            Output::success("dependency URLs synchronized");
        }
    }
    Ok(())
}

fn print_status_entry(entry: &git_ws::git::adapter::StatusEntry) {
    use git_ws::git::adapter::StatusEntry;
    match entry {
        StatusEntry::Branch(name) => Output::kv("branch", name),
        StatusEntry::File(f) => {
            let orig = f.orig_path.as_deref().map(|o| format!("{o} -> ")).unwrap_or_default();
            println!("  {:?}/{:?} {orig}{}", f.index, f.work, f.path);
        }
    }
}
