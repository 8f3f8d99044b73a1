use clap::{Parser, Subcommand};
use gmsflags::config::Config;
use gmsflags::utils::logging::init_tracing;
use gmsflags_schema::FlagType;
use mimalloc::MiMalloc;
use std::path::PathBuf;
use tracing::debug;

mod commands;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Browse and override Phenotype flags of Google Play Services on a rooted device.
#[derive(Parser, Debug)]
#[command(name = "gmsflags")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./gmsflags.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the privileged database service (launched through the root command)
    #[command(hide = true)]
    Serve,

    /// List Phenotype users present in the database
    Users,

    /// List flag values of a package
    Flags {
        /// Phenotype package name
        package: String,

        /// Flag type to list
        #[arg(short = 't', long = "type", default_value = "bool")]
        flag_type: FlagType,

        /// Phenotype user (empty is the device-wide user)
        #[arg(short, long, default_value = "")]
        user: String,

        /// Only show overridden flags
        #[arg(long)]
        changed: bool,
    },

    /// Override a flag for the given users, or for every user
    Set {
        package: String,
        name: String,
        flag_type: FlagType,
        value: String,

        /// Target user; repeat for several. Defaults to all users.
        #[arg(short, long = "user")]
        users: Vec<String>,

        /// Do not clear the phenotype cache afterwards
        #[arg(long)]
        no_clear: bool,
    },

    /// Delete one override, or every override of a package
    Reset {
        package: String,
        name: Option<String>,
    },

    /// Invalidate the cached configuration of the package's app
    ClearCache { package: String },

    /// Write the overrides of a package to a JSON file
    Export {
        package: String,
        file: PathBuf,

        /// Phenotype user to export
        #[arg(short, long, default_value = "")]
        user: String,
    },

    /// Apply the overrides stored in a JSON file
    Import {
        file: PathBuf,

        /// Do not clear the phenotype cache afterwards
        #[arg(long)]
        no_clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The service configures itself from the bootstrap line on stdin.
    if let Commands::Serve = cli.command {
        gmsflags::service::run().await?;
        return Ok(());
    }

    let cfg = Config::load(cli.config.as_deref())?;
    init_tracing(&cfg.basic.loglevel);
    debug!(
        database = %cfg.database.path.display(),
        elevate_command = ?cfg.root.elevate_command,
        timeout_secs = cfg.root.timeout_secs,
        "Configuration loaded"
    );

    let repo = commands::connect(cfg).await?;
    let result = match cli.command {
        Commands::Serve => Ok(()),
        Commands::Users => commands::users(&repo).await,
        Commands::Flags {
            package,
            flag_type,
            user,
            changed,
        } => commands::flags(&repo, &package, flag_type, &user, changed).await,
        Commands::Set {
            package,
            name,
            flag_type,
            value,
            users,
            no_clear,
        } => commands::set(&repo, &package, &name, flag_type, &value, users, !no_clear).await,
        Commands::Reset { package, name } => {
            commands::reset(&repo, &package, name.as_deref()).await
        }
        Commands::ClearCache { package } => commands::clear_cache(&repo, &package).await,
        Commands::Export {
            package,
            file,
            user,
        } => commands::export(&repo, &package, &user, &file).await,
        Commands::Import { file, no_clear } => commands::import(&repo, &file, !no_clear).await,
    };

    repo.connector().disconnect();
    result.map_err(Into::into)
}
