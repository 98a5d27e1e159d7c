use clap::Parser;
use ssm::commands;
use ssm::config::Config;

/// ssm - simple software manager
///
/// Install, uninstall, publish and unpublish versioned packages in
/// filesystem domains. Domains persist all state as directories, plain
/// files and symlinks; there is no database and no daemon.
#[derive(Parser, Debug)]
#[command(name = "ssm", version = ssm::VERSION_STRING, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debugging (show full error chains)
    #[arg(long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Force operation
    #[arg(long, global = true)]
    force: bool,

    /// Automatically respond 'y' to prompts
    #[arg(short = 'y', long = "yes", global = true)]
    yes: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a package to a domain
    Install(commands::InstallArgs),

    /// Uninstall a package from a domain
    Uninstall(commands::UninstallArgs),

    /// Publish a package to a domain
    Publish(commands::PublishArgs),

    /// Unpublish a package from a domain
    Unpublish(commands::UnpublishArgs),

    /// Create a new domain
    Created(commands::CreatedArgs),

    /// Clone a domain
    Cloned(commands::ClonedArgs),

    /// Freeze a domain against mutating operations
    Freezed(commands::FreezedArgs),

    /// Unfreeze a domain
    Unfreezed(commands::UnfreezedArgs),

    /// Update domain settings and support files
    Updated(commands::UpdatedArgs),

    /// Show domain settings and state
    Showd(commands::ShowdArgs),

    /// List a domain's packages with their states
    Listd(commands::ListdArgs),

    /// List a domain/subdomain hierarchy
    Listdh(commands::ListdhArgs),

    /// List/find packages in a repository
    Listr(commands::ListrArgs),

    /// Search for a term within domains under the given paths
    Find(commands::FindArgs),

    /// Update shell startup profiles to use a domain at login
    Subscribe(commands::SubscribeArgs),

    /// Print the tool version
    Version,
}

fn run(config: &Config, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Install(args) => commands::install(config, args),
        Commands::Uninstall(args) => commands::uninstall(config, args),
        Commands::Publish(args) => commands::publish(config, args),
        Commands::Unpublish(args) => commands::unpublish(config, args),
        Commands::Created(args) => commands::created(config, args),
        Commands::Cloned(args) => commands::cloned(config, args),
        Commands::Freezed(args) => commands::freezed(config, args),
        Commands::Unfreezed(args) => commands::unfreezed(config, args),
        Commands::Updated(args) => commands::updated(config, args),
        Commands::Showd(args) => commands::showd(config, args),
        Commands::Listd(args) => commands::listd(config, args),
        Commands::Listdh(args) => commands::listdh(config, args),
        Commands::Listr(args) => commands::listr(config, args),
        Commands::Find(args) => commands::find(config, args),
        Commands::Subscribe(args) => commands::subscribe(config, args),
        Commands::Version => {
            println!("{}", ssm::VERSION_STRING);
            Ok(())
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = Config::new(cli.debug, cli.verbose, cli.force, cli.yes);

    if let Err(err) = run(&config, &cli.command) {
        if config.debug {
            eprintln!("error: {err:?}");
        } else {
            eprintln!("error: {err}");
        }
        std::process::exit(1);
    }
}
