use std::fmt::{self, Display};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;
use tunnel_core::config::ConfigError;
use tunnel_core::utils::logging::init_logging;
use tunnel_core::{
    ConnectionController, JsonFileStore, Profile, ProfileError, ProfileId, SaveTarget, Settings,
    TunnelConfig, WgQuickAdapter,
};

#[derive(Debug)]
pub enum CliError {
    Profile(ProfileError),
    Config(ConfigError),
    IoError(std::io::Error),
    Other(String),
}

impl From<ProfileError> for CliError {
    fn from(err: ProfileError) -> CliError {
        CliError::Profile(err)
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> CliError {
        CliError::Config(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> CliError {
        CliError::IoError(err)
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Profile(e) => write!(f, "{}", e),
            CliError::Config(e) => write!(f, "{}", e),
            CliError::IoError(e) => write!(f, "IO error: {}", e),
            CliError::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for CliError {}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "tunnel-rs", version, subcommand_required = true)]
pub struct Args {
    /// Settings file (default: <config dir>/settings.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory holding the profile records
    #[arg(long, global = true)]
    pub profile_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all profiles
    List,
    /// Create a profile from a wg-quick config file
    Import {
        file: PathBuf,
        /// Display name (default: the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Write a profile's config to a file
    Export { id: String, file: PathBuf },
    /// Change a profile's display name
    Rename { id: String, name: String },
    /// Replace a profile's config with the contents of a file
    SetConfig { id: String, file: PathBuf },
    /// Delete a profile
    Remove { id: String },
    /// Connect a profile and keep it up until Ctrl-C
    Up { id: String },
}

fn load_settings(args: &Args) -> Result<Settings, CliError> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_or_default()?,
    };
    if let Some(dir) = &args.profile_dir {
        settings.storage.profile_dir = Some(dir.clone());
    }
    Ok(settings)
}

pub async fn run_cli(args: Args) -> Result<(), CliError> {
    let settings = load_settings(&args)?;
    init_logging(settings.log_level());

    let profile_dir = settings
        .profile_dir()
        .ok_or_else(|| CliError::Other("Unable to locate a profile directory".into()))?;
    let store = Arc::new(JsonFileStore::at(profile_dir)?);
    let adapter = Arc::new(WgQuickAdapter::from_settings(&settings.tunnel));
    let controller = ConnectionController::load(store, adapter.clone()).await?;

    match args.command {
        Command::List => list(&controller).await,
        Command::Import { file, name } => {
            let profile = Profile::from_config_file(&file, name)?;
            let id = controller.save(SaveTarget::Create, profile).await?;
            println!("{}", id);
            Ok(())
        }
        Command::Export { id, file } => {
            let profile = existing(&controller, &id).await?;
            profile.config.write_to(&file)?;
            info!("Exported '{}' to {:?}", profile.id, file);
            Ok(())
        }
        Command::Rename { id, name } => {
            let mut profile = existing(&controller, &id).await?;
            profile.name = name;
            save_edit(&controller, profile).await
        }
        Command::SetConfig { id, file } => {
            let mut profile = existing(&controller, &id).await?;
            profile.config = TunnelConfig::from_file(&file)?;
            save_edit(&controller, profile).await
        }
        Command::Remove { id } => {
            controller.remove(&ProfileId::new(id)?).await?;
            Ok(())
        }
        Command::Up { id } => {
            if !adapter.is_available() {
                return Err(CliError::Other("wg-quick was not found on PATH".into()));
            }
            up(&controller, ProfileId::new(id)?).await
        }
    }
}

async fn list(controller: &ConnectionController) -> Result<(), CliError> {
    for profile in &controller.list_profiles().await {
        println!("{:<38} {:<24} {}", profile.id, profile.name, profile.state);
    }
    Ok(())
}

/// A detached copy of a registered profile.
async fn existing(controller: &ConnectionController, raw: &str) -> Result<Profile, CliError> {
    let id = ProfileId::new(raw)?;
    controller
        .copy_for_editing(&id)
        .await
        .ok_or(CliError::Profile(ProfileError::UnknownProfile(id)))
}

async fn save_edit(controller: &ConnectionController, profile: Profile) -> Result<(), CliError> {
    let id = profile.id.clone();
    controller.save(SaveTarget::Replace(id), profile).await?;
    Ok(())
}

/// Connects, echoes state changes, and disconnects on Ctrl-C.
async fn up(controller: &ConnectionController, id: ProfileId) -> Result<(), CliError> {
    let mut watcher = controller.subscribe().await;
    let watched = id.clone();
    let printer = tokio::spawn(async move {
        let mut last: Option<tunnel_core::ConnectionState> = None;
        while let Some(snapshot) = watcher.changed().await {
            let Some(profile) = snapshot.get(&watched) else {
                continue;
            };
            if last.as_ref() != Some(&profile.state) {
                println!("{}: {}", profile.name, profile.state);
                last = Some(profile.state.clone());
            }
        }
    });

    let result = hold_until(controller, &id, async {
        info!("Press Ctrl-C to disconnect.");
        tokio::signal::ctrl_c().await
    })
    .await;

    printer.abort();
    result
}

/// Keeps `id` connected until `shutdown` resolves, then disconnects it
/// whether or not `shutdown` reported an error.
async fn hold_until<F>(
    controller: &ConnectionController,
    id: &ProfileId,
    shutdown: F,
) -> Result<(), CliError>
where
    F: Future<Output = std::io::Result<()>>,
{
    controller.connect(id).await?;
    let interrupted = shutdown.await;
    let disconnected = controller.disconnect(id).await;
    interrupted?;
    disconnected?;
    Ok(())
}
