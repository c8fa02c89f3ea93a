use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use sessionctl::configuration::Config;
use sessionctl::controller::{Controller, ControllerHandle};
use sessionctl::error_handling::types::{ApiError, AuthError, ControllerError};
use sessionctl::network::status_decoder::format_clock;
use sessionctl::network::{
    CredentialSource, FileCredentials, HttpSessionApi, SessionApi, StaticCredentials,
    StatusSnapshot,
};
use sessionctl::{Accepted, SessionEvent, SessionState, SessionView, StartOptions, StartRequest};
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Parser)]
#[command(name = "sessionctl")]
#[command(version)]
#[command(about = "Start, stop and follow a remote view session")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server origin, overrides `base_url`
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token; takes precedence over `token_file`
    #[arg(long, env = "SESSIONCTL_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long)]
    poll_interval_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the logged-in profile
    Me,
    /// Print one status snapshot
    Status,
    /// Start a session and follow it until it ends
    Start {
        channel: String,
        /// Target viewer count
        #[arg(short = 'n', long)]
        viewers: u32,
        /// Duration in minutes
        #[arg(short, long)]
        duration: u32,
        #[arg(long)]
        rapid: bool,
        #[arg(long)]
        viewer_speed: Option<f64>,
        #[arg(long)]
        ramp_up_minutes: Option<u32>,
        /// Return as soon as the server accepted the request
        #[arg(long)]
        detach: bool,
    },
    /// Stop the running session and wait for the server to confirm
    Stop {
        #[arg(long)]
        detach: bool,
    },
    /// Follow the running session
    Watch,
    /// Forget the stored credential
    Logout,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", e);
        if e.is_retryable() {
            info!("The failure looks temporary; running the command again may succeed");
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ControllerError> {
    let config = load_config(&args)?;
    let credentials = credentials_for(&args, &config);

    match args.command {
        Commands::Me => {
            let token = credentials
                .current_token()
                .ok_or(AuthError::MissingCredential)?;
            let profile = direct_api(&config)?.fetch_profile(&token).await?;
            println!("User:       {} (id {})", profile.username, profile.id);
            println!("Tier:       {}", profile.tier());
            println!(
                "Max views:  {}",
                profile.max_views.unwrap_or(config.default_max_viewers)
            );
            Ok(())
        }
        Commands::Status => {
            let token = credentials
                .current_token()
                .ok_or(AuthError::MissingCredential)?;
            let snapshot = match direct_api(&config)?.fetch_status(&token).await {
                Err(ApiError::Unauthorized) => {
                    credentials.invalidate();
                    return Err(AuthError::CredentialRejected.into());
                }
                other => other?,
            };
            print_snapshot(&snapshot);
            Ok(())
        }
        Commands::Start {
            channel,
            viewers,
            duration,
            rapid,
            viewer_speed,
            ramp_up_minutes,
            detach,
        } => {
            let request = StartRequest {
                channel,
                target_viewers: viewers,
                duration_minutes: duration,
                options: StartOptions {
                    rapid: rapid.then_some(true),
                    viewer_speed,
                    ramp_up_minutes,
                },
            };
            with_controller(&config, credentials, move |handle| async move {
                handle.rehydrate().await?;
                let mut events = handle.subscribe();
                if let Accepted::Confirmed(message) = handle.start(request).await? {
                    println!("{}", message);
                }
                if !detach {
                    follow(&mut events).await?;
                }
                Ok(())
            })
            .await
        }
        Commands::Stop { detach } => {
            with_controller(&config, credentials, move |handle| async move {
                handle.rehydrate().await?;
                let mut events = handle.subscribe();
                match handle.stop().await? {
                    Accepted::Confirmed(message) => println!("{}", message),
                    Accepted::Ignored => {
                        println!("No running session to stop");
                        return Ok(());
                    }
                }
                if !detach {
                    follow(&mut events).await?;
                }
                Ok(())
            })
            .await
        }
        Commands::Watch => {
            with_controller(&config, credentials, move |handle| async move {
                let view = handle.rehydrate().await?;
                let mut events = handle.subscribe();
                if !view.state.is_active() {
                    println!("No session is running");
                    return Ok(());
                }
                print_view(&view);
                follow(&mut events).await
            })
            .await
        }
        Commands::Logout => {
            with_controller(&config, credentials, |handle| async move {
                handle.logout().await?;
                println!("Logged out");
                Ok(())
            })
            .await
        }
    }
}

fn load_config(args: &Args) -> Result<Config, ControllerError> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Importing configuration from {}", path.display());
            Config::from_file(path)?
        }
        None => Config::default(),
    };
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(secs) = args.poll_interval_secs {
        config.poll_interval_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

fn credentials_for(args: &Args, config: &Config) -> Arc<dyn CredentialSource> {
    match (&args.token, &config.token_file) {
        (Some(token), _) => Arc::new(StaticCredentials::new(Some(token.clone()))),
        (None, Some(path)) => Arc::new(FileCredentials::new(path.clone())),
        (None, None) => {
            warn!("No token given (--token, SESSIONCTL_TOKEN or token_file)");
            Arc::new(StaticCredentials::new(None))
        }
    }
}

fn direct_api(config: &Config) -> Result<HttpSessionApi, ControllerError> {
    HttpSessionApi::new(config.api_origin(), config.request_timeout())
        .map_err(|e| ControllerError::Client(e.to_string()))
}

/// Runs `body` against a freshly spawned controller and shuts it down afterwards.
async fn with_controller<F, Fut>(
    config: &Config,
    credentials: Arc<dyn CredentialSource>,
    body: F,
) -> Result<(), ControllerError>
where
    F: FnOnce(ControllerHandle) -> Fut,
    Fut: std::future::Future<Output = Result<(), ControllerError>>,
{
    let (controller, handle) = Controller::new(config, credentials)?;
    let driver = tokio::spawn(controller.run());

    let result = body(handle.clone()).await;

    if handle.shutdown().await.is_ok() {
        match driver.await {
            Ok(outcome) => outcome?,
            Err(e) => error!("Controller task failed: {}", e),
        }
    }
    result
}

/// Renders events until the session ends or the user interrupts.
async fn follow(events: &mut broadcast::Receiver<SessionEvent>) -> Result<(), ControllerError> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::StateEntered { from, to }) => {
                    info!("Session {} -> {}", from, to);
                    if to == SessionState::Ended {
                        return Ok(());
                    }
                }
                Ok(SessionEvent::SnapshotIngested(view)) => print_view(&view),
                Ok(SessionEvent::Notification(n)) => println!("** {}: {}", n.title, n.body),
                Ok(SessionEvent::CountdownTick { .. }) => {}
                Err(RecvError::Lagged(missed)) => warn!("Display fell behind by {} events", missed),
                Err(RecvError::Closed) => return Err(ControllerError::ChannelClosed),
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("Interrupted; the remote session is left as it is");
                return Ok(());
            }
        }
    }
}

fn print_view(view: &SessionView) {
    println!(
        "[{}] {}/{} viewers  {:5.1}%  remaining {}  {}",
        view.state,
        view.current_viewers,
        view.target_viewers,
        view.progress_percent,
        format_clock(view.time_remaining_secs),
        view.status_line
    );
    if let Some(latest) = view.logs.first() {
        println!("    {}", latest);
    }
}

fn print_snapshot(snapshot: &StatusSnapshot) {
    println!(
        "Running:    {}",
        if snapshot.is_running { "yes" } else { "no" }
    );
    println!(
        "Viewers:    {}/{}",
        snapshot.current_viewers, snapshot.target_viewers
    );
    println!("Progress:   {:.1}%", snapshot.progress_percent);
    if let Some(remaining) = snapshot.time_remaining_secs {
        println!("Remaining:  {}", format_clock(remaining));
    }
    if let Some(total) = snapshot.total_duration_secs {
        println!("Duration:   {}", format_clock(total));
    }
    if !snapshot.status_line.is_empty() {
        println!("Status:     {}", snapshot.status_line);
    }
    for line in &snapshot.logs {
        println!("    {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn start_arguments_are_parsed() {
        let args = Args::try_parse_from([
            "sessionctl",
            "--base-url",
            "https://api.example.com/",
            "start",
            "foo",
            "-n",
            "50",
            "--duration",
            "10",
            "--rapid",
        ])
        .unwrap();
        match args.command {
            Commands::Start {
                channel,
                viewers,
                duration,
                rapid,
                detach,
                ..
            } => {
                assert_eq!(channel, "foo");
                assert_eq!((viewers, duration), (50, 10));
                assert!(rapid);
                assert!(!detach);
            }
            _ => panic!("expected start"),
        }
    }

    #[test]
    #[serial]
    fn token_is_read_from_environment() {
        std::env::set_var("SESSIONCTL_TOKEN", "env-token");
        let args = Args::try_parse_from(["sessionctl", "status"]).unwrap();
        std::env::remove_var("SESSIONCTL_TOKEN");

        assert_eq!(args.token.as_deref(), Some("env-token"));
        let credentials = credentials_for(&args, &Config::default());
        assert_eq!(credentials.current_token().as_deref(), Some("env-token"));
    }

    #[test]
    #[serial]
    fn flags_override_the_config_file() {
        std::env::remove_var("SESSIONCTL_TOKEN");
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://10.0.0.1:9000\"").unwrap();
        writeln!(file, "poll_interval_secs = 30").unwrap();
        writeln!(file, "token_file = \"/tmp/sessionctl-token\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from([
            "sessionctl",
            "--config",
            path.as_str(),
            "--poll-interval-secs",
            "2",
            "watch",
        ])
        .unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.base_url, "http://10.0.0.1:9000");
        assert_eq!(config.poll_interval_secs, 2);
        assert!(args.token.is_none());
        assert_eq!(
            config.token_file.as_deref(),
            Some(std::path::Path::new("/tmp/sessionctl-token"))
        );
    }

    #[test]
    #[serial]
    fn invalid_override_is_rejected() {
        std::env::remove_var("SESSIONCTL_TOKEN");
        let args =
            Args::try_parse_from(["sessionctl", "--poll-interval-secs", "0", "watch"]).unwrap();
        assert!(matches!(
            load_config(&args),
            Err(ControllerError::Config(_))
        ));
    }
}
