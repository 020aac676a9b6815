use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use log::{error, info};
use structopt::StructOpt;
use tokio::time::sleep;

use updateapp::base::updater::DescriptionFormat;
use updateapp::base::{page, Want};
use updateapp::config::get_config;
use updateapp::simulator::{LogPlatform, SimulatedService};
use updateapp::{Config, UpdateApp, UpdateState};

#[derive(StructOpt, Debug)]
#[structopt(name = "updateapp", about = "check, download and install system updates")]
pub struct CommandLine {
    /// Binary's version
    #[structopt(skip = env!("VERGEN_BUILD_SEMVER"))]
    version: String,
    /// Build's profile
    #[structopt(skip = env!("VERGEN_CARGO_PROFILE"))]
    profile: String,
    /// Build timestamp
    #[structopt(skip = env!("VERGEN_BUILD_TIMESTAMP"))]
    build_date: String,
    /// Path to config file
    #[structopt(short = "c", help = "Config file")]
    config: Option<String>,
    /// Log level / Verbosity (v: info, vv: debug, vvv: trace)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,
    /// List of modules to log
    #[structopt(short = "m", long = "modules")]
    modules: Vec<String>,
}

impl CommandLine {
    fn initialize_logging(&self) {
        let level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        let levels = match self.modules.clone().into_iter().reduce(|acc, e| format!("{acc},{e}={level}")) {
            Some(f) => f,
            _ => format!("updateapp={level}"),
        };

        let builder = tracing_subscriber::fmt()
            .with_line_number(false)
            .with_file(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_env_filter(levels);

        if let Err(e) = builder.try_init() {
            eprintln!("Failed to initialize logging: {e}");
        }
    }

    fn banner(&self, config: &Config) {
        const B: &str = r#"
    ░█░▒█░█▀▀▄░█▀▄░█▀▀▄░▀█▀░█▀▀░█▀▀▄░▄▀▀▄░▄▀▀▄
    ░█░▒█░█▄▄█░█░█░█▄▄█░░█░░█▀▀░█▄▄█░█▄▄█░█▄▄█
    ░░▀▀▀░█░░░░▀▀░░▀░░▀░░▀░░▀▀▀░▀░░▀░█░░░░█░░░
    "#;

        println!("{B}");
        println!("    version: {}", self.version);
        println!("    profile: {}", self.profile);
        println!("    build_date: {}", self.build_date);
        println!("    package: {}", config.package_name);
        println!("    ability: {}", config.main_ability_name);
        println!("    call_timeout: {}ms", config.call_timeout.as_millis());
        println!("    status_alive_time: {}ms", config.status_alive_time.as_millis());
        println!("    description_error_policy: {:?}", config.description_error_policy);
        println!("    simulated version: {}", config.simulator.new_version);
        println!("\n");
    }
}

// Waits until the app reaches `state` or gives up after `limit`
async fn wait_for(app: &UpdateApp, state: UpdateState, limit: Duration) -> bool {
    let step = Duration::from_millis(100);
    let mut waited = Duration::ZERO;
    while app.state().update_state() != state {
        if waited >= limit {
            return false;
        }

        sleep(step).await;
        waited += step;
    }

    true
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let commandline: CommandLine = StructOpt::from_args();
    commandline.initialize_logging();

    let config = get_config(commandline.config.as_deref())?;
    commandline.banner(&config);

    let service = SimulatedService::new(config.simulator.clone());
    let app = UpdateApp::new(config, &service, Arc::new(LogPlatform));
    app.start();

    let main_ability = app.main_ability().clone();
    let launch = Want::new(&app.config().package_name, &app.config().main_ability_name);
    main_ability.on_create(launch, "en-Latn-US");
    main_ability.on_window_stage_create();
    main_ability.on_foreground().await?;

    let current = app.manager().get_current_version_info().await;
    info!("current version: {:?}", current.data.map(|info| info.os_version));

    let check = app.check_for_update().await;
    if !check.is_ok() {
        error!("No update found: {:?}", check.call_result);
        return Ok(());
    }

    let changelog = app.manager().get_current_version_description(DescriptionFormat::Standard, "en-Latn-US").await;
    info!("changelog: {:?}", changelog.data);

    let want = Want::new(&app.config().package_name, &app.config().main_ability_name);
    main_ability.on_new_want(want.clone().with_uri(page::NEW_VERSION));

    app.download().await?;
    let limit = Duration::from_secs(120);
    if !wait_for(&app, UpdateState::DownloadSuccess, limit).await {
        error!("Download didn't finish in {}s", limit.as_secs());
        return Ok(());
    }

    app.install().await?;
    if !wait_for(&app, UpdateState::UpgradeSuccess, limit).await {
        error!("Install didn't finish in {}s", limit.as_secs());
        return Ok(());
    }

    info!("Upgraded to {}", app.config().simulator.new_version);
    main_ability.on_new_want(want.with_uri(page::INDEX));
    main_ability.on_background();
    app.stop();
    Ok(())
}
