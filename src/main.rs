use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use dioxus::desktop::tao::window::Icon;
use dioxus::desktop::{Config, LogicalSize, WindowBuilder};
use log::{error, info, warn};
use tokio::sync::Mutex;

use sip_desktop::bootstrap::{find_fonts, font_face_css, init_logging};
use sip_desktop::components::{App, Launch};
use sip_desktop::engine::rvoip::RvoipFactory;
use sip_desktop::image_provider::{AssetImageProvider, ImageProvider};
use sip_desktop::instance::{self, command_from_args, AppCommand, Instance};
use sip_desktop::paths::Paths;

const WINDOW_ICON: &str = "logo";

fn main() {
    // Initialize logging
    init_logging();

    info!("Starting SIP Desktop {}", env!("CARGO_PKG_VERSION"));

    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}

/// Splits `--config <file>` from the words making up the command
fn parse_args(args: impl IntoIterator<Item = String>) -> (Option<PathBuf>, Vec<String>) {
    let mut config = None;
    let mut rest = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => config = args.next().map(PathBuf::from),
            _ => rest.push(arg),
        }
    }
    (config, rest)
}

fn run() -> Result<i32> {
    // Engine and instance socket live on their own runtime, the window
    // thread is taken by the desktop event loop.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("sip-engine")
        .build()
        .context("Failed to build the engine runtime")?;

    let (custom_config, words) = parse_args(std::env::args().skip(1));
    let command = command_from_args(words);

    let paths = Paths::from_platform()?;
    paths.ensure_dirs()?;
    if let Some(legacy_dir) = Paths::legacy_dir().filter(|dir| dir.is_dir()) {
        match paths.migrate(&legacy_dir) {
            Ok(migrated) if !migrated.is_empty() => info!("Migrated {} legacy files", migrated.len()),
            Ok(_) => {}
            Err(e) => warn!("Legacy files not migrated: {}", e),
        }
    }

    let primary = match runtime.block_on(instance::acquire(&paths.instance_socket_path()))? {
        Instance::Secondary(secondary) => {
            runtime.block_on(secondary.send(&command))?;
            return Ok(0);
        }
        Instance::Primary(primary) => primary,
    };
    let listener = {
        let _guard = runtime.enter();
        primary.listen()
    };

    let assets_dir = paths.assets_dir_path();
    let fonts = find_fonts(&assets_dir);
    let images = AssetImageProvider::new(&assets_dir);
    let icon = runtime.block_on(images.request_image(WINDOW_ICON));

    let mut config = Config::new()
        .with_window(
            WindowBuilder::new()
                .with_title("SIP Desktop")
                .with_inner_size(LogicalSize::new(960.0, 720.0)),
        )
        .with_custom_head(format!("<style>{}</style>", font_face_css(&fonts)));
    if icon.width() > 0 && icon.height() > 0 {
        let (width, height) = icon.dimensions();
        match Icon::from_rgba(icon.into_raw(), width, height) {
            Ok(icon) => config = config.with_icon(icon),
            Err(e) => warn!("Window icon rejected: {}", e),
        }
    }

    let initial_command = match AppCommand::parse(&command) {
        AppCommand::Show => None,
        other => Some(other),
    };
    let launch = Launch {
        paths: Arc::new(paths),
        custom_config,
        factory: Arc::new(RvoipFactory::new(runtime.handle().clone())),
        commands: Arc::new(Mutex::new(Some(listener))),
        initial_command,
        user_agent: format!("sip_desktop/{}", env!("CARGO_PKG_VERSION")),
    };

    // Launch the Dioxus desktop application
    dioxus::LaunchBuilder::desktop()
        .with_cfg(config)
        .with_context(launch)
        .launch(App);
    Ok(0)
}
