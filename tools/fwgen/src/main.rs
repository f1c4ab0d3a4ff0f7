//! fwgen - firmware build-step generator
//!
//! Generates the splash screen, web content and build info headers of the
//! billboard firmware, and archives production firmware images.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fwgen::build_info::Step;
use fwgen::{archive, build_info, bundle, hooks, splash};
use fwgen::{DisplayTag, EnvSource, HookContext, Phase, Settings};

#[derive(Parser)]
#[command(name = "fwgen")]
#[command(about = "Firmware build-step generator")]
#[command(version)]
struct Cli {
    /// Path to fwgen.toml
    #[arg(short, long, global = true, default_value = "fwgen.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an image into an RGB565 splash screen header
    Splash {
        /// Input PNG/JPG file
        input: PathBuf,

        /// Output header file
        output: PathBuf,

        /// Target display (ST7735, ST7789, ST7735_ROTATED, CUSTOM); detected
        /// from the image size when omitted
        display: Option<DisplayTag>,
    },

    /// Regenerate the splash screen for the current build environment
    SplashAuto {
        /// Regenerate even when the header is up to date
        #[arg(short, long)]
        force: bool,
    },

    /// Bundle the web portal into webcontent.h
    Bundle {
        /// Web source directory (overrides fwgen.toml)
        #[arg(short, long)]
        src: Option<PathBuf>,

        /// Output header (overrides fwgen.toml)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print build flags and refresh the build info header
    BuildInfo,

    /// Copy a production firmware image into the firmware folder
    Archive {
        /// Firmware binary produced by the build
        firmware: PathBuf,
    },

    /// Run the pre- or post-build hooks
    Hook {
        #[arg(value_enum)]
        phase: Phase,

        /// Build target passed by the build tool
        #[arg(short, long)]
        target: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // stdout is reserved for build flags
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = EnvSource;
    let settings = Settings::load(&cli.config)?.apply(&config);

    match cli.command {
        Commands::Splash {
            input,
            output,
            display,
        } => {
            tracing::info!("Converting {:?} -> {:?}", input, output);
            let header = splash::convert_image(&input, &output, display)?;
            tracing::info!(
                "Generated {}x{} splash screen for {} ({} bytes)",
                header.width,
                header.height,
                header.display,
                header.byte_size()
            );
        }

        Commands::SplashAuto { force } => {
            match splash::update_for_environment(&config, &settings, force)? {
                Some(path) => tracing::info!("Splash screen written to {}", path.display()),
                None => tracing::info!("Splash screen unchanged"),
            }
        }

        Commands::Bundle { src, out } => {
            let src = src.unwrap_or_else(|| settings.resolve(&settings.web.source));
            let out = out.unwrap_or_else(|| settings.resolve(&settings.web.output));
            bundle::write_bundle(&src, &out, &settings.web.portal)?;
        }

        Commands::BuildInfo => {
            let info = build_info::generate(&config, &settings, Step::Flags)?;
            print!("{}", info.render_flags());
        }

        Commands::Archive { firmware } => {
            if archive::archive_firmware(&config, &settings, &firmware)?.is_none() {
                tracing::info!("Only production builds are copied to the firmware folder");
            }
        }

        Commands::Hook { phase, target } => {
            let ctx = HookContext {
                config: &config,
                settings: &settings,
                target: target.as_deref(),
            };
            let count = hooks::default_hooks().run(phase, &ctx)?;
            tracing::info!("{} {} hook(s) done", count, phase);
        }
    }

    Ok(())
}
