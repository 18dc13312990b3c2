mod client;

use clap::{Parser, Subcommand};
use client::Client;
use rackwire_engine::{
    channel::Direction,
    config::EngineConfig,
    factory::RecallFactory,
    file, init, logging,
    flags::CreateFlags,
    message::{Action, ChannelAddress},
    plugin::PluginManagers,
    state::AudioSummary,
};
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "rackwire")]
#[command(about = "Build, save and inspect Rackwire recall projects", long_about = None)]
struct Cli {
    /// TOML engine configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the recall families the factory knows
    Families,
    /// Build a small two-audio project and save it
    Demo {
        /// Project file to write
        output: PathBuf,
    },
    /// Load a project and print its audios
    Inspect {
        /// Project file to read
        project: PathBuf,
    },
}

fn print_summary(summary: &[AudioSummary]) {
    for audio in summary {
        println!(
            "{} [{} channels, {} out pads, {} in pads] containers={} recalls={}/{}{}",
            audio.name,
            audio.audio_channels,
            audio.output_pads,
            audio.input_pads,
            audio.containers,
            audio.audio_recalls,
            audio.channel_recalls,
            if audio.connected { "" } else { " (not connected)" }
        );
        for link in &audio.links {
            println!("  out {} -> {} in {}", link.line, link.to_audio, link.to_line);
        }
    }
}

async fn demo(config: EngineConfig, output: PathBuf) -> Result<(), String> {
    let (tx, handle) = init(config);
    let mut client = Client::subscribe(tx).await?;

    for (name, output_pads, input_pads) in [("synth", 1, 1), ("master", 1, 1)] {
        client
            .request(Action::AddAudio {
                name: name.to_string(),
                audio_channels: 2,
                output_pads,
                input_pads,
            })
            .await?;
    }
    for line in 0..2 {
        client
            .request(Action::LinkChannel {
                channel: ChannelAddress::new("synth", Direction::Output, line),
                link: Some(ChannelAddress::new("master", Direction::Input, line)),
            })
            .await?;
    }
    let recalls = [
        ("synth", "ags-delay", CreateFlags::PLAY | CreateFlags::RECALL),
        ("synth", "ags-volume", CreateFlags::PLAY | CreateFlags::RECALL),
        ("master", "ags-play-master", CreateFlags::PLAY),
        ("master", "ags-peak", CreateFlags::RECALL),
    ];
    for (audio, family, flags) in recalls {
        let created = client
            .request(Action::CreateRecall {
                audio: audio.to_string(),
                family: family.to_string(),
                channels: 0..2,
                pads: 0..1,
                flags,
                plugin: None,
            })
            .await?;
        if let Action::RecallsCreated { recalls, warnings, .. } = created {
            info!("{family} on {audio}: {recalls} recalls");
            for warning in warnings {
                error!("{warning}");
            }
        }
    }

    if let Action::ProjectSaved { path, diagnostics } =
        client.request(Action::SaveProject(output)).await?
    {
        for diagnostic in diagnostics {
            error!("{diagnostic}");
        }
        println!("saved {}", path.display());
    }
    if let Action::Description(summary) = client.request(Action::Describe).await? {
        print_summary(&summary);
    }
    client.quit().await?;
    handle.await.map_err(|e| e.to_string())
}

fn inspect(project: PathBuf) -> Result<(), String> {
    let factory = RecallFactory::new(Arc::new(PluginManagers::new()));
    let report = file::load_project(&factory, &project).map_err(|e| e.to_string())?;
    for diagnostic in &report.diagnostics {
        error!("{diagnostic}");
    }
    print_summary(&report.state.describe());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match EngineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.log_level);

    let result = match cli.command {
        Command::Families => {
            for family in RecallFactory::families() {
                println!("{family}");
            }
            Ok(())
        }
        Command::Demo { output } => demo(config, output).await,
        Command::Inspect { project } => inspect(project),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
