use facelink::cli::{commands, FrameInput};
use facelink::{AppContext, Config, DevMode};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facelink")]
#[command(about = "Customer face identification and record reconciliation")]
struct Cli {
    /// Enable development mode (keeps data under ./dev_data)
    #[arg(long, global = true)]
    dev: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Use a still image instead of capturing from the camera
    #[arg(long, conflicts_with = "replay")]
    image: Option<PathBuf>,
    /// Replay the images in a directory as camera frames
    #[arg(long)]
    replay: Option<PathBuf>,
}

impl InputArgs {
    fn into_input(self) -> FrameInput {
        FrameInput::from_args(self.image, self.replay)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a face and look up the customer
    Identify {
        #[command(flatten)]
        input: InputArgs,
        /// Also fetch membership details and purchases
        #[arg(long)]
        membership: bool,
    },
    /// Enroll a new customer
    Enroll {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        member_id: Option<String>,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Recreate the customer record for an indexed face
    Repair {
        face_id: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        member_id: Option<String>,
    },
    /// Delete indexed faces that have no customer record
    Cleanup {
        /// Only list what would be removed
        #[arg(long)]
        dry_run: bool,
    },
    /// Report inconsistencies between the index and the records
    Audit,
    /// List indexed faces
    Faces,
    /// Look up a member from their bio link
    Member {
        /// e.g. https://example.com/bio-link/<id>
        bio_link: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let config = Config::load(&dev_mode, cli.config.as_deref())?;
    let ctx = AppContext::open(config, dev_mode)?;

    match cli.command {
        Commands::Identify { input, membership } => {
            commands::identify(&ctx, &input.into_input(), membership)?;
        }
        Commands::Enroll { name, member_id, input } => {
            println!("Enrolling customer: {}", name);
            commands::enroll(&ctx, &input.into_input(), &name, member_id)?;
        }
        Commands::Repair { face_id, name, member_id } => {
            commands::repair(&ctx, &face_id, &name, member_id)?;
        }
        Commands::Cleanup { dry_run } => {
            commands::cleanup(&ctx, dry_run)?;
        }
        Commands::Audit => {
            commands::audit(&ctx)?;
        }
        Commands::Faces => {
            commands::faces(&ctx)?;
        }
        Commands::Member { bio_link } => {
            commands::member(&ctx, &bio_link)?;
        }
    }

    Ok(())
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
