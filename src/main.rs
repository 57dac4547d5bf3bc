use std::{collections::HashMap, fs, path::Path, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sheepit_client::{Client, ComputeMethod, JobKind, JobOptions};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Where session cookies are kept between runs.
    #[arg(long, default_value = "sheepit-session.json")]
    session: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session cookies.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log out and delete the stored session.
    Logout,
    /// Upload a project archive and submit a render job.
    Submit {
        archive: PathBuf,

        /// Render a frame range instead of a single frame.
        #[arg(long)]
        animation: bool,
        #[arg(long)]
        start: Option<i32>,
        #[arg(long)]
        end: Option<i32>,
        #[arg(long, default_value_t = 1)]
        step: i32,
        /// Frame to render for a single-frame job.
        #[arg(long, default_value_t = 1)]
        frame: i32,

        #[arg(long)]
        cpu: bool,
        #[arg(long)]
        cuda: bool,
        #[arg(long)]
        opencl: bool,

        /// Keep the render out of the public gallery.
        #[arg(long)]
        hidden: bool,
        /// Ask the farm to assemble an mp4 from the frames.
        #[arg(long)]
        mp4: bool,
        /// How many parts each frame is split into.
        #[arg(long, default_value = "1")]
        split: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let client = Client::new();

    match args.command {
        Command::Login { username, password } => {
            client.login(&username, &password).await?;
            save_session(&args.session, &client.export_session())?;
            eprintln!("Logged in as {username}.");
        }
        Command::Logout => {
            client.import_session(&load_session(&args.session)?);
            // Logout failures are soft: the local session goes away anyway.
            if let Err(e) = client.logout().await {
                eprintln!("Logout request failed ({e}); local session dropped anyway.");
            }
            let _ = fs::remove_file(&args.session);
            eprintln!("Logged out.");
        }
        Command::Submit {
            archive,
            animation,
            start,
            end,
            step,
            frame,
            cpu,
            cuda,
            opencl,
            hidden,
            mp4,
            split,
        } => {
            if !(cpu || cuda || opencl) {
                bail!("select at least one compute device (--cpu, --cuda, --opencl)");
            }
            let kind = if animation {
                let (Some(start), Some(end)) = (start, end) else {
                    bail!("--animation needs --start and --end");
                };
                JobKind::Animation { start, end, step }
            } else {
                JobKind::SingleFrame { frame }
            };
            let options = JobOptions {
                kind,
                compute: ComputeMethod { cpu, cuda, opencl },
                public: !hidden,
                mp4,
                split_tiles: split,
            };

            client.import_session(&load_session(&args.session)?);
            let token = client.request_upload_token().await?;

            let size = fs::metadata(&archive)
                .with_context(|| format!("can't read {}", archive.display()))?
                .len();
            let bar = ProgressBar::new(size);
            bar.set_style(ProgressStyle::with_template(
                "{spinner} {bytes}/{total_bytes} {wide_bar} {bytes_per_sec} eta {eta}",
            )?);
            let reporter = bar.clone();
            client
                .upload_file(
                    &token,
                    &archive,
                    Some(Box::new(move |sent, _total| reporter.set_position(sent))),
                )
                .await?;
            bar.finish_and_clear();
            eprintln!("Archive uploaded, submitting job...");

            let page = client.add_job(&token, &options).await?;
            eprintln!(
                "Job submitted: engine {}, archive {}.",
                page.engine, page.archive
            );
        }
    }
    Ok(())
}

fn load_session(path: &Path) -> Result<HashMap<String, String>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("no stored session at {}; run login first", path.display()))?;
    serde_json::from_str(&data).context("stored session is not valid JSON")
}

fn save_session(path: &Path, cookies: &HashMap<String, String>) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(cookies)?)?;
    Ok(())
}
