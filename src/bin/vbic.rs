//! vbic - operator console for the vision checkout backends
//!
//! Subcommands:
//! - `health`: probe every service (`--watch` to keep polling)
//! - `predict`, `capture`: recognize a file or one camera frame
//! - `tasks`: list or file human-review tasks
//! - `tools`: list and run operator assistant tools

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use vbic_console::config::ConsoleConfig;
use vbic_console::recognize::{self, RecognitionReport};
use vbic_console::tools::parse_echo_payload;
use vbic_console::ui::{self, Ui, UiMode};
use vbic_console::{
    ingest, HealthPoller, InferenceClient, JpegEncoder, Language, ReviewClient, TaskCreate,
    TaskPage, ToolsClient,
};

#[derive(Parser, Debug)]
#[command(name = "vbic", author, version, about = "Vision checkout operator console")]
struct Args {
    /// Base URL the service paths are mounted on (overrides config).
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Output language (en|uk).
    #[arg(long, global = true)]
    language: Option<Language>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe healthz/readyz/livez of every service
    Health {
        /// Keep polling at the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Recognize an image file
    Predict {
        file: PathBuf,
        /// Rendered size of the image, e.g. 320x240, to print the overlay box
        #[arg(long, value_parser = parse_display)]
        display: Option<(f64, f64)>,
        /// File a review task for the top prediction
        #[arg(long)]
        create_task: bool,
    },
    /// Capture one frame from the camera and recognize it
    Capture {
        /// Frame source (stub://, http(s)://, file path); defaults to config
        #[arg(long)]
        source: Option<String>,
        /// Also save the captured JPEG here
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_parser = parse_display)]
        display: Option<(f64, f64)>,
        #[arg(long)]
        create_task: bool,
    },
    /// Human-review tasks
    Tasks {
        #[command(subcommand)]
        command: TasksCommand,
    },
    /// Operator assistant tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TasksCommand {
    /// List tasks, newest first
    List {
        #[arg(long)]
        offset: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        /// Refresh at the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// File a task by hand
    Create {
        #[arg(long)]
        label: String,
        #[arg(long)]
        confidence: f64,
        #[arg(long)]
        image_name: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List available tools
    List,
    /// Run the echo tool; malformed JSON is sent as {}
    Echo {
        #[arg(long, default_value = "")]
        payload: String,
    },
    /// Summarize a piece of text
    Summarize { text: String },
}

fn parse_display(value: &str) -> Result<(f64, f64), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value}"))?;
    let w: f64 = w.trim().parse().map_err(|_| format!("bad width in {value}"))?;
    let h: f64 = h.trim().parse().map_err(|_| format!("bad height in {value}"))?;
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(format!("display size must be positive, got {value}"));
    }
    Ok((w, h))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ConsoleConfig::load()?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(language) = args.language {
        config.language = language;
    }
    let ui = Ui::new(UiMode::parse(&args.ui), std::io::stderr().is_terminal());

    match args.command {
        Command::Health { watch } => cmd_health(&config, watch),
        Command::Predict {
            file,
            display,
            create_task,
        } => {
            let client = inference_client(&config)?;
            let report = {
                let _stage = ui.stage("Recognize image");
                recognize::recognize_file(&client, &file)?
            };
            finish_recognition(&config, &ui, &report, display, create_task)
        }
        Command::Capture {
            source,
            output,
            display,
            create_task,
        } => {
            let uri = source.unwrap_or_else(|| config.live.source.clone());
            let image = {
                let _stage = ui.stage("Capture frame");
                let mut source = ingest::open_source(&uri)?;
                let encoder = JpegEncoder::new(config.live.jpeg_quality);
                recognize::capture_still(source.as_mut(), &encoder)?
            };
            if let Some(path) = &output {
                std::fs::write(path, &image.bytes)
                    .map_err(|e| anyhow!("failed to write {}: {}", path.display(), e))?;
                println!("frame written to {}", path.display());
            }
            let client = inference_client(&config)?;
            let report = {
                let _stage = ui.stage("Recognize frame");
                recognize::recognize(&client, &image)?
            };
            finish_recognition(&config, &ui, &report, display, create_task)
        }
        Command::Tasks { command } => cmd_tasks(&config, command),
        Command::Tools { command } => cmd_tools(&config, command),
    }
}

fn inference_client(config: &ConsoleConfig) -> Result<InferenceClient> {
    InferenceClient::new(&config.base_url, config.inference_path()?, config.http_timeout)
}

fn review_client(config: &ConsoleConfig) -> Result<ReviewClient> {
    ReviewClient::new(&config.base_url, config.review_path()?, config.http_timeout)
}

fn finish_recognition(
    config: &ConsoleConfig,
    ui: &Ui,
    report: &RecognitionReport,
    display: Option<(f64, f64)>,
    create_task: bool,
) -> Result<()> {
    print!("{}", ui::report_lines(config.language, report, display));
    if create_task {
        let task = report.review_task()?;
        let created = {
            let _stage = ui.stage("File review task");
            review_client(config)?.create_task(&task)?
        };
        match created {
            Some(task) => println!("review task #{} filed", task.id),
            None => println!("review task filed"),
        }
    }
    Ok(())
}

fn cmd_health(config: &ConsoleConfig, watch: bool) -> Result<()> {
    let poller = HealthPoller::new(&config.base_url, &config.services, config.http_timeout)?;
    let shutdown = if watch { Some(shutdown_channel()?) } else { None };
    loop {
        let rows: Vec<_> = poller
            .poll()
            .into_iter()
            .map(|(service, health)| (service, Some(health)))
            .collect();
        print!("{}", ui::health_table(config.language, &rows));
        match &shutdown {
            Some(rx) if !wait_or_shutdown(rx, config.poll_interval) => println!(),
            _ => return Ok(()),
        }
    }
}

fn cmd_tasks(config: &ConsoleConfig, command: TasksCommand) -> Result<()> {
    let client = review_client(config)?;
    match command {
        TasksCommand::List {
            offset,
            limit,
            watch,
        } => {
            let page = match (offset, limit) {
                (None, None) => None,
                (offset, limit) => Some(TaskPage::new(
                    offset.unwrap_or(0),
                    limit.unwrap_or(vbic_console::review::MAX_PAGE_LIMIT),
                )?),
            };
            let shutdown = if watch { Some(shutdown_channel()?) } else { None };
            loop {
                match client.list_tasks(page) {
                    Ok(tasks) => print!("{}", ui::task_table(config.language, &tasks)),
                    // A failed refresh keeps watching; the next poll retries.
                    Err(err) if shutdown.is_some() => log::error!("{err:#}"),
                    Err(err) => return Err(err),
                }
                match &shutdown {
                    Some(rx) if !wait_or_shutdown(rx, config.poll_interval) => println!(),
                    _ => return Ok(()),
                }
            }
        }
        TasksCommand::Create {
            label,
            confidence,
            image_name,
        } => {
            let task = TaskCreate {
                label,
                confidence,
                image_name,
            };
            match client.create_task(&task)? {
                Some(created) => println!("review task #{} filed", created.id),
                None => println!("review task filed"),
            }
            Ok(())
        }
    }
}

fn cmd_tools(config: &ConsoleConfig, command: ToolsCommand) -> Result<()> {
    let client = ToolsClient::new(&config.base_url, config.assistant_path()?, config.http_timeout)?;
    match command {
        ToolsCommand::List => {
            let tools = client.available_tools();
            print!("{}", ui::tool_list(config.language, &tools));
        }
        ToolsCommand::Echo { payload } => {
            let result = client.echo(&parse_echo_payload(&payload))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        ToolsCommand::Summarize { text } => {
            let result = client.summarize(&text)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

fn shutdown_channel() -> Result<Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {e}"))?;
    Ok(rx)
}

/// Sleep for `interval`; true when Ctrl-C arrived first.
fn wait_or_shutdown(rx: &Receiver<()>, interval: Duration) -> bool {
    !matches!(rx.recv_timeout(interval), Err(RecvTimeoutError::Timeout))
}
