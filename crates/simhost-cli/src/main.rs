//! simhost command-line front-end
//!
//! Thin scripting surface over the `simhost` library: inspect the station,
//! read and write joints and parameters, stream events and sample program
//! trajectories.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use simhost::math::pose_2_xyzrpw;
use simhost::{
    Client, ClientConfig, Detail, Discretization, EventType, Item, ItemType, ParamValue,
    PathError,
};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log filter variable checked before `RUST_LOG`.
const LOG_ENV: &str = "SIMHOST_LOG";

/// Set up logging.
/// Debug builds log at debug level to stderr and a timestamped file in the
/// temp dir; release builds log at info level to stderr.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(format!("simhost={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("simhost-{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

/// simhost command-line client
#[derive(Parser)]
#[command(name = "simhost")]
#[command(about = "Script a running simhost robot simulation host")]
#[command(version)]
#[command(after_help = "\
Examples:
  simhost status                      Host version and active station
  simhost items --type robot          List robots
  simhost joints UR10                 Print robot joints
  simhost set-joints UR10 0 -90 90 0 90 0
  simhost param get RunMode
  simhost events --filter 20 21       Stream program slider events
  simhost joint-list Pick --time 0.01 --csv pick.csv

Connection settings come from the config file, then SIMHOST_HOST,
SIMHOST_PORT, SIMHOST_TIMEOUT_MS, SIMHOST_EXECUTABLE and SIMHOST_NO_LAUNCH,
then the flags below.
")]
struct Cli {
    /// Host address
    #[arg(long, global = true)]
    host: Option<String>,

    /// Host port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Never start the host; fail if it is not running
    #[arg(long, global = true)]
    no_launch: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show host version and active station
    Status,

    /// List station items
    Items {
        /// Only items of this type
        #[arg(long = "type", value_enum)]
        item_type: Option<KindArg>,
    },

    /// Print an item's pose relative to its parent
    Pose {
        /// Item name
        item: String,
    },

    /// Print a robot's joints
    Joints {
        /// Robot name
        robot: String,
    },

    /// Set a robot's joints
    #[command(name = "set-joints")]
    SetJoints {
        /// Robot name
        robot: String,
        /// Joint values in degrees or mm
        #[arg(required = true, allow_negative_numbers = true)]
        joints: Vec<f64>,
    },

    /// Read or write a station parameter
    Param {
        #[command(subcommand)]
        command: ParamCommand,
    },

    /// Run a station command and print its answer
    Command {
        /// Command name
        name: String,
        /// Command value
        #[arg(default_value = "")]
        value: String,
    },

    /// Print events until the host closes the channel or Ctrl-C
    Events {
        /// Event ids to subscribe to (all when omitted)
        #[arg(long, num_args = 1..)]
        filter: Vec<i32>,
    },

    /// Simulate a program and sample its joint trajectory
    #[command(name = "joint-list")]
    JointList {
        /// Program name
        program: String,
        /// Largest Cartesian step in mm
        #[arg(long, default_value_t = 1.0)]
        mm: f64,
        /// Largest joint step in degrees
        #[arg(long, default_value_t = 1.0)]
        deg: f64,
        /// Time step in seconds; enables time-based sampling
        #[arg(long)]
        time: Option<f64>,
        /// Sample detail
        #[arg(long, value_enum, default_value_t = DetailArg::Basic)]
        detail: DetailArg,
        /// Check collisions while sampling
        #[arg(long)]
        collisions: bool,
        /// Write samples to this CSV file instead of printing a summary
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },

    /// Start the host if needed and wait until it answers
    Launch,
}

#[derive(Subcommand)]
enum ParamCommand {
    /// Print a parameter
    Get {
        /// Parameter name
        name: String,
    },
    /// Set a parameter; numbers are stored as numbers
    Set {
        /// Parameter name
        name: String,
        /// New value
        value: String,
    },
    /// Remove a parameter
    Unset {
        /// Parameter name
        name: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Station,
    Robot,
    Frame,
    Tool,
    Object,
    Target,
    Curve,
    Program,
}

impl From<KindArg> for ItemType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Station => Self::Station,
            KindArg::Robot => Self::Robot,
            KindArg::Frame => Self::Frame,
            KindArg::Tool => Self::Tool,
            KindArg::Object => Self::Object,
            KindArg::Target => Self::Target,
            KindArg::Curve => Self::Curve,
            KindArg::Program => Self::Program,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DetailArg {
    Basic,
    Timed,
    Speeds,
    Accelerations,
}

impl From<DetailArg> for Detail {
    fn from(detail: DetailArg) -> Self {
        match detail {
            DetailArg::Basic => Self::Basic,
            DetailArg::Timed => Self::Timed,
            DetailArg::Speeds => Self::Speeds,
            DetailArg::Accelerations => Self::Accelerations,
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env().context("Failed to load client configuration")?;
    if let Some(host) = &cli.host {
        config.session.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.session.port = port;
    }
    if cli.no_launch {
        config.session.auto_launch = false;
    }
    Ok(config)
}

async fn find(client: &Client, name: &str, item_type: ItemType) -> Result<Item> {
    client
        .item(name, item_type)
        .await
        .with_context(|| format!("Failed to look up {name}"))?
        .with_context(|| format!("No {item_type} named {name} in the station"))
}

fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.4}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numbers become numeric parameters; anything else is stored as text.
fn parse_param(value: &str) -> ParamValue {
    if let Ok(int) = value.parse::<i32>() {
        ParamValue::Int(int)
    } else if let Ok(float) = value.parse::<f64>() {
        ParamValue::Float(float)
    } else {
        ParamValue::String(value.to_string())
    }
}

fn print_param(name: &str, value: &ParamValue) {
    match value {
        ParamValue::None => println!("{name}: (not set)"),
        ParamValue::Matrix(m) => println!("{name}:\n{m}"),
        ParamValue::Bytes(b) => println!("{name}: {} bytes", b.len()),
        ParamValue::Json(v) => match serde_json::to_string_pretty(v) {
            Ok(text) => println!("{name}:\n{text}"),
            Err(_) => println!("{name}: {v}"),
        },
        other => match other.as_string() {
            Some(text) => println!("{name}: {text}"),
            None => println!("{name}: {other:?}"),
        },
    }
}

async fn status(client: &Client, config: &ClientConfig) -> Result<()> {
    let version = client.version().await.context("Host did not answer")?;
    println!("Host:     {}:{}", config.session.host, config.session.port);
    println!("Version:  {version}");
    match client.active_station().await? {
        Some(station) => println!("Station:  {}", station.name().await?),
        None => println!("Station:  (none)"),
    }
    Ok(())
}

async fn list_items(client: &Client, item_type: Option<KindArg>) -> Result<()> {
    let item_type = item_type.map_or(ItemType::Any, ItemType::from);
    let items = client
        .items(item_type)
        .await
        .context("Failed to list items")?;
    for item in items {
        println!("{:<10} {}", item.item_type().to_string(), item.name().await?);
    }
    Ok(())
}

async fn print_pose(client: &Client, name: &str) -> Result<()> {
    let item = find(client, name, ItemType::Any).await?;
    let pose = item.pose().await.context("Failed to read pose")?;
    print!("{pose}");
    let [x, y, z, r, p, w] = pose_2_xyzrpw(&pose);
    println!(
        "xyz: {x:.3} {y:.3} {z:.3}  rpw (deg): {:.3} {:.3} {:.3}",
        r.to_degrees(),
        p.to_degrees(),
        w.to_degrees()
    );
    Ok(())
}

async fn stream_events(client: &Client, filter: &[i32]) -> Result<()> {
    let types: Vec<EventType> = filter.iter().copied().map(EventType::from_code).collect();
    let mut channel = client
        .open_events((!types.is_empty()).then_some(types.as_slice()))
        .await
        .context("Failed to subscribe to events")?;
    info!("Listening on {}", channel.peer());

    loop {
        tokio::select! {
            next = channel.next_event() => {
                match next.context("Event channel failed")? {
                    Some(event) => println!("{event}"),
                    None => {
                        debug!("Host closed the event channel");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn joint_list(
    client: &Client,
    program: &str,
    disc: &Discretization,
    csv: Option<PathBuf>,
) -> Result<()> {
    let program = find(client, program, ItemType::Program).await?;
    let list = program
        .instruction_list_joints(disc)
        .await
        .context("Failed to sample program")?;

    if let Some(path) = csv {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        list.write_csv(&mut out)?;
        out.flush()?;
        println!("{} samples written to {}", list.samples.len(), path.display());
    } else {
        for sample in &list.samples {
            println!(
                "move {:>3}  {}  err={}",
                sample.move_id,
                format_values(&sample.joints),
                sample.error
            );
        }
    }

    match list.error.classify() {
        PathError::None => {
            println!("OK: {} samples", list.samples.len());
            Ok(())
        }
        problem => bail!("{problem:?}: {} ({})", list.message, list.error),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging();

    let config = load_config(&cli)?;
    debug!(
        "Using host {}:{}",
        config.session.host, config.session.port
    );
    let client = Client::new(config.session.clone());

    match cli.command {
        Commands::Status => status(&client, &config).await?,
        Commands::Items { item_type } => list_items(&client, item_type).await?,
        Commands::Pose { item } => print_pose(&client, &item).await?,
        Commands::Joints { robot } => {
            let robot = find(&client, &robot, ItemType::Robot).await?;
            let joints = robot.joints().await.context("Failed to read joints")?;
            println!("{}", format_values(&joints));
        }
        Commands::SetJoints { robot, joints } => {
            let robot = find(&client, &robot, ItemType::Robot).await?;
            robot.dof().await?;
            robot
                .set_joints(&joints)
                .await
                .context("Failed to set joints")?;
        }
        Commands::Param { command } => match command {
            ParamCommand::Get { name } => {
                let value = client.param(&name).await?;
                print_param(&name, &value);
            }
            ParamCommand::Set { name, value } => {
                client.set_param(&name, parse_param(&value)).await?;
            }
            ParamCommand::Unset { name } => {
                client.set_param(&name, ParamValue::None).await?;
            }
        },
        Commands::Command { name, value } => {
            println!("{}", client.command(&name, &value).await?);
        }
        Commands::Events { filter } => stream_events(&client, &filter).await?,
        Commands::JointList {
            program,
            mm,
            deg,
            time,
            detail,
            collisions,
            csv,
        } => {
            let mut disc = Discretization {
                mm_step: mm,
                deg_step: deg,
                detail: detail.into(),
                check_collisions: collisions,
                ..Discretization::default()
            };
            if let Some(time) = time {
                disc.time_step = time;
                disc.detail = disc.detail.max(Detail::Timed);
            }
            joint_list(&client, &program, &disc, csv).await?;
        }
        Commands::Launch => {
            let mut session = config.session.clone();
            session.auto_launch = true;
            let client = Client::new(session);
            client.connect().await.context("Failed to start the host")?;
            println!("Host ready: {}", client.version().await?);
        }
    }

    client.close().await;
    Ok(())
}
