use modbus_layout::convert::FileType;
use modbus_layout::rtu::{self, RtuConfig};
use modbus_layout::tcp::{self, TcpConfig};
use modbus_layout::{
    Category, Client, Event, Layout, ModbusTransport, Payload, TransportError, Write,
};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::channel;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Subcommand)]
enum Connection {
    /// Use TCP connection
    Tcp(TcpConfig),

    /// Use RTU connection
    Rtu(RtuConfig),
}

#[derive(Subcommand)]
enum Commands {
    /// Print the polling range of every category.
    Ranges,

    /// Convert the layout file between JSON and TOML.
    Convert {
        /// Destination file, defaults to the layout path with its extension replaced.
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Destination format, defaults to the other format.
        #[arg(long, value_enum)]
        dest_type: Option<FileType>,
    },

    /// Poll the device and print the decoded values.
    Poll {
        /// Polling interval in milliseconds.
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,

        /// Print values as hexadecimal.
        #[arg(long, default_value_t = false)]
        hex: bool,

        /// Stop after this many updates.
        #[arg(long)]
        cycles: Option<usize>,

        #[command(subcommand)]
        connection: Connection,
    },

    /// Write a single value to an element of the layout.
    Write {
        /// Category of the element.
        #[arg(long, value_enum)]
        category: Category,

        /// Address of the element.
        #[arg(long)]
        address: u16,

        /// Value to write, parsed with the type of the element.
        #[arg(long)]
        value: String,

        #[command(subcommand)]
        connection: Connection,
    },
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the JSON or TOML layout file.
    #[arg(long)]
    layout: PathBuf,

    /// Log level used if RUST_LOG is not set.
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,

    /// Switch on verbose output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

async fn connect(connection: &Connection) -> Result<ModbusTransport, TransportError> {
    match connection {
        Connection::Tcp(config) => tcp::connect(config).await,
        Connection::Rtu(config) => rtu::connect(config).await,
    }
}

fn load(path: &Path) -> anyhow::Result<Layout> {
    Layout::load(path).with_context(|| format!("Failed to load layout {}", path.display()))
}

fn render(layout: &Layout, hex: bool) -> String {
    layout
        .iter()
        .map(|(category, element)| {
            let address = element
                .address()
                .map_or_else(|| String::from("-"), |a| a.to_string());
            let kind = element
                .r#type()
                .map_or_else(|| String::from("bit"), |t| t.to_string());
            let value = element
                .value()
                .map_or_else(
                    || String::from("-"),
                    |v| if hex { v.as_hex_str() } else { v.to_string() },
                );
            let props = serde_json::Value::Object(element.props().clone());
            format!("{category:<8} {address:>5} {kind:<10} {value:<20} {props}")
        })
        .join("\n")
}

fn ranges(layout: &Layout) {
    let lines = Category::ALL.iter().map(|category| match layout.range(*category) {
        Some(range) => format!("{category:<8} {range} ({} units)", range.length()),
        None => format!("{category:<8} -"),
    });
    println!("{}", lines.format("\n"));
}

fn default_dest(src: &Path, dest_type: FileType) -> PathBuf {
    src.with_extension(dest_type.extension())
}

fn convert_layout(
    src: &Path,
    dest: Option<PathBuf>,
    dest_type: Option<FileType>,
) -> anyhow::Result<()> {
    let src_type = FileType::from_path(src);
    let dest_type = dest_type.unwrap_or(match src_type {
        FileType::Json => FileType::Toml,
        FileType::Toml => FileType::Json,
    });
    let dest = dest.unwrap_or_else(|| default_dest(src, dest_type));

    load(src)?
        .save(&dest, dest_type)
        .with_context(|| format!("Failed to write layout {}", dest.display()))?;
    info!("Layout written to {}", dest.display());
    Ok(())
}

async fn poll(
    layout: Layout,
    interval_ms: u64,
    hex: bool,
    cycles: Option<usize>,
    connection: Connection,
) -> anyhow::Result<()> {
    let transport = connect(&connection).await?;
    let (sender, mut receiver) = channel::<Event>(10);

    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                Event::Update(layout) => println!("{}\n", render(&layout, hex)),
                Event::Error(msg) => warn!("{} {}", msg.timestamp, msg.message),
                other => info!("Client {}", other.name()),
            }
        }
    });

    let mut client = Client::new(layout).with_events(sender);
    client.open(transport).await;
    client.run(Duration::from_millis(interval_ms), cycles).await;
    client.close().await;
    drop(client);

    printer.await?;
    Ok(())
}

async fn write(
    layout: Layout,
    category: Category,
    address: u16,
    value: String,
    connection: Connection,
) -> anyhow::Result<()> {
    if !category.is_writable() {
        warn!("{category} is read-only on the device, writing anyway");
    }
    let element = layout
        .find(category, address)
        .cloned()
        .ok_or_else(|| anyhow!("No {category} element at address {address}"))?;

    let transport = connect(&connection).await?;
    let mut client = Client::new(layout);
    client.open(transport).await;
    let result = client.write(&element, Payload::Value(value.clone())).await;
    client.close().await;

    match result? {
        Write::Done => info!("Wrote `{value}` to {category} {address}"),
        Write::Skipped => warn!("`{value}` is not a valid value for {category} {address}"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        args.log_level
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("modbus_layout={log_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Commands::Convert { dest, dest_type } => convert_layout(&args.layout, dest, dest_type),
        Commands::Ranges => {
            ranges(&load(&args.layout)?);
            Ok(())
        }
        Commands::Poll {
            interval_ms,
            hex,
            cycles,
            connection,
        } => {
            let layout = load(&args.layout)?;
            let runtime = Runtime::new().context("Failed to create runtime")?;
            runtime.block_on(poll(layout, interval_ms, hex, cycles, connection))
        }
        Commands::Write {
            category,
            address,
            value,
            connection,
        } => {
            let layout = load(&args.layout)?;
            let runtime = Runtime::new().context("Failed to create runtime")?;
            runtime.block_on(write(layout, category, address, value, connection))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{default_dest, render, Args, Commands};
    use clap::Parser;
    use modbus_layout::convert::FileType;
    use modbus_layout::{Category, Layout};
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use tracing::Level;

    #[test]
    fn ut_default_dest() {
        assert_eq!(
            default_dest(Path::new("cfg/layout.json"), FileType::Toml),
            PathBuf::from("cfg/layout.toml")
        );
        assert_eq!(
            default_dest(Path::new("layout.toml"), FileType::Json),
            PathBuf::from("layout.json")
        );
        assert_eq!(
            default_dest(Path::new("layout"), FileType::Json),
            PathBuf::from("layout.json")
        );
    }

    #[test]
    fn ut_args_log_level() {
        let args = Args::try_parse_from(["modbus-layout", "--layout", "l.json", "ranges"]).unwrap();
        assert_eq!(args.log_level, Level::INFO);

        let args = Args::try_parse_from([
            "modbus-layout", "--layout", "l.json", "--log-level", "debug", "ranges",
        ])
        .unwrap();
        assert_eq!(args.log_level, Level::DEBUG);

        assert!(Args::try_parse_from([
            "modbus-layout", "--layout", "l.json", "--log-level", "infoo", "ranges",
        ])
        .is_err());
    }

    #[test]
    fn ut_args_interval() {
        assert!(Args::try_parse_from([
            "modbus-layout", "--layout", "l.json", "poll", "--interval-ms", "0", "tcp",
        ])
        .is_err());

        let args = Args::try_parse_from([
            "modbus-layout", "--layout", "l.json", "poll", "--interval-ms", "1", "--hex", "tcp",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Commands::Poll { interval_ms: 1, hex: true, .. }
        ));
    }

    #[test]
    fn ut_render_hex() {
        let mut layout = Layout::from_value(&json!({ "holding": [{ "address": 4 }] })).unwrap();
        layout.apply(Category::Holding, Some(&[0x12, 0x34]));

        assert!(render(&layout, false).contains(" 4660 "));
        assert!(render(&layout, true).contains(" 0x1234 "));
    }
}
