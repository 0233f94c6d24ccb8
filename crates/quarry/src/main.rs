use std::fs;
use std::process;

use clap::{Parser, Subcommand};
use quarry_core::error::{QuarryError, Result};
use quarry_core::memory::{MemoryImage, MemoryView};
use quarry_core::resolver::dwarf::DwarfResolver;
use quarry_core::resolver::TypeResolver;
use quarry_core::value::{InspectContext, TypedValue};
use quarry_core::{default_registry, Address};
use quarry_utils::{info, init_logging};

mod render;

/// Inspect Qt5 containers inside a running or crashed process.
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "Inspect Qt5 containers inside a running or crashed process", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Decode one container value and render it as a tree
    Inspect
    {
        /// Path to the inspected binary (source of DWARF type information)
        #[arg(long)]
        binary: String,
        /// PID of a running process to read memory from
        #[arg(long, conflicts_with_all = ["image", "image_base"])]
        pid: Option<u32>,
        /// Raw memory snapshot file to read instead of a live process
        #[arg(long, requires = "image_base")]
        image: Option<String>,
        /// Virtual address the snapshot was captured at (hex or decimal)
        #[arg(long)]
        image_base: Option<String>,
        /// Address of the container value (hex or decimal)
        address: String,
        /// Static type of the value, e.g. "QMap<int, QString>"
        #[arg(long = "type", value_name = "TYPE")]
        type_name: String,
        /// Maximum children rendered per container
        #[arg(long, default_value_t = 25)]
        limit: usize,
        /// Maximum nesting depth
        #[arg(long, default_value_t = 3)]
        depth: usize,
    },
    /// Print the resolved layout of a type
    Describe
    {
        /// Path to the inspected binary (source of DWARF type information)
        #[arg(long)]
        binary: String,
        /// Type name to describe
        name: String,
    },
}

fn main()
{
    // Initialize logging (reads from RUST_LOG env var)
    // Defaults to INFO level and Pretty format if not set
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let cli = Cli::parse();

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> Result<()>
{
    match cli.command {
        Commands::Inspect {
            binary,
            pid,
            image,
            image_base,
            address,
            type_name,
            limit,
            depth,
        } => {
            info!("Loading type information from {}", binary);
            let resolver = DwarfResolver::load(&binary)?;
            let target = resolver.target();

            let memory: Box<dyn MemoryView> = if let Some(pid) = pid {
                info!("Reading memory of process {}", pid);
                live_memory(pid)?
            } else if let Some(image) = image {
                // clap guarantees image_base accompanies image
                let base = parse_address(image_base.as_deref().unwrap_or_default())?;
                info!("Reading snapshot {} mapped at {}", image, base);
                let mut snapshot = MemoryImage::new();
                snapshot.add_region(base, fs::read(image)?);
                Box::new(snapshot)
            } else {
                return Err(QuarryError::InvalidArgument(
                    "choose a memory source: --pid or --image".to_string(),
                ));
            };

            let cx = InspectContext::new(&*memory, &resolver, target);
            let value = TypedValue::new(parse_address(&address)?, resolver.lookup(&type_name)?);
            render::render_value(&cx, default_registry(), "value", value, 0, depth, limit)
        }
        Commands::Describe { binary, name } => {
            let resolver = DwarfResolver::load(&binary)?;
            let handle = resolver.lookup(&name)?;

            println!("{} ({} bytes)", resolver.type_name(handle)?, resolver.byte_size(handle)?);
            for (field_name, info) in resolver.table().fields(handle) {
                println!("  {:4}  {}: {}", info.offset, field_name, resolver.type_name(info.ty)?);
            }
            Ok(())
        }
    }
}

#[cfg(target_os = "linux")]
fn live_memory(pid: u32) -> Result<Box<dyn MemoryView>>
{
    use quarry_core::memory::ProcessMemory;
    Ok(Box::new(ProcessMemory::new(pid)))
}

#[cfg(not(target_os = "linux"))]
fn live_memory(_pid: u32) -> Result<Box<dyn MemoryView>>
{
    Err(QuarryError::InvalidArgument(
        "live process reading is only supported on Linux; use --image".to_string(),
    ))
}

/// Parse `0x…` hex or plain decimal into a target address.
fn parse_address(text: &str) -> Result<Address>
{
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        text.parse::<u64>()
    };
    parsed
        .map(Address::from)
        .map_err(|_| QuarryError::InvalidArgument(format!("invalid address: {text}")))
}
