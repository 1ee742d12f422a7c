// Memory stream probe
//
// Opens a buffer, writes a pattern at a set of offsets, verifies it reads
// back, and prints occupancy statistics.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sparsemem::config::SparsememConfig;
use sparsemem::{BlockAllocator, BufferConfig, MemoryBuffer, SeekOrigin, StreamMode};

#[derive(Parser, Debug)]
#[command(name = "memstream_probe")]
#[command(
    about = "Exercise a sparse memory stream and report block occupancy",
    long_about = None
)]
struct Args {
    /// TOML config file; command line values override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Logical capacity in bytes
    #[arg(long)]
    capacity: Option<u64>,

    /// Block size in bytes (defaults to the allocation granularity)
    #[arg(long)]
    block_size: Option<u32>,

    /// read_only, write_only or read_write
    #[arg(long)]
    mode: Option<StreamMode>,

    /// Largest capacity committed eagerly (0 always uses blocks)
    #[arg(long)]
    eager_limit: Option<u64>,

    /// Offset of a pattern write; may be repeated
    #[arg(long = "at", default_values_t = vec![0u64])]
    offsets: Vec<u64>,

    /// Bytes written at each offset
    #[arg(long, default_value_t = 4096)]
    length: usize,

    /// Reserve blocks with mmap instead of the heap
    #[arg(long)]
    mmap: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn resolve(args: &Args) -> Result<BufferConfig, String> {
    let mut file = match &args.config {
        Some(path) => SparsememConfig::load_from_path(path).map_err(|e| e.to_string())?,
        None => SparsememConfig::default(),
    };
    file.apply_env_overrides().map_err(|e| e.to_string())?;

    let mut config = match (file.to_buffer_config(), args.capacity) {
        (Ok(config), Some(capacity)) => BufferConfig { capacity, ..config },
        (Ok(config), None) => config,
        (Err(_), Some(capacity)) => BufferConfig::new(capacity),
        (Err(e), None) => return Err(format!("{e} (or pass --capacity)")),
    };
    if let Some(block_size) = args.block_size {
        config = config.with_block_size(block_size);
    }
    if let Some(mode) = args.mode {
        config = config.with_mode(mode);
    }
    if let Some(limit) = args.eager_limit {
        config = config.with_eager_commit_limit(limit);
    }
    Ok(config)
}

fn fill_pattern(buf: &mut [u8], offset: u64) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b = ((offset as usize + i) % 251) as u8 + 1;
    }
}

fn probe(args: &Args) -> Result<(), String> {
    let config = resolve(args)?;
    if !args.mmap {
        return run(args, &config, sparsemem::HeapAllocator);
    }
    #[cfg(unix)]
    {
        run(args, &config, sparsemem::VirtualMemoryAllocator)
    }
    #[cfg(not(unix))]
    {
        Err("--mmap is only supported on unix".to_string())
    }
}

fn run<A: BlockAllocator>(args: &Args, config: &BufferConfig, allocator: A) -> Result<(), String> {
    let mut buffer =
        MemoryBuffer::open_with_allocator(config, allocator).map_err(|e| e.to_string())?;
    println!(
        "opened {} buffer: capacity={} mode={}",
        if buffer.is_sparse() { "sparse" } else { "fixed" },
        buffer.capacity(),
        buffer.mode()
    );

    let mut pattern = vec![0u8; args.length];
    if buffer.mode().can_write() {
        for &offset in &args.offsets {
            fill_pattern(&mut pattern, offset);
            buffer
                .seek(offset as i64, SeekOrigin::Begin)
                .and_then(|_| buffer.write(&pattern, 0, pattern.len()))
                .map_err(|e| format!("write at {offset}: {e}"))?;
            if args.verbose {
                println!("  wrote {} bytes at {offset}", pattern.len());
            }
        }
    }

    if buffer.mode().can_read() && buffer.mode().can_write() {
        let mut out = vec![0u8; args.length];
        let len = out.len();
        for &offset in &args.offsets {
            fill_pattern(&mut pattern, offset);
            buffer
                .seek(offset as i64, SeekOrigin::Begin)
                .and_then(|_| buffer.read(&mut out, 0, len))
                .map_err(|e| format!("read at {offset}: {e}"))?;
            if out != pattern {
                return Err(format!("pattern mismatch at {offset}"));
            }
        }
        println!("verified {} pattern(s)", args.offsets.len());
    }

    print!("{}", buffer.stats());
    let summary = buffer.dispose().map_err(|e| e.to_string())?;
    if args.verbose {
        println!("released {} allocation(s)", summary.released());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match probe(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("memstream_probe: {message}");
            ExitCode::FAILURE
        }
    }
}
