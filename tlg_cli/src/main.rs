use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tlg_core::{Channel, Reader};
use tlg_image::{convert_file, DecodeOptions, OPAQUE};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "tlg",
    about = "Decode TLG5 images, convert them to PNG, and inspect their block layout",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a TLG5 file, or a directory of them, to PNG
    Convert {
        /// Input .tlg file or directory
        input: PathBuf,
        /// Output file or directory (default: next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
        /// Number of parallel workers (default: number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Files handed to the worker pool per batch
        #[arg(short, long, default_value_t = 10)]
        batch_size: usize,
        /// Alpha value written for every pixel
        #[arg(long, default_value_t = OPAQUE)]
        alpha: u8,
    },
    /// Print header geometry and block statistics
    Inspect {
        /// TLG5 file to inspect
        file: PathBuf,
        /// Print per-record details
        #[arg(long)]
        blocks: bool,
        /// Emit the scan as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Decode one channel plane of one block row
    ///
    /// Every earlier block row is decoded too, since the dictionary carries
    /// over from block to block.
    Plane {
        /// TLG5 file
        file: PathBuf,
        /// Zero-based block row
        #[arg(short, long)]
        row: u32,
        /// Channel to dump
        #[arg(short, long, value_enum, default_value_t = ChannelArg::Blue)]
        channel: ChannelArg,
        /// Write raw bytes to a file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelArg {
    #[value(alias = "b")]
    Blue,
    #[value(alias = "g")]
    Green,
    #[value(alias = "r")]
    Red,
}

impl From<ChannelArg> for Channel {
    fn from(c: ChannelArg) -> Self {
        match c {
            ChannelArg::Blue => Channel::Blue,
            ChannelArg::Green => Channel::Green,
            ChannelArg::Red => Channel::Red,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing log subscriber")?;
    Ok(())
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn is_tlg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tlg"))
}

/// Collect `*.tlg` files under `dir`, sorted for stable batch order.
fn collect_tlg_files(dir: &Path, recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries =
            fs::read_dir(&current).with_context(|| format!("reading directory {:?}", current))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if is_tlg(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Pair every input with its PNG destination.
fn plan_conversions(
    input: &Path,
    output: Option<&Path>,
    recursive: bool,
) -> anyhow::Result<Vec<(PathBuf, PathBuf)>> {
    if input.is_file() {
        let dest = match output {
            Some(o) => o.to_path_buf(),
            None => input.with_extension("png"),
        };
        return Ok(vec![(input.to_path_buf(), dest)]);
    }

    let out_dir = output.unwrap_or(input);
    collect_tlg_files(input, recursive)?
        .into_iter()
        .map(|src| -> anyhow::Result<(PathBuf, PathBuf)> {
            let rel = src.strip_prefix(input).with_context(|| format!("relativizing {:?}", src))?;
            let dest = out_dir.join(rel).with_extension("png");
            Ok((src, dest))
        })
        .collect()
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_convert(
    input: PathBuf,
    output: Option<PathBuf>,
    recursive: bool,
    jobs: Option<usize>,
    batch_size: usize,
    alpha: u8,
) -> anyhow::Result<()> {
    let plan = plan_conversions(&input, output.as_deref(), recursive)?;
    if plan.is_empty() {
        info!("no TLG files found under {:?}", input);
        return Ok(());
    }

    let jobs = jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("building worker pool")?;
    let options = DecodeOptions {
        alpha,
        ..DecodeOptions::default()
    };

    let total = plan.len();
    info!("processing {} files using {} workers", total, jobs);

    let t0 = Instant::now();
    let mut done = 0usize;
    let mut failed = 0usize;
    for batch in plan.chunks(batch_size.max(1)) {
        let failures = pool.install(|| {
            batch
                .par_iter()
                .filter(|(src, dest)| match convert_file(src, dest, &options) {
                    Ok(_) => false,
                    Err(e) => {
                        error!("error processing {:?}: {}", src, e);
                        true
                    }
                })
                .count()
        });
        done += batch.len();
        failed += failures;
        info!("converted {}/{}", done, total);
    }

    info!(
        "finished in {:.3}s: {} converted, {} failed",
        t0.elapsed().as_secs_f64(),
        total - failed,
        failed
    );
    if failed > 0 {
        anyhow::bail!("{} of {} files failed to convert", failed, total);
    }
    Ok(())
}

fn run_inspect(file: PathBuf, show_blocks: bool, json: bool) -> anyhow::Result<()> {
    let reader = Reader::open(&file).with_context(|| format!("opening {:?}", file))?;
    let scan = reader.scan_blocks()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scan)?);
        return Ok(());
    }

    let header = &scan.header;
    println!("=== TLG5 File: {:?} ===", file);
    println!();
    println!("  dimensions     : {} x {}", header.image_width, header.image_height);
    println!("  block height   : {}", header.block_height);
    println!("  block rows     : {}", header.block_count());
    println!("  records        : {} ({} stored, {} compressed)",
        scan.records.len(), scan.stored_count(), scan.compressed_count());
    println!("  payload        : {}", human_bytes(scan.payload_size()));
    println!("  decoded planes : {}", human_bytes(scan.decoded_size()));
    println!("  ratio          : {:.2}x", scan.ratio());
    println!("  complete       : {}", scan.complete);

    if show_blocks {
        println!();
        println!(
            "  {:>6}  {:>6}  {:>7}  {:>10}  {:>10}  {:>10}  {:>16}",
            "row", "chan", "stored", "table", "payload", "decoded", "checksum"
        );
        println!("  {}", "-".repeat(77));
        for rec in &scan.records {
            let table = scan
                .block_sizes
                .get(rec.block_row as usize)
                .map(|s| s.to_string())
                .unwrap_or_default();
            println!(
                "  {:>6}  {:>6}  {:>7}  {:>10}  {:>10}  {:>10}  {:016x}",
                rec.block_row,
                rec.channel.name(),
                rec.stored,
                table,
                rec.payload_len,
                rec.decoded_len,
                rec.checksum.unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn run_plane(file: PathBuf, row: u32, channel: Channel, output: Option<PathBuf>) -> anyhow::Result<()> {
    let reader = Reader::open(&file).with_context(|| format!("opening {:?}", file))?;
    let block_rows = reader.header().block_count();

    let t0 = Instant::now();
    let plane = reader
        .read_plane(row, channel)?
        .with_context(|| format!("block row {} not present (file has {})", row, block_rows))?;
    let elapsed = t0.elapsed();

    eprintln!(
        "  decoded {} {} plane in {:.3}ms",
        human_bytes(plane.len() as u64),
        channel.name(),
        elapsed.as_secs_f64() * 1000.0
    );

    match output {
        Some(path) => {
            fs::write(&path, &plane)?;
            eprintln!("  written to {:?}", path);
        }
        None => {
            let preview = &plane[..plane.len().min(256)];
            println!(
                "--- block row {} {} ({} bytes, first {} shown) ---",
                row,
                channel.name(),
                plane.len(),
                preview.len()
            );
            for (i, chunk) in preview.chunks(16).enumerate() {
                print!("  {:04x}  ", i * 16);
                for b in chunk {
                    print!("{:02x} ", b);
                }
                for _ in chunk.len()..16 {
                    print!("   ");
                }
                println!();
            }
            if plane.len() > 256 {
                println!("  ... ({} bytes remaining not shown)", plane.len() - 256);
            }
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    match cli.command {
        Commands::Convert {
            input,
            output,
            recursive,
            jobs,
            batch_size,
            alpha,
        } => run_convert(input, output, recursive, jobs, batch_size, alpha),
        Commands::Inspect { file, blocks, json } => run_inspect(file, blocks, json),
        Commands::Plane {
            file,
            row,
            channel,
            output,
        } => run_plane(file, row, channel.into(), output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_tlg_ignores_case() {
        assert!(is_tlg(Path::new("a/b/bg01.TLG")));
        assert!(is_tlg(Path::new("c.tlg")));
        assert!(!is_tlg(Path::new("c.tlg.png")));
        assert!(!is_tlg(Path::new("tlg")));
    }

    #[test]
    fn test_plan_mirrors_directory_layout() {
        let root = std::env::temp_dir().join("tlg_cli_plan");
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("top.tlg"), b"").unwrap();
        fs::write(root.join("sub/deep.TLG"), b"").unwrap();
        fs::write(root.join("notes.txt"), b"").unwrap();

        let flat = plan_conversions(&root, None, false).unwrap();
        assert_eq!(flat, vec![(root.join("top.tlg"), root.join("top.png"))]);

        let out = root.join("out");
        let deep = plan_conversions(&root, Some(&out), true).unwrap();
        assert_eq!(
            deep,
            vec![
                (root.join("sub/deep.TLG"), out.join("sub/deep.png")),
                (root.join("top.tlg"), out.join("top.png")),
            ]
        );
    }

    #[test]
    fn test_plan_single_file_defaults_next_to_input() {
        let file = std::env::temp_dir().join("tlg_cli_single.tlg");
        fs::write(&file, b"").unwrap();
        let plan = plan_conversions(&file, None, false).unwrap();
        assert_eq!(plan, vec![(file.clone(), file.with_extension("png"))]);
    }
}
