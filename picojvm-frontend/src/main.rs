use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mapfile_parser::{parse_index, parse_mapfile, MapFileParseError, MapFileWarning};
use picojvm_base::code::op;
use picojvm_base::relocate::RelocateError;
use picojvm_base::{translate_code, MapRelocator, RelocationContext, TranslateError};
use tracing_subscriber::layer::SubscriberExt;

mod formatter;

#[derive(Debug, Parser)]
#[clap(name = "picojvm (Frontend)")]
#[clap(version = "0.1.0")]
#[clap(about = "Code translator for the picojvm target machine")]
#[clap(propagate_version = true)]
struct CliArgs {
    /// Also log the per-instruction relocation traces
    #[clap(long, global = true)]
    verbose: bool,
    #[clap(subcommand)]
    command: CliCommands,
}

#[derive(Debug, Subcommand)]
enum CliCommands {
    /// Rewrite a method's code bytes in place for the target machine
    Translate {
        /// Raw method code bytes, as extracted by the class file parser
        #[clap(parse(from_os_str), value_name = "CODE_FILE")]
        code: PathBuf,
        /// Relocation map emitted by the pool compactor
        #[clap(long, parse(from_os_str), value_name = "MAP_FILE")]
        map: PathBuf,
        /// Where to write the rewritten bytes; defaults to CODE_FILE.out
        #[clap(long, parse(from_os_str), value_name = "OUT_FILE")]
        out: Option<PathBuf>,
    },
    /// Walk a code stream read-only, printing one line per instruction
    Dump {
        #[clap(parse(from_os_str), value_name = "CODE_FILE")]
        code: PathBuf,
    },
}

#[derive(Debug)]
enum ToolError {
    ReadCode(PathBuf, std::io::Error),
    WriteCode(PathBuf, std::io::Error),
    ReadMap(PathBuf, std::io::Error),
    ParseMap(MapFileParseError),
    /// The map file has no `[pool]` section
    MissingPoolSection,
    /// The map file has no `[natives]` section with a `lowest-id` key
    MissingLowestNativeId,
    BadPoolEntry {
        key: String,
        value: String,
    },
    BadLowestNativeId {
        value: String,
    },
    Translate(TranslateError),
}

struct EmptyWriter;
impl std::io::Write for EmptyWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn make_log_file() -> std::sync::Arc<std::fs::File> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("./picojvm.log")
        .expect("Expected to be able to open log file");
    std::sync::Arc::new(log_file)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let should_log_console = std::env::var("PICOJVM_LOG_CONSOLE")
        .map(|x| x != "0")
        .unwrap_or(true);
    let should_log_file = std::env::var("PICOJVM_LOG_FILE")
        .map(|x| x != "0")
        .unwrap_or(false);

    let console_layer = if should_log_console {
        Some(
            tracing_subscriber::fmt::Layer::default()
                .with_writer(std::io::stderr)
                .without_time()
                .event_format(formatter::Formatter),
        )
    } else {
        None
    };
    let file_layer = if should_log_file {
        Some(
            tracing_subscriber::fmt::Layer::default()
                .with_writer(make_log_file())
                .without_time()
                .event_format(formatter::Formatter),
        )
    } else {
        None
    };

    let t_subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .event_format(formatter::Formatter)
        .with_writer(|| EmptyWriter)
        .finish()
        .with(console_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(t_subscriber)
        .expect("failed to set global default tracing subscriber");
}

fn main() {
    // Note that clap autoexits if it didn't get a thing to do
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let res = match &args.command {
        CliCommands::Translate { code, map, out } => run_translate(code, map, out.as_deref()),
        CliCommands::Dump { code } => run_dump(code),
    };
    if let Err(err) = res {
        eprintln!("{}", describe_error(&err));
        std::process::exit(1);
    }
}

fn run_translate(
    code_path: &Path,
    map_path: &Path,
    out: Option<&Path>,
) -> Result<(), ToolError> {
    let mut code = std::fs::read(code_path)
        .map_err(|err| ToolError::ReadCode(code_path.to_owned(), err))?;
    let (relocator, lowest_native_id) = load_relocation_map(map_path)?;

    let ctx = RelocationContext::new(&relocator, lowest_native_id);
    let summary = translate_code(&ctx, &mut code).map_err(ToolError::Translate)?;
    tracing::info!(
        "translated {}: {} indices relocated, {} opcodes narrowed, {} conversions elided, {} native pushes",
        code_path.display(),
        summary.relocated,
        summary.narrowed,
        summary.elided,
        summary.native_pushes.len()
    );

    let out_path = match out {
        Some(path) => path.to_owned(),
        None => {
            let mut path = code_path.as_os_str().to_owned();
            path.push(".out");
            PathBuf::from(path)
        }
    };
    std::fs::write(&out_path, &code)
        .map_err(|err| ToolError::WriteCode(out_path.clone(), err))?;

    Ok(())
}

fn run_dump(code_path: &Path) -> Result<(), ToolError> {
    let code = std::fs::read(code_path)
        .map_err(|err| ToolError::ReadCode(code_path.to_owned(), err))?;

    let mut i = 0;
    while i < code.len() {
        let opcode = code[i];
        let width = match op::operand_bytes(opcode) {
            Some(width) => usize::from(width),
            None => {
                return Err(ToolError::Translate(TranslateError::UnsupportedOpcode {
                    opcode,
                    offset: i,
                }))
            }
        };

        let end = (i + 1 + width).min(code.len());
        let mut bytes = String::new();
        for b in &code[i..end] {
            let _ = write!(bytes, "{:02x} ", b);
        }
        match op::name(opcode) {
            Some(name) => println!("{:04x}  {:<9} {}", i, bytes.trim_end(), name),
            None => println!("{:04x}  {}", i, bytes.trim_end()),
        }

        i += 1 + width;
    }

    Ok(())
}

fn load_relocation_map(path: &Path) -> Result<(MapRelocator, u8), ToolError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| ToolError::ReadMap(path.to_owned(), err))?;
    let data = parse_mapfile(&text, |warning| match warning {
        MapFileWarning::DuplicateKey { key, line } => {
            tracing::warn!(
                "duplicate key {:?} in {} (line {})",
                key,
                path.display(),
                line
            );
        }
    })
    .map_err(ToolError::ParseMap)?;

    let pool = data.section("pool").ok_or(ToolError::MissingPoolSection)?;
    let mut relocator = MapRelocator::new();
    for (key, value) in pool.entries() {
        let (old, new) = match (parse_index(key), parse_index(value)) {
            (Some(old), Some(new)) => (old, new),
            _ => {
                return Err(ToolError::BadPoolEntry {
                    key: key.to_owned(),
                    value: value.to_owned(),
                })
            }
        };
        relocator.insert(old, new);
    }

    let lowest = data
        .section("natives")
        .and_then(|natives| natives.get("lowest-id"))
        .ok_or(ToolError::MissingLowestNativeId)?;
    let lowest_native_id = parse_index(lowest)
        .and_then(|id| u8::try_from(id).ok())
        .ok_or_else(|| ToolError::BadLowestNativeId {
            value: lowest.to_owned(),
        })?;

    Ok((relocator, lowest_native_id))
}

fn describe_error(err: &ToolError) -> String {
    match err {
        ToolError::ReadCode(path, err) => {
            format!("failed to read code file {}: {}", path.display(), err)
        }
        ToolError::WriteCode(path, err) => {
            format!("failed to write {}: {}", path.display(), err)
        }
        ToolError::ReadMap(path, err) => {
            format!("failed to read relocation map {}: {}", path.display(), err)
        }
        ToolError::ParseMap(err) => format!("bad relocation map: {:?}", err),
        ToolError::MissingPoolSection => "relocation map has no [pool] section".to_owned(),
        ToolError::MissingLowestNativeId => {
            "relocation map has no lowest-id key in a [natives] section".to_owned()
        }
        ToolError::BadPoolEntry { key, value } => {
            format!("bad [pool] entry: {:?} = {:?}", key, value)
        }
        ToolError::BadLowestNativeId { value } => {
            format!("lowest-id must fit in one byte, got {:?}", value)
        }
        ToolError::Translate(err) => match err {
            TranslateError::UnsupportedOpcode { opcode, offset } => {
                format!("unsupported byte code {:#04x} at offset {}", opcode, offset)
            }
            TranslateError::Relocate(RelocateError::UnknownIndex { index }) => {
                format!("constant pool index #{} is not in the relocation map", index)
            }
            other => format!("translation failed: {:?}", other),
        },
    }
}
