use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use memmap2::Mmap;

use pdbview::image;
use pdbview::sym::Symbol;
use pdbview::Pdb;

#[derive(Parser)]
#[command(about = "Inspect Microsoft PDB debug files")]
struct Cli {
    /// Path to the .pdb file.
    pdb: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Identity of the PDB: version, age, GUID.
    Info,
    /// The stream directory: index and size of every stream.
    Streams,
    /// Type records, or a single named type.
    Types {
        /// Only show the record with this name.
        name: Option<String>,
    },
    /// Symbol records.
    Symbols,
    /// Section headers from the debug header's section header stream.
    Sections,
    /// Resolve a data symbol to a virtual address.
    Addr {
        symbol: String,
        /// Load address of the image, e.g. 0x140000000.
        #[arg(long, default_value = "0x140000000")]
        image_base: String,
    },
    /// Exported names of a compiled image, for cross-checking.
    Exports {
        /// Path to the binary.
        binary: PathBuf,
    },
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file =
        std::fs::File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    // Safety: read-only mapping, never written through.
    let mmap =
        unsafe { Mmap::map(&file) }.with_context(|| format!("could not map {}", path.display()))?;
    Ok(mmap)
}

fn parse_address(text: &str) -> Result<u64> {
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    value.with_context(|| format!("'{text}' is not a valid address"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mmap = map_file(&cli.pdb)?;
    let pdb = Pdb::parse(&mmap)?;
    tracing::debug!(
        page_size = pdb.msf().page_size(),
        streams = pdb.directory().len(),
        "opened {}",
        cli.pdb.display()
    );

    match cli.command {
        Command::Info => {
            let info = pdb.info()?;
            println!("version:   {}", info.version);
            println!("signature: {}", info.signature);
            println!("age:       {}", info.age);
            println!("guid:      {}", info.guid);
        }
        Command::Streams => {
            for (index, stream) in pdb.directory().iter().enumerate() {
                if stream.is_absent() {
                    println!("{index:4}  (absent)");
                } else {
                    println!(
                        "{index:4}  {:8} bytes  {} pages",
                        stream.size,
                        stream.pages.len()
                    );
                }
            }
        }
        Command::Types { name } => {
            let types = pdb.types()?;
            match name {
                Some(name) => match types.find(&name)? {
                    Some((ti, record)) => println!("0x{:x}: {record:#?}", ti.0),
                    None => bail!("no type record named '{name}'"),
                },
                None => {
                    for (ti, record) in types.iter() {
                        match record {
                            Ok(record) => println!("0x{:x}: {record:?}", ti.0),
                            Err(error) => println!("0x{:x}: unreadable: {error:#}", ti.0),
                        }
                    }
                }
            }
        }
        Command::Symbols => {
            for symbol in pdb.symbols()?.iter() {
                match symbol? {
                    Symbol::Data(data) => println!(
                        "data     {:?} seg {} off 0x{:x} ti 0x{:x}  {}",
                        data.linkage(),
                        data.segment,
                        data.offset,
                        data.type_index.0,
                        data.name
                    ),
                    Symbol::Public(public) => println!(
                        "public   {} seg {} off 0x{:x}  {}",
                        if public.is_code() { "code" } else { "data" },
                        public.segment,
                        public.offset,
                        public.name
                    ),
                    Symbol::Udt(udt) => {
                        println!("udt      ti 0x{:x}  {}", udt.type_index.0, udt.name)
                    }
                    Symbol::Constant(constant) => println!(
                        "constant ti 0x{:x} value {:?}  {}",
                        constant.type_index.0, constant.value, constant.name
                    ),
                    Symbol::Unknown { kind } => println!("unknown  kind 0x{kind:x}"),
                }
            }
        }
        Command::Sections => {
            for (index, section) in pdb.section_headers()?.iter().enumerate() {
                println!(
                    "{:3}  {:8}  rva 0x{:08x}  vsize 0x{:x}",
                    index + 1,
                    section.name,
                    section.virtual_address,
                    section.virtual_size
                );
            }
        }
        Command::Addr { symbol, image_base } => {
            let base = parse_address(&image_base)?;
            match pdb.find_symbol_address(&symbol, base)? {
                Some(address) => println!("{symbol} = 0x{address:x}"),
                None => bail!("no data symbol named '{symbol}'"),
            }
        }
        Command::Exports { binary } => {
            let data = map_file(&binary)?;
            let exports = image::exported_names(&data)?;
            if exports.is_empty() {
                println!("(no exports)");
            }
            for name in exports {
                println!("{name}");
            }
        }
    }
    Ok(())
}
