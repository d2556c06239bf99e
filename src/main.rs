use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use thiserror::Error;

use igscript::archive::{self, ArchiveError};
use igscript::asm::{self, AsmError};
use igscript::disasm::{DisasmError, Disassembler, LabelPolicy, OpcodeHistogram};
use igscript::listing::{self, ListError};
use igscript::tables::Build;

#[derive(Debug, Error)]
enum Error {
    #[error("IO Error: {0}")]
    IoError(#[from] io::Error),

    #[error("Assembly Error: {0}")]
    AsmError(#[from] AsmError),

    #[error("Disassembly Error: {0}")]
    DisasmError(#[from] DisasmError),

    #[error("Listing Error: {0}")]
    ListError(#[from] ListError),

    #[error("Archive Error: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("'{0}' is not a usable entry name")]
    BadEntryName(String),
}

#[derive(Parser)]
#[command(about = "Assembler and disassembler for InnocentGrey script bytecode")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a compiled script into a listing
    Disasm {
        input: PathBuf,

        /// Write the listing here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, default_value = "flowers")]
        build: Build,

        /// Pin jump targets that fall between instructions instead of failing
        #[arg(long)]
        relaxed: bool,

        /// Print per-opcode usage counts to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Assemble a listing into a compiled script
    Asm {
        input: PathBuf,
        output: PathBuf,

        #[arg(long, default_value = "flowers")]
        build: Build,
    },

    /// Bundle files into an IGA archive
    Pack {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,

        /// Per-archive obfuscation key
        #[arg(long, default_value = "0", value_parser = parse_xor)]
        xor: u8,
    },

    /// Extract an IGA archive into a directory
    Unpack {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Per-archive obfuscation key
        #[arg(long, default_value = "0", value_parser = parse_xor)]
        xor: u8,
    },
}

fn parse_xor(s: &str) -> Result<u8, std::num::ParseIntError> {
    match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn main_error() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Command::Disasm {
            input,
            output,
            build,
            relaxed,
            stats,
        } => {
            let data = fs::read(input)?;
            let table = build.table();

            let policy = if relaxed {
                LabelPolicy::Synthesize
            } else {
                LabelPolicy::Strict
            };

            let mut histogram = OpcodeHistogram::new();
            let mut d = Disassembler::new(&table).with_policy(policy);

            if stats {
                d = d.with_observer(&mut histogram);
            }

            let items = d.run(&data)?;
            let source = listing::render(&items);

            match output {
                Some(path) => fs::write(path, source)?,
                None => print!("{source}"),
            }

            if stats {
                for (opcode, count) in histogram.seen() {
                    let mnemonic = match table.schema(opcode) {
                        Some(schema) => schema.mnemonic(),
                        None => "?",
                    };

                    writeln!(io::stderr(), "0x{opcode:02x} {mnemonic}: {count}")?;
                }
            }

            Ok(())
        }

        Command::Asm {
            input,
            output,
            build,
        } => {
            let source = fs::read_to_string(input)?;
            let items = listing::parse(&source)?;

            let data = asm::assemble(&build.table(), &items)?;
            fs::write(output, data)?;

            Ok(())
        }

        Command::Pack {
            inputs,
            output,
            xor,
        } => {
            let mut files = Vec::with_capacity(inputs.len());

            for path in inputs {
                let name = match path.file_name().and_then(|n| n.to_str()) {
                    Some(name) => name.to_string(),
                    None => return Err(Error::BadEntryName(path.display().to_string())),
                };

                files.push((name, fs::read(&path)?));
            }

            fs::write(output, archive::pack(&files, xor))?;
            Ok(())
        }

        Command::Unpack { input, output, xor } => {
            let data = fs::read(input)?;
            fs::create_dir_all(&output)?;

            for (name, data) in archive::unpack(&data, xor)? {
                // entry names are not allowed to navigate out of the
                // output directory
                if name.contains(['/', '\\']) || name.contains("..") {
                    return Err(Error::BadEntryName(name));
                }

                fs::write(output.join(name), data)?;
            }

            Ok(())
        }
    }
}

fn main() -> Result<(), ()> {
    match main_error() {
        Ok(_) => Ok(()),

        Err(err) => {
            writeln!(io::stderr(), "{0}", err).unwrap();
            Err(())
        }
    }
}
