use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use clap::Parser;
use flexi_logger::Logger;

use dbase3::{DbfReader, ReaderOptions};

/// Prints the header or the contents of a dBase III table.
#[derive(Parser, Debug)]
#[command(name = "dbfdump", version, about)]
struct Cli {
    /// Path to the .dbf file
    path: PathBuf,

    /// Charset overriding the file's language driver byte
    #[arg(short, long)]
    encoding: Option<String>,

    /// Dump the records as CSV instead of the header summary
    #[arg(long)]
    csv: bool,

    /// Field delimiter for CSV output
    #[arg(short, long, default_value_t = ',')]
    delimiter: char,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let _logger = Logger::try_with_str(&cli.log_level)?.start()?;

    if !cli.delimiter.is_ascii() {
        return Err(format!("delimiter must be ASCII, got {:?}", cli.delimiter).into());
    }

    let mut options = ReaderOptions::new();
    if let Some(label) = &cli.encoding {
        options = options.forced_encoding(label.as_str());
    }
    let file = BufReader::new(File::open(&cli.path)?);
    let mut reader = DbfReader::with_options(file, &options)?;

    if cli.csv {
        let stdout = io::stdout();
        let written = dbase3::csv::write_csv(&mut reader, stdout.lock(), cli.delimiter as u8)?;
        log::info!("Wrote {} records from {}", written, cli.path.display());
    } else {
        print!("{}", reader.header());
    }
    Ok(())
}
