extern crate easycalc;

use clap::Parser;
use easycalc::codec::encode_input;
use easycalc::input::{ingest_input, ingest_input_code};
use easycalc::output::FileOutput;
use easycalc::{run_project, ProjectFlags};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct EasyCalcArgs {
    input_file: String,
    /// The input file holds a serialized input code rather than a JSON record
    #[arg(long, short, default_value_t = false)]
    encoded: bool,
    /// Also write the merged record as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Print the serialized input code for the input instead of calculating
    #[arg(long, default_value_t = false)]
    print_code: bool,
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = EasyCalcArgs::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let input_file = Path::new(args.input_file.as_str());
    let reader = BufReader::new(File::open(input_file)?);

    if args.print_code {
        let input = if args.encoded {
            ingest_input_code(reader)?
        } else {
            ingest_input(reader)?
        };
        println!("{}", encode_input(&input));
        return Ok(());
    }

    let mut flags = ProjectFlags::empty();
    flags.set(ProjectFlags::ENCODED_INPUT, args.encoded);
    flags.set(ProjectFlags::JSON_OUTPUT, args.json);

    let input_file_stem = input_file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("easycalc");
    let output_path = input_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let output = FileOutput::new(output_path, format!("{input_file_stem}__{{}}.{{}}"));

    let record = run_project(reader, &output, &flags)?;
    info!(
        nrw = ?record.number("nrw"),
        ili = ?record.number("ili"),
        "wrote results for {}",
        input_file.display()
    );

    Ok(())
}
