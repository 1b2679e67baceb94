use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use xword_csp::backtracking_search::{find_fill_with_options, FillFailure, FillOptions};
use xword_csp::grid_config::{generate_grid_config_from_template_string, render_grid};
use xword_csp::word_list::WordList;

/// Exit code used when the search stopped before it could decide whether a fill exists.
const EXIT_UNKNOWN: u8 = 2;

/// xword_csp: fill a crossword structure from a word list
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the structure file, with _ (or .) for open squares, # for blocks, and letters for
    /// squares that are already filled in
    structure_path: PathBuf,

    /// Path to the word list, with one word per line
    words_path: PathBuf,

    /// Also write the filled grid to this file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Give up after this many backtracks [default: no limit]
    #[arg(long)]
    max_backtracks: Option<usize>,

    /// Give up after this many seconds [default: no limit]
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Only check each choice against the words already placed, instead of propagating it to the
    /// rest of the grid
    #[arg(long)]
    no_maintain_arc_consistency: bool,
}

fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let word_list = WordList::from_dict_file(&args.words_path, None)
        .with_context(|| format!("Couldn't load word list {}", args.words_path.display()))?;

    for (source_id, errors) in word_list.get_source_errors() {
        for error in errors {
            log::warn!("word list {source_id}: {error}");
        }
    }

    let template = fs::read_to_string(&args.structure_path)
        .with_context(|| format!("Couldn't read file {}", args.structure_path.display()))?;

    let grid_config = generate_grid_config_from_template_string(word_list, &template)
        .with_context(|| format!("Invalid structure {}", args.structure_path.display()))?;
    let config = grid_config.to_config_ref();

    log::debug!(
        "loaded {}x{} grid with {} slots and {} words",
        config.width,
        config.height,
        config.slot_count(),
        config.word_list.len(),
    );

    let options = FillOptions {
        maintain_arc_consistency: !args.no_maintain_arc_consistency,
        max_backtracks: args.max_backtracks,
        timeout: args.timeout_secs.map(Duration::from_secs),
    };

    match find_fill_with_options(&config, &options) {
        Ok(result) => {
            let rendered = render_grid(&config, &result.choices);
            println!("{rendered}");

            if let Some(output_path) = &args.output {
                fs::write(output_path, format!("{rendered}\n"))
                    .with_context(|| format!("Couldn't write file {}", output_path.display()))?;
            }

            Ok(ExitCode::SUCCESS)
        }
        Err(FillFailure::Unsatisfiable) => {
            println!("No solution.");
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            eprintln!("Couldn't determine whether a fill exists: {failure}");
            Ok(ExitCode::from(EXIT_UNKNOWN))
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {error}");
            for cause in error.chain().skip(1) {
                eprintln!("  Caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}
