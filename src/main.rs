use std::fs::File;
use std::io;
use std::io::stdout;
use std::io::BufWriter;
use std::io::Write;

use fmd::FmdIndex;
use fmd::FmdIndexBuilder;
use jseqio::reader::DynamicFastXReader;

struct MySeqReader {
    inner: DynamicFastXReader,
}

impl fmd::SeqStream for MySeqReader {
    fn stream_next(&mut self) -> Option<&[u8]> {
        self.inner.read_next().unwrap().map(|rec| rec.seq)
    }
}

fn load_index(path: &std::path::Path) -> FmdIndex {
    log::info!("Loading index from {}", path.display());
    let mut reader = std::io::BufReader::new(std::fs::File::open(path).unwrap());
    let index = FmdIndex::load(&mut reader).unwrap();
    log::info!(
        "Loaded an index over {} sequences ({} positions)",
        index.sequences(),
        index.size()
    );
    index
}

fn build_command(matches: &clap::ArgMatches) {
    let infile = matches.get_one::<std::path::PathBuf>("input").unwrap();
    let out_prefix = matches.get_one::<std::path::PathBuf>("output-prefix").unwrap();
    let sample_rate = *matches.get_one::<usize>("sample-rate").unwrap();
    let no_revcomp = matches.get_flag("no-revcomp");

    let reader = MySeqReader { inner: DynamicFastXReader::from_file(infile).unwrap() };

    // Need to do this to be able to append .fmd to the filename (PathBuf can
    // only set the extension, which would clobber part of the prefix).
    let mut outfile = out_prefix.clone().into_os_string().into_string().unwrap();
    outfile.push_str(".fmd");
    log::info!("Index output file: {}", outfile);
    let mut out = std::io::BufWriter::new(std::fs::File::create(&outfile).unwrap()); // Open already here to fail early if problems

    log::info!("Building the index");
    let start_time = std::time::Instant::now();
    let index = FmdIndexBuilder::new()
        .sample_rate(sample_rate)
        .add_rev_comp(!no_revcomp)
        .run(reader);
    let end_time = std::time::Instant::now();
    log::info!("Construction finished in {:.2} seconds", (end_time - start_time).as_secs_f64());

    let n_written = index.serialize(&mut out).unwrap();
    log::info!(
        "Wrote the index: {} bytes ({:.2} bits / position)",
        n_written,
        n_written as f64 * 8.0 / index.size() as f64
    );
}

fn grep_command(matches: &clap::ArgMatches) {
    let indexfile = matches.get_one::<std::path::PathBuf>("index").unwrap();
    let pattern = matches.get_one::<String>("pattern").unwrap();
    let count_sequences = matches.get_flag("count");
    let count_total = matches.get_flag("total");
    let print_starts = matches.get_flag("starts");
    let print_relative = matches.get_flag("relative");

    let index = load_index(indexfile);
    let pattern = pattern.as_bytes().to_ascii_uppercase();
    if pattern.is_empty() {
        log::error!("The pattern must not be empty");
        return;
    }

    let hits = index.count(&pattern, true);

    // Cross-check the bidirectional search against plain backward search.
    let classical = index
        .csa()
        .count(&pattern)
        .map(|(low, high)| high - low + 1)
        .unwrap_or(0);
    log::info!("Got {} bidirectional matches, {} classical matches", hits.len(), classical);
    assert_eq!(hits.len(), classical, "search disagreement, the index is corrupt");

    let mut out = BufWriter::new(stdout());
    if count_total {
        writeln!(out, "{}", hits.len()).unwrap();
        return;
    }
    if hits.is_empty() {
        if count_sequences {
            writeln!(out, "0").unwrap();
        }
        return;
    }

    let mut positions = index.locate_all(&hits);
    positions.sort_unstable();

    if count_sequences {
        let mut texts: Vec<usize> =
            positions.iter().map(|&p| index.csa().relative_position(p).0).collect();
        texts.dedup();
        writeln!(out, "{}", texts.len()).unwrap();
    } else if print_starts {
        for position in positions {
            writeln!(out, "{}", position).unwrap();
        }
    } else if print_relative {
        for position in positions {
            let (text, offset) = index.csa().relative_position(position);
            writeln!(out, "{}, {}", text, offset).unwrap();
        }
    } else {
        // Print each matching sequence once, like grep prints matching lines.
        let mut texts: Vec<usize> =
            positions.iter().map(|&p| index.csa().relative_position(p).0).collect();
        texts.dedup();
        for text in texts {
            out.write_all(&index.csa().extract(text)).unwrap();
            out.write_all(b"\n").unwrap();
        }
    }
}

fn map_one_record<W: Write>(index: &FmdIndex, seq: &[u8], out: &mut W) {
    let mappings = index.map(seq, 0, None);
    for (i, mapping) in mappings.iter().enumerate() {
        if i > 0 {
            out.write_all(b" ").unwrap();
        }
        if mapping.is_mapped {
            write!(out, "{}:{}", mapping.text, mapping.offset).unwrap();
        } else {
            out.write_all(b"-").unwrap();
        }
    }
    out.write_all(b"\n").unwrap();
}

fn map_command(matches: &clap::ArgMatches) {
    let indexfile = matches.get_one::<std::path::PathBuf>("index").unwrap();
    let queryfile = matches.get_one::<std::path::PathBuf>("query").unwrap();
    let outfile = matches.get_one::<std::path::PathBuf>("output");

    let index = load_index(indexfile);
    let mut query_reader = DynamicFastXReader::from_file(queryfile).unwrap();
    let mut out = outfile.map(|f| BufWriter::new(File::create(f).unwrap()));
    let mut stdout = stdout();

    let start_time = std::time::Instant::now();
    let mut n_bases = 0usize;
    while let Some(rec) = query_reader.read_next().unwrap() {
        let seq = rec.seq.to_ascii_uppercase();
        n_bases += seq.len();
        match out {
            Some(ref mut out) => map_one_record(&index, &seq, out),
            None => map_one_record(&index, &seq, &mut stdout),
        }
    }
    let elapsed = std::time::Instant::now() - start_time;

    let (extends, restarts) = index.stats();
    log::info!("Mapped {} bases: {} extensions, {} restarts", n_bases, extends, restarts);
    log::info!(
        "Elapsed time: {:.2} seconds ({:.2} ns / base)",
        elapsed.as_secs_f64(),
        elapsed.as_nanos() as f64 / n_bases as f64
    );
}

fn dump_suffixes_command(matches: &clap::ArgMatches) {
    let indexfile = matches.get_one::<std::path::PathBuf>("index").unwrap();
    let depth = *matches.get_one::<usize>("depth").unwrap();
    let dead_ends = matches.get_flag("dead-ends");

    let index = load_index(indexfile);
    let mut out = BufWriter::new(io::stdout());
    for (pattern, interval) in index.suffixes(depth, dead_ends) {
        out.write_all(&pattern).unwrap();
        writeln!(out, "\t{}", interval.len()).unwrap();
    }
}

fn main() {
    let cli = clap::Command::new("fmd")
        .about("Command line tools for the fmd library.")
        .arg_required_else_help(true)
        .arg(
            clap::Arg::new("verbose")
                .help("Print more information when running.")
                .short('v')
                .long("verbose")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            clap::Command::new("build")
                .about("Build an FMD-index from a set of sequences")
                .arg_required_else_help(true)
                .arg(
                    clap::Arg::new("input")
                        .help("Input fasta or fastq sequence file")
                        .short('i')
                        .long("input")
                        .required(true)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    clap::Arg::new("output-prefix")
                        .help("Prefix for the output filename. Writes to file [prefix].fmd.")
                        .short('o')
                        .long("output-prefix")
                        .required(true)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    clap::Arg::new("sample-rate")
                        .help("Suffix array sample rate. Smaller locates faster, larger writes a smaller index.")
                        .short('s')
                        .long("sample-rate")
                        .default_value("32")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    clap::Arg::new("no-revcomp")
                        .help("Do not add reverse complements; the input must already contain them.")
                        .long("no-revcomp")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            clap::Command::new("grep")
                .about("Search for a pattern. By default prints each matching sequence once.")
                .arg_required_else_help(true)
                .arg(
                    clap::Arg::new("index")
                        .help("FMD index file")
                        .short('i')
                        .long("index")
                        .required(true)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    clap::Arg::new("pattern")
                        .help("Pattern over the ACGTN alphabet")
                        .short('p')
                        .long("pattern")
                        .required(true),
                )
                .arg(
                    clap::Arg::new("count")
                        .help("Print the number of matching sequences")
                        .short('c')
                        .long("count")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    clap::Arg::new("total")
                        .help("Print the total number of occurrences")
                        .short('t')
                        .long("total")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    clap::Arg::new("starts")
                        .help("Print the start positions of matches in the collection")
                        .short('s')
                        .long("starts")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    clap::Arg::new("relative")
                        .help("Print the relative start positions of matches (sequence, position)")
                        .short('r')
                        .long("relative")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            clap::Command::new("map")
                .about("Map every base of the query sequences to its unique position in the collection. Prints one line per query sequence with space-separated text:offset pairs, or - for unmapped bases.")
                .arg_required_else_help(true)
                .arg(
                    clap::Arg::new("index")
                        .help("FMD index file")
                        .short('i')
                        .long("index")
                        .required(true)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    clap::Arg::new("query")
                        .help("Query sequences in FASTA or FASTQ format, possibly gzipped")
                        .short('q')
                        .long("query")
                        .required(true)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    clap::Arg::new("output")
                        .help("Output text file. If not given, prints to stdout.")
                        .short('o')
                        .long("output")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            clap::Command::new("dump-suffixes")
                .about("Print every string of the given length occurring in the collection, with its occurrence count.")
                .arg_required_else_help(true)
                .arg(
                    clap::Arg::new("index")
                        .help("FMD index file")
                        .short('i')
                        .long("index")
                        .required(true)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    clap::Arg::new("depth")
                        .help("Length of the strings to enumerate")
                        .short('d')
                        .long("depth")
                        .required(true)
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    clap::Arg::new("dead-ends")
                        .help("Also print shorter strings whose continuation runs into the end of a sequence")
                        .long("dead-ends")
                        .action(clap::ArgAction::SetTrue),
                ),
        );

    let matches = cli.get_matches();

    // Initialize logging
    let mut builder = env_logger::builder();
    if matches.get_flag("verbose") {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    };

    builder.format(|buf, record| {
        let style = buf.default_level_style(record.level());
        let level_string = style.value(record.level().as_str());

        let module = match record.module_path() {
            None => "unknown",
            Some(x) => x,
        };

        let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

        writeln!(buf, "[{}] [{}] [{}]: {}", level_string, time, module, record.args())
    });
    builder.init();

    match matches.subcommand() {
        Some(("build", sub_matches)) => build_command(sub_matches),
        Some(("grep", sub_matches)) => grep_command(sub_matches),
        Some(("map", sub_matches)) => map_command(sub_matches),
        Some(("dump-suffixes", sub_matches)) => dump_suffixes_command(sub_matches),
        _ => unreachable!(),
    }
}
