//! Command-line front end for xmlcore.
//!
//! Parses XML files, optionally resolves XIncludes, and writes the result
//! as plain or canonical XML. Names and URIs can be checked directly.

use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use xmlcore::builder::Builder;
use xmlcore::serial::c14n::{canonicalize, Algorithm, C14nOptions};
use xmlcore::serial::{serialize_with_options, SerializeOptions};
use xmlcore::verifier;
use xmlcore::xinclude::{XIncludeOptions, XIncluder};
use xmlcore::Document;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// xmlcore -- canonicalize and XInclude-resolve XML, check names and URIs.
#[derive(Parser, Debug)]
#[command(name = "xmlcore", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// XML files to process (use `-` for stdin).
    files: Vec<String>,

    /// Log processing details (same as `RUST_LOG=debug`).
    #[arg(long)]
    verbose: bool,

    // -- Processing options ------------------------------------------------
    /// Resolve xi:include elements before output.
    #[arg(long)]
    xinclude: bool,

    /// Maximum XInclude nesting depth.
    #[arg(long, value_name = "N", default_value_t = 50)]
    xinclude_depth: usize,

    // -- Output options ----------------------------------------------------
    /// Canonical XML (C14N 1.0) output.
    #[arg(long)]
    c14n: bool,

    /// Exclusive Canonical XML output.
    #[arg(long = "exc-c14n", conflicts_with = "c14n")]
    exc_c14n: bool,

    /// Keep comments in canonical output.
    #[arg(long)]
    with_comments: bool,

    /// InclusiveNamespaces prefix list for exclusive C14N (`#default` for
    /// the default namespace).
    #[arg(long, value_name = "PREFIXES", requires = "exc_c14n")]
    inclusive_prefixes: Option<String>,

    /// Pretty-print (indent) plain output.
    #[arg(long)]
    format: bool,

    /// Do not output the result tree.
    #[arg(long)]
    noout: bool,

    /// Save output to a file instead of stdout.
    #[arg(long, value_name = "FILE")]
    output: Option<String>,

    // -- Checks ------------------------------------------------------------
    /// Check that a string is a legal XML name.
    #[arg(long, value_name = "NAME")]
    check_name: Vec<String>,

    /// Check that a string is a legal NCName.
    #[arg(long, value_name = "NAME")]
    check_ncname: Vec<String>,

    /// Check that a string is a legal URI reference.
    #[arg(long, value_name = "URI")]
    check_uri: Vec<String>,
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_CHECK_FAILED: u8 = 2;
const EXIT_XINCLUDE_ERROR: u8 = 3;
const EXIT_OUTPUT_ERROR: u8 = 4;

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut worst_exit = run_checks(&cli);
    for file in &cli.files {
        worst_exit = worst_exit.max(process_file(&cli, file));
    }
    ExitCode::from(worst_exit)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Name and URI checks
// ---------------------------------------------------------------------------

fn run_checks(cli: &Cli) -> u8 {
    let checks = cli
        .check_name
        .iter()
        .map(|s| ("name", s, verifier::check_name(s)))
        .chain(
            cli.check_ncname
                .iter()
                .map(|s| ("NCName", s, verifier::check_ncname(s))),
        )
        .chain(
            cli.check_uri
                .iter()
                .map(|s| ("URI reference", s, verifier::check_uri_reference(s))),
        );

    let mut exit = EXIT_SUCCESS;
    for (what, input, result) in checks {
        match result {
            Ok(()) => println!("{input:?}: legal {what}"),
            Err(e) => {
                println!("{input:?}: {e}");
                exit = EXIT_CHECK_FAILED;
            }
        }
    }
    exit
}

// ---------------------------------------------------------------------------
// Document processing
// ---------------------------------------------------------------------------

/// Processes a single input file and returns an exit code.
fn process_file(cli: &Cli, filename: &str) -> u8 {
    let doc = match read_document(filename) {
        Ok(doc) => doc,
        Err(msg) => {
            eprintln!("{filename}: {msg}");
            return EXIT_PARSE_ERROR;
        }
    };

    let doc = if cli.xinclude {
        let includer = XIncluder::new().options(XIncludeOptions::default().max_depth(cli.xinclude_depth));
        match includer.resolve(&doc) {
            Ok(resolved) => resolved,
            Err(e) => {
                eprintln!("{filename}: {e}");
                return EXIT_XINCLUDE_ERROR;
            }
        }
    } else {
        doc
    };

    if cli.noout {
        return EXIT_SUCCESS;
    }
    match write_output(cli, &render(cli, &doc)) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("{filename}: failed to write output: {e}");
            EXIT_OUTPUT_ERROR
        }
    }
}

/// Builds a document from a file, or from stdin when filename is `-`.
fn read_document(filename: &str) -> Result<Document, String> {
    let builder = Builder::new();
    if filename == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).map_err(|e| e.to_string())?;
        builder.build_bytes(&buf, None).map_err(|e| e.to_string())
    } else {
        builder.build_file(filename).map_err(|e| e.to_string())
    }
}

fn render(cli: &Cli, doc: &Document) -> String {
    if cli.c14n || cli.exc_c14n {
        let algorithm = match (cli.exc_c14n, cli.with_comments) {
            (false, false) => Algorithm::Canonical,
            (false, true) => Algorithm::CanonicalWithComments,
            (true, false) => Algorithm::ExclusiveCanonical,
            (true, true) => Algorithm::ExclusiveCanonicalWithComments,
        };
        let mut opts = C14nOptions::default().algorithm(algorithm);
        if let Some(ref prefixes) = cli.inclusive_prefixes {
            opts = opts.inclusive_prefixes(prefixes);
        }
        canonicalize(doc, &opts)
    } else {
        serialize_with_options(doc, &SerializeOptions::default().indent(cli.format))
    }
}

/// Writes output to the configured destination (file or stdout).
fn write_output(cli: &Cli, content: &str) -> io::Result<()> {
    match cli.output {
        Some(ref path) => fs::write(path, content),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()
        }
    }
}
