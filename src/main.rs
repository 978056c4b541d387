// Entry point and CLI flow.
//
// `report` renders the dashboard once for the selected filters, `options`
// lists the selector values, and `interactive` keeps a menu loop open where
// the workbook is only re-read when the file changes on disk.
use clap::{Parser, Subcommand};
use clinic_report::config::{Settings, CONFIG_TEMPLATE, DEFAULT_CONFIG_FILE};
use clinic_report::error::Result;
use clinic_report::filter::{branch_options, parse_date_arg, service_options};
use clinic_report::loader::load_dataset;
use clinic_report::output::{export_all, render_dashboard};
use clinic_report::util::format_int;
use clinic_report::{
    aggregate, AggregateResult, Dataset, RecordFilter, ReportError, ReportOptions, Selection,
    WorkbookCache,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clinic_report")]
#[command(version, about = "Clinic billing goal report from the resumen/envios/TD workbook", long_about = None)]
struct Cli {
    /// Workbook path (default: resumen.xlsx or the config file setting)
    #[arg(short, long, global = true)]
    workbook: Option<PathBuf>,

    /// Settings file (default: ./clinic_report.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log load and cache decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a clinic_report.toml template in the current directory
    Init,

    /// Render the billing dashboard
    Report {
        /// SEDE to include, or ALL
        #[arg(short, long, default_value = "ALL")]
        branch: String,

        /// Service to include, or ALL
        #[arg(short, long, default_value = "ALL")]
        service: String,

        /// First invoice date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last invoice date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Number of payers in the ranking
        #[arg(long)]
        top: Option<usize>,

        /// Number of recent invoices listed
        #[arg(long)]
        tail: Option<usize>,

        /// Monthly goal, overriding the TD sheet
        #[arg(long)]
        goal: Option<f64>,

        /// Ideal completion fraction (e.g. 0.45)
        #[arg(long)]
        ideal: Option<f64>,

        /// Also export CSV and JSON files into this directory (all four or none)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Print the metrics as JSON instead of the dashboard
        #[arg(long)]
        json: bool,
    },

    /// List the SEDE and service selector values
    Options,

    /// Menu loop for exploring the workbook
    Interactive,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "clinic_report=debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Error banner plus hint on stderr.
fn report_error(e: &ReportError) {
    eprintln!("Error: {}", e);
    if let Some(hint) = e.hint() {
        eprintln!("{}", hint);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Defaults < config file < command-line flags.
    let load_settings = || -> Result<Settings> {
        let mut settings = Settings::load(cli.config.as_deref())?;
        if let Some(path) = &cli.workbook {
            settings.workbook = path.clone();
        }
        Ok(settings)
    };

    match cli.command {
        Commands::Init => cmd_init(),
        Commands::Report {
            branch,
            service,
            from,
            to,
            top,
            tail,
            goal,
            ideal,
            out_dir,
            json,
        } => {
            let mut settings = load_settings()?;
            if let Some(n) = top {
                settings.top_payers = n;
            }
            if let Some(k) = tail {
                settings.tail_rows = k;
            }
            if goal.is_some() {
                settings.total_goal = goal;
            }
            if let Some(fraction) = ideal {
                settings.ideal_completion = fraction;
            }
            let filter = RecordFilter {
                branch: branch.parse()?,
                service: service.parse()?,
                from: from.as_deref().map(parse_date_arg).transpose()?,
                to: to.as_deref().map(parse_date_arg).transpose()?,
            };
            cmd_report(&settings, &filter, out_dir, json)
        }
        Commands::Options => cmd_options(&load_settings()?),
        Commands::Interactive => cmd_interactive(&load_settings()?),
    }
}

fn cmd_init() -> Result<()> {
    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if path.exists() {
        return Err(ReportError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }
    std::fs::write(&path, CONFIG_TEMPLATE)?;
    println!("Created {}", path.display());
    Ok(())
}

fn compute(
    settings: &Settings,
    dataset: &Dataset,
    filter: &RecordFilter,
) -> Result<AggregateResult> {
    let goal = settings.resolve_goal(&dataset.goal)?;
    let options = ReportOptions {
        top_n: settings.top_payers,
        tail: settings.tail_rows,
    };
    Ok(aggregate(dataset, &goal, filter, &options)?)
}

fn cmd_report(
    settings: &Settings,
    filter: &RecordFilter,
    out_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let dataset = load_dataset(&settings.workbook)?;
    let result = compute(settings, &dataset, filter)?;

    let exported = match out_dir {
        Some(dir) => export_all(&dir, &result)?,
        None => Vec::new(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_dashboard(&result, filter));
    }
    for path in exported {
        eprintln!("Exported {}", path.display());
    }
    Ok(())
}

fn cmd_options(settings: &Settings) -> Result<()> {
    let dataset = load_dataset(&settings.workbook)?;
    println!("SEDE:");
    for b in branch_options(&dataset.records) {
        println!("  {}", b);
    }
    println!("Services:");
    for s in service_options(&dataset.records) {
        println!("  {}", s);
    }
    Ok(())
}

/// Read a single line of input after printing `prompt`.
fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Print numbered choices and return the chosen selection.
fn choose(label: &str, options: &[String]) -> Option<Selection> {
    println!("{}:", label);
    for (i, opt) in options.iter().enumerate() {
        println!("[{}] {}", i + 1, opt);
    }
    let input = read_line("Enter choice: ")?;
    match input.parse::<usize>().ok().and_then(|i| options.get(i.wrapping_sub(1))) {
        Some(opt) => opt.parse().ok(),
        None => {
            println!("Invalid choice.\n");
            None
        }
    }
}

struct Session {
    cache: WorkbookCache,
    dataset: Option<Arc<Dataset>>,
    filter: RecordFilter,
}

impl Session {
    /// Fetch the workbook through the cache; it is only re-read when it changed.
    fn refresh(&mut self, settings: &Settings) {
        let before = self.cache.loads();
        match self.cache.get_or_load(&settings.workbook, load_dataset) {
            Ok(dataset) => {
                if self.cache.loads() != before {
                    println!(
                        "Workbook loaded ({} invoices, {} shipments)\n",
                        format_int(dataset.records.len() as u64),
                        format_int(dataset.shipment_count() as u64)
                    );
                }
                self.dataset = Some(dataset);
            }
            Err(e) => {
                report_error(&ReportError::from(e));
                println!();
                self.dataset = None;
            }
        }
    }
}

fn cmd_interactive(settings: &Settings) -> Result<()> {
    settings.validate()?;
    let mut session = Session {
        cache: WorkbookCache::new(),
        dataset: None,
        filter: RecordFilter::default(),
    };
    session.refresh(settings);

    loop {
        println!("Select an option:");
        println!("[1] Reload the workbook");
        println!("[2] Choose SEDE (current: {})", session.filter.branch);
        println!("[3] Choose service (current: {})", session.filter.service);
        println!("[4] Show dashboard");
        println!("[0] Exit\n");
        let Some(choice) = read_line("Enter choice: ") else {
            break;
        };
        match choice.as_str() {
            "1" => {
                session.cache.invalidate(&settings.workbook);
                session.refresh(settings);
            }
            "2" | "3" | "4" => {
                session.refresh(settings);
                let Some(dataset) = session.dataset.clone() else {
                    println!("No workbook loaded. Fix the file and choose option 1.\n");
                    continue;
                };
                match choice.as_str() {
                    "2" => {
                        if let Some(sel) = choose("SEDE", &branch_options(&dataset.records)) {
                            session.filter.branch = sel;
                        }
                    }
                    "3" => {
                        if let Some(sel) = choose("Service", &service_options(&dataset.records)) {
                            session.filter.service = sel;
                        }
                    }
                    _ => match compute(settings, &dataset, &session.filter) {
                        Ok(result) => println!("{}", render_dashboard(&result, &session.filter)),
                        Err(e) => {
                            report_error(&e);
                            println!();
                        }
                    },
                }
            }
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-4.\n"),
        }
    }
    Ok(())
}
