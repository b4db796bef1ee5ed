use std::{
    env,
    io::{self, Write},
    path::PathBuf,
    process,
    time::Duration,
};

use anyhow::Result;
use clap::{ArgAction, ArgGroup, CommandFactory, FromArgMatches, Parser, error::ErrorKind};
use po_sync::cli_i18n as i18n;
use po_sync::config::credentials::TOKEN_ENV_KEY;
use po_sync::logging::{self, LogOptions};
use po_sync::{
    ApiToken, BatchOutcome, BatchReport, ClientConfig, Layout, MappingCollection, Msgcat,
    PoEditorClient, ReconciliationRules, Selection, SortSpec,
};
use tracing::{debug, warn};

const DEFAULT_PROJECT: &str = "subdownloader";
const API_URL_ENV_KEY: &str = "PO_SYNC_API_URL";

#[derive(Parser, Debug)]
#[command(
    name = "po-sync",
    version,
    about = "i18n:cli.about",
    disable_version_flag = true
)]
#[command(group(
    ArgGroup::new("mode")
        .args(["upload", "download", "delete", "status"])
        .multiple(false)
))]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "i18n:cli.version_flag_help"
    )]
    show_version: bool,
    #[arg(short, long, action = ArgAction::SetTrue, help = "i18n:cli.verbose_help")]
    verbose: bool,

    #[arg(long, value_name = "TOKEN", help = "i18n:args.token")]
    token: Option<String>,
    #[arg(long, value_name = "PATH", help = "i18n:args.token_file")]
    token_file: Option<PathBuf>,
    #[arg(long, value_name = "PROJECT", default_value = DEFAULT_PROJECT, help = "i18n:args.name")]
    name: String,
    #[arg(long, visible_alias = "rules", value_name = "PATH", help = "i18n:args.fixed")]
    fixed: Option<PathBuf>,
    #[arg(long, value_name = "CODE", num_args = 0.., help = "i18n:args.languages")]
    languages: Option<Vec<String>>,
    #[arg(
        short,
        long,
        value_name = "KEY",
        value_parser = ["l", "s", "n", "p", "t"],
        help = "i18n:args.sort"
    )]
    sort: Option<String>,
    #[arg(short, long, action = ArgAction::SetTrue, help = "i18n:args.reverse")]
    reverse: bool,

    #[arg(long, action = ArgAction::SetTrue, help = "i18n:args.upload")]
    upload: bool,
    #[arg(long, action = ArgAction::SetTrue, help = "i18n:args.download")]
    download: bool,
    #[arg(long, action = ArgAction::SetTrue, help = "i18n:args.delete")]
    delete: bool,
    #[arg(long, action = ArgAction::SetTrue, help = "i18n:args.status")]
    status: bool,

    #[arg(long, value_name = "DIR", help = "i18n:args.root")]
    root: Option<PathBuf>,
    #[arg(long, value_name = "URL", help = "i18n:args.api_url")]
    api_url: Option<String>,
    #[arg(long, value_name = "PATH", default_value = "msgcat", help = "i18n:args.msgcat")]
    msgcat: PathBuf,
    #[arg(long, value_name = "SECS", help = "i18n:args.upload_interval")]
    upload_interval: Option<u64>,
    #[arg(long, value_name = "PATH", help = "i18n:args.log_file")]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Status,
    Download,
    Upload,
    Delete,
}

impl Cli {
    fn mode(&self) -> Option<Mode> {
        if self.status {
            Some(Mode::Status)
        } else if self.download {
            Some(Mode::Download)
        } else if self.upload {
            Some(Mode::Upload)
        } else if self.delete {
            Some(Mode::Delete)
        } else {
            None
        }
    }
}

fn main() {
    let messages = i18n::messages();
    let command = i18n::localize_command(Cli::command(), messages);

    let mut matches = command.get_matches();
    let cli = Cli::from_arg_matches_mut(&mut matches).unwrap_or_else(|err| err.exit());

    if cli.show_version {
        if let Some(version) = Cli::command().get_version() {
            println!("{version}");
        }
        return;
    }

    let Some(mode) = cli.mode() else {
        i18n::localize_command(Cli::command(), messages)
            .error(ErrorKind::MissingRequiredArgument, messages.mode_required())
            .exit();
    };

    if let Err(err) = run(cli, mode) {
        let rendered = messages.render_anyhow(&err);
        eprintln!("{} {}", messages.error_prefix(), rendered);
        process::exit(1);
    }
}

fn run(cli: Cli, mode: Mode) -> Result<()> {
    let _guard =
        logging::init_tracing(&LogOptions { verbose: cli.verbose, log_file: cli.log_file.clone() })?;

    let project_name = cli.name.to_lowercase();
    let layout = match cli.root {
        Some(root) => Layout::new(root, &project_name),
        None => Layout::current_dir(&project_name)?,
    };
    debug!(root = %layout.root().display(), project = %project_name, ?mode, "starting");

    let token_file = cli.token_file.unwrap_or_else(|| layout.default_token_path());
    let token = ApiToken::resolve(cli.token, env::var(TOKEN_ENV_KEY).ok(), &token_file)?;

    let rules = match &cli.fixed {
        Some(path) => ReconciliationRules::from_file(path)?,
        None => ReconciliationRules::from_optional_file(layout.default_rules_path())?,
    };
    debug!(rules = rules.len(), "reconciliation rules loaded");

    let reverse = if cli.reverse { "r" } else { "" };
    let sort: SortSpec = format!("{reverse}{}", cli.sort.unwrap_or_default()).parse()?;
    let selection = Selection { languages: cli.languages, sort };

    let mut config = ClientConfig::default();
    if let Some(url) = cli.api_url.or_else(|| env::var(API_URL_ENV_KEY).ok()) {
        config = config.with_base_url(url);
    }
    if let Some(secs) = cli.upload_interval {
        config = config.with_upload_interval(Duration::from_secs(secs));
    }
    let client = PoEditorClient::new(token, config)?;

    let mut collection =
        MappingCollection::build(&client, &project_name, layout.language_root(), rules)?;

    let report = match mode {
        Mode::Status => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            collection.report_status(&selection, &mut out)?
        }
        Mode::Download => {
            let merger = Msgcat::new(cli.msgcat);
            collection.sync_all_from_server(&client, &merger, &selection)?
        }
        Mode::Upload => collection.sync_all_to_server(&client, &selection)?,
        Mode::Delete => {
            let mut confirm = prompt_project_name;
            match collection.delete_all_on_server(&client, &selection, &mut confirm)? {
                BatchOutcome::Completed(report) => report,
                BatchOutcome::Cancelled => {
                    println!("{}", i18n::messages().delete_cancelled());
                    BatchReport::default()
                }
            }
        }
    };

    print_summary(&report);
    Ok(())
}

fn prompt_project_name(project_name: &str) -> Result<String> {
    let messages = i18n::messages();
    println!("{}", messages.delete_warning(project_name));
    print!("{}", messages.delete_prompt());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input)
}

fn print_summary(report: &BatchReport) {
    let messages = i18n::messages();
    for failure in &report.failed {
        warn!(language = failure.mapping.label(), reason = %failure.reason, "language failed");
    }
    println!("{}", messages.language_count(report.attempted));
    if !report.failed.is_empty() {
        println!("{}", messages.failed_languages(&report.failed_codes()));
    }
    println!("{}", messages.done());
}
