use clap::{App, Arg, SubCommand};
use num_enum::TryFromPrimitive;

mod commands;

#[derive(TryFromPrimitive, PartialEq, Copy, Clone)]
#[repr(u8)]
enum Verbosity {
    Warn = 0,
    Info = 1,
    Debug = 2,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = App::new("FHEPoll CLI")
        .version("0.1")
        .about("Creates, votes in, and tallies polls with encrypted on-chain counters")
        .arg(
            Arg::with_name("rpc")
                .long("rpc")
                .takes_value(true)
                .help("RPC endpoint - can also be set with FHEPOLL_RPC_URL"),
        )
        .arg(
            Arg::with_name("contract")
                .long("contract")
                .takes_value(true)
                .help("Poll contract address - can also be set with FHEPOLL_CONTRACT"),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("create")
                .about("Create a new poll")
                .arg(Arg::with_name("TITLE").index(1).required(true))
                .arg(
                    Arg::with_name("description")
                        .long("description")
                        .takes_value(true)
                        .default_value(""),
                )
                .arg(
                    Arg::with_name("option")
                        .long("option")
                        .short("o")
                        .multiple(true)
                        .takes_value(true)
                        .required(true)
                        .help("Poll option, pass at least twice"),
                )
                .arg(
                    Arg::with_name("hours")
                        .long("hours")
                        .takes_value(true)
                        .default_value("24")
                        .help("Voting window in hours"),
                ),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("List all polls, newest first")
                .arg(Arg::with_name("json").long("json").help("Print raw JSON")),
        )
        .subcommand(
            SubCommand::with_name("show")
                .about("Show one poll, including decrypted results if available")
                .arg(Arg::with_name("POLL_ID").index(1).required(true))
                .arg(Arg::with_name("json").long("json").help("Print raw JSON")),
        )
        .subcommand(
            SubCommand::with_name("vote")
                .about("Cast an encrypted vote")
                .arg(Arg::with_name("POLL_ID").index(1).required(true))
                .arg(
                    Arg::with_name("CHOICE")
                        .index(2)
                        .required(true)
                        .help("Zero-based option index"),
                ),
        )
        .subcommand(
            SubCommand::with_name("end")
                .about("End a poll (creator only)")
                .arg(Arg::with_name("POLL_ID").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("request-results")
                .about("Ask the decryption oracle for a poll's tallies")
                .arg(Arg::with_name("POLL_ID").index(1).required(true)),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("Show wallet status and, optionally, a poll's decryption state")
                .arg(
                    Arg::with_name("poll")
                        .long("poll")
                        .takes_value(true)
                        .help("Reconcile and print this poll's decryption state"),
                ),
        )
        .subcommand(
            SubCommand::with_name("watch")
                .about("Stream contract events to stdout")
                .arg(
                    Arg::with_name("from-block")
                        .long("from-block")
                        .takes_value(true)
                        .default_value("0"),
                )
                .arg(
                    Arg::with_name("interval")
                        .long("interval")
                        .takes_value(true)
                        .default_value("5")
                        .help("Poll interval in seconds"),
                ),
        )
        .get_matches();

    let verbosity = match matches.occurrences_of("v") {
        0 => Verbosity::Warn,
        1 => Verbosity::Info,
        _ => Verbosity::Debug,
    };
    init_tracing(verbosity);

    let config = commands::build_config(&matches)?;

    match matches.subcommand() {
        ("create", Some(sub)) => commands::create(config, sub).await,
        ("list", Some(sub)) => commands::list(config, sub).await,
        ("show", Some(sub)) => commands::show(config, sub).await,
        ("vote", Some(sub)) => commands::vote(config, sub).await,
        ("end", Some(sub)) => commands::end(config, sub).await,
        ("request-results", Some(sub)) => commands::request_results(config, sub).await,
        ("status", Some(sub)) => commands::status(config, sub).await,
        ("watch", Some(sub)) => commands::watch(config, sub).await,
        _ => {
            eprintln!("fhepoll: no subcommand given, try --help");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbosity: Verbosity) {
    let level = match verbosity {
        Verbosity::Warn => "warn",
        Verbosity::Info => "info",
        Verbosity::Debug => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
