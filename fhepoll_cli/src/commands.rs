use anyhow::{anyhow, bail, Context, Result};
use clap::ArgMatches;
use ethers::utils::format_ether;
use fhepoll::{
    unix_now, DecryptStatus, EncryptionEngine, EventKind, Poll, PollClient, PollEvent,
    RelayerEngine, SessionConfig,
};
use std::sync::Arc;
use std::time::Duration;

pub fn build_config(matches: &ArgMatches<'_>) -> Result<SessionConfig> {
    let mut config = SessionConfig::from_env()?;
    if let Some(rpc) = matches.value_of("rpc") {
        config.rpc_url = rpc.to_string();
    }
    if let Some(contract) = matches.value_of("contract") {
        config.contract_address = contract.parse().context("bad contract address")?;
    }
    Ok(config)
}

async fn connect(config: SessionConfig) -> Result<PollClient> {
    let engine: Arc<dyn EncryptionEngine> = Arc::new(RelayerEngine::new(config.relayer_url.clone()));
    let mut client = PollClient::new(config, engine);
    if !client.connect().await {
        bail!("unable to connect - check FHEPOLL_RPC_URL, FHEPOLL_CONTRACT and FHEPOLL_PRIVATE_KEY (rerun with -v for details)");
    }
    Ok(client)
}

fn parse_poll_id(matches: &ArgMatches<'_>) -> Result<u64> {
    matches
        .value_of("POLL_ID")
        .unwrap()
        .parse()
        .context("POLL_ID must be a non-negative integer")
}

pub async fn create(config: SessionConfig, matches: &ArgMatches<'_>) -> Result<()> {
    let title = matches.value_of("TITLE").unwrap();
    let description = matches.value_of("description").unwrap_or("");
    let options: Vec<String> = matches
        .values_of("option")
        .map(|vals| vals.map(str::to_string).collect())
        .unwrap_or_default();
    let hours: u64 = matches
        .value_of("hours")
        .unwrap()
        .parse()
        .context("bad --hours")?;

    let client = connect(config).await?;
    let poll_id = client
        .create_poll(title, description, options, hours * 3600)
        .await?;
    println!("created poll {}", poll_id);
    Ok(())
}

pub async fn list(config: SessionConfig, matches: &ArgMatches<'_>) -> Result<()> {
    let client = connect(config).await?;
    let polls = client.get_all_polls().await;

    if matches.is_present("json") {
        println!("{}", serde_json::to_string_pretty(&polls)?);
        return Ok(());
    }
    if polls.is_empty() {
        println!("no polls found (or the fetch failed - rerun with -v)");
        return Ok(());
    }

    let now = unix_now();
    for poll in &polls {
        println!(
            "#{:<4} {:<40} {:>2} options {:>5} votes  {}",
            poll.id,
            poll.title,
            poll.options.len(),
            poll.total_votes,
            poll_state(poll, now)
        );
    }
    Ok(())
}

fn poll_state(poll: &Poll, now: u64) -> String {
    if !poll.is_active {
        "Ended".to_string()
    } else if now >= poll.end_time {
        "Expired".to_string()
    } else {
        poll.time_remaining(now)
    }
}

pub async fn show(config: SessionConfig, matches: &ArgMatches<'_>) -> Result<()> {
    let poll_id = parse_poll_id(matches)?;
    let client = connect(config).await?;
    let poll = client
        .get_poll(poll_id)
        .await
        .ok_or_else(|| anyhow!("poll {} not found", poll_id))?;

    if matches.is_present("json") {
        println!("{}", serde_json::to_string_pretty(&poll)?);
        return Ok(());
    }

    let now = unix_now();
    println!("#{} {}", poll.id, poll.title);
    if !poll.description.is_empty() {
        println!("{}", poll.description);
    }
    println!("creator: {:#x}", poll.creator);
    println!("state:   {}", poll_state(&poll, now));
    println!("votes:   {} (observed)", poll.total_votes);
    for (idx, option) in poll.options.iter().enumerate() {
        println!("  [{}] {}", idx, option);
    }

    if client.has_voted(poll_id).await {
        println!("you have voted on this poll");
    }
    match client.refresh_decrypt_status(poll_id).await {
        Some(req) if req.status == DecryptStatus::Fulfilled => {
            println!("results (request {}):", req.request_id);
            for (option, count) in poll.options.iter().zip(&req.counts) {
                println!("  {:<30} {}", option, count);
            }
        }
        Some(req) => println!("decryption pending (request {})", req.request_id),
        None => println!("results not requested yet"),
    }
    Ok(())
}

pub async fn vote(config: SessionConfig, matches: &ArgMatches<'_>) -> Result<()> {
    let poll_id = parse_poll_id(matches)?;
    let choice: u32 = matches
        .value_of("CHOICE")
        .unwrap()
        .parse()
        .context("CHOICE must be a zero-based option index")?;

    let client = connect(config).await?;
    let tx_hash = client.vote(poll_id, choice).await?;
    println!("vote confirmed in {:#x}", tx_hash);
    Ok(())
}

pub async fn end(config: SessionConfig, matches: &ArgMatches<'_>) -> Result<()> {
    let poll_id = parse_poll_id(matches)?;
    let client = connect(config).await?;
    client.end_poll(poll_id).await?;
    println!("poll {} ended", poll_id);
    Ok(())
}

pub async fn request_results(config: SessionConfig, matches: &ArgMatches<'_>) -> Result<()> {
    let poll_id = parse_poll_id(matches)?;
    let client = connect(config).await?;
    let request_id = client.request_results(poll_id).await?;
    println!(
        "decryption requested for poll {} (request {}), watch for ResultsDecrypted",
        poll_id, request_id
    );
    Ok(())
}

pub async fn status(config: SessionConfig, matches: &ArgMatches<'_>) -> Result<()> {
    let client = connect(config).await?;
    let session = client.session()?;

    println!("address:  {:#x}", session.address());
    println!("chain:    {}", session.chain_id());
    println!("contract: {:#x}", session.contract_address());
    match session.balance().await {
        Ok(wei) => println!("balance:  {} ETH", format_ether(wei)),
        Err(err) => println!("balance:  unavailable ({})", err),
    }

    if let Some(poll) = matches.value_of("poll") {
        let poll_id: u64 = poll.parse().context("bad --poll")?;
        match client.refresh_decrypt_status(poll_id).await {
            Some(req) if req.status == DecryptStatus::Fulfilled => {
                println!("poll {}: decrypted, counts {:?} (request {})", poll_id, req.counts, req.request_id)
            }
            Some(req) => println!("poll {}: decryption pending (request {})", poll_id, req.request_id),
            None => println!("poll {}: no decryption requested", poll_id),
        }
    }
    Ok(())
}

pub async fn watch(config: SessionConfig, matches: &ArgMatches<'_>) -> Result<()> {
    let from_block: u64 = matches
        .value_of("from-block")
        .unwrap()
        .parse()
        .context("bad --from-block")?;
    let interval: u64 = matches
        .value_of("interval")
        .unwrap()
        .parse()
        .context("bad --interval")?;

    let client = connect(config).await?;
    for kind in [
        EventKind::PollCreated,
        EventKind::VoteCast,
        EventKind::ResultsRequested,
        EventKind::ResultsDecrypted,
        EventKind::PollEnded,
    ] {
        client.subscribe(kind, Arc::new(|event| println!("{}", describe(event))));
    }

    println!("watching for contract events, ctrl-c to stop");
    let watcher = client.event_watcher(from_block)?;
    watcher.run(Duration::from_secs(interval)).await;
    Ok(())
}

fn describe(event: &PollEvent) -> String {
    match event {
        PollEvent::PollCreated {
            poll_id,
            title,
            creator,
        } => format!(
            "PollCreated      poll={} title={:?} creator={:#x}",
            poll_id, title, creator
        ),
        PollEvent::VoteCast { poll_id, voter } => {
            format!("VoteCast         poll={} voter={:#x}", poll_id, voter)
        }
        PollEvent::ResultsRequested {
            poll_id,
            request_id,
        } => format!("ResultsRequested poll={} request={}", poll_id, request_id),
        PollEvent::ResultsDecrypted {
            poll_id,
            request_id,
            counts,
        } => format!(
            "ResultsDecrypted poll={} request={} counts={:?}",
            poll_id, request_id, counts
        ),
        PollEvent::PollEnded { poll_id } => format!("PollEnded        poll={}", poll_id),
    }
}
