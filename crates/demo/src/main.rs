mod config;
mod script;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use arena::{
    ArenaWorld, DriverExit, LinkConditions, LoopbackEnd, LoopbackLink, LoopbackTransport,
    NetworkSession, PeerDriver, SessionConfig, SessionOutcome, WireFormat, WorldSettings,
};
use config::DemoConfig;
use script::ScriptedPlayer;

#[derive(Parser)]
#[command(name = "arena-demo")]
#[command(about = "Two scripted peers playing one arena match over a simulated link")]
struct Args {
    #[arg(long, default_value_t = 0.0, help = "Snapshot loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,

    #[arg(long, help = "Use the binary wire format instead of JSON")]
    binary: bool,

    #[arg(long, default_value_t = 3)]
    target_score: usize,

    #[arg(long, default_value_t = 8)]
    resources: usize,

    #[arg(long, default_value_t = 60)]
    max_seconds: u64,
}

impl Args {
    fn into_config(self) -> DemoConfig {
        let simulate = self.loss_percent > 0.0 || self.max_latency > 0 || self.jitter > 0;
        DemoConfig {
            link: LinkConditions {
                enabled: simulate,
                loss_percent: self.loss_percent.clamp(0.0, 100.0),
                min_latency_ms: self.min_latency,
                max_latency_ms: self.max_latency.max(self.min_latency),
                jitter_ms: self.jitter,
            },
            wire_format: if self.binary {
                WireFormat::Binary
            } else {
                WireFormat::Json
            },
            target_score: self.target_score.max(1),
            resources: self.resources.max(1),
            max_duration: Duration::from_secs(self.max_seconds),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    log::info!("starting match: {config:?}");

    let (link, end_a, end_b) = LoopbackLink::pair(config.link.clone());
    let mut a = driver(end_a, &config);
    let mut b = driver(end_b, &config);
    link.connect();

    let mut script_a = ScriptedPlayer::new(config.resources);
    let mut script_b = ScriptedPlayer::new(config.resources);
    let (exit_a, exit_b) = tokio::join!(
        a.run(
            |session, world, dt| script_a.frame(session, world, dt),
            tokio::time::sleep(config.max_duration),
        ),
        b.run(
            |session, world, dt| script_b.frame(session, world, dt),
            tokio::time::sleep(config.max_duration),
        ),
    );

    report(&a, exit_a);
    report(&b, exit_b);
    Ok(())
}

fn driver(end: LoopbackEnd, config: &DemoConfig) -> PeerDriver<LoopbackTransport, ArenaWorld> {
    let session_config = SessionConfig::default().with_wire_format(config.wire_format);
    let session = NetworkSession::new(session_config, end.peer, end.transport);
    let world = ArenaWorld::new(WorldSettings {
        target_score: config.target_score,
        ..Default::default()
    });
    PeerDriver::new(session, world, end.events).with_frame_rate(config.frame_rate)
}

fn report(driver: &PeerDriver<LoopbackTransport, ArenaWorld>, exit: DriverExit) {
    let session = driver.session();
    let role = match session.is_host() {
        Some(true) => "host",
        Some(false) => "client",
        None => "unelected",
    };
    let result = match exit {
        DriverExit::Finished(SessionOutcome::GameOver { local_won: true }) => "won",
        DriverExit::Finished(SessionOutcome::GameOver { local_won: false }) => "lost",
        DriverExit::Finished(SessionOutcome::Disconnected) => "disconnected",
        DriverExit::Shutdown => "timed out",
        DriverExit::InboxClosed => "lost its transport",
    };
    let scores: Vec<usize> = driver.sim().players().iter().map(|p| p.score()).collect();
    let stats = session.stats();

    println!("{} ({role}) {result}, scores {scores:?}", session.local_peer());
    println!(
        "  sent {} envelopes / {} bytes ({} snapshots), received {} / {} bytes ({} snapshots applied)",
        stats.envelopes_sent,
        stats.bytes_sent,
        stats.snapshots_sent,
        stats.envelopes_received,
        stats.bytes_received,
        stats.snapshots_applied
    );
    println!(
        "  {} decode failures, {} dropped for state, {} send failures, {} lost on the link",
        stats.decode_failures,
        stats.dropped_for_state,
        stats.send_failures,
        session.transport().dropped()
    );
}
