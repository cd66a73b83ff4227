//! Long-running stress test for endpoint group fan-out.
//!
//! Each round deploys one project to every mock endpoint while, at the same
//! time, listing the images of another project with a random subset of
//! endpoints failing. After every round the failure counts, the flattened
//! listing and the post-clean container state are checked.
//!
//! Usage:
//!   cargo run --bin fanout_stress -- [--rounds N] [--endpoints N] [--seed N] [--verbose]
//!
//! Log output is controlled with `ARMADA_LOG` (e.g. `ARMADA_LOG=armada_core=debug`).

use armada_core::{EndpointFailure, EndpointGroup, GroupListing};
use armada_runtime::{EndpointClient, ImageInfo, MockClient, Operation, OutputSink};
use armada_schema::{Dockerfile, Project, Revision};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const DOCKERFILE: &str = "FROM alpine:3.20\nCOPY . /srv\nCMD [\"/srv/start\"]\n";

struct Options {
    rounds: usize,
    endpoints: usize,
    seed: u64,
    verbose: bool,
}

impl Options {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .and_then(|s| s.parse::<u64>().ok())
        };
        Self {
            rounds: value("--rounds").map_or(200, |v| v as usize),
            endpoints: value("--endpoints").map_or(16, |v| v as usize),
            seed: value("--seed").unwrap_or(0x5eed),
            verbose: args.iter().any(|a| a == "--verbose"),
        }
    }
}

#[derive(Default)]
struct Timings {
    concurrent: Duration,
    clean: Duration,
    list: Duration,
}

struct Fleet {
    group: EndpointGroup,
    mocks: Vec<MockClient>,
    app: Project,
    cache: Project,
    dockerfile: Dockerfile,
}

impl Fleet {
    fn new(size: usize, rng: &mut StdRng) -> Self {
        let app = Project::new("app").expect("valid project name");
        let cache = Project::new("cache").expect("valid project name");
        let mocks: Vec<MockClient> = (0..size)
            .map(|i| {
                MockClient::new(format!("mock://stress-{i:03}").as_str())
                    .with_delay(Duration::from_micros(rng.gen_range(0..2_000)))
                    .with_image(&cache, &format!("cache:seed-{i}"))
            })
            .collect();
        let group = EndpointGroup::from_clients(
            mocks
                .iter()
                .cloned()
                .map(|m| Box::new(m) as Box<dyn EndpointClient>),
        )
        .expect("unique endpoints");
        Self {
            group,
            mocks,
            app,
            cache,
            dockerfile: Dockerfile::from_content(DOCKERFILE),
        }
    }

    /// Arm a random subset of endpoints to fail `list_images` and return
    /// their indices.
    fn arm_faults(&self, rng: &mut StdRng) -> BTreeSet<usize> {
        let count = rng.gen_range(0..=self.mocks.len());
        let mut failing = BTreeSet::new();
        while failing.len() < count {
            failing.insert(rng.gen_range(0..self.mocks.len()));
        }
        for (i, mock) in self.mocks.iter().enumerate() {
            mock.clear_faults();
            if failing.contains(&i) {
                mock.fail_on(Operation::ListImages, "registry unreachable");
            }
        }
        failing
    }
}

fn run_round(
    fleet: &Fleet,
    round: usize,
    rng: &mut StdRng,
    timings: &mut Timings,
) -> Result<(), String> {
    let failing = fleet.arm_faults(rng);
    let revision = Revision::new(format!("r{round:08}"));
    let force = round.is_multiple_of(10);
    let sink = OutputSink::discard();

    let t0 = Instant::now();
    let (deploy, images): (Vec<EndpointFailure>, GroupListing<ImageInfo>) = thread::scope(|s| {
        let deploy = s.spawn(|| {
            fleet
                .group
                .deploy(&fleet.app, &revision, &fleet.dockerfile, &sink, force)
        });
        let images = fleet.group.list_images(&fleet.cache);
        (deploy.join().unwrap_or_default(), images)
    });
    timings.concurrent += t0.elapsed();

    if !deploy.is_empty() {
        return Err(format!(
            "round {round}: DEPLOY FAILED on {} endpoints: {}",
            deploy.len(),
            deploy[0]
        ));
    }
    if images.failures.len() != failing.len() {
        return Err(format!(
            "round {round}: expected {} list failures, got {}",
            failing.len(),
            images.failures.len()
        ));
    }
    let healthy = fleet.mocks.len() - failing.len();
    if images.items.len() != healthy {
        return Err(format!(
            "round {round}: expected {healthy} images, got {}",
            images.items.len()
        ));
    }
    if images.items.iter().any(|img| img.project != fleet.cache.name()) {
        return Err(format!("round {round}: listing leaked images of another project"));
    }

    let t0 = Instant::now();
    let clean = fleet.group.clean(&fleet.app);
    timings.clean += t0.elapsed();
    if !clean.is_empty() {
        return Err(format!("round {round}: CLEAN FAILED: {}", clean[0]));
    }

    let t0 = Instant::now();
    let containers = fleet.group.list_containers(&fleet.app);
    timings.list += t0.elapsed();
    if !containers.is_complete() || !containers.items.is_empty() {
        return Err(format!(
            "round {round}: {} containers and {} failures left after clean",
            containers.items.len(),
            containers.failures.len()
        ));
    }
    Ok(())
}

fn print_report(opts: &Options, failures: u64, timings: &Timings) {
    let per_round = |d: Duration| d.as_secs_f64() * 1000.0 / opts.rounds.max(1) as f64;

    println!();
    println!("============================================");
    println!(
        "Results: {} rounds x {} endpoints, {failures} failures",
        opts.rounds, opts.endpoints
    );
    println!(
        "  deploy+list: {:.3}s total, {:.3}ms avg",
        timings.concurrent.as_secs_f64(),
        per_round(timings.concurrent)
    );
    println!(
        "  clean:       {:.3}s total, {:.3}ms avg",
        timings.clean.as_secs_f64(),
        per_round(timings.clean)
    );
    println!(
        "  list:        {:.3}s total, {:.3}ms avg",
        timings.list.as_secs_f64(),
        per_round(timings.list)
    );

    if failures > 0 {
        eprintln!("\nSTRESS TEST FAILED");
        std::process::exit(1);
    } else {
        println!("\nSTRESS TEST PASSED");
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("ARMADA_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let opts = Options::from_args();
    init_logging(opts.verbose);

    println!(
        "Armada fan-out stress test: {} rounds, {} endpoints, seed {:#x}",
        opts.rounds, opts.endpoints, opts.seed
    );
    println!("============================================");

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let fleet = Fleet::new(opts.endpoints, &mut rng);
    let mut timings = Timings::default();
    let mut failures = 0u64;

    for round in 1..=opts.rounds {
        if let Err(msg) = run_round(&fleet, round, &mut rng, &mut timings) {
            eprintln!("  {msg}");
            failures += 1;
            continue;
        }
        if round.is_multiple_of(50) {
            let elapsed = timings.concurrent + timings.clean + timings.list;
            println!(
                "  round {round}/{}: {:.1}s elapsed, {failures} failures",
                opts.rounds,
                elapsed.as_secs_f64()
            );
        }
    }

    print_report(&opts, failures, &timings);
}
