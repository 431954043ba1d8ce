//! Run one producer and one consumer over a small ring, then dump the event trace.
//!
//! ```bash
//! cargo run --example trace_demo -- --strategy spin --count 40
//! RUST_LOG=ph_lockring=trace cargo run --example trace_demo
//! ```

use std::io;
use std::sync::Barrier;
use std::thread;

use clap::Parser;
use ph_lockring::{AnyLock, EventLog, LockStrategy, RawLock, RingBuffer};
use tracing_subscriber::EnvFilter;

const CAPACITY: usize = 12;

#[derive(Parser, Debug)]
#[command(about = "SPSC ring buffer with an event trace")]
struct Args {
    /// Lock strategy guarding the ring: `mutex` or `spin`.
    #[arg(short, long, default_value_t = LockStrategy::Mutex)]
    strategy: LockStrategy,

    /// Values the producer sends before the end-of-stream sentinel.
    #[arg(short, long, default_value_t = 30)]
    count: u32,
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let log = EventLog::new();
    let ring = RingBuffer::<u32, CAPACITY, _, _>::with_trace(AnyLock::new(args.strategy), &log);
    let start = Barrier::new(2);

    let received = thread::scope(|s| {
        s.spawn(|| {
            let producer = ring.producer();
            start.wait();
            for v in 0..args.count {
                producer.push(v);
            }
            producer.finish();
        });

        let consumer = s.spawn(|| {
            start.wait();
            ring.consumer().count()
        });
        consumer.join()
    });
    let received = received.map_err(|_| io::Error::other("consumer thread panicked"))?;

    let stats = ring.lock().stats();
    println!(
        "strategy={} sent={} received={} overwritten={} contended(producer={}, consumer={})",
        args.strategy,
        args.count,
        received,
        ring.overwritten(),
        stats.producer,
        stats.consumer,
    );
    log.dump(&mut io::stdout().lock())?;
    Ok(())
}
