//! Scalar multiply over a queue device file.
//!
//! ```text
//! cargo run --example scalar_mul -- /dev/mac8-q0 6 7
//! ```

use mac8_driver::{compute, QueueChannel, Request, Result, TransferConfig};
use std::path::Path;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("mac8_driver=info")
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (queue, a, b) = match &args[..] {
        [_, queue, a, b] => (
            queue.clone(),
            a.parse().expect("operand a must be an integer"),
            b.parse().expect("operand b must be an integer"),
        ),
        _ => {
            eprintln!("usage: scalar_mul <queue> <a> <b>");
            std::process::exit(2);
        }
    };

    println!("On queue: {queue}");
    println!("Evaluating {a} * {b} with hardware multiplier.");

    let mut chan = QueueChannel::open(Path::new(&queue))?;
    let outcome = compute(&mut chan, &TransferConfig::queue(), &Request::Scalar { a, b })?;

    println!("Expected result is {}", outcome.expected);
    println!("Data read is {}", outcome.actual);

    Ok(())
}
