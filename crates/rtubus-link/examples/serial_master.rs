//! Reads holding registers from one unit once a second.
//!
//! cargo run -p rtubus-link --features serial --example serial_master -- --path /dev/ttyUSB0

use clap::Parser;
use rtubus_link::{
    response_channel, LinkConfig, RawReply, Response, ResponseHandle, RtuMaster, SerialConfig,
    SerialLink, SystemClock,
};
use std::time::{Duration, Instant};

#[derive(Debug, Parser)]
#[command(name = "serial_master", about = "Poll holding registers (FC03) over a serial line")]
struct Args {
    #[arg(long, default_value = "/dev/ttyUSB0")]
    path: String,
    #[arg(long, default_value_t = 9600)]
    baud: u32,
    #[arg(long, default_value_t = 1)]
    unit_id: u8,
    #[arg(long, default_value_t = 0)]
    start: u16,
    #[arg(long, default_value_t = 1)]
    quantity: u16,
    /// Response timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    timeout: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();

    let args = Args::parse();

    let port = SerialLink::open(&args.path, args.baud, &SerialConfig::default())?;
    let config = LinkConfig::default()
        .with_baud_rate(args.baud)
        .with_response_timeout(Duration::from_millis(args.timeout));
    let mut master = RtuMaster::new(port, SystemClock::new(), RawReply, config)?;

    let mut next_request = Instant::now();
    let mut in_flight: Option<ResponseHandle<Vec<u8>>> = None;
    loop {
        master.poll()?;

        if let Some(mut handle) = in_flight.take() {
            match handle.try_take() {
                Response::Pending => in_flight = Some(handle),
                Response::Complete(outcome, reply) => println!("{outcome:?}: {reply:02X?}"),
                Response::Abandoned => println!("request was not sent"),
            }
        }

        if in_flight.is_none() && Instant::now() >= next_request {
            let (callback, handle) = response_channel();
            let mut request = vec![0x03];
            request.extend_from_slice(&args.start.to_be_bytes());
            request.extend_from_slice(&args.quantity.to_be_bytes());
            if master.send(args.unit_id, request, (), Vec::new(), callback, true)? {
                in_flight = Some(handle);
            }
            next_request += Duration::from_secs(1);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
