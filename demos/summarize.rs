use std::error::Error;
use std::io;

fn main() -> Result<(), Box<dyn Error>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    tallies::app::run_summarize(std::env::args().skip(1), &mut out)
}
