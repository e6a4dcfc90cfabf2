mod device;
mod error;
pub mod fd;
pub mod repl;

use error::Result;
use repl::Repl;

fn main() -> Result<()> {
    env_logger::init();
    Repl::new(std::env::args().nth(1))?.run();
    Ok(())
}
