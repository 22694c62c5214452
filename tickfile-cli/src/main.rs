use anyhow::Result;
use clap::Parser;

use crate::opt::{Opt, OptWrapper};

mod create;
mod dump;
mod inspect;
mod opt;

fn main() -> Result<()> {
  env_logger::init();
  let opt = OptWrapper::parse().opt;
  match opt {
    Opt::Create(create_opt) => create::create(create_opt),
    Opt::Inspect(inspect_opt) => inspect::inspect(inspect_opt),
    Opt::Dump(dump_opt) => dump::dump(dump_opt),
  }
}
