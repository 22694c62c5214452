use clap::{Parser, Subcommand};

use crate::create::CreateOpt;
use crate::dump::DumpOpt;
use crate::inspect::InspectOpt;

#[derive(Clone, Debug, Parser)]
#[command(about = "create, inspect, and dump .tck tickfile data")]
pub struct OptWrapper {
  #[command(subcommand)]
  pub opt: Opt,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Opt {
  Create(CreateOpt),
  Inspect(InspectOpt),
  Dump(DumpOpt),
}
