// Copyright 2026 hikari-fs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cmd;

use clap::{Parser, Subcommand};
use snafu::Whatever;

use crate::cmd::validate::ValidateArgs;

#[derive(Debug, Parser)]
#[clap(name = "hikari", about = "hikari-fs client", version)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Validate(ValidateArgs),
}

fn main() -> Result<(), Whatever> {
    hikari_utils::logger::init("info");
    let cli = Cli::parse();
    match cli.commands {
        Commands::Validate(validate_args) => validate_args.run(),
    }
}
