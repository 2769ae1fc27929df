#[macro_use]
extern crate clap;

use std::path::PathBuf;

use clap::Shell;

#[path = "src/cli.rs"]
mod cli;

fn main() {
    let mut cli = cli::generate_cli();
    let mut out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());
    out_dir.pop();
    out_dir.pop();
    out_dir.pop();

    cli.gen_completions("apkscope", Shell::Bash, &out_dir);
    cli.gen_completions("apkscope", Shell::Fish, out_dir);
}
