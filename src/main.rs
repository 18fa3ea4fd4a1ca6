use crate::cli::run;

mod catalog;
pub mod cli;
mod config;
pub mod domain;
pub mod http;
pub mod reveal;
pub mod storage;
mod throwback;

fn main() -> anyhow::Result<()> {
    run()
}
