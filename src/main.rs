use clap::Parser;
use dotmatrixvideo::execute_with_video_options;
use dotmatrixvideo::{extract_options, CliData};
use log::error;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliData::parse();
    let result = extract_options(args).and_then(execute_with_video_options);
    if let Err(error) = result {
        error!("{}", error);
        std::process::exit(1);
    }
}
