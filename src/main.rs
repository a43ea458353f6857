use std::error::Error as _;

use bevy::app::AppExit;

mod cli;

use cli::Cli;

fn main() -> AppExit {
    let cli = Cli::parse_args();
    let launch = match cli.launch_config() {
        Ok(launch) => launch,
        Err(err) => {
            // bevy's logger is not up yet
            match err.source() {
                Some(source) => eprintln!("adorapet: {err}: {source}"),
                None => eprintln!("adorapet: {err}"),
            }
            return AppExit::error();
        }
    };
    adorapet::app::build_app(launch).run()
}
