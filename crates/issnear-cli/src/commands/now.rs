use clap::Args;
use issnear_core::{distance_km, Config, OpenNotifyClient, TargetFeed};

use super::{runtime, CommandResult};

#[derive(Args)]
pub struct NowArgs {
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

pub fn run(args: NowArgs) -> CommandResult {
    let config = Config::load()?;
    let client = OpenNotifyClient::new(config.feed.endpoint.clone(), config.feed_timeout())?;
    let position = runtime()?.block_on(client.fetch_position())?;
    let distance = config.home_location().map(|home| distance_km(home, position));

    if args.json {
        let out = serde_json::json!({
            "position": position,
            "distance_km": distance,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("ISS position: {position}");
        if let Some(d) = distance {
            println!("Distance: {d:.1} km");
        }
    }
    Ok(())
}
