use clap::Args;
use issnear_core::{distance_km, Coordinate};

use super::{parse_coordinate, CommandResult};

#[derive(Args)]
pub struct DistanceArgs {
    /// First point as LAT,LON
    #[arg(value_parser = parse_coordinate, allow_hyphen_values = true)]
    from: Coordinate,
    /// Second point as LAT,LON
    #[arg(value_parser = parse_coordinate, allow_hyphen_values = true)]
    to: Coordinate,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

pub fn run(args: DistanceArgs) -> CommandResult {
    let km = distance_km(args.from, args.to);
    if args.json {
        let out = serde_json::json!({
            "from": args.from,
            "to": args.to,
            "distance_km": km,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Distance: {km:.1} km");
    }
    Ok(())
}
