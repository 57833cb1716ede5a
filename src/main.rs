use std::path::PathBuf;

use reelfeed::app::RunOptions;

fn main() {
    let options = match handle_cli_flags() {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = reelfeed::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Parses flags; `Ok(None)` means a flag was handled and the program exits.
fn handle_cli_flags() -> Result<Option<RunOptions>, String> {
    let mut options = RunOptions::default();
    let mut comments_for: Option<String> = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("reelfeed {}", reelfeed::VERSION);
                return Ok(None);
            }
            "--help" | "-h" => {
                println!(
                    "reelfeed {}: scroll a vertical video feed from the terminal.\n\n  --feed <path>          Load the video list from a JSON file\n  --config <path>        Read configuration from this YAML file\n  --comments <video-id>  Print stored comments for a video as JSON and exit\n  --version, -V          Show version and exit\n  --help,    -h          Show this help message",
                    reelfeed::VERSION
                );
                return Ok(None);
            }
            "--feed" => options.feed = Some(PathBuf::from(value_for(&arg, args.next())?)),
            "--config" => options.config = Some(PathBuf::from(value_for(&arg, args.next())?)),
            "--comments" => comments_for = Some(value_for(&arg, args.next())?),
            other => return Err(format!("unknown argument: {other} (see --help)")),
        }
    }

    if let Some(video_id) = comments_for {
        if let Err(err) = reelfeed::app::print_comments(&video_id, &options) {
            eprintln!("error: {err:?}");
            std::process::exit(1);
        }
        return Ok(None);
    }

    Ok(Some(options))
}

fn value_for(flag: &str, value: Option<String>) -> Result<String, String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| format!("{flag} needs a value"))
}
