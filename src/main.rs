use lofi::app::AppOptions;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    lofi::app::run(options)
}

fn parse_args(args: Vec<String>) -> anyhow::Result<AppOptions> {
    let mut out = AppOptions::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--null-audio" => out.null_audio = true,
            flag @ ("--catalog" | "--folder" | "--base-url" | "--noise-base") => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("{flag} requires a value");
                };
                let value = value.trim();
                if value.is_empty() {
                    anyhow::bail!("{flag} cannot be empty");
                }
                match flag {
                    "--catalog" => out.catalog_path = Some(PathBuf::from(value)),
                    "--folder" => out.folder = Some(PathBuf::from(value)),
                    "--base-url" => out.base_url = Some(value.to_string()),
                    _ => out.noise_base = Some(value.to_string()),
                }
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

const HELP: &str = "\
lofi
  --catalog <file>       JSON list of track paths
  --folder <dir>         Play audio files found under a local folder
  --base-url <url>       Prefix joined with catalog paths
  --noise-base <loc>     Directory or URL holding the noise loops
  --null-audio           Run without an audio device

The bundled catalog is a short sample list; point --catalog or --folder at
your own music for a full library.
Noise loops are not shipped. Put brown_noise.mp3, blue_noise.mp3 and
white_noise.mp3 in ~/.config/lofi/noise/ (or $LOFI_CONFIG_DIR/noise/), or
pass --noise-base with the directory or URL that holds them.";

fn print_help() {
    println!("{HELP}");
}
