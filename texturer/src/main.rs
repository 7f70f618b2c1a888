use simplelog::{
    ColorChoice, Config, LevelFilter, TermLogger, TerminalMode,
};
use structopt::StructOpt;

use texturer::pipeline::{texture_with_params, TextureParams};

#[derive(StructOpt)]
#[structopt(about = "Texture reconstruction for scanned meshes")]
struct Opts {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    #[structopt(name = "texture")]
    Texture(TextureParams),
}

fn main() {
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .ok();

    let opts = Opts::from_args();

    let res = match opts.command {
        Command::Texture(params) => texture_with_params(&params),
    };

    if let Err(err) = res {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
